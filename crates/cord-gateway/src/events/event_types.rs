//! Dispatch event names
//!
//! Well-known names carried in the `t` field of dispatch frames. Unknown names
//! are still delivered to the sink as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares the event enum together with its wire names so the two lists
/// cannot drift apart.
macro_rules! event_types {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// Dispatch event names the client knows about
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum GatewayEventType {
            $($(#[$doc])* #[serde(rename = $name)] $variant,)+
        }

        impl GatewayEventType {
            /// Every known event type
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Wire name of this event type
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Look up an event type by wire name
            #[must_use]
            pub fn from_str(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

event_types! {
    /// Identify accepted; carries the session id and resume URL
    Ready => "READY",
    /// Resume accepted; missed events have been replayed
    Resumed => "RESUMED",

    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    /// Reply to Request Guild Members (op 8)
    GuildMembersChunk => "GUILD_MEMBERS_CHUNK",

    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ThreadCreate => "THREAD_CREATE",

    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",

    InteractionCreate => "INTERACTION_CREATE",
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",
    UserUpdate => "USER_UPDATE",

    /// Someone joined, left or moved voice channels
    VoiceStateUpdate => "VOICE_STATE_UPDATE",
    /// Voice server assignment for this client
    VoiceServerUpdate => "VOICE_SERVER_UPDATE",
}

impl GatewayEventType {
    /// Check if this event completes a handshake
    #[must_use]
    pub const fn is_session_start(self) -> bool {
        matches!(self, Self::Ready | Self::Resumed)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
