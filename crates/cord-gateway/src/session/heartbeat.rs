//! Heartbeat timer
//!
//! Deadline-based rather than task-based: the session polls [`HeartbeatTimer::deadline`]
//! in its select loop and calls [`HeartbeatTimer::fire`] when it passes. Stopping the
//! timer is therefore synchronous and nothing can beat on a replaced socket.

use rand::Rng;
use tokio::time::{Duration, Instant};

/// What to do on a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Previous beat was acknowledged; send another
    Send,
    /// Previous beat was never acknowledged; the connection is dead
    Missed,
}

/// Periodic liveness timer for one socket
#[derive(Debug, Default)]
pub struct HeartbeatTimer {
    interval: Option<Duration>,
    next_beat: Option<Instant>,
    acknowledged: bool,
}

impl HeartbeatTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) beating every `interval`
    ///
    /// The first beat is delayed by a uniformly random amount in `[0, interval)`
    /// so that many clients reconnecting together do not beat in lockstep.
    /// Returns the chosen delay.
    pub fn start(&mut self, interval: Duration) -> Duration {
        let first_delay = if interval.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..interval)
        };
        self.start_with_delay(interval, first_delay);
        first_delay
    }

    /// Start beating with an explicit first delay
    pub fn start_with_delay(&mut self, interval: Duration, first_delay: Duration) {
        // Optimistic: nothing has been sent yet, so nothing is owed
        self.acknowledged = true;
        self.interval = Some(interval);
        self.next_beat = Some(Instant::now() + first_delay);
    }

    /// Cancel all pending beats
    pub fn stop(&mut self) {
        self.interval = None;
        self.next_beat = None;
    }

    /// Record a heartbeat ACK
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.next_beat.is_some()
    }

    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// When the next beat is due, if running
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.next_beat
    }

    /// Consume the due beat and schedule the next one
    ///
    /// The next deadline is the previous deadline plus the interval, so beats
    /// stay exactly one interval apart. A missed beat stops the timer.
    pub fn fire(&mut self) -> Option<Beat> {
        let (interval, due) = self.interval.zip(self.next_beat)?;

        if self.acknowledged {
            self.acknowledged = false;
            self.next_beat = Some(due + interval);
            Some(Beat::Send)
        } else {
            self.stop();
            Some(Beat::Missed)
        }
    }
}
