//! Gateway Integration Tests
//!
//! Each test starts a mock gateway on a local port and drives a real session
//! against it over WebSocket. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::collections::HashMap;
use std::time::Duration;

use cord_common::ClientConfig;
use cord_gateway::error::ResolveError;
use cord_gateway::{
    ChannelSink, DispatchEvent, EndpointResolver, GatewayError, GatewayEvent, GatewayResult,
    GatewaySessionBuilder, HttpEndpointResolver, Intents, OpCode, SessionHandle, SessionState,
    StaticResolver,
};
use integration_tests::{
    dispatch, hello, invalid_session, ready, reconnect, resumed, BotResponse, MockConnection,
    MockGateway, TEST_TOKEN, WAIT,
};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const QUIET_HEARTBEAT_MS: u64 = 45_000;

struct Client {
    handle: SessionHandle,
    events: UnboundedReceiver<GatewayEvent>,
    task: JoinHandle<GatewayResult<()>>,
}

impl Client {
    fn start(builder: GatewaySessionBuilder) -> Self {
        let (sink, events) = ChannelSink::new();
        let (mut session, handle) = builder
            .sink(sink)
            .reconnect_delay(Duration::from_millis(50))
            .build()
            .expect("Failed to build session");
        let task = tokio::spawn(async move { session.run().await });
        Self {
            handle,
            events,
            task,
        }
    }

    fn against(mock: &MockGateway) -> Self {
        Self::start(
            GatewaySessionBuilder::new()
                .token(TEST_TOKEN)
                .resolver(StaticResolver::new(mock.gateway_url()))
                .intents(&[Intents::GUILDS, Intents::GUILD_MESSAGES]),
        )
    }

    async fn next_event(&mut self) -> GatewayEvent {
        tokio::time::timeout(WAIT, self.events.recv())
            .await
            .expect("Timed out waiting for an event")
            .expect("Event channel closed")
    }

    async fn finish(self) -> GatewayResult<()> {
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("Session did not stop")
            .expect("Session task panicked")
    }
}

/// Accept the first socket, complete Identify and READY (seq 1, session "sess-1")
async fn establish(mock: &mut MockGateway, client: &mut Client) -> MockConnection {
    let mut conn = mock.accept().await.unwrap();
    conn.send(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    let identify = conn.next_message().await.unwrap().unwrap();
    assert_eq!(identify.op, OpCode::Identify);

    conn.send(&ready(1, "sess-1", &mock.resume_url())).await.unwrap();
    assert!(matches!(
        client.next_event().await,
        GatewayEvent::Dispatch(DispatchEvent::Ready(_))
    ));
    conn
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);

    let mut conn = mock.accept().await.unwrap();
    assert_eq!(conn.uri, "/gateway?v=10&encoding=json");

    conn.send(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    let identify = conn.next_message().await.unwrap().unwrap();
    assert_eq!(identify.op, OpCode::Identify);
    assert_eq!(
        identify.d,
        Some(json!({
            "token": TEST_TOKEN,
            "intents": 513,
            "compress": true,
            "properties": {},
        }))
    );

    conn.send(&ready(1, "sess-1", &mock.resume_url())).await.unwrap();
    match client.next_event().await {
        GatewayEvent::Dispatch(DispatchEvent::Ready(ready)) => {
            assert_eq!(ready.session_id, "sess-1");
            assert_eq!(ready.guilds.len(), 1);
        }
        other => panic!("Expected READY, got {other:?}"),
    }
    assert_eq!(
        client.handle.wait_for(SessionState::Established).await.unwrap(),
        SessionState::Established
    );

    conn.send(&dispatch("MESSAGE_CREATE", 2, json!({ "content": "hi" })))
        .await
        .unwrap();
    assert_eq!(
        client.next_event().await,
        GatewayEvent::Dispatch(DispatchEvent::Other {
            event_type: "MESSAGE_CREATE".to_string(),
            data: json!({ "content": "hi" }),
        })
    );

    client.handle.shutdown().await.unwrap();
    assert_eq!(conn.expect_close().await.unwrap(), Some(1000));
    assert!(client.finish().await.is_ok());
}

#[tokio::test]
async fn test_heartbeats_follow_hello_interval() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let client = Client::against(&mock);

    let mut conn = mock.accept().await.unwrap();
    conn.send(&hello(100)).await.unwrap();
    assert_eq!(conn.next_frame().await.unwrap().unwrap().op, OpCode::Identify);

    // No sequence seen yet
    let first = conn.next_frame().await.unwrap().unwrap();
    assert_eq!(first.op, OpCode::Heartbeat);
    assert_eq!(first.d, Some(serde_json::Value::Null));

    conn.send(&cord_gateway::GatewayMessage::new(
        OpCode::HeartbeatAck,
        serde_json::Value::Null,
    ))
    .await
    .unwrap();
    conn.send(&dispatch("TYPING_START", 3, json!({}))).await.unwrap();

    let second = conn.next_frame().await.unwrap().unwrap();
    assert_eq!(second.op, OpCode::Heartbeat);
    assert_eq!(second.d, Some(json!(3)));

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

#[tokio::test]
async fn test_compressed_frames() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);

    let mut conn = mock.accept().await.unwrap();
    conn.send_compressed(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    assert_eq!(conn.next_message().await.unwrap().unwrap().op, OpCode::Identify);

    conn.send_compressed(&ready(1, "zipped", &mock.resume_url()))
        .await
        .unwrap();
    match client.next_event().await {
        GatewayEvent::Dispatch(DispatchEvent::Ready(ready)) => assert_eq!(ready.session_id, "zipped"),
        other => panic!("Expected READY, got {other:?}"),
    }

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

// ============================================================================
// Resume Tests
// ============================================================================

#[tokio::test]
async fn test_resume_after_reconnectable_close() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);
    let mut conn = establish(&mut mock, &mut client).await;

    conn.send(&dispatch("MESSAGE_CREATE", 42, json!({}))).await.unwrap();
    client.next_event().await;
    conn.close(4000).await.unwrap();

    let mut conn = mock.accept().await.unwrap();
    assert_eq!(conn.uri, "/resume?v=10&encoding=json");

    conn.send(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    let resume = conn.next_message().await.unwrap().unwrap();
    assert_eq!(resume.op, OpCode::Resume);
    assert_eq!(
        resume.d,
        Some(json!({ "token": TEST_TOKEN, "session_id": "sess-1", "seq": 42 }))
    );

    conn.send(&resumed(43)).await.unwrap();
    assert_eq!(
        client.next_event().await,
        GatewayEvent::Dispatch(DispatchEvent::Resumed)
    );

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

#[tokio::test]
async fn test_reconnect_request() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);
    let mut conn = establish(&mut mock, &mut client).await;

    conn.send(&reconnect()).await.unwrap();
    assert_eq!(conn.expect_close().await.unwrap(), Some(4000));

    let mut conn = mock.accept().await.unwrap();
    assert!(conn.uri.starts_with("/resume"));
    conn.send(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    assert_eq!(conn.next_message().await.unwrap().unwrap().op, OpCode::Resume);
    mock.expect_no_connection(Duration::from_millis(200)).await.unwrap();

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

#[tokio::test]
async fn test_resumable_invalid_session() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);
    let mut conn = establish(&mut mock, &mut client).await;

    conn.send(&invalid_session(true)).await.unwrap();
    assert_eq!(conn.expect_close().await.unwrap(), Some(4000));
    assert!(mock.accept().await.unwrap().uri.starts_with("/resume"));

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

// ============================================================================
// Terminal Failure Tests
// ============================================================================

#[tokio::test]
async fn test_terminal_close_code() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);
    let conn = establish(&mut mock, &mut client).await;

    conn.close(4004).await.unwrap();

    assert!(matches!(client.next_event().await, GatewayEvent::Fatal(msg) if msg.contains("4004")));
    assert_eq!(client.handle.state(), SessionState::Failed);
    mock.expect_no_connection(Duration::from_millis(200)).await.unwrap();

    let result = client.finish().await;
    assert!(matches!(result, Err(GatewayError::Closed { code: Some(4004) })));
}

#[tokio::test]
async fn test_invalid_session_not_resumable() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let mut client = Client::against(&mock);
    let mut conn = establish(&mut mock, &mut client).await;

    conn.send(&invalid_session(false)).await.unwrap();
    assert_eq!(conn.expect_close().await.unwrap(), Some(1000));
    assert!(matches!(client.next_event().await, GatewayEvent::Fatal(_)));
    mock.expect_no_connection(Duration::from_millis(200)).await.unwrap();

    let result = client.finish().await;
    assert!(matches!(result, Err(GatewayError::InvalidSession)));
}

// ============================================================================
// Endpoint Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_http_resolver_discovers_gateway() {
    let mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let resolver = HttpEndpointResolver::new(mock.api_base_url(), TEST_TOKEN, "tests/1.0").unwrap();

    let info = resolver.resolve().await.unwrap();
    assert_eq!(info.url, mock.gateway_url());
    assert_eq!(info.shards, 1);

    let requests = mock.bot_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bot test-token"));
    let user_agent = requests[0].user_agent.clone().unwrap();
    assert!(user_agent.starts_with("DiscordBot (cord, "));
    assert!(user_agent.ends_with("tests/1.0"));
}

#[tokio::test]
async fn test_http_resolver_errors() {
    let mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let resolver = HttpEndpointResolver::new(mock.api_base_url(), TEST_TOKEN, "").unwrap();

    mock.set_bot_response(BotResponse::Unauthorized);
    match resolver.resolve().await {
        Err(ResolveError::Status { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "401: Unauthorized");
        }
        other => panic!("Expected a status error, got {other:?}"),
    }

    mock.set_bot_response(BotResponse::RateLimited);
    match resolver.resolve().await {
        Err(ResolveError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(1.5)),
        other => panic!("Expected a rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_session_resolves_through_rest() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let resolver = HttpEndpointResolver::new(mock.api_base_url(), TEST_TOKEN, "").unwrap();
    let client = Client::start(
        GatewaySessionBuilder::new()
            .token(TEST_TOKEN)
            .resolver(resolver),
    );

    let conn = mock.accept().await.unwrap();
    assert_eq!(conn.uri, "/gateway?v=10&encoding=json");
    assert_eq!(mock.bot_requests().len(), 1);

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}

#[tokio::test]
async fn test_failed_discovery_is_fatal() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    mock.set_bot_response(BotResponse::Unauthorized);
    let resolver = HttpEndpointResolver::new(mock.api_base_url(), TEST_TOKEN, "").unwrap();
    let mut client = Client::start(
        GatewaySessionBuilder::new()
            .token(TEST_TOKEN)
            .resolver(resolver),
    );

    assert!(matches!(client.next_event().await, GatewayEvent::Fatal(_)));
    mock.expect_no_connection(Duration::from_millis(200)).await.unwrap();
    assert!(matches!(client.finish().await, Err(GatewayError::Resolve(_))));
}

#[tokio::test]
async fn test_session_from_environment_config() {
    let mut mock = MockGateway::start().await.expect("Failed to start mock gateway");
    let vars: HashMap<&str, String> = HashMap::from([
        ("GATEWAY_TOKEN", TEST_TOKEN.to_string()),
        ("GATEWAY_URL", mock.gateway_url()),
        ("GATEWAY_INTENTS", "1,4096".to_string()),
        ("GATEWAY_COMPRESS", "false".to_string()),
    ]);
    let config = ClientConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let client = Client::start(GatewaySessionBuilder::from_config(&config).unwrap());

    let mut conn = mock.accept().await.unwrap();
    conn.send(&hello(QUIET_HEARTBEAT_MS)).await.unwrap();
    let identify = conn.next_message().await.unwrap().unwrap();
    let d = identify.d.unwrap();
    assert_eq!(d["intents"], json!(4097));
    assert_eq!(d["compress"], json!(false));
    assert!(mock.bot_requests().is_empty());

    client.handle.shutdown().await.unwrap();
    assert!(client.finish().await.is_ok());
}
