//! End-to-end tests over TCP loopback: wire scenarios for completion,
//! engine failure, client disconnect, default budgets, and serialization.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use genrelay::engine::{ScriptStep, ScriptedEngine, StubEngine};
use genrelay::server::framing::{read_frame, write_frame};
use genrelay::server::protocol::{
    decode_message, encode_message, GenerateRequest, RequestId, WireMessage,
    DEFAULT_MAX_FRAME_SIZE,
};
use genrelay::{shared_engine, Server, ServerConfig, SharedEngine};

async fn start_server(engine: SharedEngine, config: ServerConfig) -> (std::net::SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(engine, config);
    let token = CancellationToken::new();
    let run_token = token.clone();
    tokio::spawn(async move {
        server.run(listener, run_token).await.unwrap();
    });
    (addr, token)
}

async fn send_generate(stream: &mut TcpStream, request: GenerateRequest) {
    let frame = encode_message(&WireMessage::Generate(request), DEFAULT_MAX_FRAME_SIZE).unwrap();
    write_frame(stream, &frame).await.unwrap();
}

async fn read_message(stream: &mut TcpStream) -> WireMessage {
    let frame = read_frame(stream, DEFAULT_MAX_FRAME_SIZE)
        .await
        .unwrap()
        .expect("stream closed before a terminal message");
    decode_message(&frame, DEFAULT_MAX_FRAME_SIZE).unwrap()
}

fn prompt_request(id: u64, prompt: &str, max_tokens: u32) -> GenerateRequest {
    GenerateRequest {
        request_id: RequestId(id),
        prompt: Some(prompt.to_string()),
        messages: Vec::new(),
        temperature: 0.0,
        max_tokens,
    }
}

/// Read chunk frames until a terminal frame. Returns (chunks, terminal).
async fn collect_stream(stream: &mut TcpStream) -> (Vec<String>, WireMessage) {
    let mut chunks = Vec::new();
    loop {
        match read_message(stream).await {
            WireMessage::Chunk { text, .. } => {
                assert!(!text.is_empty(), "empty chunk on the wire");
                chunks.push(text);
            }
            terminal => return (chunks, terminal),
        }
    }
}

#[tokio::test]
async fn prompt_completes_within_budget() {
    let (addr, _token) =
        start_server(shared_engine(StubEngine::new("stub")), ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send_generate(&mut stream, prompt_request(1, "Hello", 3)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 3);
    assert!(matches!(terminal, WireMessage::Done { request_id: RequestId(1) }));
}

#[tokio::test]
async fn engine_failure_surfaces_and_worker_stays_usable() {
    let engine = shared_engine(ScriptedEngine::new(vec![
        ScriptStep::Chunk("partial ".into()),
        ScriptStep::Fail("attention buffer overrun".into()),
    ]));
    let (addr, _token) = start_server(engine, ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send_generate(&mut stream, prompt_request(1, "hi", 0)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks, vec!["partial "]);
    match terminal {
        WireMessage::Error { code, message, .. } => {
            assert_eq!(code, 500);
            assert!(message.contains("attention buffer overrun"));
        }
        other => panic!("unexpected terminal: {other:?}"),
    }

    // The guard was released: a second request makes progress.
    send_generate(&mut stream, prompt_request(2, "hi", 0)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 1);
    assert!(matches!(terminal, WireMessage::Error { .. }));
}

#[tokio::test]
async fn client_disconnect_stops_the_producer() {
    let scripted = ScriptedEngine::chunks(200).with_step_delay(Duration::from_millis(5));
    let counters = scripted.counters();
    let (addr, _token) = start_server(
        shared_engine(scripted),
        ServerConfig { channel_capacity: 2, ..ServerConfig::default() },
    )
    .await;

    {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        send_generate(&mut stream, prompt_request(1, "hi", 0)).await;
        assert!(matches!(read_message(&mut stream).await, WireMessage::Chunk { .. }));
        // Drop the connection mid-stream.
    }

    // Wait for production to stop, then verify it stays stopped well short
    // of the full script.
    let mut last = counters.produced();
    loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let now = counters.produced();
        if now == last {
            break;
        }
        last = now;
    }
    assert!(last < 200, "producer ran the full script after disconnect: {last}");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counters.produced(), last);
}

#[tokio::test]
async fn max_tokens_zero_uses_default_budget() {
    let (addr, _token) =
        start_server(shared_engine(StubEngine::new("stub")), ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    send_generate(&mut stream, prompt_request(1, "ping", 0)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 256);
    assert!(matches!(terminal, WireMessage::Done { .. }));
}

#[tokio::test]
async fn simultaneous_requests_are_serialized_and_both_complete() {
    let scripted = ScriptedEngine::chunks(5).with_step_delay(Duration::from_millis(10));
    let counters = scripted.counters();
    let (addr, _token) = start_server(shared_engine(scripted), ServerConfig::default()).await;

    let mut tasks = Vec::new();
    for id in [1u64, 2] {
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            send_generate(&mut stream, prompt_request(id, "go", 0)).await;
            collect_stream(&mut stream).await
        }));
    }
    for task in tasks {
        let (chunks, terminal) = task.await.unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(matches!(terminal, WireMessage::Done { .. }));
    }
    assert_eq!(counters.max_in_flight(), 1, "engine ran two generations at once");
}

#[tokio::test]
async fn empty_request_is_rejected_before_any_session() {
    let scripted = ScriptedEngine::chunks(3);
    let counters = scripted.counters();
    let (addr, _token) = start_server(shared_engine(scripted), ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let request = GenerateRequest {
        request_id: RequestId(7),
        prompt: None,
        messages: Vec::new(),
        temperature: 0.0,
        max_tokens: 0,
    };
    send_generate(&mut stream, request).await;
    match read_message(&mut stream).await {
        WireMessage::Error { request_id, code, .. } => {
            assert_eq!(request_id, RequestId(7));
            assert_eq!(code, 400);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(counters.produced(), 0, "a session ran for a rejected request");

    // The connection survives a rejection.
    send_generate(&mut stream, prompt_request(8, "ok", 0)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 3);
    assert!(matches!(terminal, WireMessage::Done { .. }));
}

#[tokio::test]
async fn malformed_payload_gets_an_error_and_the_connection_survives() {
    let (addr, _token) =
        start_server(shared_engine(StubEngine::new("stub")), ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Well-framed, but not a message.
    write_frame(&mut stream, b"this is not json").await.unwrap();
    match read_message(&mut stream).await {
        WireMessage::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("unexpected message: {other:?}"),
    }

    send_generate(&mut stream, prompt_request(1, "still here", 2)).await;
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 2);
    assert!(matches!(terminal, WireMessage::Done { .. }));
}

#[tokio::test]
async fn shutdown_token_stops_the_accept_loop() {
    let (addr, token) =
        start_server(shared_engine(StubEngine::new("stub")), ServerConfig::default()).await;

    // A connection made before the signal still completes its stream.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_generate(&mut stream, prompt_request(1, "bye", 2)).await;
    token.cancel();
    let (chunks, terminal) = collect_stream(&mut stream).await;
    assert_eq!(chunks.len(), 2);
    assert!(matches!(terminal, WireMessage::Done { .. }));
}
