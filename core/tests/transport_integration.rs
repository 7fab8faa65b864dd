/*
 * transport_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the request transport against an in-process mock
 * server: success/failure classification, body serialization, chunked
 * reassembly, header envelopes, raw passthrough, timeouts, and the
 * callback-pair calling convention, on both executors.
 *
 * Run with:
 *   cargo test -p magazzino_core --test transport_integration
 */

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use magazzino_core::service::Service;
use magazzino_core::transport::descriptor::{HttpMethod, ResponseKind};
use magazzino_core::transport::response::{ApiSuccess, HeaderBlock, Payload};
use magazzino_core::SdkError;

/// One-shot mock server: accepts a single connection, captures the full
/// request, then writes the response parts with a pause between them.
struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    async fn start(response_parts: Vec<Vec<u8>>, part_delay: Duration) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = requests.clone();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            captured.lock().unwrap().push(request);
            for part in response_parts {
                socket.write_all(&part).await.unwrap();
                socket.flush().await.unwrap();
                if !part_delay.is_zero() {
                    tokio::time::sleep(part_delay).await;
                }
            }
        });
        MockServer { addr, requests }
    }

    /// Accepts a connection and then never responds (timeout scenarios).
    async fn start_silent() -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });
        MockServer {
            addr,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn service(&self) -> Service {
        Service::new("test-app", "test-key", format!("http://{}", self.addr))
    }

    fn request(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let header_end;
    loop {
        let n = socket.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed before sending a full request");
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            header_end = pos + 4;
            break;
        }
    }
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|l| {
            let lower = l.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .map(|v| v.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&tmp[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn json_response(status_line: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
    .into_bytes()
}

#[tokio::test]
async fn get_json_success() {
    let mock = MockServer::start(
        vec![json_response("200 OK", "{\"objectId\":\"a1\",\"score\":10}")],
        Duration::ZERO,
    )
    .await;
    let object = mock
        .service()
        .data_bucket("scores")
        .fetch("a1")
        .await
        .unwrap();
    assert_eq!(object.id.as_deref(), Some("a1"));
    assert_eq!(object.get("score"), Some(&serde_json::Value::from(10)));

    let request = mock.request(0);
    assert!(request.starts_with("GET /2013-09-01/classes/scores/a1 HTTP/1.1\r\n"));
    assert!(request.contains("X-Magazzino-Application-Id: test-app\r\n"));
    assert!(request.contains("X-Magazzino-Api-Key: test-key\r\n"));
}

#[tokio::test]
async fn post_object_body_serialized_as_json() {
    let mock = MockServer::start(
        vec![json_response(
            "201 Created",
            "{\"objectId\":\"n1\",\"createDate\":\"2026-08-07T00:00:00Z\"}",
        )],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let mut object = magazzino_core::service::DataObject::new();
    object.set("score", 42);
    service
        .data_bucket("scores")
        .save(&mut object)
        .await
        .unwrap();
    assert_eq!(object.id.as_deref(), Some("n1"));

    // Plain object body, no explicit content type: serialized JSON on the wire.
    let request = mock.request(0);
    assert!(request.contains("Content-Type: application/json\r\n"));
    assert!(request.ends_with("{\"score\":42}"));
}

#[tokio::test]
async fn not_found_carries_status_and_raw_body() {
    let body = "{\"code\":\"E404001\",\"error\":\"No data available\"}";
    let mock = MockServer::start(vec![json_response("404 Not Found", body)], Duration::ZERO).await;
    let err = mock
        .service()
        .data_bucket("scores")
        .fetch("missing")
        .await
        .unwrap_err();
    match err {
        SdkError::Api(e) => {
            assert_eq!(e.status, 404);
            assert_eq!(e.status_text, "Not Found");
            assert_eq!(e.response_text, body);
            assert_eq!(e.data.unwrap()["code"], "E404001");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn chunked_response_reassembled_across_delayed_parts() {
    // Three chunks delivered with pauses; the decoded body must equal the
    // concatenation, decoded once at the end.
    let head = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    let parts = vec![
        head,
        b"10\r\n{\"results\":[{\"ob\r\n".to_vec(),
        b"f\r\njectId\":\"c1\"}]}\r\n".to_vec(),
        b"0\r\n\r\n".to_vec(),
    ];
    let mock = MockServer::start(parts, Duration::from_millis(20)).await;
    let results = mock
        .service()
        .data_bucket("scores")
        .find(&magazzino_core::service::Query::new())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn timeout_rejects_with_status_zero_quickly() {
    let mock = MockServer::start_silent().await;
    let service = mock.service();
    let mut request = service.build_request(HttpMethod::Get, "/classes/scores/x");
    request.timeout(Duration::from_millis(50));
    let started = Instant::now();
    let err = request.execute().await.unwrap_err();
    let elapsed = started.elapsed();
    match err {
        SdkError::Api(e) => {
            assert_eq!(e.status, 0);
            assert!(e.status_text.contains("timed out"), "got {:?}", e.status_text);
        }
        other => panic!("expected Api error, got {:?}", other),
    }
    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
}

#[tokio::test]
async fn headers_envelope_is_a_map_on_the_stream_executor() {
    let mock = MockServer::start(
        vec![json_response("200 OK", "{\"ok\":true}")],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let mut request = service.build_request(HttpMethod::Get, "/classes/scores/a1");
    request.want_response_headers(true);
    let success = request.execute().await.unwrap();
    match success {
        ApiSuccess::Enveloped(envelope) => {
            assert_eq!(envelope.status, 200);
            match envelope.headers {
                HeaderBlock::Map(headers) => {
                    assert!(headers
                        .iter()
                        .any(|(n, v)| n == "Content-Type" && v == "application/json"));
                }
                other => panic!("stream executor must produce a map, got {:?}", other),
            }
        }
        other => panic!("expected envelope, got {:?}", other),
    }
}

#[tokio::test]
async fn bare_body_shape_unchanged_without_envelope() {
    let mock = MockServer::start(
        vec![json_response("200 OK", "{\"ok\":true}")],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let request = service.build_request(HttpMethod::Get, "/classes/scores/a1");
    match request.execute().await.unwrap() {
        ApiSuccess::Body(Payload::Json(v)) => assert_eq!(v["ok"], true),
        other => panic!("expected bare JSON body, got {:?}", other),
    }
}

#[tokio::test]
async fn range_header_sent_verbatim() {
    let mock = MockServer::start(
        vec![b"HTTP/1.1 206 Partial Content\r\nContent-Length: 5\r\n\r\nhello".to_vec()],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let data = service
        .file_bucket()
        .download_range("big.bin", Some(0), Some(49), None)
        .await
        .unwrap();
    assert_eq!(data, b"hello");
    assert!(mock.request(0).contains("Range: bytes=0-49\r\n"));
}

#[tokio::test]
async fn raw_passthrough_hands_over_the_live_stream() {
    let parts = vec![
        b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\n".to_vec(),
        b"stream".to_vec(),
        b"-body!".to_vec(),
    ];
    let mock = MockServer::start(parts, Duration::from_millis(15)).await;
    let service = mock.service();
    let mut raw = service.file_bucket().download_raw("big.bin").await.unwrap();
    assert_eq!(raw.status, 200);
    let mut collected = Vec::new();
    while let Some(chunk) = raw.next_chunk().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(collected, b"stream-body!");
}

#[tokio::test]
async fn raw_passthrough_failure_rejects_with_protocol_error() {
    let mock = MockServer::start(
        vec![json_response("403 Forbidden", "{\"error\":\"denied\"}")],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let mut request = service.build_request(HttpMethod::Get, "/files/secret.bin");
    request.raw_passthrough();
    let err = request.execute().await.unwrap_err();
    match err {
        SdkError::Api(e) => {
            assert_eq!(e.status, 403);
            assert_eq!(e.response_text, "{\"error\":\"denied\"}");
            assert_eq!(e.data.unwrap()["error"], "denied");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn callback_pair_receives_the_outcome() {
    let mock = MockServer::start(
        vec![json_response("200 OK", "{\"ok\":1}")],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let request = service.build_request(HttpMethod::Get, "/classes/scores/a1");
    let (tx, rx) = std::sync::mpsc::channel();
    let tx_err = tx.clone();
    request
        .execute_with(
            Box::new(move |success| {
                let ok = matches!(success, ApiSuccess::Body(Payload::Json(_)));
                tx.send(Ok(ok)).unwrap();
            }),
            Box::new(move |e| {
                tx_err.send(Err(e.to_string())).unwrap();
            }),
        )
        .unwrap();
    let outcome = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Ok(true));
}

#[tokio::test]
async fn binary_kind_returns_raw_bytes() {
    let mock = MockServer::start(
        vec![b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\xff".to_vec()],
        Duration::ZERO,
    )
    .await;
    let service = mock.service();
    let mut request = service.build_request(HttpMethod::Get, "/files/blob.bin");
    request.response_kind(ResponseKind::Binary);
    match request.execute().await.unwrap() {
        ApiSuccess::Body(Payload::Binary(data)) => assert_eq!(data, vec![0x00, 0x01, 0x02, 0xff]),
        other => panic!("expected binary body, got {:?}", other),
    }
}

// ── Blocking executor (no runtime on the calling thread) ─────────────

fn start_mock_on_thread(
    response_parts: Vec<Vec<u8>>,
) -> (SocketAddr, Arc<Mutex<Vec<String>>>, tokio::runtime::Runtime) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock = runtime.block_on(MockServer::start(response_parts, Duration::ZERO));
    (mock.addr, mock.requests, runtime)
}

#[test]
fn blocking_executor_round_trip() {
    let (addr, requests, _runtime) =
        start_mock_on_thread(vec![json_response("200 OK", "{\"objectId\":\"b1\"}")]);
    let service = Service::new("app", "key", format!("http://{}", addr));
    let request = service.build_request(HttpMethod::Get, "/classes/scores/b1");
    // No runtime on this thread: the capability probe picks the blocking
    // executor.
    match request.execute_blocking().unwrap() {
        ApiSuccess::Body(Payload::Json(v)) => assert_eq!(v["objectId"], "b1"),
        other => panic!("expected JSON body, got {:?}", other),
    }
    assert!(requests.lock().unwrap()[0].contains("X-Magazzino-Application-Id: app\r\n"));
}

#[test]
fn blocking_executor_envelope_headers_are_one_string() {
    let (addr, _requests, _runtime) =
        start_mock_on_thread(vec![json_response("200 OK", "{\"ok\":true}")]);
    let service = Service::new("app", "key", format!("http://{}", addr));
    let mut request = service.build_request(HttpMethod::Get, "/classes/scores/b1");
    request.want_response_headers(true);
    match request.execute_blocking().unwrap() {
        ApiSuccess::Enveloped(envelope) => match envelope.headers {
            HeaderBlock::Raw(block) => {
                assert!(block.contains("Content-Type: application/json\r\n"));
            }
            other => panic!("blocking executor must produce a string block, got {:?}", other),
        },
        other => panic!("expected envelope, got {:?}", other),
    }
}

#[test]
fn blocking_executor_timeout_rejects_quickly() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock = runtime.block_on(MockServer::start_silent());
    let service = Service::new("app", "key", format!("http://{}", mock.addr));
    let mut request = service.build_request(HttpMethod::Get, "/classes/scores/x");
    request.timeout(Duration::from_millis(50));
    let started = Instant::now();
    let err = request.execute_blocking().unwrap_err();
    match err {
        SdkError::Api(e) => assert_eq!(e.status, 0),
        other => panic!("expected Api error, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}
