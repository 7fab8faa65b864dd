/*
 * http_network.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Network integration test for the stream executor's HTTP/2 path. Performs
 * real HTTPS GETs to a known h2-capable server and verifies ALPN
 * negotiation, HPACK decoding, and session-pool reuse.
 *
 * Run with:
 *   cargo test -p magazzino_core --test http_network -- --ignored --nocapture
 */

use std::time::Duration;

use magazzino_core::transport::descriptor::{HttpMethod, ResponseKind};
use magazzino_core::transport::facade::ApiRequest;
use magazzino_core::transport::response::{ApiSuccess, Payload};
use magazzino_core::transport::stream::pool;

#[tokio::test]
#[ignore] // requires network
async fn h2_get_reuses_one_pooled_session() {
    let url = "https://www.google.com/generate_204";

    println!("=== HTTP/2 session pool test ===");
    println!("GET {} (x2, multiplexed)", url);

    for round in 0..2 {
        let mut request = ApiRequest::new(HttpMethod::Get, url, "app", "key", None);
        request
            .use_http2()
            .response_kind(ResponseKind::Binary)
            .timeout(Duration::from_secs(15));
        let success = request.execute().await.expect("request failed");
        match success {
            ApiSuccess::Body(Payload::Binary(body)) => {
                println!("round {}: {} body bytes", round, body.len());
            }
            other => panic!("expected binary body, got {:?}", other),
        }
    }

    let authorities = pool::authorities().await;
    println!("pooled authorities: {:?}", authorities);
    assert_eq!(
        authorities
            .iter()
            .filter(|a| a.contains("www.google.com"))
            .count(),
        1,
        "both requests must share one session"
    );

    pool::close_session("https://www.google.com:443").await;
    assert!(pool::session("https://www.google.com:443").await.is_none());

    println!("=== PASS ===");
}
