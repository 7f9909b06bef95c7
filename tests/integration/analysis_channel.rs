//! Analysis channel behaviour: one request, one response, deterministic close

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio_tungstenite::tungstenite::Message;

use corewatch::analysis::AnalysisRequester;

use super::helpers::{accept_ws, bind_server, within};

#[tokio::test]
async fn test_exchange_sends_document_and_returns_text() {
    let (listener, origin) = bind_server().await;
    let requester = AnalysisRequester::new(&origin);

    let mut rx = requester.request(7, "a\nb".to_string());

    let mut server = accept_ws(&listener).await;

    // Exactly one payload, sent immediately upon open: the joined sentences.
    let payload = within(server.next()).await.unwrap().unwrap();
    assert_eq!(payload, Message::Text("a\nb".to_string()));

    server
        .send(Message::Text(r#"{"text":"x"}"#.to_string()))
        .await
        .unwrap();

    let outcome = within(rx.recv()).await.expect("outcome delivered");
    assert_eq!(outcome.generation, 7);
    assert_eq!(outcome.result.unwrap(), "x");

    // The client closes the channel once the single response is consumed.
    let closed = within(async {
        loop {
            match server.next().await {
                Some(Ok(Message::Close(_))) | None => return true,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return true,
            }
        }
    })
    .await;
    assert!(closed);
}

#[tokio::test]
async fn test_malformed_response_frame_is_dropped() {
    let (listener, origin) = bind_server().await;
    let requester = AnalysisRequester::new(&origin);

    let mut rx = requester.request(1, "doc".to_string());

    let mut server = accept_ws(&listener).await;
    let _ = within(server.next()).await;

    // Junk first; the exchange keeps waiting for a decodable response.
    server
        .send(Message::Text("{{{".to_string()))
        .await
        .unwrap();
    server
        .send(Message::Text(r#"{"text":"eventually"}"#.to_string()))
        .await
        .unwrap();

    let outcome = within(rx.recv()).await.expect("outcome delivered");
    assert_eq!(outcome.result.unwrap(), "eventually");
}

#[tokio::test]
async fn test_connection_refused_yields_error_outcome() {
    let (listener, origin) = bind_server().await;
    drop(listener);

    let requester = AnalysisRequester::new(&origin);
    let mut rx = requester.request(3, "doc".to_string());

    let outcome = within(rx.recv()).await.expect("outcome delivered");
    assert_eq!(outcome.generation, 3);
    assert_matches!(outcome.result, Err(_));
}

#[tokio::test]
async fn test_server_close_before_response_yields_error_outcome() {
    let (listener, origin) = bind_server().await;
    let requester = AnalysisRequester::new(&origin);

    let mut rx = requester.request(4, "doc".to_string());

    let mut server = accept_ws(&listener).await;
    let _ = within(server.next()).await;
    server.close(None).await.unwrap();

    let outcome = within(rx.recv()).await.expect("outcome delivered");
    assert_matches!(outcome.result, Err(_));
}
