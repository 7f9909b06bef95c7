//! End-to-end snapshot flow: live feed -> capture -> analysis -> resume
//!
//! Composes the session, the live channel and the analysis requester the
//! same way the event loop does, without the terminal.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio_tungstenite::tungstenite::Message;

use corewatch::MetricSample;
use corewatch::analysis::AnalysisRequester;
use corewatch::channel::{Channel, ChannelEvent, ReconnectPolicy, endpoint_url};
use corewatch::session::Session;

use super::helpers::{accept_ws, bind_server, sample_json, within};

#[tokio::test]
async fn test_snapshot_is_analyzed_and_displayed() {
    let (listener, origin) = bind_server().await;
    let mut session = Session::new();

    // Live feed delivers one sample.
    let mut live: Channel<MetricSample> = Channel::connect(
        endpoint_url(&origin, "/realtime/cpus"),
        ReconnectPolicy::none(),
    );
    let mut live_server = accept_ws(&listener).await;
    live_server
        .send(Message::Text(sample_json(&[10.0, 20.0], &["a", "b"])))
        .await
        .unwrap();

    loop {
        match within(live.recv()).await {
            Some(ChannelEvent::Connected) => {}
            Some(ChannelEvent::Message(sample)) => {
                session.apply_sample(sample);
                break;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // Operator triggers Snapshot: close the live channel, freeze, request.
    live.close();
    let snapshot = session.capture();
    assert_eq!(snapshot.document(), "a\nb");

    let requester = AnalysisRequester::new(&origin);
    let mut analysis_rx = requester.request(snapshot.generation(), snapshot.document());

    let mut analysis_server = accept_ws(&listener).await;
    let payload = within(analysis_server.next()).await.unwrap().unwrap();
    assert_eq!(payload, Message::Text("a\nb".to_string()));
    analysis_server
        .send(Message::Text(r#"{"text":"x"}"#.to_string()))
        .await
        .unwrap();

    let outcome = within(analysis_rx.recv()).await.unwrap();
    assert!(session.attach_analysis(outcome.generation, outcome.result.unwrap()));

    // Display state: the frozen sample plus the analysis text.
    let displayed = session.displayed_sample().unwrap();
    assert_eq!(displayed.cpus, vec![10.0, 20.0]);
    assert_eq!(displayed.sentences, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(session.snapshot().unwrap().analysis(), Some("x"));
    assert_eq!(session.toggle_label(), "Resume");
}

#[tokio::test]
async fn test_empty_capture_sends_no_analysis_request() {
    let (listener, origin) = bind_server().await;
    let mut session = Session::new();
    let requester = AnalysisRequester::new(&origin);

    // Capture with nothing rendered yet: valid, but nothing to analyze.
    let snapshot = session.capture();
    assert!(snapshot.sample().is_empty());
    assert!(requester.request_snapshot(&snapshot).is_none());

    // No connection reaches the analysis endpoint.
    let connection = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(connection.is_err());

    // A non-empty capture on the same session does fire a request.
    session.resume();
    session.apply_sample(MetricSample {
        cpus: vec![1.0],
        sentences: vec!["a".to_string()],
    });
    let snapshot = session.capture();
    let _analysis_rx = requester
        .request_snapshot(&snapshot)
        .expect("non-empty snapshot requests analysis");

    let mut analysis_server = accept_ws(&listener).await;
    let payload = within(analysis_server.next()).await.unwrap().unwrap();
    assert_eq!(payload, Message::Text("a".to_string()));
}

#[tokio::test]
async fn test_resume_before_response_discards_late_analysis() {
    let (listener, origin) = bind_server().await;
    let mut session = Session::new();

    session.apply_sample(MetricSample {
        cpus: vec![5.0],
        sentences: vec!["slow".to_string()],
    });

    let snapshot = session.capture();
    let requester = AnalysisRequester::new(&origin);
    let mut analysis_rx = requester.request(snapshot.generation(), snapshot.document());

    let mut analysis_server = accept_ws(&listener).await;
    let _ = within(analysis_server.next()).await;

    // Operator resumes before the service answers.
    session.resume();
    assert_eq!(session.toggle_label(), "Snapshot");

    // The response arrives late.
    analysis_server
        .send(Message::Text(r#"{"text":"too late"}"#.to_string()))
        .await
        .unwrap();
    let outcome = within(analysis_rx.recv()).await.unwrap();

    // The stale result must not be applied.
    assert!(!session.attach_analysis(outcome.generation, outcome.result.unwrap()));
    assert!(session.snapshot().is_none());
    assert_eq!(
        session.displayed_sample().unwrap().sentences,
        vec!["slow".to_string()]
    );
}
