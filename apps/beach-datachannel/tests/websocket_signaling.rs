mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use beach_datachannel::signaling::websocket;
use beach_datachannel::{Session, SessionConfig, SignalingClient, SignalingError, SignalingSink};
use common::{FakeFactory, RecordingSurface, SurfaceLog};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Accepts one connection, answers the first `start` with `startResponse`,
/// and returns every text frame it saw.
async fn spawn_media_server() -> (Url, tokio::task::JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/showdatachannel")).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut seen = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["id"] == "start" {
                        let reply = json!({"id": "startResponse", "sdpAnswer": "A1"});
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                    }
                    seen.push(frame);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        seen
    });
    (url, server)
}

#[tokio::test]
async fn frames_round_trip_over_websocket() {
    let (url, server) = spawn_media_server().await;
    let (sink, mut inbound) = websocket::connect(&url).await.unwrap();
    let client = SignalingClient::new(sink.clone());

    client.send_start("O1".into());
    let reply = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&reply).unwrap(),
        json!({"id": "startResponse", "sdpAnswer": "A1"})
    );

    client.send_stop();
    client.close();
    assert!(matches!(
        sink.send_text("late".into()),
        Err(SignalingError::Closed)
    ));

    let seen = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        seen,
        vec![json!({"id": "start", "sdpOffer": "O1"}), json!({"id": "stop"})]
    );

    let ended = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn rejects_non_websocket_urls() {
    let url = Url::parse("http://127.0.0.1:1/showdatachannel").unwrap();
    assert!(matches!(
        websocket::connect(&url).await,
        Err(SignalingError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn session_negotiates_over_websocket() {
    let (url, server) = spawn_media_server().await;
    let (sink, inbound) = websocket::connect(&url).await.unwrap();

    let factory = Arc::new(FakeFactory::default());
    let surface = Arc::new(Mutex::new(SurfaceLog::default()));
    let (session, events) = Session::new(
        SessionConfig::default(),
        SignalingClient::new(sink),
        factory.clone(),
        Box::new(RecordingSurface(surface.clone())),
    );
    let handle = session.handle();
    handle.pump_signaling(inbound);
    let task = tokio::spawn(session.run(events));

    handle.start();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while factory.created() == 0 || factory.peer(0).answers().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "answer never applied");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let controls = surface.lock().unwrap().last_controls().unwrap();
    assert!(controls.stop && !controls.start);

    handle.stop();
    handle.shutdown();
    task.await.unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<&str> = seen.iter().filter_map(|frame| frame["id"].as_str()).collect();
    assert_eq!(ids, vec!["start", "stop"]);
}
