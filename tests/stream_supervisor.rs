//! End-to-end tests driving the supervised stream against an in-process
//! mock WebSocket server, mirroring the session-loop test style: spin up
//! both protocol ends and assert on observed behavior rather than internals.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use finlight_client::{ClientConfig, EnrichedArticleStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode};

/// Accepts exactly one connection, hands the accepted stream to `handler`.
async fn serve_once<F, Fut>(handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    (addr, task)
}

/// Accepts connections in a loop, incrementing `count` per accept and
/// handing each one (after draining the subscription frame) to `handler`.
fn serve_counting_with<F, Fut>(count: Arc<AtomicUsize>, handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let addr = std_listener.local_addr().unwrap();
    let listener = TcpListener::from_std(std_listener).unwrap();
    let task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            count.fetch_add(1, Ordering::SeqCst);
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let _ = ws.next().await; // subscription frame
            handler(ws).await;
        }
    });
    (addr, task)
}

async fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new("test-key")
        .wss_url(format!("ws://{addr}"))
        .base_reconnect_delay(Duration::from_millis(10))
        .max_reconnect_delay(Duration::from_millis(50))
        .build()
        .unwrap()
}

fn sample_article(link: &str) -> serde_json::Value {
    serde_json::json!({
        "link": link,
        "title": "Example headline",
        "publishDate": "2026-01-01T00:00:00Z",
        "source": "reuters",
        "language": "en",
    })
}

#[tokio::test]
async fn delivers_article_to_sink() {
    let (addr, server) = serve_once(|mut ws| async move {
        let _ = ws.next().await; // subscription frame
        let frame = serde_json::json!({"action": "sendArticle", "data": sample_article("a1")});
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
        ws.send(Message::Close(None)).await.unwrap();
    })
    .await;

    let config = Arc::new(config_for(addr).await);
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let handle = EnrichedArticleStream::spawn(config, serde_json::json!({}), move |article| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(article.link);
        }
    });

    let link = timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    assert_eq!(link, "a1");

    handle.stop().await;
    timeout(Duration::from_secs(1), server).await.unwrap().unwrap();
}

#[tokio::test]
async fn duplicate_article_is_suppressed() {
    let (addr, server) = serve_once(|mut ws| async move {
        let _ = ws.next().await;
        let frame = serde_json::json!({"action": "sendArticle", "data": sample_article("dup")});
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        ws.send(Message::Close(None)).await.unwrap();
    })
    .await;

    let config = Arc::new(config_for(addr).await);
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    let handle = EnrichedArticleStream::spawn(config, serde_json::json!({}), move |_article| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });

    timeout(Duration::from_secs(1), server).await.unwrap().unwrap();
    handle.stop().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn preempted_frame_stops_permanently() {
    let count = Arc::new(AtomicUsize::new(0));
    let (addr, server) = serve_counting_with(count.clone(), move |mut ws| async move {
        let frame = serde_json::json!({"action": "preempted", "reason": "takeover"});
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    });

    let config = Arc::new(
        ClientConfig::new("test-key")
            .wss_url(format!("ws://{addr}"))
            .base_reconnect_delay(Duration::from_millis(5))
            .max_reconnect_delay(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let handle = EnrichedArticleStream::spawn(config, serde_json::json!({}), |_| {});

    // Give the supervisor ample time to have reconnected, had it not
    // honored the permanent-stop condition.
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.stop().await;
    server.abort();

    assert_eq!(count.load(Ordering::SeqCst), 1, "must not reconnect after preemption");
}

#[tokio::test]
async fn on_close_hook_fires_and_session_reconnects() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    let (addr, first) = serve_once(|mut ws| async move {
        let _ = ws.next().await;
        let close = CloseFrame {
            code: CloseCode::from(1001u16),
            reason: "going away".into(),
        };
        ws.send(Message::Close(Some(close))).await.unwrap();
    })
    .await;
    timeout(Duration::from_secs(1), first).await.unwrap().unwrap();

    // Re-bind on the same address for the reconnect attempt.
    let listener = TcpListener::bind(addr).await.unwrap();
    let second = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        ws.send(Message::Close(None)).await.unwrap();
    });

    let config = Arc::new(
        ClientConfig::new("test-key")
            .wss_url(format!("ws://{addr}"))
            .base_reconnect_delay(Duration::from_millis(5))
            .max_reconnect_delay(Duration::from_millis(20))
            .on_close(move |_info| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let handle = EnrichedArticleStream::spawn(config, serde_json::json!({}), |_| {});
    timeout(Duration::from_secs(1), second).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop().await;

    assert!(hits.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn malformed_frame_does_not_terminate_session() {
    let (addr, server) = serve_once(|mut ws| async move {
        let _ = ws.next().await;
        ws.send(Message::Text("not json at all".into())).await.unwrap();
        let frame = serde_json::json!({"action": "sendArticle", "data": sample_article("after-garbage")});
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
        ws.send(Message::Close(None)).await.unwrap();
    })
    .await;

    let config = Arc::new(config_for(addr).await);
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let handle = EnrichedArticleStream::spawn(config, serde_json::json!({}), move |article| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(article.link);
        }
    });

    let link = timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    assert_eq!(link, "after-garbage");

    handle.stop().await;
    timeout(Duration::from_secs(1), server).await.unwrap().unwrap();
}
