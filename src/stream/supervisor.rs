//! The supervised connection loop: connect → run → close → wait, until stopped.
//!
//! One engine, parameterised by a small capability record (§9 Design Notes),
//! shared by both public stream variants instead of the inheritance
//! hierarchy the distilled spec describes.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{Instant, interval, sleep};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, CloseInfo};
use crate::error::FinlightError;
use crate::stream::backoff::{BackoffPolicy, NextAttempt};
use crate::stream::dedup::DuplicateFilter;
use crate::stream::protocol::{InboundFrame, PingFrame, build_subscription_frame, parse_inbound};

/// Static parameters distinguishing the two public stream variants (§4.9, §9).
pub(crate) struct Capability<T> {
    pub path_suffix: &'static str,
    pub log_prefix: &'static str,
    pub transform: Arc<dyn Fn(&Value) -> Result<T, FinlightError> + Send + Sync>,
    pub identifier: Option<Arc<dyn Fn(&T) -> String + Send + Sync>>,
}

/// A running stream's control handle. `stop()` is idempotent and may be
/// called from any context.
pub struct StreamHandle {
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl StreamHandle {
    /// Signal the supervisor to stop, and wait for it to unwind.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }

    /// Signal the supervisor to stop without waiting for it to finish.
    pub fn stop_no_wait(&self) {
        let _ = self.stop_tx.send(true);
    }
}

pub(crate) fn spawn<T>(
    config: Arc<ClientConfig>,
    capability: Capability<T>,
    params: Value,
    sink: Arc<dyn Fn(T) + Send + Sync>,
) -> StreamHandle
where
    T: Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run(config, capability, params, sink, stop_rx));
    StreamHandle { stop_tx, task }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn client_version() -> String {
    format!("finlight-client-rs/{}", env!("CARGO_PKG_VERSION"))
}

async fn run<T>(
    config: Arc<ClientConfig>,
    capability: Capability<T>,
    params: Value,
    sink: Arc<dyn Fn(T) + Send + Sync>,
    mut stop_rx: watch::Receiver<bool>,
) where
    T: Send + 'static,
{
    let mut backoff = BackoffPolicy::new(config.base_reconnect_delay(), config.max_reconnect_delay());
    let mut dedup = DuplicateFilter::new();

    loop {
        if *stop_rx.borrow() {
            info!(prefix = capability.log_prefix, "supervisor stopping");
            return;
        }

        let endpoint = format!("{}{}", config.wss_url(), capability.path_suffix);
        let request = match build_ws_request(&endpoint, &config) {
            Ok(r) => r,
            Err(e) => {
                warn!(prefix = capability.log_prefix, error = %e, "invalid stream endpoint");
                return;
            }
        };

        let connect_result = connect_async(request).await;
        let ws = match connect_result {
            Ok((ws, _response)) => ws,
            Err(e) => {
                let message = e.to_string();
                warn!(prefix = capability.log_prefix, error = %message, "connect failed");
                if message.contains("429") {
                    backoff.set_reconnect_at(Instant::now(), Duration::from_millis(60_000));
                }
                if wait_or_stop(&mut backoff, &mut stop_rx).await {
                    return;
                }
                continue;
            }
        };

        info!(prefix = capability.log_prefix, "transport open");
        backoff.on_successful_open();

        let outcome = run_session(&config, &capability, &params, &sink, &mut dedup, ws, &mut stop_rx).await;

        match outcome {
            SessionEnd::StopRequested => {
                info!(prefix = capability.log_prefix, "stop requested");
                config.fire_on_close(&CloseInfo {
                    code: Some(1000),
                    reason: "Client stopped".to_owned(),
                });
                return;
            }
            SessionEnd::Closed { info, permanent, reconnect_after } => {
                config.fire_on_close(&info);
                if permanent {
                    info!(prefix = capability.log_prefix, "permanent stop condition reached");
                    return;
                }
                if let Some(window) = reconnect_after {
                    backoff.set_reconnect_at(Instant::now(), window);
                }
                if *stop_rx.borrow() {
                    return;
                }
                if wait_or_stop(&mut backoff, &mut stop_rx).await {
                    return;
                }
            }
        }
    }
}

/// Returns `true` if the stop signal fired during the wait.
async fn wait_or_stop(backoff: &mut BackoffPolicy, stop_rx: &mut watch::Receiver<bool>) -> bool {
    let delay = match backoff.next_attempt(Instant::now()) {
        NextAttempt::Exponential(d) => d,
        NextAttempt::Forced(d) => d,
    };
    tokio::select! {
        _ = sleep(delay) => false,
        _ = stop_rx.changed() => true,
    }
}

enum SessionEnd {
    StopRequested,
    Closed {
        info: CloseInfo,
        /// (c) transport close code 1008, or (b) inbound `preempted` — the
        /// supervisor loop must not reconnect.
        permanent: bool,
        /// Forced reconnect-floor window, when this close carries a
        /// retry-class penalty (rate limit / admin kick / blocked-by-error).
        reconnect_after: Option<Duration>,
    },
}

fn closed(code: Option<u16>, reason: impl Into<String>) -> SessionEnd {
    SessionEnd::Closed {
        info: CloseInfo {
            code,
            reason: reason.into(),
        },
        permanent: false,
        reconnect_after: None,
    }
}

fn closed_permanent(code: Option<u16>, reason: impl Into<String>) -> SessionEnd {
    SessionEnd::Closed {
        info: CloseInfo {
            code,
            reason: reason.into(),
        },
        permanent: true,
        reconnect_after: None,
    }
}

fn closed_with_window(code: u16, reason: impl Into<String>, window: Duration) -> SessionEnd {
    SessionEnd::Closed {
        info: CloseInfo {
            code: Some(code),
            reason: reason.into(),
        },
        permanent: false,
        reconnect_after: Some(window),
    }
}

struct SessionState {
    nonce: String,
    lease_id: Option<String>,
    last_pong: Instant,
}

async fn run_session<T, S>(
    config: &ClientConfig,
    capability: &Capability<T>,
    params: &Value,
    sink: &Arc<dyn Fn(T) + Send + Sync>,
    dedup: &mut DuplicateFilter,
    mut ws: S,
    stop_rx: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    T: Send + 'static,
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let mut state = SessionState {
        nonce: Uuid::new_v4().to_string(),
        lease_id: None,
        last_pong: Instant::now(),
    };

    let subscription = build_subscription_frame(params, &state.nonce);
    if let Err(e) = send_json(&mut ws, &subscription).await {
        warn!(prefix = capability.log_prefix, error = %e, "failed to send subscription frame");
        return closed(None, e.to_string());
    }

    let mut ping_ticker = interval(config.ping_interval());
    ping_ticker.tick().await; // first tick fires immediately; consume it
    let mut watchdog_ticker = interval(Duration::from_secs(5));
    watchdog_ticker.tick().await;
    let rotation = sleep(config.connection_lifetime());
    tokio::pin!(rotation);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    let _ = close_ws(&mut ws, 1000, "Client stopped").await;
                    return SessionEnd::StopRequested;
                }
            }

            _ = &mut rotation => {
                info!(prefix = capability.log_prefix, "proactive rotation");
                let _ = close_ws(&mut ws, 4000, "Proactive rotation").await;
                return closed(Some(4000), "Proactive rotation");
            }

            _ = watchdog_ticker.tick() => {
                if state.last_pong.elapsed() > config.pong_timeout() {
                    warn!(prefix = capability.log_prefix, "pong watchdog timed out");
                    let _ = ws.close().await;
                    return closed(None, "pong timeout");
                }
            }

            _ = ping_ticker.tick() => {
                let ping = PingFrame::now(now_ms());
                if let Err(e) = send_json(&mut ws, &ping).await {
                    warn!(prefix = capability.log_prefix, error = %e, "failed to send ping");
                    return closed(None, e.to_string());
                }
            }

            msg = ws.next() => {
                match msg {
                    None => {
                        return closed(None, "connection ended");
                    }
                    Some(Err(e)) => {
                        warn!(prefix = capability.log_prefix, error = %e, "transport error");
                        return closed(None, e.to_string());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = close_details(&frame);
                        if code == Some(1008) {
                            return closed_permanent(code, reason);
                        }
                        return closed(code, reason);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(outcome) = handle_frame(
                            &text, capability, sink, dedup, &mut state, &mut ws,
                        ).await {
                            return outcome;
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn close_details(frame: &Option<CloseFrame>) -> (Option<u16>, String) {
    match frame {
        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
        None => (None, String::new()),
    }
}

async fn handle_frame<T, S>(
    text: &str,
    capability: &Capability<T>,
    sink: &Arc<dyn Fn(T) + Send + Sync>,
    dedup: &mut DuplicateFilter,
    state: &mut SessionState,
    ws: &mut S,
) -> Option<SessionEnd>
where
    T: Send + 'static,
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let frame = parse_inbound(text)?;
    match frame {
        InboundFrame::Pong(p) => {
            state.last_pong = Instant::now();
            if let Some(t) = p.t {
                debug!(prefix = capability.log_prefix, rtt_ms = now_ms() - t, "pong received");
            }
            None
        }
        InboundFrame::Admit(a) => {
            state.lease_id = Some(a.lease_id.clone());
            if let Some(echoed) = &a.client_nonce {
                if echoed != &state.nonce {
                    warn!(prefix = capability.log_prefix, "admit nonce mismatch");
                }
            }
            info!(prefix = capability.log_prefix, lease_id = %a.lease_id, "admitted");
            None
        }
        InboundFrame::Preempted(p) => {
            info!(prefix = capability.log_prefix, reason = ?p.reason, "preempted by server");
            let _ = close_ws(ws, 1000, "Preempted by server").await;
            Some(closed_permanent(Some(1000), "Preempted by server"))
        }
        InboundFrame::SendArticle(f) => {
            match (capability.transform)(&f.data) {
                Ok(article) => {
                    let duplicate = capability
                        .identifier
                        .as_ref()
                        .map(|id_fn| dedup.check_and_insert(&id_fn(&article)))
                        .unwrap_or(false);
                    if duplicate {
                        debug!(prefix = capability.log_prefix, "dropping duplicate article");
                    } else {
                        sink(article);
                    }
                }
                Err(e) => warn!(prefix = capability.log_prefix, error = %e, "article transform failed"),
            }
            None
        }
        InboundFrame::AdminKick(f) => {
            let retry_after = Duration::from_millis(f.retry_after.unwrap_or(900_000));
            info!(prefix = capability.log_prefix, retry_after_ms = retry_after.as_millis() as u64, "admin kick");
            let _ = close_ws(ws, 4003, "Admin kick").await;
            Some(closed_with_window(4003, "Admin kick", retry_after))
        }
        InboundFrame::Error(f) => {
            let message = f.message();
            let lower = message.to_lowercase();
            if lower.contains("limit") {
                let _ = close_ws(ws, 4001, message).await;
                Some(closed_with_window(4001, message, Duration::from_millis(60_000)))
            } else if lower.contains("blocked") {
                let _ = close_ws(ws, 4002, message).await;
                Some(closed_with_window(4002, message, Duration::from_millis(3_600_000)))
            } else {
                warn!(prefix = capability.log_prefix, error = %message, "server error frame");
                None
            }
        }
        InboundFrame::Unknown(action) => {
            debug!(prefix = capability.log_prefix, action = %action, "ignoring unknown action");
            None
        }
    }
}

async fn send_json<S>(ws: &mut S, value: &impl serde::Serialize) -> Result<(), FinlightError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(value)?;
    ws.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn close_ws<S>(ws: &mut S, code: u16, reason: &str) -> Result<(), FinlightError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_owned().into(),
    };
    ws.send(Message::Close(Some(frame))).await?;
    Ok(())
}

fn build_ws_request(
    url: &str,
    config: &ClientConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, FinlightError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| FinlightError::ConnectRejected(format!("invalid URL '{url}': {e}")))?;

    let headers = request.headers_mut();
    headers.insert(
        "x-api-key",
        config
            .api_key()
            .parse()
            .map_err(|_| FinlightError::ConnectRejected("invalid api key header value".into()))?,
    );
    headers.insert(
        "x-client-version",
        client_version()
            .parse()
            .map_err(|_| FinlightError::ConnectRejected("invalid client version header".into()))?,
    );
    if config.takeover() {
        headers.insert("x-takeover", "true".parse().unwrap());
    }

    Ok(request)
}
