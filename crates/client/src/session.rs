//! One connection attempt and its full active lifecycle.
//!
//! A session moves CONNECTING → ACTIVE → TERMINATED. While ACTIVE it runs
//! three duties over the same socket:
//!
//! - heartbeat: dormant until the server's HELLO supplies an interval, then
//!   one HEARTBEAT per interval until termination
//! - inbound dispatch: decode and dispatch each server message, with a 1 s
//!   recv ceiling per attempt so the loop stays responsive while idle
//! - outbound polling: sample the sensor amplitude every 500 ms and send an
//!   INPUT message on change
//!
//! Per-message failures (malformed text, unknown opcode, missing payload)
//! are dropped at message granularity. Only a closed or broken connection
//! terminates the session, and termination aborts every duty so no timer
//! outlives the socket.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use cb_hal::{Amplitude, Indicator, LedColor, LedStatus};
use cb_protocol::{Message, Opcode};

/// Product string sent in the `User-Agent` header at open.
pub const USER_AGENT: &str = "littleARCH cloudBit";

/// A configured session. Per-connection state (heartbeat interval, last
/// observed amplitude) lives inside [`run`](Self::run), so re-running the
/// same session always starts fresh.
pub struct Session {
    pub(crate) url: String,
    pub(crate) mac_address: String,
    pub(crate) cb_id: String,
    pub(crate) poll_interval: Duration,
    pub(crate) recv_timeout: Duration,
    pub(crate) input_delta: u16,
    pub(crate) amplitude: Arc<dyn Amplitude>,
    pub(crate) indicator: Arc<dyn Indicator>,
}

impl Session {
    /// Run the session to termination.
    ///
    /// `Ok(())` means the server closed the connection; `Err` means the open
    /// attempt or the connection itself failed. Either way the session is
    /// over and the supervisor restarts the lifecycle.
    pub async fn run(&self) -> anyhow::Result<()> {
        // ── CONNECTING ───────────────────────────────────────────────
        self.indicator.set_color(LedColor::Teal);
        self.indicator.set_status(LedStatus::Blink);

        let request = self.connect_request()?;
        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .context("websocket open failed")?;
        tracing::info!(url = %self.url, "connected");

        let (mut sink, mut stream) = ws.split();

        // ── ACTIVE ───────────────────────────────────────────────────
        self.indicator.set_color(LedColor::Green);
        self.indicator.set_status(LedStatus::Hold);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(16);

        // Writer task: drains the outbound queue into the socket. A send
        // failure ends the task; the reader then observes the broken
        // connection and terminates the session.
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let text = match cb_protocol::encode(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        // Polling duty: sample the amplitude and send INPUT on change. The
        // last observed value starts unset, so the first real read (0
        // included) always produces one INPUT message.
        let poll_tx = outbound_tx.clone();
        let amplitude = Arc::clone(&self.amplitude);
        let poll_interval = self.poll_interval;
        let input_delta = self.input_delta;
        let poll_task = tokio::spawn(async move {
            let mut last_observed: Option<u16> = None;
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                let now = amplitude.read();
                let changed = match last_observed {
                    None => true,
                    Some(prev) => prev.abs_diff(now) > input_delta,
                };
                if changed {
                    last_observed = Some(now);
                    if poll_tx.send(Message::input(now)).await.is_err() {
                        break;
                    }
                }
            }
        });

        // Heartbeat duty handle. Dormant until the first HELLO; owned here
        // so termination can cancel it explicitly.
        let mut heartbeat: Option<JoinHandle<()>> = None;

        // Inbound dispatch duty. The timeout is not an error: it bounds the
        // wait so an idle connection still cycles the loop.
        let result = loop {
            match tokio::time::timeout(self.recv_timeout, stream.next()).await {
                Err(_idle) => continue,
                Ok(None) => break Ok(()),
                Ok(Some(Err(e))) => break Err(anyhow::Error::new(e).context("websocket receive failed")),
                Ok(Some(Ok(WsMessage::Text(text)))) => {
                    self.dispatch(&text, &outbound_tx, &mut heartbeat);
                }
                Ok(Some(Ok(WsMessage::Close(_)))) => {
                    tracing::info!("server closed connection");
                    break Ok(());
                }
                Ok(Some(Ok(_))) => {} // binary/ping/pong frames carry no opcode
            }
        };

        // ── TERMINATED ───────────────────────────────────────────────
        if let Some(hb) = heartbeat.take() {
            hb.abort();
        }
        poll_task.abort();
        writer_task.abort();

        result
    }

    /// Decode and dispatch one inbound message. Failures here never
    /// terminate the session.
    fn dispatch(
        &self,
        text: &str,
        outbound_tx: &mpsc::Sender<Message>,
        heartbeat: &mut Option<JoinHandle<()>>,
    ) {
        let msg = match cb_protocol::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable message");
                return;
            }
        };

        match msg.opcode {
            Opcode::Hello => {
                let Some(interval_ms) = msg.heartbeat_interval else {
                    tracing::warn!("HELLO without heartbeat_interval");
                    return;
                };
                tracing::info!(interval_ms, "HELLO received, starting heartbeat");
                if let Some(old) = heartbeat.take() {
                    old.abort();
                }
                *heartbeat = Some(spawn_heartbeat(interval_ms, outbound_tx.clone()));
            }
            Opcode::Output => match msg.data {
                Some(data) => self.amplitude.write(data.value),
                None => tracing::warn!("OUTPUT without data payload"),
            },
            Opcode::Clownbarf => {
                // Fault display changes the color only, never the status.
                self.indicator.set_color(LedColor::Clownbarf);
            }
            other => {
                tracing::trace!(opcode = ?other, "ignoring message");
            }
        }
    }

    /// Build the open request with the three identity headers.
    fn connect_request(
        &self,
    ) -> anyhow::Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .context("invalid server URL")?;
        let headers = request.headers_mut();
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        headers.insert(
            "MAC-Address",
            self.mac_address
                .parse()
                .context("MAC address is not a valid header value")?,
        );
        headers.insert(
            "CB-Id",
            self.cb_id
                .parse()
                .context("CB-Id is not a valid header value")?,
        );
        Ok(request)
    }
}

/// Spawn the heartbeat duty: one HEARTBEAT per interval, starting one full
/// interval after the HELLO that armed it.
fn spawn_heartbeat(interval_ms: u64, tx: mpsc::Sender<Message>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_millis(interval_ms);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(Message::bare(Opcode::Heartbeat)).await.is_err() {
                break;
            }
        }
    })
}
