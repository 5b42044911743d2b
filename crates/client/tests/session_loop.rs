//! Integration test: boots an in-process WebSocket server that simulates
//! the cloud control server, runs a real [`Supervisor`] against it with fake
//! hardware adapters, and asserts the full lifecycle:
//!
//! - identity headers are sent at open
//! - the indicator goes green/hold once connected
//! - no HEARTBEAT before the first HELLO, steady beats after
//! - OUTPUT drives the actuator, CLOWNBARF drives the fault color
//! - amplitude changes produce INPUT messages (first read included)
//! - garbage and unknown opcodes are dropped without killing the session
//! - connection loss triggers red/blink and one reconnect attempt

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use cb_client::{
    Amplitude, ClientBuilder, ClientError, Indicator, LedColor, LedStatus, Message, Opcode,
    RetryDelay,
};

// ── Fake adapters ───────────────────────────────────────────────────────

/// Scripted sensor: pops queued readings, then repeats the last one.
/// Records every actuator write.
#[derive(Default)]
struct FakeAmplitude {
    reads: Mutex<VecDeque<u16>>,
    last: Mutex<u16>,
    writes: Mutex<Vec<u16>>,
}

impl FakeAmplitude {
    fn with_reads(seq: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            reads: Mutex::new(seq.iter().copied().collect()),
            ..Self::default()
        })
    }

    fn writes(&self) -> Vec<u16> {
        self.writes.lock().unwrap().clone()
    }
}

impl Amplitude for FakeAmplitude {
    fn read(&self) -> u16 {
        let mut reads = self.reads.lock().unwrap();
        match reads.pop_front() {
            Some(v) => {
                *self.last.lock().unwrap() = v;
                v
            }
            None => *self.last.lock().unwrap(),
        }
    }

    fn write(&self, value: u16) {
        self.writes.lock().unwrap().push(value);
    }
}

/// Records every color and status change.
#[derive(Default)]
struct FakeIndicator {
    colors: Mutex<Vec<LedColor>>,
    statuses: Mutex<Vec<LedStatus>>,
}

impl FakeIndicator {
    fn color(&self) -> Option<LedColor> {
        self.colors.lock().unwrap().last().copied()
    }

    fn status(&self) -> Option<LedStatus> {
        self.statuses.lock().unwrap().last().copied()
    }

    fn statuses(&self) -> Vec<LedStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl Indicator for FakeIndicator {
    fn set_color(&self, color: LedColor) {
        self.colors.lock().unwrap().push(color);
    }

    fn set_status(&self, status: LedStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

// ── Mini cloud: in-process WS server ────────────────────────────────────

/// Identity headers captured during the WebSocket upgrade.
#[derive(Debug, Clone, Default)]
struct CapturedHeaders {
    user_agent: String,
    mac_address: String,
    cb_id: String,
}

/// Handle to one accepted device connection.
struct ServerConn {
    headers: CapturedHeaders,
    send_raw: mpsc::Sender<String>,
    recv: mpsc::Receiver<Message>,
    close: CancellationToken,
}

impl ServerConn {
    async fn send(&self, msg: &Message) {
        let text = cb_protocol::encode(msg).unwrap();
        self.send_raw.send(text).await.expect("server conn gone");
    }

    /// Drain inbound messages until one with the wanted opcode arrives.
    async fn recv_opcode(&mut self, opcode: Opcode, deadline: Duration) -> Message {
        let deadline = tokio::time::Instant::now() + deadline;
        loop {
            match tokio::time::timeout_at(deadline, self.recv.recv()).await {
                Ok(Some(msg)) if msg.opcode == opcode => return msg,
                Ok(Some(_)) => continue,
                Ok(None) => panic!("connection dropped waiting for {opcode:?}"),
                Err(_) => panic!("timeout waiting for {opcode:?}"),
            }
        }
    }

    /// Collect every message received within the window.
    async fn drain_for(&mut self, window: Duration) -> Vec<Message> {
        let deadline = tokio::time::Instant::now() + window;
        let mut out = Vec::new();
        while let Ok(Some(msg)) = tokio::time::timeout_at(deadline, self.recv.recv()).await {
            out.push(msg);
        }
        out
    }
}

/// Boots a tiny WS server on an ephemeral port. Each accepted connection is
/// delivered through the returned channel as a [`ServerConn`].
async fn start_mini_cloud() -> (SocketAddr, mpsc::Receiver<ServerConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (conn_tx, conn_rx) = mpsc::channel(4);

    tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            let conn_tx = conn_tx.clone();
            tokio::spawn(async move {
                let captured = Arc::new(Mutex::new(CapturedHeaders::default()));
                let captured_cb = Arc::clone(&captured);
                let ws = tokio_tungstenite::accept_hdr_async(
                    stream,
                    move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        let mut captured = captured_cb.lock().unwrap();
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string()
                        };
                        captured.user_agent = header("User-Agent");
                        captured.mac_address = header("MAC-Address");
                        captured.cb_id = header("CB-Id");
                        Ok(resp)
                    },
                )
                .await
                .unwrap();

                let (mut sink, mut stream) = ws.split();
                let (raw_tx, mut raw_rx) = mpsc::channel::<String>(16);
                let (msg_tx, msg_rx) = mpsc::channel::<Message>(64);
                let close = CancellationToken::new();

                let headers = captured.lock().unwrap().clone();
                let conn = ServerConn {
                    headers,
                    send_raw: raw_tx,
                    recv: msg_rx,
                    close: close.clone(),
                };
                if conn_tx.send(conn).await.is_err() {
                    return;
                }

                loop {
                    tokio::select! {
                        _ = close.cancelled() => break, // drop the socket
                        out = raw_rx.recv() => match out {
                            Some(text) => {
                                if sink.send(WsMessage::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                        inbound = stream.next() => match inbound {
                            Some(Ok(WsMessage::Text(text))) => {
                                if let Ok(msg) = cb_protocol::decode(&text) {
                                    let _ = msg_tx.send(msg).await;
                                }
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            });
        }
    });

    (addr, conn_rx)
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    amplitude: Arc<FakeAmplitude>,
    indicator: Arc<FakeIndicator>,
    conn_rx: mpsc::Receiver<ServerConn>,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<Result<(), ClientError>>,
}

impl Harness {
    /// Spawn a supervisor against a fresh mini cloud with fast test timings.
    async fn start(amplitude: Arc<FakeAmplitude>) -> Self {
        let (addr, conn_rx) = start_mini_cloud().await;
        let indicator = Arc::new(FakeIndicator::default());

        let supervisor = ClientBuilder::new()
            .url(format!("ws://{addr}/"))
            .mac_address("00:11:22:33:44:55")
            .cb_id("integration-cb")
            .poll_interval(Duration::from_millis(30))
            .retry(RetryDelay::fixed(Duration::from_millis(50)))
            .amplitude(amplitude.clone())
            .indicator(indicator.clone())
            .build()
            .unwrap();

        let shutdown = CancellationToken::new();
        let handle = supervisor.spawn(shutdown.clone());

        Self {
            amplitude,
            indicator,
            conn_rx,
            shutdown,
            handle,
        }
    }

    async fn next_conn(&mut self) -> ServerConn {
        tokio::time::timeout(Duration::from_secs(5), self.conn_rx.recv())
            .await
            .expect("timeout waiting for device connection")
            .expect("mini cloud stopped")
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("supervisor did not stop")
            .expect("supervisor task panicked");
        assert!(matches!(result, Err(ClientError::Shutdown)));
    }
}

/// Await until `check` passes or the deadline hits.
async fn eventually(deadline: Duration, mut check: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + deadline;
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timeout waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_sends_identity_headers_and_goes_green() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let mut conn = h.next_conn().await;

    assert_eq!(conn.headers.user_agent, "littleARCH cloudBit");
    assert_eq!(conn.headers.mac_address, "00:11:22:33:44:55");
    assert_eq!(conn.headers.cb_id, "integration-cb");

    let indicator = h.indicator.clone();
    eventually(
        Duration::from_secs(2),
        || indicator.color() == Some(LedColor::Green) && indicator.status() == Some(LedStatus::Hold),
        "green/hold after connect",
    )
    .await;

    // The first real read (0) crosses the unset sentinel and is reported.
    let input = conn.recv_opcode(Opcode::Input, Duration::from_secs(2)).await;
    assert_eq!(input.data.map(|d| d.value), Some(0));

    h.stop().await;
}

#[tokio::test]
async fn no_heartbeat_before_hello_then_steady_beats() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let mut conn = h.next_conn().await;

    // Dormant until HELLO: nothing but INPUT traffic in the first window.
    let before = conn.drain_for(Duration::from_millis(400)).await;
    assert!(
        before.iter().all(|m| m.opcode != Opcode::Heartbeat),
        "heartbeat emitted before HELLO: {before:?}"
    );

    conn.send(&Message::hello(100)).await;

    // Steady beats after: roughly one per 100 ms, never a flood.
    let beats = conn
        .drain_for(Duration::from_millis(1_000))
        .await
        .into_iter()
        .filter(|m| m.opcode == Opcode::Heartbeat)
        .count();
    assert!((3..=13).contains(&beats), "unexpected beat count: {beats}");

    // A second HELLO rearms the duty instead of doubling it.
    conn.send(&Message::hello(100)).await;
    let beats = conn
        .drain_for(Duration::from_millis(1_000))
        .await
        .into_iter()
        .filter(|m| m.opcode == Opcode::Heartbeat)
        .count();
    assert!((3..=13).contains(&beats), "beat count after rearm: {beats}");

    h.stop().await;
}

#[tokio::test]
async fn input_sequence_sends_changes_only() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0, 0, 5, 5, 7])).await;
    let mut conn = h.next_conn().await;

    let values: Vec<u16> = conn
        .drain_for(Duration::from_millis(600))
        .await
        .into_iter()
        .filter(|m| m.opcode == Opcode::Input)
        .filter_map(|m| m.data.map(|d| d.value))
        .collect();

    // Repeats are suppressed; the trailing constant 7 never re-fires.
    assert_eq!(values, vec![0, 5, 7]);

    h.stop().await;
}

#[tokio::test]
async fn output_writes_actuator_every_time() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let conn = h.next_conn().await;

    conn.send(&Message::output(42)).await;
    let amplitude = h.amplitude.clone();
    eventually(
        Duration::from_secs(2),
        || amplitude.writes() == vec![42],
        "first OUTPUT write",
    )
    .await;

    // Same value again still writes: no change detection on the way out.
    conn.send(&Message::output(42)).await;
    eventually(
        Duration::from_secs(2),
        || amplitude.writes() == vec![42, 42],
        "second OUTPUT write",
    )
    .await;

    h.stop().await;
}

#[tokio::test]
async fn clownbarf_sets_fault_color_and_leaves_status_alone() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let conn = h.next_conn().await;

    let indicator = h.indicator.clone();
    eventually(
        Duration::from_secs(2),
        || indicator.status() == Some(LedStatus::Hold),
        "active session",
    )
    .await;

    conn.send(&Message::bare(Opcode::Clownbarf)).await;
    eventually(
        Duration::from_secs(2),
        || indicator.color() == Some(LedColor::Clownbarf),
        "fault color",
    )
    .await;

    // Connecting set blink, active set hold, clownbarf changed nothing.
    assert_eq!(h.indicator.statuses(), vec![LedStatus::Blink, LedStatus::Hold]);

    h.stop().await;
}

#[tokio::test]
async fn garbage_and_unknown_opcodes_are_dropped_quietly() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let conn = h.next_conn().await;

    let indicator = h.indicator.clone();
    eventually(
        Duration::from_secs(2),
        || indicator.color() == Some(LedColor::Green),
        "active session",
    )
    .await;

    conn.send_raw.send(r#"{"opcode":99}"#.into()).await.unwrap();
    conn.send_raw.send(r#"{"data":{"value":1}}"#.into()).await.unwrap();
    conn.send_raw.send("not json at all".into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // No adapter state changed.
    assert!(h.amplitude.writes().is_empty());
    assert_eq!(h.indicator.color(), Some(LedColor::Green));

    // And the session is still alive: a real OUTPUT still lands.
    conn.send(&Message::output(7)).await;
    let amplitude = h.amplitude.clone();
    eventually(
        Duration::from_secs(2),
        || amplitude.writes() == vec![7],
        "OUTPUT after garbage",
    )
    .await;

    h.stop().await;
}

#[tokio::test]
async fn reconnects_after_connection_loss_with_fresh_state() {
    let mut h = Harness::start(FakeAmplitude::with_reads(&[0])).await;
    let mut conn = h.next_conn().await;

    conn.send(&Message::hello(100)).await;
    conn.recv_opcode(Opcode::Heartbeat, Duration::from_secs(2)).await;

    // Kill the connection from the server side.
    conn.close.cancel();

    let indicator = h.indicator.clone();
    eventually(
        Duration::from_secs(2),
        || indicator.color() == Some(LedColor::Red) && indicator.status() == Some(LedStatus::Blink),
        "red/blink after loss",
    )
    .await;

    // One reconnect attempt after the (near-zero) fixed delay.
    let mut conn2 = h.next_conn().await;

    // The heartbeat interval did not survive the restart: the new session
    // is dormant until its own HELLO, and the sentinel reset re-reports the
    // current amplitude.
    let fresh = conn2.drain_for(Duration::from_millis(400)).await;
    assert!(
        fresh.iter().all(|m| m.opcode != Opcode::Heartbeat),
        "heartbeat leaked across sessions: {fresh:?}"
    );
    assert!(
        fresh
            .iter()
            .any(|m| m.opcode == Opcode::Input && m.data.map(|d| d.value) == Some(0)),
        "fresh session did not re-report the amplitude"
    );

    h.stop().await;
}
