//! `cb-client` — connection lifecycle for the cloud-connected device.
//!
//! The device bridges one analog sensor/actuator pair and a status LED to a
//! remote control server over a persistent WebSocket. This crate owns the
//! whole lifecycle: one [`Session`] per connection attempt, restarted
//! forever by the [`Supervisor`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Supervisor (restart forever, fixed delay)             │
//! │   └─ Session (one connection)                          │
//! │       ├─ heartbeat duty   (dormant until HELLO)        │
//! │       ├─ inbound dispatch (1 s recv ceiling)           │
//! │       ├─ outbound polling (500 ms amplitude poll)      │
//! │       └─ writer task      (drains the outbound queue)  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection flow
//!
//! 1. Connect WS with identity headers (`User-Agent`, `MAC-Address`, `CB-Id`)
//! 2. Show green/hold and start the polling + dispatch duties
//! 3. On `HELLO { heartbeat_interval }`: start the heartbeat duty
//! 4. On `OUTPUT { data.value }`: write the actuator amplitude
//! 5. On connection loss: cancel every duty, show red/blink, wait the retry
//!    delay, start over with fresh per-connection state
//!
//! User-visible state is the LED only: green/hold = connected, red/blink =
//! recovering, clownbarf = server-signaled fault.

pub mod builder;
pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod supervisor;

pub use builder::ClientBuilder;
pub use config::Config;
pub use error::ClientError;
pub use retry::RetryDelay;
pub use session::Session;
pub use supervisor::Supervisor;

// Re-export the protocol and adapter seams so binaries and tests never need
// to import cb-protocol / cb-hal directly.
pub use cb_hal::{Amplitude, Indicator, LedColor, LedStatus};
pub use cb_protocol::{Message, Opcode};
