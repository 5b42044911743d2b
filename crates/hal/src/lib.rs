//! `cb-hal` — thin adapters over the board's external helper binaries.
//!
//! The device exposes its ADC/DAC and status LED through small privileged
//! helper programs rather than direct register access. This crate wraps
//! those invocations and defines the two traits the client consumes, so the
//! session logic can be driven against fakes in tests.
//!
//! Helper failures are never surfaced to callers: the device must keep
//! functioning with a degraded reading rather than crash, so a failed read
//! reports amplitude 0 and a failed write or LED set is logged and dropped.

pub mod amplitude;
pub mod led;

pub use amplitude::{dac_argument, Amplitude, HelperAmplitude};
pub use led::{HelperIndicator, Indicator, LedColor, LedStatus};
