//! Wire protocol for the cloud control server: message types and JSON codec.
//!
//! Every message on the socket is a JSON object with a mandatory integer
//! `opcode` and, depending on the opcode, an optional `data` payload
//! (INPUT/OUTPUT) or a top-level `heartbeat_interval` (HELLO).

use serde::{Deserialize, Serialize};

/// Fixed opcode table. The integer values are the wire representation and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Opcode {
    /// Device → server: sensor amplitude changed.
    Input = 1,
    /// Server → device: set actuator amplitude.
    Output = 2,
    /// Server → device: handshake accepted, carries the heartbeat interval.
    Hello = 3,
    /// Device → server: liveness beacon.
    Heartbeat = 4,
    /// Reserved. Defined by the protocol but never handled.
    HeartbeatAck = 5,
    /// Server → device: display the fault color.
    Clownbarf = 6,
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Input),
            2 => Ok(Self::Output),
            3 => Ok(Self::Hello),
            4 => Ok(Self::Heartbeat),
            5 => Ok(Self::HeartbeatAck),
            6 => Ok(Self::Clownbarf),
            other => Err(format!("unrecognized opcode: {other}")),
        }
    }
}

/// Amplitude payload carried by INPUT and OUTPUT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmplitudeData {
    pub value: u16,
}

/// One wire message.
///
/// Unknown extra fields from the server are ignored on decode; a missing or
/// unrecognized `opcode` is a [`ProtocolError`] for that message only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub opcode: Opcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AmplitudeData>,
    /// HELLO only. The original server puts this at the top level of the
    /// message, not inside `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
}

impl Message {
    /// Bare message carrying only an opcode (HEARTBEAT et al.).
    pub fn bare(opcode: Opcode) -> Self {
        Self {
            opcode,
            data: None,
            heartbeat_interval: None,
        }
    }

    /// Device → server INPUT with the new sensor amplitude.
    pub fn input(value: u16) -> Self {
        Self {
            opcode: Opcode::Input,
            data: Some(AmplitudeData { value }),
            heartbeat_interval: None,
        }
    }

    /// Server → device OUTPUT (used by tests and the protocol simulator).
    pub fn output(value: u16) -> Self {
        Self {
            opcode: Opcode::Output,
            data: Some(AmplitudeData { value }),
            heartbeat_interval: None,
        }
    }

    /// Server → device HELLO with the heartbeat interval in milliseconds.
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self {
            opcode: Opcode::Hello,
            data: None,
            heartbeat_interval: Some(heartbeat_interval_ms),
        }
    }
}

/// Codec error.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message to its wire text.
pub fn encode(msg: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decode wire text into a message. Fails on malformed JSON, a missing
/// `opcode`, or an opcode outside the fixed table.
pub fn decode(text: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
