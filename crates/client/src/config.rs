//! Device configuration: TOML file with per-field defaults, plus the two
//! identity strings the board provisions as flat files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ClientError;

/// Stock server gateway. Overridable via the config file.
pub const DEFAULT_URL: &str = "wss://gateway.cloudcontrol.littlebitsman.dev/";

/// Board-provisioned identity files.
const MAC_PATH: &str = "/var/lb/mac";
const ID_PATH: &str = "/var/lb/id";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Server address and identity overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default = "d_url")]
    pub url: String,
    /// Overrides the `/var/lb/mac` identity file when set.
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Overrides the `/var/lb/id` identity file when set.
    #[serde(default)]
    pub cb_id: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            mac_address: None,
            cb_id: None,
        }
    }
}

/// Helper binary locations and input tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "d_adc_helper")]
    pub adc_helper: String,
    #[serde(default = "d_dac_helper")]
    pub dac_helper: String,
    #[serde(default = "d_led_helper")]
    pub led_helper: String,
    /// Minimum amplitude change before an INPUT message is sent. 0 means
    /// any change counts (strict inequality).
    #[serde(default)]
    pub input_delta: u16,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            adc_helper: d_adc_helper(),
            dac_helper: d_dac_helper(),
            led_helper: d_led_helper(),
            input_delta: 0,
        }
    }
}

fn d_url() -> String {
    DEFAULT_URL.into()
}
fn d_adc_helper() -> String {
    cb_hal::amplitude::DEFAULT_READ_HELPER.into()
}
fn d_dac_helper() -> String {
    cb_hal::amplitude::DEFAULT_WRITE_HELPER.into()
}
fn d_led_helper() -> String {
    cb_hal::led::DEFAULT_LED_HELPER.into()
}

impl Config {
    /// Parse the config file at `path`. A missing file is not an error — the
    /// device runs on defaults — but a malformed one is, so a bad edit is
    /// caught at startup instead of silently ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ClientError::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        toml::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Resolve the identity pair, preferring config overrides and falling
    /// back to the board's identity files. A missing file yields a marker
    /// string rather than aborting; the device still connects and the server
    /// side sees the degraded identity.
    pub fn identity(&self) -> (String, String) {
        let mac = match &self.cloud.mac_address {
            Some(mac) => mac.clone(),
            None => read_identity_file(MAC_PATH, "ERROR_READING_MAC"),
        };
        let cb_id = match &self.cloud.cb_id {
            Some(id) => id.clone(),
            None => read_identity_file(ID_PATH, "ERROR_READING_ID"),
        };
        (mac, cb_id)
    }
}

fn read_identity_file(path: &str, fallback: &str) -> String {
    match fs::read_to_string(path) {
        Ok(raw) => raw.trim().to_string(),
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to read identity file");
            fallback.to_string()
        }
    }
}

/// Normalize a server URL scheme: `http` becomes `ws`, `https` becomes
/// `wss`, `ws`/`wss` pass through, anything else is rejected.
pub fn normalize_url(url: &str) -> Result<String, ClientError> {
    if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else {
        Err(ClientError::Config(format!(
            "invalid scheme on server URL: {url}"
        )))
    }
}
