//! Analog amplitude access via the board's ADC/DAC helper binaries.

use std::path::PathBuf;
use std::process::Command;

/// Default helper locations on the device image.
pub const DEFAULT_READ_HELPER: &str = "/usr/local/lb/ADC/bin/getADC";
pub const DEFAULT_WRITE_HELPER: &str = "/usr/local/lb/DAC/bin/setDAC";

/// Channel selector passed to the read helper.
const READ_CHANNEL_ARG: &str = "-1";

/// Seam for the sensor/actuator pair. The production implementation is
/// [`HelperAmplitude`]; tests substitute fakes.
pub trait Amplitude: Send + Sync + 'static {
    /// Current sensor amplitude. Never fails; a broken helper reads as 0.
    fn read(&self) -> u16;
    /// Set the actuator amplitude. Never fails; a broken helper is a no-op.
    fn write(&self, value: u16);
}

/// Format an amplitude as the DAC helper's argument: `0x` followed by four
/// uppercase hex digits.
pub fn dac_argument(value: u16) -> String {
    format!("0x{value:04X}")
}

/// Amplitude adapter backed by the external helper binaries.
#[derive(Debug, Clone)]
pub struct HelperAmplitude {
    read_helper: PathBuf,
    write_helper: PathBuf,
}

impl HelperAmplitude {
    pub fn new(read_helper: impl Into<PathBuf>, write_helper: impl Into<PathBuf>) -> Self {
        Self {
            read_helper: read_helper.into(),
            write_helper: write_helper.into(),
        }
    }
}

impl Default for HelperAmplitude {
    fn default() -> Self {
        Self::new(DEFAULT_READ_HELPER, DEFAULT_WRITE_HELPER)
    }
}

impl Amplitude for HelperAmplitude {
    fn read(&self) -> u16 {
        let output = match Command::new(&self.read_helper).arg(READ_CHANNEL_ARG).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(helper = %self.read_helper.display(), error = %e, "ADC read failed");
                return 0;
            }
        };
        if !output.status.success() {
            tracing::debug!(
                helper = %self.read_helper.display(),
                status = %output.status,
                "ADC helper exited non-zero"
            );
            return 0;
        }

        // The amplitude is the first line of stdout.
        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().next().map(str::trim).unwrap_or("").parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::debug!(raw = %stdout.trim(), "non-numeric ADC output");
                0
            }
        }
    }

    fn write(&self, value: u16) {
        match Command::new(&self.write_helper).arg(dac_argument(value)).status() {
            Ok(status) if !status.success() => {
                tracing::debug!(
                    helper = %self.write_helper.display(),
                    %status,
                    "DAC helper exited non-zero"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(helper = %self.write_helper.display(), error = %e, "DAC write failed");
            }
        }
    }
}
