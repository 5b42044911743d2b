//! Status LED control via the board's LED helper binary.
//!
//! Color and blink/hold status are two independent axes, but the helper
//! takes a single string token for either.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::process::Command;

/// Default helper location on the device image.
pub const DEFAULT_LED_HELPER: &str = "/usr/local/lb/LEDcolor/bin/setColor";

/// LED colors, including the server-signaled fault display.
///
/// `Violet` and `Purple` are distinct names for the same wire token: the
/// stock firmware collapses both to `"purple"`. This is preserved as a
/// palette alias, not corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Red,
    Green,
    Blue,
    Yellow,
    Teal,
    Purple,
    Violet,
    White,
    Clownbarf,
}

impl LedColor {
    /// The token the helper expects.
    pub fn token(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Teal => "teal",
            Self::Purple | Self::Violet => "purple",
            Self::White => "white",
            Self::Clownbarf => "clownbarf",
        }
    }
}

impl Display for LedColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.token())
    }
}

/// LED display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedStatus {
    Off,
    Blink,
    Hold,
}

impl LedStatus {
    /// The token the helper expects.
    pub fn token(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Blink => "blink",
            Self::Hold => "hold",
        }
    }
}

impl Display for LedStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.token())
    }
}

/// Seam for the status LED. The production implementation is
/// [`HelperIndicator`]; tests substitute fakes.
pub trait Indicator: Send + Sync + 'static {
    fn set_color(&self, color: LedColor);
    fn set_status(&self, status: LedStatus);
}

/// Indicator adapter backed by the external LED helper.
#[derive(Debug, Clone)]
pub struct HelperIndicator {
    helper: PathBuf,
}

impl HelperIndicator {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    fn run(&self, token: &str) {
        match Command::new(&self.helper).arg(token).status() {
            Ok(status) if !status.success() => {
                tracing::debug!(helper = %self.helper.display(), token, %status, "LED helper exited non-zero");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(helper = %self.helper.display(), token, error = %e, "LED helper failed");
            }
        }
    }
}

impl Default for HelperIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_LED_HELPER)
    }
}

impl Indicator for HelperIndicator {
    fn set_color(&self, color: LedColor) {
        self.run(color.token());
    }

    fn set_status(&self, status: LedStatus) {
        self.run(status.token());
    }
}
