//! Builder pattern for constructing a [`Supervisor`].

use std::sync::Arc;
use std::time::Duration;

use cb_hal::{Amplitude, HelperAmplitude, HelperIndicator, Indicator};

use crate::config::{self, Config};
use crate::error::ClientError;
use crate::retry::RetryDelay;
use crate::session::Session;
use crate::supervisor::Supervisor;

/// Fluent builder for the client's [`Supervisor`].
///
/// # Example
///
/// ```rust,no_run
/// # use cb_client::ClientBuilder;
/// let supervisor = ClientBuilder::new()
///     .url("wss://gateway.example.com/")
///     .mac_address("00:11:22:33:44:55")
///     .cb_id("my-device")
///     .build()
///     .unwrap();
/// ```
pub struct ClientBuilder {
    url: String,
    mac_address: String,
    cb_id: String,
    poll_interval: Duration,
    recv_timeout: Duration,
    input_delta: u16,
    retry: RetryDelay,
    amplitude: Option<Arc<dyn Amplitude>>,
    indicator: Option<Arc<dyn Indicator>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            url: config::DEFAULT_URL.into(),
            mac_address: "ERROR_READING_MAC".into(),
            cb_id: "ERROR_READING_ID".into(),
            poll_interval: Duration::from_millis(500),
            recv_timeout: Duration::from_secs(1),
            input_delta: 0,
            retry: RetryDelay::default(),
            amplitude: None,
            indicator: None,
        }
    }

    /// Seed the builder from a parsed [`Config`], resolving the identity
    /// pair and wiring the helper-backed adapters.
    pub fn from_config(config: &Config) -> Self {
        let (mac_address, cb_id) = config.identity();
        let mut builder = Self::new()
            .url(&config.cloud.url)
            .mac_address(mac_address)
            .cb_id(cb_id)
            .input_delta(config.hardware.input_delta);
        builder.amplitude = Some(Arc::new(HelperAmplitude::new(
            &config.hardware.adc_helper,
            &config.hardware.dac_helper,
        )));
        builder.indicator = Some(Arc::new(HelperIndicator::new(&config.hardware.led_helper)));
        builder
    }

    /// Set the server URL. `http`/`https` schemes are normalized to
    /// `ws`/`wss` at build time.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the MAC-style identity header value.
    pub fn mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = mac.into();
        self
    }

    /// Set the device identity header value.
    pub fn cb_id(mut self, id: impl Into<String>) -> Self {
        self.cb_id = id.into();
        self
    }

    /// Override the amplitude poll cadence (default 500 ms).
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Override the inbound receive ceiling (default 1 s).
    pub fn recv_timeout(mut self, d: Duration) -> Self {
        self.recv_timeout = d;
        self
    }

    /// Minimum amplitude change before an INPUT is sent (default 0).
    pub fn input_delta(mut self, delta: u16) -> Self {
        self.input_delta = delta;
        self
    }

    /// Override the reconnect delay policy (default fixed 2 s).
    pub fn retry(mut self, retry: RetryDelay) -> Self {
        self.retry = retry;
        self
    }

    /// Substitute the sensor/actuator adapter (tests use fakes here).
    pub fn amplitude(mut self, amplitude: Arc<dyn Amplitude>) -> Self {
        self.amplitude = Some(amplitude);
        self
    }

    /// Substitute the LED adapter (tests use fakes here).
    pub fn indicator(mut self, indicator: Arc<dyn Indicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Build the [`Supervisor`].
    pub fn build(self) -> Result<Supervisor, ClientError> {
        if self.url.is_empty() {
            return Err(ClientError::Config("server URL is required".into()));
        }
        let url = config::normalize_url(&self.url)?;

        let amplitude = self
            .amplitude
            .unwrap_or_else(|| Arc::new(HelperAmplitude::default()));
        let indicator = self
            .indicator
            .unwrap_or_else(|| Arc::new(HelperIndicator::default()));

        Ok(Supervisor {
            session: Session {
                url,
                mac_address: self.mac_address,
                cb_id: self.cb_id,
                poll_interval: self.poll_interval,
                recv_timeout: self.recv_timeout,
                input_delta: self.input_delta,
                amplitude,
                indicator: Arc::clone(&indicator),
            },
            retry: self.retry,
            indicator,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
