//! Event runtime configuration structures.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What to do when failures are flushed and no async handler is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledErrorPolicy {
    /// Log every failure and abort the process.
    #[default]
    Abort,
    /// Panic on the flushing thread.
    Panic,
}

impl FromStr for UnhandledErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "panic" => Ok(Self::Panic),
            other => Err(format!("unknown unhandled error policy `{other}`")),
        }
    }
}

/// Host backend sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostBackendConfig {
    /// Number of simulated host devices.
    pub device_count: u32,
    /// In-order instruction streams per device.
    pub streams_per_device: usize,
    /// Commands a stream may hold before submission blocks.
    pub max_stream_depth: usize,
    /// Stack size of stream worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl Default for HostBackendConfig {
    fn default() -> Self {
        Self {
            device_count: 1,
            streams_per_device: 1,
            max_stream_depth: 1024,
            thread_stack_size: 2 * 1024 * 1024,
        }
    }
}

impl HostBackendConfig {
    /// Minimum accepted worker stack size.
    pub const MIN_STACK_SIZE: usize = 64 * 1024;

    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of devices.
    #[must_use]
    pub const fn with_device_count(mut self, device_count: u32) -> Self {
        self.device_count = device_count;
        self
    }

    /// Set the number of streams per device.
    #[must_use]
    pub const fn with_streams_per_device(mut self, streams: usize) -> Self {
        self.streams_per_device = streams;
        self
    }

    /// Set the stream queue depth.
    #[must_use]
    pub const fn with_max_stream_depth(mut self, depth: usize) -> Self {
        self.max_stream_depth = depth;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Validate host backend values.
    pub fn validate(&self) -> Result<(), String> {
        if self.device_count == 0 {
            return Err("device_count must be greater than 0".into());
        }
        if self.streams_per_device == 0 {
            return Err("streams_per_device must be greater than 0".into());
        }
        if self.max_stream_depth == 0 {
            return Err("max_stream_depth must be greater than 0".into());
        }
        if self.thread_stack_size < Self::MIN_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {} bytes",
                Self::MIN_STACK_SIZE
            ));
        }
        Ok(())
    }
}

/// Root event runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRuntimeConfig {
    /// Policy for flushes without a registered handler.
    pub unhandled_errors: UnhandledErrorPolicy,
    /// Host backend sizing.
    pub host: HostBackendConfig,
}

impl EventRuntimeConfig {
    /// Prefix of the environment variables read by [`Self::from_env`].
    pub const ENV_PREFIX: &'static str = "ACCEL_EVENTS_";

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.host
            .validate()
            .map_err(|e| format!("host backend invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by the process
    /// environment (after loading a `.env` file, if present), then validate.
    ///
    /// Recognized variables: `ACCEL_EVENTS_UNHANDLED_ERRORS`,
    /// `ACCEL_EVENTS_HOST_DEVICES`, `ACCEL_EVENTS_HOST_STREAMS`,
    /// `ACCEL_EVENTS_HOST_STREAM_DEPTH`, `ACCEL_EVENTS_HOST_STACK_SIZE`.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{name}", Self::ENV_PREFIX));
        let mut cfg = Self::default();

        if let Some(v) = var("UNHANDLED_ERRORS") {
            cfg.unhandled_errors = v.parse()?;
        }
        if let Some(v) = var("HOST_DEVICES") {
            cfg.host.device_count = parse_number("HOST_DEVICES", &v)?;
        }
        if let Some(v) = var("HOST_STREAMS") {
            cfg.host.streams_per_device = parse_number("HOST_STREAMS", &v)?;
        }
        if let Some(v) = var("HOST_STREAM_DEPTH") {
            cfg.host.max_stream_depth = parse_number("HOST_STREAM_DEPTH", &v)?;
        }
        if let Some(v) = var("HOST_STACK_SIZE") {
            cfg.host.thread_stack_size = parse_number("HOST_STACK_SIZE", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{}{name}: `{value}` is not a valid number", EventRuntimeConfig::ENV_PREFIX))
}
