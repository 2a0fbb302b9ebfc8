//! netmon.toml configuration parser.
//!
//! Every section and field has a default, so an empty file yields a
//! working configuration. Durations are written as strings ("2s",
//! "500ms", "1m").

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::history::DownPolicy;
use crate::state::MonitorPolicy;
use crate::time::duration_str;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetmonConfig {
    pub device: DeviceConfig,
    pub link: LinkConfig,
    pub upstream: TargetConfig,
    pub downstream: TargetConfig,
    pub cadence: CadenceConfig,
    pub verdict: VerdictConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for NetmonConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            link: LinkConfig::default(),
            upstream: TargetConfig::new("192.168.1.1"),
            downstream: TargetConfig::new("192.168.1.50"),
            cadence: CadenceConfig::default(),
            verdict: VerdictConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device name used in the telemetry topic.
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "netmon".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Network interface whose carrier state is polled.
    pub interface: String,
    /// Command (argv) run to re-associate the link. Empty disables it.
    pub reconnect_command: Vec<String>,
    /// Minimum spacing between reconnect attempts.
    #[serde(with = "duration_str")]
    pub reconnect_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            reconnect_command: Vec::new(),
            reconnect_interval: Duration::from_secs(3),
        }
    }
}

/// How a target is probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    /// One ICMP echo via the system `ping`.
    #[default]
    Icmp,
    /// A TCP connect to `port`.
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub address: String,
    #[serde(default)]
    pub method: ProbeMethod,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-attempt bound.
    #[serde(default = "default_probe_timeout", with = "duration_str")]
    pub timeout: Duration,
    /// Start the staleness clock at boot instead of at the first success.
    #[serde(default)]
    pub seed_last_success: bool,
    #[serde(default)]
    pub down_policy: DownPolicy,
}

impl TargetConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            method: ProbeMethod::default(),
            port: default_port(),
            timeout: default_probe_timeout(),
            seed_last_success: false,
            down_policy: DownPolicy::default(),
        }
    }
}

fn default_port() -> u16 {
    80
}

fn default_probe_timeout() -> Duration {
    Duration::from_millis(800)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Sampling tick.
    #[serde(with = "duration_str")]
    pub sample_interval: Duration,
    /// Display refresh tick, independent of sampling.
    #[serde(with = "duration_str")]
    pub display_interval: Duration,
    /// Sample the upstream target every N ticks.
    pub upstream_every: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(2_000),
            display_interval: Duration::from_millis(500),
            upstream_every: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictConfig {
    #[serde(with = "duration_str")]
    pub high_latency: Duration,
    #[serde(with = "duration_str")]
    pub recovery_window: Duration,
    #[serde(with = "duration_str")]
    pub boot_window: Duration,
    #[serde(with = "duration_str")]
    pub outage_display: Duration,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        let policy = MonitorPolicy::default();
        Self {
            high_latency: policy.high_latency,
            recovery_window: policy.recovery_window,
            boot_window: policy.boot_window,
            outage_display: policy.outage_display,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// MQTT broker as `host:port`.
    pub broker: String,
    /// Overrides `netmon/<device>/metrics`.
    pub topic: Option<String>,
    /// Defaults to `netmon-<device>`.
    pub client_id: Option<String>,
    #[serde(with = "duration_str")]
    pub keep_alive: Duration,
    #[serde(with = "duration_str")]
    pub connect_timeout: Duration,
    /// Minimum spacing between broker reconnect attempts.
    #[serde(with = "duration_str")]
    pub reconnect_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broker: "127.0.0.1:1883".to_string(),
            topic: None,
            client_id: None,
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(3),
        }
    }
}

impl NetmonConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: NetmonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the control loop cannot honor.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, target) in [("upstream", &self.upstream), ("downstream", &self.downstream)] {
            if target.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name}.address is empty")));
            }
            if target.timeout.is_zero() {
                return Err(ConfigError::Invalid(format!("{name}.timeout must be non-zero")));
            }
            // Both targets are probed concurrently, so the slower bound must fit in a tick.
            if target.timeout >= self.cadence.sample_interval {
                return Err(ConfigError::Invalid(format!(
                    "{name}.timeout must be shorter than cadence.sample_interval"
                )));
            }
            if let DownPolicy::Count { failures: 0 } = target.down_policy {
                return Err(ConfigError::Invalid(format!(
                    "{name}.down_policy.failures must be at least 1"
                )));
            }
        }
        if self.cadence.sample_interval.is_zero() || self.cadence.display_interval.is_zero() {
            return Err(ConfigError::Invalid("cadence intervals must be non-zero".to_string()));
        }
        if self.cadence.upstream_every == 0 {
            return Err(ConfigError::Invalid("cadence.upstream_every must be at least 1".to_string()));
        }
        if self.device.id.contains(['/', '+', '#']) {
            return Err(ConfigError::Invalid(
                "device.id must not contain MQTT topic characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Thresholds and windows for the monitor state machine.
    pub fn monitor_policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            upstream_down: self.upstream.down_policy,
            downstream_down: self.downstream.down_policy,
            seed_upstream: self.upstream.seed_last_success,
            seed_downstream: self.downstream.seed_last_success,
            high_latency: self.verdict.high_latency,
            recovery_window: self.verdict.recovery_window,
            boot_window: self.verdict.boot_window,
            outage_display: self.verdict.outage_display,
        }
    }

    pub fn telemetry_topic(&self) -> String {
        self.telemetry
            .topic
            .clone()
            .unwrap_or_else(|| format!("netmon/{}/metrics", self.device.id))
    }

    pub fn telemetry_client_id(&self) -> String {
        self.telemetry
            .client_id
            .clone()
            .unwrap_or_else(|| format!("netmon-{}", self.device.id))
    }
}
