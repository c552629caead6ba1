//! Run configuration.
//!
//! One YAML file configures the link and both runner modes. Every section and
//! key is optional; command-line flags override what the file says.
//!
//! ```yaml
//! link:
//!   self_id: 1
//!   peer_id: 2
//!   baud_rate: 300
//! simulation:
//!   seed: 7
//!   loss_rate: 0.1
//! bridge:
//!   host_listen: 127.0.0.1:4000
//!   line_connect: 192.168.1.20:5000
//! ```

use crate::error::{RunnerError, RunnerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use umcp_link::LinkConfig;

/// How line bytes are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    /// uMCP frames as-is.
    #[default]
    Raw,
    /// uMCP frames wrapped in `$PUMCP` sentences, for modems that only accept
    /// text commands.
    Sentence,
}

/// Two-node simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for payloads and line impairments.
    pub seed: u64,
    /// Give up after this much simulated time.
    pub duration_secs: f64,
    /// Simulation step.
    pub step_ms: u64,
    /// One-way line latency.
    pub propagation_delay_ms: u64,
    /// Probability that a line write is lost.
    pub loss_rate: f64,
    /// Probability that a line write arrives with one bit flipped.
    pub corrupt_rate: f64,
    /// Bytes node A sends to node B.
    pub payload_bytes: usize,
    /// Bytes node B sends to node A.
    pub reverse_payload_bytes: usize,
    /// Line encoding.
    pub line_format: LineFormat,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 42,
            duration_secs: 600.0,
            step_ms: 10,
            propagation_delay_ms: 20,
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            payload_bytes: 256,
            reverse_payload_bytes: 0,
            line_format: LineFormat::Raw,
        }
    }
}

impl SimulationConfig {
    /// Check value ranges.
    pub fn validate(&self) -> RunnerResult<()> {
        for (name, rate) in [("loss_rate", self.loss_rate), ("corrupt_rate", self.corrupt_rate)] {
            if !(0.0..1.0).contains(&rate) {
                return Err(RunnerError::InvalidConfig(format!(
                    "{} must be in [0, 1), got {}",
                    name, rate
                )));
            }
        }
        if self.step_ms == 0 {
            return Err(RunnerError::InvalidConfig("step_ms must be positive".into()));
        }
        if self.duration_secs <= 0.0 {
            return Err(RunnerError::InvalidConfig("duration_secs must be positive".into()));
        }
        Ok(())
    }
}

/// TCP bridge parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address the host port listens on.
    pub host_listen: String,
    /// Listen for the line on this address...
    pub line_listen: Option<String>,
    /// ...or connect to it here (e.g. a serial-over-TCP adapter).
    pub line_connect: Option<String>,
    /// Longest the poll loop sleeps when the session has nothing scheduled.
    pub poll_interval_ms: u64,
    /// Period of the stats log line; `None` disables it.
    pub stats_interval_secs: Option<u64>,
    /// Line encoding.
    pub line_format: LineFormat,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            host_listen: "127.0.0.1:4000".to_string(),
            line_listen: None,
            line_connect: None,
            poll_interval_ms: 5,
            stats_interval_secs: Some(30),
            line_format: LineFormat::Raw,
        }
    }
}

impl BridgeConfig {
    /// Check that exactly one line endpoint is given.
    pub fn validate(&self) -> RunnerResult<()> {
        match (&self.line_listen, &self.line_connect) {
            (Some(_), Some(_)) => Err(RunnerError::InvalidConfig(
                "set only one of line_listen and line_connect".into(),
            )),
            (None, None) => Err(RunnerError::InvalidConfig(
                "one of line_listen or line_connect is required".into(),
            )),
            _ if self.poll_interval_ms == 0 => {
                Err(RunnerError::InvalidConfig("poll_interval_ms must be positive".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Complete runner configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Protocol parameters. In simulation these are node A's; node B mirrors them.
    pub link: LinkConfig,
    /// `simulate` parameters.
    pub simulation: SimulationConfig,
    /// `bridge` parameters.
    pub bridge: BridgeConfig,
}

impl RunConfig {
    /// Load from a YAML file.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> RunnerResult<Self> {
        if text.trim().is_empty() {
            return Ok(RunConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> RunnerResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RunConfig::from_yaml("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
link:
  self_id: 4
  peer_id: 9
  pipeline_limit: 2
simulation:
  loss_rate: 0.25
  line_format: sentence
bridge:
  line_connect: "10.0.0.2:5000"
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.link.self_id, 4);
        assert_eq!(config.link.pipeline_limit, 2);
        assert_eq!(config.link.block_size, 32);
        assert_eq!(config.simulation.loss_rate, 0.25);
        assert_eq!(config.simulation.line_format, LineFormat::Sentence);
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.bridge.line_connect.as_deref(), Some("10.0.0.2:5000"));
        assert!(config.bridge.validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = RunConfig::default();
        config.simulation.reverse_payload_bytes = 17;
        let text = config.to_yaml().unwrap();
        assert_eq!(RunConfig::from_yaml(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            RunConfig::from_yaml("link: [1, 2"),
            Err(RunnerError::Yaml(_))
        ));
    }

    #[test]
    fn test_simulation_validate() {
        let mut config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        config.loss_rate = 1.0;
        assert!(config.validate().is_err());
        config.loss_rate = 0.5;
        config.step_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bridge_needs_one_line_endpoint() {
        let mut config = BridgeConfig::default();
        assert!(config.validate().is_err());
        config.line_listen = Some("0.0.0.0:5000".into());
        assert!(config.validate().is_ok());
        config.line_connect = Some("10.0.0.1:5000".into());
        assert!(config.validate().is_err());
    }
}
