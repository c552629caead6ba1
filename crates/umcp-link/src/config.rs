//! Link configuration.
//!
//! All tunables of a session live in [`LinkConfig`]. It deserializes from YAML
//! (missing keys fall back to the defaults) and is checked once by
//! [`LinkConfig::validate`] before a session is built.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use umcp_packet::MAX_DATA_SIZE;

/// Configuration for one uMCP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// This node's id.
    pub self_id: u8,
    /// The peer's id.
    pub peer_id: u8,
    /// Line baud rate, used to estimate how long a frame occupies the line.
    pub baud_rate: u32,
    /// Payload bytes per data block (1..=32).
    pub block_size: u8,
    /// Unacknowledged blocks the sent-block window can hold.
    pub max_blocks_in_flight: u8,
    /// Blocks sent in one SELECT turn before the token is handed over.
    pub pipeline_limit: u8,
    /// Keep SELECT while idle instead of handing it straight back.
    pub select_default: bool,
    /// How long a released SELECT token may stay away before it is taken back.
    pub select_interval_ms: u64,
    /// Retransmission timeout.
    pub timeout_interval_ms: u64,
    /// Fixed settling delay added after every transmitted frame.
    pub tx_fixed_delay_ms: u64,
    /// How long a partial block may wait for more host bytes.
    pub nagle_delay_ms: u64,
    /// Capacity of the host input ring buffer.
    pub ring_size: usize,
    /// TIMEOUT expiries without hearing from the peer before the session is
    /// halted. `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            self_id: 0,
            peer_id: 1,
            baud_rate: 9600,
            block_size: MAX_DATA_SIZE as u8,
            max_blocks_in_flight: 8,
            pipeline_limit: 4,
            select_default: true,
            select_interval_ms: 3000,
            timeout_interval_ms: 2000,
            tx_fixed_delay_ms: 50,
            nagle_delay_ms: 100,
            ring_size: 1024,
            max_retries: None,
        }
    }
}

impl LinkConfig {
    /// Configuration for the endpoint `self_id` talking to `peer_id`.
    pub fn new(self_id: u8, peer_id: u8) -> Self {
        LinkConfig {
            self_id,
            peer_id,
            ..Default::default()
        }
    }

    /// The same link seen from the other end.
    pub fn mirrored(&self) -> Self {
        LinkConfig {
            self_id: self.peer_id,
            peer_id: self.self_id,
            ..self.clone()
        }
    }

    /// Set the SELECT idle policy.
    pub fn with_select_default(mut self, select_default: bool) -> Self {
        self.select_default = select_default;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the block size.
    pub fn with_block_size(mut self, block_size: u8) -> Self {
        self.block_size = block_size;
        self
    }

    /// Retransmission timeout.
    pub fn timeout_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_interval_ms)
    }

    /// SELECT regain interval.
    pub fn select_interval(&self) -> Duration {
        Duration::from_millis(self.select_interval_ms)
    }

    /// Partial-block coalescing delay.
    pub fn nagle_delay(&self) -> Duration {
        Duration::from_millis(self.nagle_delay_ms)
    }

    /// Time a frame of `frame_len` bytes keeps the line busy: the fixed
    /// settling delay plus serialization at the configured baud rate.
    pub fn tx_duration(&self, frame_len: usize) -> Duration {
        let bits = frame_len as u64 * 8;
        let serialization_us = bits * 1_000_000 / u64::from(self.baud_rate.max(1));
        Duration::from_millis(self.tx_fixed_delay_ms) + Duration::from_micros(serialization_us)
    }

    /// Check the configuration for values the protocol cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size as usize > MAX_DATA_SIZE {
            return Err(ConfigError::BlockSize {
                max: MAX_DATA_SIZE,
                actual: self.block_size,
            });
        }
        // Counters are mod 256; half the space keeps old and new blocks apart.
        if self.max_blocks_in_flight == 0 || self.max_blocks_in_flight > 127 {
            return Err(ConfigError::WindowSize(self.max_blocks_in_flight));
        }
        if self.pipeline_limit == 0 || self.pipeline_limit > self.max_blocks_in_flight {
            return Err(ConfigError::PipelineLimit {
                window: self.max_blocks_in_flight,
                actual: self.pipeline_limit,
            });
        }
        if self.ring_size < self.block_size as usize {
            return Err(ConfigError::RingSize {
                block_size: self.block_size,
                actual: self.ring_size,
            });
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::BaudRate);
        }
        if self.self_id == self.peer_id {
            return Err(ConfigError::SameIds(self.self_id));
        }
        if self.timeout_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("timeout_interval_ms"));
        }
        if self.select_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("select_interval_ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LinkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_mirrored_swaps_ids() {
        let config = LinkConfig::new(3, 9).with_select_default(false);
        let mirror = config.mirrored();
        assert_eq!(mirror.self_id, 9);
        assert_eq!(mirror.peer_id, 3);
        assert!(!mirror.select_default);
    }

    #[test]
    fn test_tx_duration() {
        let config = LinkConfig {
            baud_rate: 80,
            tx_fixed_delay_ms: 100,
            ..Default::default()
        };
        // 10 bytes = 80 bits = 1 s at 80 baud.
        assert_eq!(config.tx_duration(10), Duration::from_millis(1100));
    }

    #[test]
    fn test_rejects_bad_block_size() {
        let config = LinkConfig::default().with_block_size(33);
        assert!(matches!(config.validate(), Err(ConfigError::BlockSize { actual: 33, .. })));
        let config = LinkConfig::default().with_block_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_pipeline_over_window() {
        let config = LinkConfig {
            max_blocks_in_flight: 4,
            pipeline_limit: 5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PipelineLimit { .. })));
    }

    #[test]
    fn test_rejects_same_ids() {
        assert_eq!(LinkConfig::new(2, 2).validate(), Err(ConfigError::SameIds(2)));
    }

    #[test]
    fn test_yaml_partial() {
        let yaml = "self_id: 5\npeer_id: 6\nbaud_rate: 80\nmax_retries: 3\n";
        let config: LinkConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.self_id, 5);
        assert_eq!(config.baud_rate, 80);
        assert_eq!(config.max_retries, Some(3));
        assert_eq!(config.block_size, 32);
        assert!(config.validate().is_ok());
    }
}
