//! # umcp-runner
//!
//! Library behind the `umcp` binary.
//!
//! - [`Simulation`]: two sessions over a seeded lossy line, reporting
//!   delivery and protocol totals
//! - [`Bridge`]: one session in real time between a host TCP port and a line
//!   TCP port
//! - [`RunConfig`]: YAML configuration shared by both
//! - [`LineChannel`]: raw or sentence-wrapped line encoding

mod bridge;
mod config;
mod error;
mod line;
pub mod logging;
mod simulate;

pub use bridge::{Bridge, PortChannel, PortTaskEnds};
pub use config::{BridgeConfig, LineFormat, RunConfig, SimulationConfig};
pub use error::{RunnerError, RunnerResult};
pub use line::{LineChannel, SentenceLine, LINE_SENTENCE_ADDRESS, MAX_SENTENCE_PAYLOAD};
pub use simulate::{
    run_simulation, DirectionReport, LineStats, NodeReport, Simulation, SimulationReport,
};
