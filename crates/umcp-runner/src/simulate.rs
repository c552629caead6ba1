//! Deterministic two-node simulation.
//!
//! Two sessions exchange seeded random payloads over a simulated line with a
//! fixed propagation delay. Each line write is independently lost or
//! corrupted (one bit flipped) with the configured probabilities. All
//! randomness comes from one `ChaCha8Rng`, so a seed reproduces a run exactly.

use crate::config::{LineFormat, SimulationConfig};
use crate::error::RunnerResult;
use crate::line::LineChannel;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};
use umcp_link::{ByteChannel, Link, LinkConfig, LinkTime, MemoryChannel, Session};

type SimLink = Link<MemoryChannel, LineChannel<MemoryChannel>>;

/// Impairment counters for one direction of the line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LineStats {
    /// Writes put on the line.
    pub writes: u64,
    /// Bytes put on the line.
    pub bytes: u64,
    /// Writes lost.
    pub lost: u64,
    /// Writes delivered with a flipped bit.
    pub corrupted: u64,
}

/// One direction of the simulated line.
#[derive(Debug, Default)]
struct Medium {
    in_transit: VecDeque<(LinkTime, Vec<u8>)>,
    stats: LineStats,
}

impl Medium {
    fn send(&mut self, mut bytes: Vec<u8>, arrive_at: LinkTime, config: &SimulationConfig, rng: &mut ChaCha8Rng) {
        self.stats.writes += 1;
        self.stats.bytes += bytes.len() as u64;

        if rng.gen_bool(config.loss_rate) {
            self.stats.lost += 1;
            return;
        }
        if rng.gen_bool(config.corrupt_rate) {
            let index = rng.gen_range(0..bytes.len());
            bytes[index] ^= 1 << rng.gen_range(0..8);
            self.stats.corrupted += 1;
        }
        self.in_transit.push_back((arrive_at, bytes));
    }

    fn deliver(&mut self, now: LinkTime, to: &mut MemoryChannel) {
        while let Some((arrive_at, _)) = self.in_transit.front() {
            if *arrive_at > now {
                break;
            }
            if let Some((_, bytes)) = self.in_transit.pop_front() {
                to.feed(&bytes);
            }
        }
    }
}

/// Outcome for one direction of traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionReport {
    /// Payload handed to the sender.
    pub offered_bytes: usize,
    /// Payload the receiver's host got.
    pub delivered_bytes: usize,
    /// Delivered bytes match the offered ones, in order.
    pub intact: bool,
    /// Line impairments in this direction.
    pub line: LineStats,
    /// Delivered payload per simulated second.
    pub goodput_bps: f64,
}

/// Per-node session totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    /// Node name.
    pub name: String,
    /// State at the end of the run.
    pub final_state: String,
    /// Frames sent.
    pub frames_tx: u64,
    /// Valid frames received.
    pub frames_rx: u64,
    /// First transmissions of data blocks.
    pub blocks_sent: u64,
    /// Data blocks sent again.
    pub retransmissions: u64,
    /// TIMEOUT expiries.
    pub timeouts: u64,
    /// Frames dropped by the deframer.
    pub header_errors: u64,
    /// Payload checksum failures.
    pub data_errors: u64,
    /// Retry budget exhaustions.
    pub give_ups: u64,
}

impl NodeReport {
    fn from_session(session: &Session) -> Self {
        let stats = session.stats();
        let deframer = session.deframer_stats();
        NodeReport {
            name: session.name().to_string(),
            final_state: session.state().to_string(),
            frames_tx: stats.frames_tx,
            frames_rx: stats.frames_rx,
            blocks_sent: stats.blocks_sent,
            retransmissions: stats.retransmissions,
            timeouts: stats.timeouts,
            header_errors: deframer.header_errors,
            data_errors: deframer.data_errors,
            give_ups: stats.give_ups,
        }
    }
}

/// Result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Seed used.
    pub seed: u64,
    /// Line encoding used.
    pub line_format: LineFormat,
    /// Both payloads were delivered and acknowledged.
    pub completed: bool,
    /// Simulated time at the end of the run.
    pub sim_time_secs: f64,
    /// Node A to node B.
    pub a_to_b: DirectionReport,
    /// Node B to node A.
    pub b_to_a: DirectionReport,
    /// Node A totals.
    pub node_a: NodeReport,
    /// Node B totals.
    pub node_b: NodeReport,
}

/// A running two-node simulation.
pub struct Simulation {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    now: LinkTime,
    a: SimLink,
    b: SimLink,
    a_to_b: Medium,
    b_to_a: Medium,
    a_payload: Vec<u8>,
    b_payload: Vec<u8>,
    a_offered: usize,
    b_offered: usize,
    received_by_a: Vec<u8>,
    received_by_b: Vec<u8>,
}

impl Simulation {
    /// Build a simulation. `link` is node A's configuration; node B mirrors it.
    pub fn new(link: LinkConfig, config: SimulationConfig) -> RunnerResult<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut a_payload = vec![0u8; config.payload_bytes];
        let mut b_payload = vec![0u8; config.reverse_payload_bytes];
        rng.fill(&mut a_payload[..]);
        rng.fill(&mut b_payload[..]);

        let node = |link: LinkConfig, name: &str| -> RunnerResult<SimLink> {
            let session = Session::new(link)?.with_name(name);
            Ok(Link::new(
                session,
                MemoryChannel::new(),
                LineChannel::new(config.line_format, MemoryChannel::new()),
            ))
        };
        let b = node(link.mirrored(), "b")?;
        let a = node(link, "a")?;

        Ok(Simulation {
            config,
            rng,
            now: LinkTime::ZERO,
            a,
            b,
            a_to_b: Medium::default(),
            b_to_a: Medium::default(),
            a_payload,
            b_payload,
            a_offered: 0,
            b_offered: 0,
            received_by_a: Vec::new(),
            received_by_b: Vec::new(),
        })
    }

    /// Current simulated time.
    pub fn now(&self) -> LinkTime {
        self.now
    }

    /// Both payloads delivered and acknowledged.
    pub fn is_complete(&self) -> bool {
        self.received_by_b.len() == self.a_payload.len()
            && self.received_by_a.len() == self.b_payload.len()
            && self.a.session().buffered_len() == 0
            && self.b.session().buffered_len() == 0
    }

    /// Advance one step.
    pub fn step(&mut self) {
        let now = self.now;

        self.a_offered += offer(&mut self.a, &self.a_payload[self.a_offered..]);
        self.b_offered += offer(&mut self.b, &self.b_payload[self.b_offered..]);

        for link in [&mut self.a, &mut self.b] {
            if let Err(e) = link.poll(now) {
                debug!("{}: {}", link.session().name(), e);
            }
        }

        let arrive_at = now + Duration::from_millis(self.config.propagation_delay_ms);
        let from_a = self.a.line_mut().wire_mut().take_written();
        if !from_a.is_empty() {
            self.a_to_b.send(from_a, arrive_at, &self.config, &mut self.rng);
        }
        let from_b = self.b.line_mut().wire_mut().take_written();
        if !from_b.is_empty() {
            self.b_to_a.send(from_b, arrive_at, &self.config, &mut self.rng);
        }

        self.a_to_b.deliver(now, self.b.line_mut().wire_mut());
        self.b_to_a.deliver(now, self.a.line_mut().wire_mut());

        self.received_by_a.extend(self.a.host_mut().take_written());
        self.received_by_b.extend(self.b.host_mut().take_written());

        self.now = now + Duration::from_millis(self.config.step_ms);
    }

    /// Run until both payloads are through or the time limit is reached.
    pub fn run(mut self) -> SimulationReport {
        let limit = LinkTime::from_secs_f64(self.config.duration_secs);
        info!(
            "simulating {} + {} bytes, seed {}, loss {}, corruption {}",
            self.a_payload.len(),
            self.b_payload.len(),
            self.config.seed,
            self.config.loss_rate,
            self.config.corrupt_rate
        );
        while self.now < limit && !self.is_complete() {
            self.step();
        }
        let report = self.report();
        info!(
            "simulation {} after {:.1}s",
            if report.completed { "completed" } else { "timed out" },
            report.sim_time_secs
        );
        report
    }

    /// Snapshot of the results so far.
    pub fn report(&self) -> SimulationReport {
        let secs = self.now.as_secs_f64();
        let direction = |offered: &[u8], received: &[u8], line: LineStats| DirectionReport {
            offered_bytes: offered.len(),
            delivered_bytes: received.len(),
            intact: offered.starts_with(received),
            line,
            goodput_bps: if secs > 0.0 { received.len() as f64 / secs } else { 0.0 },
        };
        SimulationReport {
            seed: self.config.seed,
            line_format: self.config.line_format,
            completed: self.is_complete(),
            sim_time_secs: secs,
            a_to_b: direction(&self.a_payload, &self.received_by_b, self.a_to_b.stats),
            b_to_a: direction(&self.b_payload, &self.received_by_a, self.b_to_a.stats),
            node_a: NodeReport::from_session(self.a.session()),
            node_b: NodeReport::from_session(self.b.session()),
        }
    }
}

/// Hand the host side as much of `pending` as the session's ring can take.
fn offer(link: &mut SimLink, pending: &[u8]) -> usize {
    let session = link.session();
    let free = session
        .config()
        .ring_size
        .saturating_sub(session.buffered_len() + link.host().bytes_available());
    let n = pending.len().min(free);
    if n > 0 {
        link.host_mut().feed(&pending[..n]);
    }
    n
}

/// Build and run a simulation.
pub fn run_simulation(link: LinkConfig, config: SimulationConfig) -> RunnerResult<SimulationReport> {
    Ok(Simulation::new(link, config)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            payload_bytes: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_medium_delay() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut medium = Medium::default();
        let mut wire = MemoryChannel::new();
        medium.send(b"abc".to_vec(), LinkTime::from_millis(20), &config(), &mut rng);

        medium.deliver(LinkTime::from_millis(10), &mut wire);
        assert_eq!(wire.bytes_available(), 0);
        medium.deliver(LinkTime::from_millis(20), &mut wire);
        assert_eq!(wire.bytes_available(), 3);
        assert_eq!(medium.stats.writes, 1);
    }

    #[test]
    fn test_medium_loss() {
        let lossy = SimulationConfig {
            loss_rate: 0.5,
            ..config()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut medium = Medium::default();
        for _ in 0..200 {
            medium.send(vec![1, 2, 3], LinkTime::ZERO, &lossy, &mut rng);
        }
        assert!(medium.stats.lost > 50 && medium.stats.lost < 150);
        assert_eq!(medium.in_transit.len() as u64, 200 - medium.stats.lost);
    }

    #[test]
    fn test_offer_respects_ring() {
        let link = LinkConfig {
            ring_size: 40,
            ..LinkConfig::new(1, 2)
        };
        let mut sim = Simulation::new(
            link,
            SimulationConfig {
                payload_bytes: 100,
                ..config()
            },
        )
        .unwrap();
        sim.step();
        assert_eq!(sim.a_offered, 40);
        assert_eq!(sim.a.session().buffered_len(), 40);
    }

    #[test]
    fn test_lossless_run_completes() {
        let report = run_simulation(LinkConfig::new(1, 2), config()).unwrap();
        assert!(report.completed);
        assert!(report.a_to_b.intact);
        assert_eq!(report.a_to_b.delivered_bytes, 64);
        assert_eq!(report.node_a.retransmissions, 0);
        assert_eq!(report.node_a.final_state, "RUNNING");
    }
}
