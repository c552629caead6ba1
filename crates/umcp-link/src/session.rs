//! uMCP session state machine.
//!
//! A [`Session`] owns everything one end of a link needs: the host input ring,
//! the sent-block window, the deframer, the three timers and the SELECT token.
//! It is driven entirely by the caller:
//!
//! - [`Session::push_host`] with bytes from the host side,
//! - [`Session::push_line_byte`] with bytes from the line,
//! - [`Session::poll`] regularly, to run timers and start pending work,
//!
//! and emits bytes through [`Session::take_line_output`] and
//! [`Session::take_host_output`]. Every call takes the current [`LinkTime`].
//!
//! ## Handshake
//!
//! ```text
//!   A (has data)                     B
//!   Halted -> IStart  --- STR --->   Halted -> AStart
//!   IStart -> Running <--- STA ---
//!                     --- ACK(0,0) -> AStart -> Running
//! ```
//!
//! ## Data transfer
//!
//! Only the SELECT holder starts a transmission. Data blocks go out as DTA
//! while more follow in the same turn and as DTE on the last one, which hands
//! SELECT to the peer. Acknowledgements are cumulative (the rx counter of any
//! ACK, DTA or DTE releases every block up to it). Losses are repaired by
//! TIMEOUT-driven REP frames and by resending the oldest block; there is no NAK.

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::ring::RingBuffer;
use crate::time::LinkTime;
use crate::timers::{TimerId, TimerManager};
use crate::window::{SentBlock, SentBlockWindow};
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};
use umcp_metrics::{metric_defs, metrics, MetricLabels};
use umcp_packet::{encode_data_frame, encode_packet, Deframer, DeframerStats, Packet, PacketType};

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// No session.
    Halted,
    /// We sent STR and wait for STA.
    IStart,
    /// We sent STA and wait for ACK.
    AStart,
    /// Session established.
    Running,
}

impl LinkState {
    /// Numeric code used for the state gauge.
    pub fn code(self) -> u8 {
        match self {
            LinkState::Halted => 0,
            LinkState::IStart => 1,
            LinkState::AStart => 2,
            LinkState::Running => 3,
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LinkState::Halted => "HALTED",
            LinkState::IStart => "ISTART",
            LinkState::AStart => "ASTART",
            LinkState::Running => "RUNNING",
        };
        f.write_str(s)
    }
}

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames queued for the line.
    pub frames_tx: u64,
    /// Valid frames from the peer.
    pub frames_rx: u64,
    /// Frames addressed elsewhere or from another sender.
    pub frames_foreign: u64,
    /// Data blocks sent for the first time.
    pub blocks_sent: u64,
    /// Data blocks sent again.
    pub retransmissions: u64,
    /// TIMEOUT expiries.
    pub timeouts: u64,
    /// Host bytes rejected by a full ring.
    pub overflow_bytes: u64,
    /// Payload bytes handed to the host.
    pub delivered_bytes: u64,
    /// Host bytes acknowledged by the peer.
    pub acked_bytes: u64,
    /// Host bytes discarded when the retry budget ran out.
    pub dropped_bytes: u64,
    /// Times the retry budget ran out.
    pub give_ups: u64,
}

/// One end of a uMCP link.
#[derive(Debug)]
pub struct Session {
    config: LinkConfig,
    name: String,
    labels: MetricLabels,

    state: LinkState,
    select: bool,
    /// New blocks sent since SELECT was last taken.
    turn_blocks: u8,
    /// `R`: highest sequence number accepted from the peer.
    rx_counter: u8,
    /// An acknowledgement is owed to the peer.
    sack: bool,
    /// A REP must be sent to make the peer acknowledge again.
    srep: bool,
    /// Start TIMEOUT once the current transmission has left the line.
    arm_timeout_after_tx: bool,
    retries: u32,

    ring: RingBuffer,
    window: SentBlockWindow,
    deframer: Deframer,
    timers: TimerManager,
    last_host_byte: LinkTime,

    line_out: VecDeque<u8>,
    host_out: Vec<u8>,
    stats: SessionStats,
}

impl Session {
    /// Create a halted session.
    pub fn new(config: LinkConfig) -> LinkResult<Self> {
        config.validate()?;
        let name = format!("umcp{}", config.self_id);
        Ok(Session {
            labels: MetricLabels::new(name.clone(), config.self_id),
            name,
            state: LinkState::Halted,
            select: false,
            turn_blocks: 0,
            rx_counter: 0,
            sack: false,
            srep: false,
            arm_timeout_after_tx: false,
            retries: 0,
            ring: RingBuffer::new(config.ring_size),
            window: SentBlockWindow::new(config.max_blocks_in_flight),
            deframer: Deframer::new(),
            timers: TimerManager::new(
                config.timeout_interval(),
                config.select_interval(),
                config.tx_duration(0),
            ),
            last_host_byte: LinkTime::ZERO,
            line_out: VecDeque::new(),
            host_out: Vec::new(),
            stats: SessionStats::default(),
            config,
        })
    }

    /// Name used in logs and metric labels.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.labels = MetricLabels::new(self.name.clone(), self.config.self_id);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in use.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Current protocol state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether this end holds the SELECT token.
    pub fn has_select(&self) -> bool {
        self.select
    }

    /// `N`: last data sequence number sent.
    pub fn tx_counter(&self) -> u8 {
        self.window.last_sent()
    }

    /// `R`: last data sequence number accepted.
    pub fn rx_counter(&self) -> u8 {
        self.rx_counter
    }

    /// `A`: last data sequence number acknowledged by the peer.
    pub fn acked_counter(&self) -> u8 {
        self.window.last_acked()
    }

    /// Unacknowledged blocks.
    pub fn window(&self) -> &SentBlockWindow {
        &self.window
    }

    /// Host bytes not yet acknowledged (sent or not).
    pub fn buffered_len(&self) -> usize {
        self.ring.len()
    }

    /// Host bytes not yet sent.
    pub fn unsent_len(&self) -> usize {
        self.ring.len() - self.window.bytes_in_flight()
    }

    /// Whether a timer is running.
    pub fn timer_active(&self, id: TimerId) -> bool {
        self.timers.is_active(id)
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Deframer counters.
    pub fn deframer_stats(&self) -> DeframerStats {
        self.deframer.stats()
    }

    /// Whether everything the host gave us has been acknowledged.
    pub fn is_idle(&self) -> bool {
        self.ring.is_empty() && self.line_out.is_empty()
    }

    /// Earliest time after `now` at which [`poll`](Self::poll) may have work
    /// to do. `None` means only new input can change anything.
    pub fn next_wake(&self, now: LinkTime) -> Option<LinkTime> {
        let timer = self.timers.next_expiry();
        let nagle = Some(self.last_host_byte + self.config.nagle_delay())
            .filter(|&at| self.unsent_len() > 0 && at > now);
        match (timer, nagle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Accept bytes from the host.
    ///
    /// On overflow the bytes that fit are kept and the rest are reported in
    /// the error.
    pub fn push_host(&mut self, bytes: &[u8], now: LinkTime) -> LinkResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let result = self.ring.write(bytes);
        self.last_host_byte = now;
        if let Err(LinkError::RingOverflow { accepted, dropped }) = &result {
            warn!(
                "{}: host ring overflow, accepted {} dropped {} (capacity {})",
                self.name,
                accepted,
                dropped,
                self.ring.capacity()
            );
            self.stats.overflow_bytes += *dropped as u64;
            metrics::counter!(metric_defs::HOST_OVERFLOW_BYTES.name, &self.labels.to_labels())
                .increment(*dropped as u64);
        }
        result
    }

    /// Feed one byte received from the line.
    pub fn push_line_byte(&mut self, byte: u8, now: LinkTime) {
        let data_errors = self.deframer.stats().data_errors;
        let packet = self.deframer.push(byte);
        if let Some(reason) = self.deframer.take_drop() {
            trace!("{}: frame dropped: {:?}", self.name, reason);
            metrics::counter!(metric_defs::LINK_RX_HEADER_ERRORS.name, &self.labels.to_labels())
                .increment(1);
        }
        if self.deframer.stats().data_errors != data_errors {
            debug!("{}: payload checksum failed, frame kept as ACK", self.name);
            metrics::counter!(metric_defs::LINK_RX_DATA_ERRORS.name, &self.labels.to_labels())
                .increment(1);
        }
        if let Some(packet) = packet {
            self.handle_packet(packet, now);
        }
    }

    /// Feed a run of line bytes.
    pub fn push_line(&mut self, bytes: &[u8], now: LinkTime) {
        for &b in bytes {
            self.push_line_byte(b, now);
        }
    }

    /// Run expired timers, then start whatever work is due.
    ///
    /// Timers are scanned in the order TIMEOUT, SELECT, TX.
    pub fn poll(&mut self, now: LinkTime) {
        for id in TimerId::ALL {
            if self.timers.take_expired(id, now) {
                match id {
                    TimerId::Timeout => self.on_timeout(now),
                    TimerId::Select => self.on_select_timer(now),
                    TimerId::Tx => self.on_tx_timer(now),
                }
            }
        }

        match self.state {
            LinkState::Halted if self.unsent_len() > 0 => self.start_handshake(now),
            LinkState::Running if self.select && self.unsent_len() > 0 => self.try_send(now),
            _ => {}
        }
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    /// Drain bytes queued for the line.
    pub fn take_line_output(&mut self) -> Vec<u8> {
        self.line_out.drain(..).collect()
    }

    /// Whether bytes are queued for the line.
    pub fn has_line_output(&self) -> bool {
        !self.line_out.is_empty()
    }

    /// Drain payload bytes delivered by the peer.
    pub fn take_host_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.host_out)
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    fn enter_state(&mut self, state: LinkState, now: LinkTime) {
        if state != self.state {
            debug!("{}: {} -> {} at {}", self.name, self.state, state, now);
        }
        self.state = state;

        match state {
            LinkState::Halted | LinkState::IStart => {
                self.window.reset();
                self.rx_counter = 0;
                self.sack = false;
                self.srep = false;
                self.select = false;
                self.arm_timeout_after_tx = false;
                self.timers.set_active(TimerId::Timeout, false, now);
                self.timers.set_active(TimerId::Select, false, now);
                if state == LinkState::Halted {
                    self.deframer.reset();
                }
            }
            LinkState::AStart => {
                self.timers.set_active(TimerId::Timeout, false, now);
            }
            LinkState::Running => {
                info!(
                    "{}: link to {} established",
                    self.name, self.config.peer_id
                );
                self.retries = 0;
                self.arm_timeout_after_tx = false;
                self.timers.set_active(TimerId::Timeout, false, now);
            }
        }

        metrics::gauge!(metric_defs::LINK_STATE.name, &self.labels.to_labels())
            .set(f64::from(state.code()));
    }

    fn start_handshake(&mut self, now: LinkTime) {
        self.enter_state(LinkState::IStart, now);
        self.send_control(Packet::start(self.config.self_id, self.config.peer_id), now);
        self.arm_timeout_after_tx = true;
    }

    fn give_up(&mut self, now: LinkTime) {
        let dropped = self.ring.len();
        warn!(
            "{}: no answer from {} after {} retries in {}, dropping {} bytes",
            self.name, self.config.peer_id, self.retries, self.state, dropped
        );
        self.ring.clear();
        self.stats.dropped_bytes += dropped as u64;
        self.stats.give_ups += 1;
        self.retries = 0;
        metrics::counter!(metric_defs::LINK_GIVE_UPS.name, &self.labels.to_labels()).increment(1);
        self.enter_state(LinkState::Halted, now);
    }

    /// Take or hand over SELECT. Taking it immediately evaluates the send
    /// logic.
    fn set_select(&mut self, select: bool, now: LinkTime) {
        self.select = select;
        if select {
            self.turn_blocks = 0;
            self.timers.set_active(TimerId::Select, false, now);
            self.try_send(now);
        } else if self.state == LinkState::Running {
            self.timers.set_active(TimerId::Select, true, now);
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn on_timeout(&mut self, now: LinkTime) {
        self.stats.timeouts += 1;
        self.retries += 1;
        metrics::counter!(metric_defs::LINK_TIMEOUTS.name, &self.labels.to_labels()).increment(1);

        if let Some(max) = self.config.max_retries {
            if self.retries > max {
                self.give_up(now);
                return;
            }
        }

        match self.state {
            LinkState::IStart => {
                debug!("{}: timeout, resending STR", self.name);
                self.send_control(Packet::start(self.config.self_id, self.config.peer_id), now);
                self.arm_timeout_after_tx = true;
            }
            LinkState::AStart => {
                debug!("{}: timeout, resending STA", self.name);
                self.send_control(Packet::start_ack(self.config.self_id, self.config.peer_id), now);
                self.arm_timeout_after_tx = true;
            }
            LinkState::Running => {
                debug!("{}: timeout, requesting reply", self.name);
                self.srep = true;
                self.set_select(true, now);
            }
            LinkState::Halted => {}
        }
    }

    fn on_select_timer(&mut self, now: LinkTime) {
        if self.state == LinkState::Running {
            trace!("{}: taking SELECT back", self.name);
            self.set_select(true, now);
        }
    }

    fn on_tx_timer(&mut self, now: LinkTime) {
        if self.arm_timeout_after_tx && !self.timers.is_active(TimerId::Timeout) {
            self.arm_timeout_after_tx = false;
            self.timers.set_active(TimerId::Timeout, true, now);
        } else {
            self.try_send(now);
        }
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    /// Send logic, run whenever SELECT is (re)gained or the line frees up.
    fn try_send(&mut self, now: LinkTime) {
        if self.state != LinkState::Running
            || !self.select
            || self.timers.is_active(TimerId::Tx)
            || self.timers.is_active(TimerId::Timeout)
        {
            return;
        }

        let unsent = self.unsent_len();
        if unsent > 0 && !self.window.is_full() && self.turn_blocks < self.config.pipeline_limit {
            let full_block = unsent >= self.config.block_size as usize;
            let waited = now.saturating_since(self.last_host_byte) >= self.config.nagle_delay();
            if full_block || waited {
                self.send_next_block(unsent, now);
            }
            return;
        }

        if self.srep {
            self.srep = false;
            self.send_control(
                Packet::reply_request(self.config.self_id, self.config.peer_id, self.window.last_sent()),
                now,
            );
            self.arm_timeout_after_tx = true;
            self.set_select(false, now);
        } else if let Some((seq, block)) = self.window.oldest() {
            debug!("{}: resending block {} ({} bytes)", self.name, seq, block.len);
            self.stats.retransmissions += 1;
            metrics::counter!(metric_defs::LINK_RETRANSMISSIONS.name, &self.labels.to_labels())
                .increment(1);
            self.send_block(PacketType::Dte, seq, block, now);
            self.arm_timeout_after_tx = true;
            self.set_select(false, now);
        } else if !self.config.select_default || self.sack {
            self.sack = false;
            self.send_control(self.ack_packet(), now);
            self.set_select(false, now);
        }
    }

    fn send_next_block(&mut self, unsent: usize, now: LinkTime) {
        let len = unsent.min(self.config.block_size as usize);
        let offset = self.ring.offset(self.window.bytes_in_flight());
        let Some(seq) = self.window.push(offset, len) else {
            return;
        };
        self.turn_blocks += 1;
        let last = len == unsent
            || self.turn_blocks >= self.config.pipeline_limit
            || self.window.is_full();
        let packet_type = if last { PacketType::Dte } else { PacketType::Dta };

        self.stats.blocks_sent += 1;
        self.send_block(packet_type, seq, SentBlock { offset, len }, now);
        metrics::histogram!(metric_defs::LINK_BLOCKS_IN_FLIGHT.name, &self.labels.to_labels())
            .record(self.window.len() as f64);

        // The rx counter rides along, so nothing else is owed.
        self.sack = false;
        if last {
            self.arm_timeout_after_tx = true;
            self.set_select(false, now);
        }
    }

    fn ack_packet(&self) -> Packet {
        Packet::ack(
            self.config.self_id,
            self.config.peer_id,
            self.window.last_sent(),
            self.rx_counter,
        )
    }

    fn send_control(&mut self, packet: Packet, now: LinkTime) {
        match encode_packet(&packet) {
            Ok(frame) => self.queue_frame(&packet, &frame, now),
            Err(e) => warn!("{}: cannot encode {}: {}", self.name, packet, e),
        }
    }

    fn send_block(&mut self, packet_type: PacketType, seq: u8, block: SentBlock, now: LinkTime) {
        let header = Packet {
            packet_type,
            sender_id: self.config.self_id,
            target_id: self.config.peer_id,
            tx_counter: seq,
            rx_counter: self.rx_counter,
            data: Vec::new(),
        };
        match encode_data_frame(&header, self.ring.storage(), block.offset, block.len) {
            Ok(frame) => self.queue_frame(&header, &frame, now),
            Err(e) => warn!("{}: cannot encode block {}: {}", self.name, seq, e),
        }
    }

    /// Queue a frame and mark the line busy for as long as it takes to send.
    fn queue_frame(&mut self, packet: &Packet, frame: &[u8], now: LinkTime) {
        trace!("{}: tx {} ({} bytes)", self.name, packet, frame.len());
        self.line_out.extend(frame.iter().copied());
        self.timers
            .start_for(TimerId::Tx, self.config.tx_duration(frame.len()), now);

        self.stats.frames_tx += 1;
        metrics::counter!(
            metric_defs::LINK_TX_FRAMES.name,
            &self.labels.with(&[("packet_type", packet.packet_type.as_str().to_string())])
        )
        .increment(1);
        metrics::counter!(metric_defs::LINK_TX_BYTES.name, &self.labels.to_labels())
            .increment(frame.len() as u64);
    }

    // ========================================================================
    // Reception
    // ========================================================================

    fn handle_packet(&mut self, packet: Packet, now: LinkTime) {
        if packet.target_id != self.config.self_id || packet.sender_id != self.config.peer_id {
            trace!("{}: ignoring foreign frame {}", self.name, packet);
            self.stats.frames_foreign += 1;
            metrics::counter!(metric_defs::LINK_RX_FOREIGN.name, &self.labels.to_labels())
                .increment(1);
            return;
        }

        trace!("{}: rx {} in {}", self.name, packet, self.state);
        self.stats.frames_rx += 1;
        self.retries = 0;
        // The peer answered; a TIMEOUT still pending from our last frame is moot.
        self.arm_timeout_after_tx = false;
        metrics::counter!(
            metric_defs::LINK_RX_FRAMES.name,
            &self.labels.with(&[("packet_type", packet.packet_type.as_str().to_string())])
        )
        .increment(1);

        match packet.packet_type {
            PacketType::Str => self.on_start(now),
            PacketType::Sta => self.on_start_ack(now),
            PacketType::Rep => {
                if self.state == LinkState::Running {
                    self.sack = true;
                    self.set_select(true, now);
                }
            }
            PacketType::Ack => {
                if self.state == LinkState::AStart && packet.rx_counter == 0 {
                    self.enter_state(LinkState::Running, now);
                }
                if self.state == LinkState::Running {
                    self.timers.set_active(TimerId::Timeout, false, now);
                    self.release_acked(packet.rx_counter);
                    self.set_select(true, now);
                }
            }
            PacketType::Dta | PacketType::Dte => {
                if self.state == LinkState::Running {
                    self.on_data(packet, now);
                }
            }
        }
    }

    fn on_start(&mut self, now: LinkTime) {
        match self.state {
            LinkState::Halted | LinkState::IStart => {
                self.enter_state(LinkState::AStart, now);
                self.send_control(Packet::start_ack(self.config.self_id, self.config.peer_id), now);
                self.arm_timeout_after_tx = true;
            }
            LinkState::AStart => {
                // Both ends started at once.
                self.enter_state(LinkState::Running, now);
                self.send_control(Packet::ack(self.config.self_id, self.config.peer_id, 0, 0), now);
                self.set_select(true, now);
            }
            LinkState::Running => {
                info!("{}: peer {} restarted the link", self.name, self.config.peer_id);
                self.enter_state(LinkState::Halted, now);
                self.on_start(now);
            }
        }
    }

    fn on_start_ack(&mut self, now: LinkTime) {
        match self.state {
            LinkState::IStart | LinkState::AStart => {
                self.enter_state(LinkState::Running, now);
                self.send_control(Packet::ack(self.config.self_id, self.config.peer_id, 0, 0), now);
                self.set_select(true, now);
            }
            LinkState::Running => {
                // Our ACK(0,0) was lost.
                let ack = self.ack_packet();
                self.send_control(ack, now);
            }
            LinkState::Halted => {
                trace!("{}: STA while halted ignored", self.name);
            }
        }
    }

    fn on_data(&mut self, packet: Packet, now: LinkTime) {
        let expected = self.rx_counter.wrapping_add(1);
        if packet.tx_counter == expected {
            self.rx_counter = expected;
            self.host_out.extend_from_slice(&packet.data);
            self.stats.delivered_bytes += packet.data.len() as u64;
            metrics::counter!(metric_defs::HOST_DELIVERED_BYTES.name, &self.labels.to_labels())
                .increment(packet.data.len() as u64);
        } else {
            trace!(
                "{}: block {} not accepted (expecting {})",
                self.name,
                packet.tx_counter,
                expected
            );
        }

        self.sack = true;
        self.timers.set_active(TimerId::Timeout, false, now);
        self.release_acked(packet.rx_counter);

        match packet.packet_type {
            PacketType::Dta => self.timers.set_active(TimerId::Timeout, true, now),
            _ => self.set_select(true, now),
        }
    }

    fn release_acked(&mut self, rx: u8) {
        match self.window.acknowledge(rx) {
            Some(bytes) => {
                if bytes > 0 {
                    self.ring.consume(bytes);
                    self.stats.acked_bytes += bytes as u64;
                    metrics::counter!(metric_defs::HOST_ACKED_BYTES.name, &self.labels.to_labels())
                        .increment(bytes as u64);
                }
            }
            None => trace!(
                "{}: rx counter {} outside ({}, {}]",
                self.name,
                rx,
                self.window.last_acked(),
                self.window.last_sent()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const A: u8 = 1;
    const B: u8 = 2;

    fn ms(v: u64) -> LinkTime {
        LinkTime::from_millis(v)
    }

    fn session() -> Session {
        Session::new(LinkConfig::new(A, B)).unwrap()
    }

    fn frames(session: &mut Session) -> Vec<Packet> {
        Deframer::new().push_slice(&session.take_line_output())
    }

    fn feed(session: &mut Session, packet: Packet, now: LinkTime) {
        session.push_line(&encode_packet(&packet).unwrap(), now);
    }

    /// Drive `session` into Running as the handshake initiator.
    fn running(session: &mut Session) {
        feed(session, Packet::start(B, A), ms(0));
        feed(session, Packet::ack(B, A, 0, 0), ms(0));
        assert_eq!(session.state(), LinkState::Running);
        // Let the STA leave the line.
        session.poll(ms(100));
        assert!(!session.timer_active(TimerId::Tx));
        session.take_line_output();
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Session::new(LinkConfig::new(3, 3)).is_err());
    }

    #[test]
    fn test_halted_with_data_sends_str() {
        let mut s = session();
        s.push_host(b"x", ms(0)).unwrap();
        s.poll(ms(0));
        assert_eq!(s.state(), LinkState::IStart);
        assert_eq!(frames(&mut s), vec![Packet::start(A, B)]);
    }

    #[test]
    fn test_str_answered_with_sta() {
        let mut s = session();
        feed(&mut s, Packet::start(B, A), ms(0));
        assert_eq!(s.state(), LinkState::AStart);
        assert_eq!(frames(&mut s), vec![Packet::start_ack(A, B)]);
    }

    #[test]
    fn test_sta_completes_handshake() {
        let mut s = session();
        s.push_host(b"x", ms(0)).unwrap();
        s.poll(ms(0));
        s.take_line_output();
        feed(&mut s, Packet::start_ack(B, A), ms(10));
        assert_eq!(s.state(), LinkState::Running);
        assert!(s.has_select());
        assert_eq!(frames(&mut s)[0], Packet::ack(A, B, 0, 0));
    }

    #[test]
    fn test_handshake_retransmits_str_on_timeout() {
        let mut s = session();
        s.push_host(b"x", ms(0)).unwrap();
        s.poll(ms(0));
        s.take_line_output();

        // TX timer first, then TIMEOUT from the end of transmission.
        let tx_done = ms(0) + s.config().tx_duration(5);
        s.poll(tx_done);
        assert!(s.timer_active(TimerId::Timeout));
        s.poll(tx_done + s.config().timeout_interval());
        assert_eq!(frames(&mut s), vec![Packet::start(A, B)]);
        assert_eq!(s.stats().timeouts, 1);
    }

    #[test]
    fn test_retry_budget_halts() {
        let config = LinkConfig::new(A, B).with_max_retries(Some(1));
        let mut s = Session::new(config).unwrap();
        s.push_host(b"abc", ms(0)).unwrap();

        let mut now = ms(0);
        for _ in 0..20 {
            s.poll(now);
            now = now + Duration::from_millis(500);
        }
        assert_eq!(s.state(), LinkState::Halted);
        assert_eq!(s.stats().give_ups, 1);
        assert_eq!(s.stats().dropped_bytes, 3);
        assert_eq!(s.buffered_len(), 0);
    }

    #[test]
    fn test_foreign_frames_ignored() {
        let mut s = session();
        feed(&mut s, Packet::start(9, A), ms(0));
        feed(&mut s, Packet::start(B, 9), ms(0));
        assert_eq!(s.state(), LinkState::Halted);
        assert_eq!(s.stats().frames_foreign, 2);
    }

    #[test]
    fn test_short_data_goes_as_dte() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HELLO", ms(0)).unwrap();
        s.poll(ms(200));

        let sent = frames(&mut s);
        assert_eq!(sent, vec![Packet::data_end(A, B, 1, 0, b"HELLO".to_vec())]);
        assert!(!s.has_select());
        assert_eq!(s.window().len(), 1);
    }

    #[test]
    fn test_nagle_holds_partial_block() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HE", ms(1000)).unwrap();
        s.poll(ms(1050));
        assert!(frames(&mut s).is_empty());
        s.push_host(b"LLO", ms(1080)).unwrap();
        s.poll(ms(1150));
        assert!(frames(&mut s).is_empty());
        s.poll(ms(1180));
        assert_eq!(frames(&mut s)[0].data, b"HELLO");
    }

    #[test]
    fn test_pipelined_blocks() {
        let mut s = session();
        running(&mut s);
        let payload: Vec<u8> = (0..70u8).collect();
        s.push_host(&payload, ms(0)).unwrap();

        let mut now = ms(0);
        let mut sent = Vec::new();
        for _ in 0..50 {
            s.poll(now);
            sent.extend(frames(&mut s));
            now = now + Duration::from_millis(20);
        }

        let types: Vec<_> = sent.iter().map(|p| p.packet_type).collect();
        assert_eq!(&types[..3], &[PacketType::Dta, PacketType::Dta, PacketType::Dte]);
        assert_eq!(sent[0].tx_counter, 1);
        assert_eq!(sent[2].tx_counter, 3);
        assert_eq!(sent[2].data.len(), 6);
        assert_eq!(s.window().len(), 3);
    }

    #[test]
    fn test_pipeline_limit_is_per_turn() {
        let config = LinkConfig {
            pipeline_limit: 2,
            max_blocks_in_flight: 4,
            ..LinkConfig::new(A, B)
        };
        let mut s = Session::new(config).unwrap();
        running(&mut s);
        s.push_host(&[7u8; 200], ms(0)).unwrap();

        let drive = |s: &mut Session, from: u64, to: u64| {
            let mut sent = Vec::new();
            for t in (from..to).step_by(20) {
                s.poll(ms(t));
                sent.extend(frames(s));
            }
            sent
        };
        let counters = |sent: &[Packet]| -> Vec<(PacketType, u8)> {
            sent.iter().map(|p| (p.packet_type, p.tx_counter)).collect()
        };

        let first = drive(&mut s, 0, 1000);
        assert_eq!(counters(&first), vec![(PacketType::Dta, 1), (PacketType::Dte, 2)]);

        // An ACK that releases nothing starts a new turn; the window still has room.
        feed(&mut s, Packet::ack(B, A, 0, 0), ms(1000));
        let mut second = frames(&mut s);
        second.extend(drive(&mut s, 1020, 2000));
        assert_eq!(counters(&second), vec![(PacketType::Dta, 3), (PacketType::Dte, 4)]);
        assert_eq!(s.window().len(), 4);

        // Window full: the next turn resends the oldest block instead.
        feed(&mut s, Packet::ack(B, A, 0, 0), ms(2000));
        let third = frames(&mut s);
        assert_eq!(counters(&third), vec![(PacketType::Dte, 1)]);
        assert_eq!(s.stats().retransmissions, 1);
    }

    #[test]
    fn test_next_wake() {
        let mut s = session();
        assert_eq!(s.next_wake(ms(0)), None);

        running(&mut s);
        assert_eq!(s.next_wake(ms(100)), None);

        // A partial block waits for the Nagle delay.
        s.push_host(b"HE", ms(1000)).unwrap();
        s.poll(ms(1000));
        assert_eq!(s.next_wake(ms(1000)), Some(ms(1100)));

        // Once sent, the line-busy timer is next.
        s.poll(ms(1100));
        assert_eq!(frames(&mut s)[0].data, b"HE");
        let wake = s.next_wake(ms(1100)).unwrap();
        assert!(wake > ms(1100));
        assert!(s.timer_active(TimerId::Tx));
    }

    #[test]
    fn test_ack_releases_blocks() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HELLO", ms(0)).unwrap();
        s.poll(ms(200));
        s.take_line_output();

        feed(&mut s, Packet::ack(B, A, 0, 1), ms(400));
        assert!(s.window().is_empty());
        assert_eq!(s.buffered_len(), 0);
        assert_eq!(s.stats().acked_bytes, 5);
        assert!(s.has_select());
    }

    #[test]
    fn test_stale_ack_triggers_resend() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HELLO", ms(0)).unwrap();
        s.poll(ms(200));
        s.take_line_output();

        s.poll(ms(300));
        assert!(s.timer_active(TimerId::Timeout));

        // Peer never saw block 1.
        let later = ms(2000);
        feed(&mut s, Packet::ack(B, A, 0, 0), later);
        let resent = frames(&mut s);
        assert_eq!(resent, vec![Packet::data_end(A, B, 1, 0, b"HELLO".to_vec())]);
        assert_eq!(s.stats().retransmissions, 1);
    }

    #[test]
    fn test_data_delivered_and_acked() {
        let mut s = session();
        running(&mut s);
        s.set_select(false, ms(0));

        feed(&mut s, Packet::data_end(B, A, 1, 0, b"hi".to_vec()), ms(0));
        assert_eq!(s.take_host_output(), b"hi");
        assert_eq!(s.rx_counter(), 1);
        assert_eq!(frames(&mut s), vec![Packet::ack(A, B, 0, 1)]);
    }

    #[test]
    fn test_duplicate_data_not_delivered_twice() {
        let mut s = session();
        running(&mut s);
        s.set_select(false, ms(0));

        feed(&mut s, Packet::data_end(B, A, 1, 0, b"hi".to_vec()), ms(0));
        s.poll(ms(500));
        feed(&mut s, Packet::data_end(B, A, 1, 0, b"hi".to_vec()), ms(1000));
        assert_eq!(s.take_host_output(), b"hi");
        assert_eq!(s.stats().delivered_bytes, 2);
    }

    #[test]
    fn test_dta_arms_timeout() {
        let mut s = session();
        running(&mut s);
        s.set_select(false, ms(0));

        feed(&mut s, Packet::data(B, A, 1, 0, vec![7; 32]), ms(0));
        assert!(s.timer_active(TimerId::Timeout));
        assert!(!s.has_select());
    }

    #[test]
    fn test_timeout_in_running_sends_rep() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HELLO", ms(0)).unwrap();
        s.poll(ms(200));
        s.take_line_output();

        let mut now = ms(200);
        let mut sent = Vec::new();
        while now < ms(3000) {
            s.poll(now);
            sent.extend(frames(&mut s));
            now = now + Duration::from_millis(10);
        }
        assert_eq!(sent[0], Packet::reply_request(A, B, 1));
    }

    #[test]
    fn test_rep_answered_with_ack() {
        let mut s = session();
        running(&mut s);
        s.set_select(false, ms(0));
        feed(&mut s, Packet::reply_request(B, A, 0), ms(100));
        assert_eq!(frames(&mut s), vec![Packet::ack(A, B, 0, 0)]);
        assert!(!s.has_select());
    }

    #[test]
    fn test_str_while_running_restarts() {
        let mut s = session();
        running(&mut s);
        s.push_host(b"HELLO", ms(0)).unwrap();
        s.poll(ms(200));
        s.take_line_output();
        assert_eq!(s.unsent_len(), 0);

        feed(&mut s, Packet::start(B, A), ms(300));
        assert_eq!(s.state(), LinkState::AStart);
        assert_eq!(s.unsent_len(), 5);
        assert_eq!(frames(&mut s), vec![Packet::start_ack(A, B)]);
    }

    #[test]
    fn test_overflow_reported() {
        let config = LinkConfig {
            ring_size: 40,
            ..LinkConfig::new(A, B)
        };
        let mut s = Session::new(config).unwrap();
        let err = s.push_host(&[0u8; 50], ms(0)).unwrap_err();
        assert_eq!(err, LinkError::RingOverflow { accepted: 40, dropped: 10 });
        assert_eq!(s.buffered_len(), 40);
        assert_eq!(s.stats().overflow_bytes, 10);
    }
}
