//! Metrics infrastructure for the uMCP link controller.
//!
//! This crate declares every metric the link emits as a structured [`Metric`]
//! constant and re-exports the `metrics` facade. Nothing here installs a
//! recorder; without one, the macros are no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! use umcp_metrics::{MetricLabels, metric_defs, describe_metrics};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("modem_a", 1);
//! metrics::counter!(
//!     metric_defs::LINK_TX_FRAMES.name,
//!     &labels.with(&[("packet_type", "DTE".to_string())])
//! )
//! .increment(1);
//! ```
//!
//! # Metric Type
//!
//! ```rust
//! use umcp_metrics::{Metric, MetricKind};
//! use metrics::Unit;
//!
//! const MY_COUNTER: Metric = Metric::counter("my.counter")
//!     .with_description("A counter metric")
//!     .with_unit(Unit::Count)
//!     .with_labels(&["node"]);
//!
//! assert_eq!(MY_COUNTER.kind, MetricKind::Counter);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// # Example
///
/// ```rust
/// use umcp_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES_SENT: Metric = Metric::counter("umcp.link.frames_sent")
///     .with_description("Frames written to the line")
///     .with_unit(Unit::Count)
///     .with_labels(&["node", "packet_type"]);
///
/// assert_eq!(FRAMES_SENT.name, "umcp.link.frames_sent");
/// assert_eq!(FRAMES_SENT.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "umcp.link.tx_frames").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const RETRIES: Metric = Metric::counter("umcp.link.retries");
    /// ```
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new gauge metric with the given name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const STATE: Metric = Metric::gauge("umcp.link.state");
    /// ```
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new histogram metric with the given name.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const IN_FLIGHT: Metric = Metric::histogram("umcp.link.in_flight");
    /// ```
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const TIMEOUTS: Metric = Metric::counter("umcp.link.timeouts")
    ///     .with_description("TIMEOUT timer expiries");
    /// assert_eq!(TIMEOUTS.description, "TIMEOUT timer expiries");
    /// ```
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    /// use metrics::Unit;
    ///
    /// const LINE_BYTES: Metric = Metric::counter("umcp.link.line_bytes").with_unit(Unit::Bytes);
    /// assert_eq!(LINE_BYTES.unit, Some(Unit::Bytes));
    /// ```
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const DROPPED: Metric = Metric::counter("umcp.link.dropped").with_labels(&["node", "node_id"]);
    /// assert_eq!(DROPPED.labels, &["node", "node_id"]);
    /// ```
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    /// Without a recorder this is a no-op.
    ///
    /// # Example
    ///
    /// ```rust
    /// use umcp_metrics::Metric;
    ///
    /// const DELIVERED: Metric = Metric::counter("umcp.link.delivered")
    ///     .with_description("Payload bytes delivered to the host");
    /// DELIVERED.describe();
    /// ```
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the link controller.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every link metric.
    pub const STANDARD_LABELS: &[&str] = &["node", "node_id"];

    // ========================================================================
    // Line / framing
    // ========================================================================

    /// Frames written to the line.
    ///
    /// Labels: node, node_id, packet_type
    pub const LINK_TX_FRAMES: Metric = Metric::counter("umcp.link.tx_frames")
        .with_description("Frames written to the line")
        .with_unit(Unit::Count)
        .with_labels(&["node", "node_id", "packet_type"]);

    /// Frames accepted from the line.
    ///
    /// Labels: node, node_id, packet_type
    pub const LINK_RX_FRAMES: Metric = Metric::counter("umcp.link.rx_frames")
        .with_description("Valid frames received from the line")
        .with_unit(Unit::Count)
        .with_labels(&["node", "node_id", "packet_type"]);

    /// Frames dropped by the deframer (bad type, header checksum, length).
    pub const LINK_RX_HEADER_ERRORS: Metric = Metric::counter("umcp.link.rx_header_errors")
        .with_description("Frames dropped because of a damaged header")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Data frames downgraded to ACK after a payload checksum failure.
    pub const LINK_RX_DATA_ERRORS: Metric = Metric::counter("umcp.link.rx_data_errors")
        .with_description("Data frames whose payload checksum failed")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Frames addressed to another node or from an unexpected sender.
    pub const LINK_RX_FOREIGN: Metric = Metric::counter("umcp.link.rx_foreign")
        .with_description("Frames ignored because of a sender/target mismatch")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Bytes written to the line.
    pub const LINK_TX_BYTES: Metric = Metric::counter("umcp.link.tx_bytes")
        .with_description("Bytes written to the line")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // ARQ
    // ========================================================================

    /// Data blocks sent again after a loss.
    pub const LINK_RETRANSMISSIONS: Metric = Metric::counter("umcp.link.retransmissions")
        .with_description("Data blocks retransmitted")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// TIMEOUT timer expiries.
    pub const LINK_TIMEOUTS: Metric = Metric::counter("umcp.link.timeouts")
        .with_description("TIMEOUT timer expiries")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Sessions abandoned after the retry budget ran out.
    pub const LINK_GIVE_UPS: Metric = Metric::counter("umcp.link.give_ups")
        .with_description("Sessions halted after exhausting retries")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Current protocol state (0 = halted, 1 = istart, 2 = astart, 3 = running).
    pub const LINK_STATE: Metric = Metric::gauge("umcp.link.state")
        .with_description("Protocol state as a number")
        .with_labels(STANDARD_LABELS);

    /// Unacknowledged blocks after each transmission.
    pub const LINK_BLOCKS_IN_FLIGHT: Metric = Metric::histogram("umcp.link.blocks_in_flight")
        .with_description("Unacknowledged data blocks")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // Host side
    // ========================================================================

    /// Host bytes rejected because the ring buffer was full.
    pub const HOST_OVERFLOW_BYTES: Metric = Metric::counter("umcp.host.overflow_bytes")
        .with_description("Host bytes dropped on ring buffer overflow")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Payload bytes delivered to the host.
    pub const HOST_DELIVERED_BYTES: Metric = Metric::counter("umcp.host.delivered_bytes")
        .with_description("Payload bytes delivered to the host")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Payload bytes acknowledged by the peer.
    pub const HOST_ACKED_BYTES: Metric = Metric::counter("umcp.host.acked_bytes")
        .with_description("Host bytes acknowledged by the peer")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// All metric definitions.
    pub const ALL: &[&Metric] = &[
        &LINK_TX_FRAMES,
        &LINK_RX_FRAMES,
        &LINK_RX_HEADER_ERRORS,
        &LINK_RX_DATA_ERRORS,
        &LINK_RX_FOREIGN,
        &LINK_TX_BYTES,
        &LINK_RETRANSMISSIONS,
        &LINK_TIMEOUTS,
        &LINK_GIVE_UPS,
        &LINK_STATE,
        &LINK_BLOCKS_IN_FLIGHT,
        &HOST_OVERFLOW_BYTES,
        &HOST_DELIVERED_BYTES,
        &HOST_ACKED_BYTES,
    ];
}

/// Labels identifying one link endpoint.
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Human-readable node name.
    pub node: String,
    /// uMCP node id.
    pub node_id: u8,
}

impl MetricLabels {
    /// Create labels for a node.
    pub fn new(node: impl Into<String>, node_id: u8) -> Self {
        Self {
            node: node.into(),
            node_id,
        }
    }

    /// Standard labels as key/value pairs.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("node", self.node.clone()), ("node_id", self.node_id.to_string())]
    }

    /// Standard labels plus extra ones.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Register descriptions for every metric in [`metric_defs::ALL`].
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
