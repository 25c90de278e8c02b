use crate::codec::{self, CodecError, Ticks, TimestampEncoding};
use std::fmt;

/// A round is converged when its correction is under 5ms.
pub const SYNC_TOLERANCE_TICKS: Ticks = 50_000;

/// Outcome of one two-timestamp exchange with a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetEstimate {
    pub offset_delta: Ticks,
    pub round_trip: Ticks,
}

impl OffsetEstimate {
    /// `t0`/`t3` are local send/receive instants, `t1`/`t2` the probe's receive/reply
    /// instants.
    pub fn from_exchange(t0: Ticks, t1: Ticks, t2: Ticks, t3: Ticks) -> Self {
        let offset_delta = t1.saturating_sub(t0).saturating_add(t2.saturating_sub(t3)) / 2;
        let round_trip = t3.saturating_sub(t0).saturating_sub(t2.saturating_sub(t1));
        Self {
            offset_delta,
            round_trip,
        }
    }

    pub fn within_tolerance(&self) -> bool {
        self.offset_delta.unsigned_abs() < SYNC_TOLERANCE_TICKS.unsigned_abs()
    }
}

#[derive(Debug, Clone)]
pub struct Probe {
    id: String,
    name: String,
    encoding: TimestampEncoding,
    time_offset: Ticks,
    round_trip: Ticks,
    synchronized: bool,
}

impl Probe {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        encoding: TimestampEncoding,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            encoding,
            time_offset: 0,
            round_trip: 0,
            synchronized: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoding(&self) -> TimestampEncoding {
        self.encoding
    }

    /// Sum of every correction applied so far.
    pub fn time_offset(&self) -> Ticks {
        self.time_offset
    }

    /// Round trip measured by the latest exchange.
    pub fn round_trip(&self) -> Ticks {
        self.round_trip
    }

    /// Whether the latest round's correction alone was within tolerance.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn record_round(&mut self, estimate: OffsetEstimate) {
        self.time_offset = self.time_offset.saturating_add(estimate.offset_delta);
        self.round_trip = estimate.round_trip;
        self.synchronized = estimate.within_tolerance();
    }

    /// Local instant shifted onto this probe's clock.
    pub fn corrected(&self, local_now: Ticks) -> Ticks {
        local_now.saturating_add(self.time_offset)
    }

    pub fn encode_timestamp(&self, ticks: Ticks) -> Result<String, CodecError> {
        codec::encode(ticks, self.encoding)
    }

    pub fn decode_timestamp(&self, text: &str) -> Result<Ticks, CodecError> {
        codec::decode(text, self.encoding)
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Probe {}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "probe {} ({})", self.name, self.id)
    }
}
