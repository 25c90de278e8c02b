//! Probe timestamp codec.
//!
//! Every probe reports and accepts instants in one of four wire encodings. All arithmetic
//! in this crate happens on [`Ticks`]: signed counts of 100ns intervals since
//! 0001-01-01T00:00:00Z, the probes' native epoch.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Signed count of 100ns intervals since 0001-01-01T00:00:00Z.
pub type Ticks = i64;

pub const TICKS_PER_SECOND: Ticks = 10_000_000;
pub const TICKS_PER_MILLISECOND: Ticks = 10_000;
const NANOS_PER_TICK: i128 = 100;
/// Tick count of 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_TICKS: Ticks = 621_355_968_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimestampEncoding {
    Iso8601,
    Ticks,
    TicksBinary,
    TicksBinaryBigEndian,
}

impl TimestampEncoding {
    pub const ALL: [TimestampEncoding; 4] = [
        TimestampEncoding::Iso8601,
        TimestampEncoding::Ticks,
        TimestampEncoding::TicksBinary,
        TimestampEncoding::TicksBinaryBigEndian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampEncoding::Iso8601 => "Iso8601",
            TimestampEncoding::Ticks => "Ticks",
            TimestampEncoding::TicksBinary => "TicksBinary",
            TimestampEncoding::TicksBinaryBigEndian => "TicksBinaryBigEndian",
        }
    }
}

impl fmt::Display for TimestampEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampEncoding {
    type Err = CodecError;

    /// Wire names are matched case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        TimestampEncoding::ALL
            .into_iter()
            .find(|encoding| encoding.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CodecError::Unsupported(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("unsupported timestamp encoding '{0}'")]
    Unsupported(String),
    #[error("malformed {encoding} timestamp: {reason}")]
    Malformed {
        encoding: TimestampEncoding,
        reason: String,
    },
    #[error("tick count {0} is outside the range representable as {1}")]
    OutOfRange(Ticks, TimestampEncoding),
}

impl CodecError {
    fn malformed(encoding: TimestampEncoding, reason: impl fmt::Display) -> Self {
        CodecError::Malformed {
            encoding,
            reason: reason.to_string(),
        }
    }
}

pub fn encode(ticks: Ticks, encoding: TimestampEncoding) -> Result<String, CodecError> {
    match encoding {
        TimestampEncoding::Iso8601 => {
            let instant = datetime_from_ticks(ticks)
                .ok_or(CodecError::OutOfRange(ticks, encoding))?;
            // RFC 3339 output trims trailing fractional zeros and writes UTC as `Z`.
            instant
                .format(&Rfc3339)
                .map_err(|_| CodecError::OutOfRange(ticks, encoding))
        }
        TimestampEncoding::Ticks => Ok(ticks.to_string()),
        TimestampEncoding::TicksBinary => Ok(STANDARD.encode(ticks.to_le_bytes())),
        TimestampEncoding::TicksBinaryBigEndian => Ok(STANDARD.encode(ticks.to_be_bytes())),
    }
}

pub fn decode(text: &str, encoding: TimestampEncoding) -> Result<Ticks, CodecError> {
    if text.is_empty() {
        return Err(CodecError::InvalidArgument(
            "encoded timestamp cannot be empty",
        ));
    }

    match encoding {
        TimestampEncoding::Iso8601 => {
            let instant = OffsetDateTime::parse(text.trim(), &Rfc3339)
                .map_err(|err| CodecError::malformed(encoding, err))?;
            ticks_from_datetime(instant)
                .ok_or_else(|| CodecError::malformed(encoding, "instant outside the tick range"))
        }
        TimestampEncoding::Ticks => text
            .trim()
            .parse::<Ticks>()
            .map_err(|err| CodecError::malformed(encoding, err)),
        TimestampEncoding::TicksBinary => decode_binary(text, encoding).map(Ticks::from_le_bytes),
        TimestampEncoding::TicksBinaryBigEndian => {
            decode_binary(text, encoding).map(Ticks::from_be_bytes)
        }
    }
}

/// Decodes with an encoding given by its wire name.
pub fn decode_named(text: &str, encoding: &str) -> Result<Ticks, CodecError> {
    let encoding = encoding.parse::<TimestampEncoding>()?;
    decode(text, encoding)
}

fn decode_binary(text: &str, encoding: TimestampEncoding) -> Result<[u8; 8], CodecError> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|err| CodecError::malformed(encoding, err))?;
    let len = bytes.len();
    <[u8; 8]>::try_from(bytes)
        .map_err(|_| CodecError::malformed(encoding, format!("expected 8 bytes, got {len}")))
}

/// `None` when the instant lies beyond what an i64 tick count can hold.
pub fn ticks_from_datetime(instant: OffsetDateTime) -> Option<Ticks> {
    let since_unix = instant.unix_timestamp_nanos().div_euclid(NANOS_PER_TICK);
    Ticks::try_from(since_unix)
        .ok()?
        .checked_add(UNIX_EPOCH_TICKS)
}

pub fn datetime_from_ticks(ticks: Ticks) -> Option<OffsetDateTime> {
    let since_unix = i128::from(ticks) - i128::from(UNIX_EPOCH_TICKS);
    OffsetDateTime::from_unix_timestamp_nanos(since_unix * NANOS_PER_TICK).ok()
}
