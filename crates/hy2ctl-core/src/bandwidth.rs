//! Bandwidth string conversion.
//!
//! Bandwidth is written as a bit rate (`"100 mbps"`, `"512kb"`, `"1g"`) and
//! converted to bytes per second. Multipliers are decimal, so `"1 mbps"` is
//! `1_000_000 / 8 = 125_000` bytes per second. Plain integers passed through
//! [`conv_bandwidth`] are already bytes per second.

use serde_json::Value;

use crate::error::BandwidthError;

const KILO: u64 = 1_000;
const MEGA: u64 = KILO * 1_000;
const GIGA: u64 = MEGA * 1_000;
const TERA: u64 = GIGA * 1_000;

/// Parse a unit-suffixed bandwidth string into bytes per second.
pub fn string_to_bps(s: &str) -> Result<u64, BandwidthError> {
    let s = s.trim().to_ascii_lowercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .filter(|&idx| idx > 0)
        .ok_or_else(|| BandwidthError::InvalidFormat(s.clone()))?;

    let (digits, unit) = s.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| BandwidthError::Overflow(s.clone()))?;

    let multiplier = match unit.trim() {
        "b" | "bps" => 1,
        "k" | "kb" | "kbps" => KILO,
        "m" | "mb" | "mbps" => MEGA,
        "g" | "gb" | "gbps" => GIGA,
        "t" | "tb" | "tbps" => TERA,
        other => return Err(BandwidthError::UnsupportedUnit(other.to_string())),
    };

    value
        .checked_mul(multiplier)
        .map(|bits| bits / 8)
        .ok_or(BandwidthError::Overflow(s))
}

/// Convert a JSON bandwidth value into bytes per second.
///
/// Strings go through [`string_to_bps`]; non-negative integers are taken
/// as bytes per second verbatim. Floats and every other JSON type are
/// rejected.
pub fn conv_bandwidth(value: &Value) -> Result<u64, BandwidthError> {
    match value {
        Value::String(s) => string_to_bps(s),
        Value::Number(n) => n.as_u64().ok_or(if n.is_i64() {
            BandwidthError::InvalidType("negative integer")
        } else {
            BandwidthError::InvalidType("float")
        }),
        Value::Null => Err(BandwidthError::InvalidType("null")),
        Value::Bool(_) => Err(BandwidthError::InvalidType("bool")),
        Value::Array(_) => Err(BandwidthError::InvalidType("array")),
        Value::Object(_) => Err(BandwidthError::InvalidType("object")),
    }
}
