//! Byte sizes with binary multiples (1 KB = 1024 bytes)

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ScaleError};
use crate::normalize::{FieldSource, coerce_float};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;
const PIB: u64 = TIB * 1024;

/// Parse an operator-supplied size such as `50GB`, `500 mb` or `1024`
///
/// A bare number is a byte count. Units are `KB`, `MB`, `GB` and `TB`,
/// case-insensitive.
pub fn parse_size_to_bytes(input: &str) -> Result<u64> {
    static SIZE_RE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE_RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)\s*(kb|mb|gb|tb)?$").expect("size pattern is valid")
    });

    let trimmed = input.trim();
    let caps = re
        .captures(trimmed)
        .ok_or_else(|| ScaleError::InvalidSize(input.to_string()))?;

    let value: u64 = caps[1]
        .parse()
        .map_err(|_| ScaleError::InvalidSize(input.to_string()))?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
        None => 1,
        Some("kb") => KIB,
        Some("mb") => MIB,
        Some("gb") => GIB,
        Some(_) => TIB,
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| ScaleError::InvalidSize(input.to_string()))
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.trim().to_lowercase().as_str() {
        "bytes" | "byte" => Some(1),
        "kilobytes" | "kb" => Some(KIB),
        "megabytes" | "mb" => Some(MIB),
        "gigabytes" | "gb" => Some(GIB),
        "terabytes" | "tb" => Some(TIB),
        "petabytes" | "pb" => Some(PIB),
        _ => None,
    }
}

/// Convert a `{ limit, unit }` max-size capability to bytes
///
/// An unrecognized unit is taken to be bytes already.
pub fn capability_size_to_bytes(capability: &Value) -> Option<u64> {
    let limit = coerce_float(capability.get_any(&["limit"]).as_ref(), None)?;
    if limit < 0.0 {
        return None;
    }
    let unit = capability.get_str(&["unit"]).unwrap_or_default();

    match unit_multiplier(&unit) {
        Some(multiplier) => Some((limit * multiplier as f64) as u64),
        None => {
            warn!(
                "Unrecognized size unit '{}' (limit {}); treating value as bytes",
                unit, limit
            );
            Some(limit as u64)
        }
    }
}

/// Render a byte count as `12.5GB` / `1.0TB`, or `-` when unknown
pub fn bytes_to_human(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes else {
        return "-".to_string();
    };
    let gb = bytes as f64 / GIB as f64;
    if gb >= 1024.0 {
        format!("{:.1}TB", gb / 1024.0)
    } else {
        format!("{:.1}GB", gb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size_to_bytes("50GB").unwrap(), 53_687_091_200);
        assert_eq!(parse_size_to_bytes("1024").unwrap(), 1024);
        assert_eq!(parse_size_to_bytes("500 mb").unwrap(), 500 * MIB);
        assert_eq!(parse_size_to_bytes(" 2tb ").unwrap(), 2 * TIB);
        assert_eq!(parse_size_to_bytes("4KB").unwrap(), 4096);
    }

    #[test]
    fn test_parse_size_rejects_unknown_units() {
        for bad in ["50XB", "GB", "", "-5GB", "1.5GB", "99999999999999999999"] {
            let err = parse_size_to_bytes(bad).unwrap_err();
            assert!(err.is_usage(), "{bad} should be a usage error");
        }
    }

    #[test]
    fn test_capability_size_units() {
        assert_eq!(
            capability_size_to_bytes(&json!({"limit": 50, "unit": "Gigabytes"})),
            Some(50 * GIB)
        );
        assert_eq!(
            capability_size_to_bytes(&json!({"Limit": 1, "Unit": "Terabytes"})),
            Some(TIB)
        );
        assert_eq!(
            capability_size_to_bytes(&json!({"limit": 4, "unit": "PB"})),
            Some(4 * PIB)
        );
        assert_eq!(
            capability_size_to_bytes(&json!({"limit": 100, "unit": "Furlongs"})),
            Some(100)
        );
        assert_eq!(capability_size_to_bytes(&json!({"unit": "Gigabytes"})), None);
        assert_eq!(capability_size_to_bytes(&Value::Null), None);
    }

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(bytes_to_human(None), "-");
        assert_eq!(bytes_to_human(Some(5 * GIB)), "5.0GB");
        assert_eq!(bytes_to_human(Some(GIB / 2)), "0.5GB");
        assert_eq!(bytes_to_human(Some(4 * TIB)), "4.0TB");
    }
}
