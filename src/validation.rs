//! Input checks shared by the REST API and the tool endpoint.
//!
//! Both front ends run every external value through these functions before
//! touching the store, so they reject exactly the same inputs.

use crate::pairing;
use crate::store::{MAX_ZONE, MIN_ZONE};
use serde_json::Value;

/// Lowest accepted heart rate.
pub const MIN_BPM: f64 = 30.0;
/// Highest accepted heart rate.
pub const MAX_BPM: f64 = 250.0;

/// Shortest query window in seconds.
pub const MIN_WINDOW_SECS: u32 = 1;
/// Longest query window in seconds (matches the reading TTL).
pub const MAX_WINDOW_SECS: u32 = 1800;

/// Rejected input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Pairing code absent or not a string
    MissingCode,
    /// Pairing code present but not `<animal><2 digits>`
    InvalidCode,
    InvalidBpm,
    InvalidZone,
    InvalidWindow,
    /// Body was not a JSON object
    MalformedBody,
    /// Query string could not be parsed
    MalformedQuery,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingCode => write!(f, "Missing or invalid pairing code"),
            ValidationError::InvalidCode => write!(f, "Invalid pairing code format"),
            ValidationError::InvalidBpm => {
                write!(f, "Invalid BPM (must be {MIN_BPM}-{MAX_BPM})")
            }
            ValidationError::InvalidZone => {
                write!(f, "Invalid zone (must be {MIN_ZONE}-{MAX_ZONE})")
            }
            ValidationError::InvalidWindow => {
                write!(f, "Seconds must be {MIN_WINDOW_SECS}-{MAX_WINDOW_SECS}")
            }
            ValidationError::MalformedBody => write!(f, "Request body must be a JSON object"),
            ValidationError::MalformedQuery => write!(f, "Malformed query string"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A reading that passed validation and can go straight into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReading {
    pub code: String,
    pub bpm: u16,
    pub zone: u8,
}

/// Validate a pairing code that may be missing.
pub fn pairing_code(code: Option<&str>) -> Result<&str, ValidationError> {
    match code {
        None | Some("") => Err(ValidationError::MissingCode),
        Some(code) if !pairing::is_valid(code) => Err(ValidationError::InvalidCode),
        Some(code) => Ok(code),
    }
}

/// Validate a pairing code taken from an untyped JSON value.
pub fn pairing_code_value(value: Option<&Value>) -> Result<&str, ValidationError> {
    pairing_code(value.and_then(Value::as_str))
}

/// Validate a BPM value: any finite JSON number in range, rounded to an integer.
pub fn bpm(value: Option<&Value>) -> Result<u16, ValidationError> {
    let bpm = value
        .and_then(Value::as_f64)
        .filter(|b| b.is_finite() && (MIN_BPM..=MAX_BPM).contains(b))
        .ok_or(ValidationError::InvalidBpm)?;
    Ok(bpm.round() as u16)
}

/// Validate a zone value: an integral JSON number in range.
pub fn zone(value: Option<&Value>) -> Result<u8, ValidationError> {
    let zone = value
        .and_then(Value::as_f64)
        .filter(|z| z.fract() == 0.0 && (f64::from(MIN_ZONE)..=f64::from(MAX_ZONE)).contains(z))
        .ok_or(ValidationError::InvalidZone)?;
    Ok(zone as u8)
}

/// Validate a whole ingest body `{code, bpm, zone}`.
pub fn reading(body: &Value) -> Result<ValidReading, ValidationError> {
    let body = body.as_object().ok_or(ValidationError::MalformedBody)?;
    let code = pairing_code_value(body.get("code"))?;
    let bpm = bpm(body.get("bpm"))?;
    let zone = zone(body.get("zone"))?;

    Ok(ValidReading {
        code: code.to_string(),
        bpm,
        zone,
    })
}

/// Check a window length, falling back to `default` when absent.
pub fn window(secs: Option<i64>, default: u32) -> Result<u32, ValidationError> {
    let secs = secs.unwrap_or(i64::from(default));
    u32::try_from(secs)
        .ok()
        .filter(|s| (MIN_WINDOW_SECS..=MAX_WINDOW_SECS).contains(s))
        .ok_or(ValidationError::InvalidWindow)
}

/// Parse a window from a query string parameter.
///
/// Absent or empty means `default`; anything that is not an integer is
/// rejected rather than silently replaced.
pub fn window_param(raw: Option<&str>, default: u32) -> Result<u32, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => window(None, default),
        Some(raw) => {
            let secs = raw
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidWindow)?;
            window(Some(secs), default)
        }
    }
}

/// Parse a window from a JSON argument. Integral floats such as `60.0` pass.
pub fn window_value(value: Option<&Value>, default: u32) -> Result<u32, ValidationError> {
    match value {
        None | Some(Value::Null) => window(None, default),
        Some(value) => {
            let secs = value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or(ValidationError::InvalidWindow)?;
            window(Some(secs), default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pairing_code() {
        assert_eq!(pairing_code(Some("tiger07")), Ok("tiger07"));
        assert_eq!(pairing_code(None), Err(ValidationError::MissingCode));
        assert_eq!(pairing_code(Some("")), Err(ValidationError::MissingCode));
        assert_eq!(pairing_code(Some("tiger7")), Err(ValidationError::InvalidCode));
        assert_eq!(
            pairing_code_value(Some(&json!(42))),
            Err(ValidationError::MissingCode)
        );
    }

    #[test]
    fn test_bpm_bounds() {
        assert_eq!(bpm(Some(&json!(30))), Ok(30));
        assert_eq!(bpm(Some(&json!(250))), Ok(250));
        assert_eq!(bpm(Some(&json!(72.6))), Ok(73));
        assert_eq!(bpm(Some(&json!(29.9))), Err(ValidationError::InvalidBpm));
        assert_eq!(bpm(Some(&json!(251))), Err(ValidationError::InvalidBpm));
        assert_eq!(bpm(Some(&json!("72"))), Err(ValidationError::InvalidBpm));
        assert_eq!(bpm(None), Err(ValidationError::InvalidBpm));
    }

    #[test]
    fn test_zone_bounds() {
        assert_eq!(zone(Some(&json!(1))), Ok(1));
        assert_eq!(zone(Some(&json!(5))), Ok(5));
        assert_eq!(zone(Some(&json!(3.0))), Ok(3));
        assert_eq!(zone(Some(&json!(0))), Err(ValidationError::InvalidZone));
        assert_eq!(zone(Some(&json!(6))), Err(ValidationError::InvalidZone));
        assert_eq!(zone(Some(&json!(2.5))), Err(ValidationError::InvalidZone));
        assert_eq!(zone(Some(&json!(null))), Err(ValidationError::InvalidZone));
    }

    #[test]
    fn test_reading_body() {
        let valid = reading(&json!({"code": "tiger07", "bpm": 72, "zone": 2})).unwrap();
        assert_eq!(
            valid,
            ValidReading {
                code: "tiger07".to_string(),
                bpm: 72,
                zone: 2
            }
        );

        assert_eq!(
            reading(&json!({"bpm": 72, "zone": 2})),
            Err(ValidationError::MissingCode)
        );
        assert_eq!(
            reading(&json!({"code": "dog07", "bpm": 72, "zone": 2})),
            Err(ValidationError::InvalidCode)
        );
        assert_eq!(reading(&json!([1, 2])), Err(ValidationError::MalformedBody));
    }

    #[test]
    fn test_window_bounds() {
        assert_eq!(window_param(None, 10), Ok(10));
        assert_eq!(window_param(Some(""), 60), Ok(60));
        assert_eq!(window_param(Some("1"), 10), Ok(1));
        assert_eq!(window_param(Some("1800"), 10), Ok(1800));
        assert_eq!(window_param(Some("1801"), 10), Err(ValidationError::InvalidWindow));
        assert_eq!(window_param(Some("0"), 10), Err(ValidationError::InvalidWindow));
        assert_eq!(window_param(Some("-5"), 10), Err(ValidationError::InvalidWindow));
        assert_eq!(window_param(Some("ten"), 10), Err(ValidationError::InvalidWindow));
    }

    #[test]
    fn test_window_value() {
        assert_eq!(window_value(None, 60), Ok(60));
        assert_eq!(window_value(Some(&json!(null)), 60), Ok(60));
        assert_eq!(window_value(Some(&json!(120)), 60), Ok(120));
        assert_eq!(window_value(Some(&json!(120.0)), 60), Ok(120));
        assert_eq!(window_value(Some(&json!(1800)), 60), Ok(1800));
        assert_eq!(window_value(Some(&json!(1801)), 60), Err(ValidationError::InvalidWindow));
        assert_eq!(window_value(Some(&json!(1.5)), 60), Err(ValidationError::InvalidWindow));
        assert_eq!(window_value(Some(&json!("60")), 60), Err(ValidationError::InvalidWindow));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ValidationError::InvalidBpm.to_string(), "Invalid BPM (must be 30-250)");
        assert_eq!(ValidationError::InvalidZone.to_string(), "Invalid zone (must be 1-5)");
        assert_eq!(ValidationError::InvalidWindow.to_string(), "Seconds must be 1-1800");
    }
}
