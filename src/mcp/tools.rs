//! Tools exposed to agents through `tools/list` and `tools/call`.
//!
//! Argument problems (bad pairing code, window out of range) and empty
//! results come back as tool results with `isError: true`, so the agent sees
//! the message. Only envelope problems become JSON-RPC errors.

use super::protocol::JsonRpcError;
use crate::status::{self, ConnectionState};
use crate::store::{ReadingStore, ZoneCounts};
use crate::validation::{self, ValidationError, MAX_WINDOW_SECS, MIN_WINDOW_SECS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default window for the history and stats tools.
pub const DEFAULT_TOOL_WINDOW_SECS: u32 = 60;

pub const CHECK_CONNECTION: &str = "checkConnection";
pub const GET_HEART_RATE: &str = "getHeartRate";
/// Older name for [`GET_HEART_RATE`], still accepted by `tools/call`.
pub const GET_CURRENT_HEART_RATE: &str = "getCurrentHeartRate";
pub const GET_HEART_RATE_HISTORY: &str = "getHeartRateHistory";
pub const GET_HEART_RATE_STATS: &str = "getHeartRateStats";

const INVALID_CODE_TEXT: &str =
    "Invalid pairing code format. Expected format: animal + 2 digits (e.g., condor34)";

/// Entry in the `tools/list` result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// A block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    fn ok(text: impl Into<String>, structured: Value) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            structured_content: Some(structured),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            structured_content: None,
            is_error: true,
        }
    }

    /// Text of the first content block.
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(Content::Text { text }) => text.as_str(),
            None => "",
        }
    }
}

/// `tools/call` parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

fn pairing_code_schema() -> Value {
    json!({
        "type": "string",
        "description": "The user's pairing code (e.g., condor34)"
    })
}

fn seconds_schema(purpose: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": MIN_WINDOW_SECS,
        "maximum": MAX_WINDOW_SECS,
        "default": DEFAULT_TOOL_WINDOW_SECS,
        "description": format!(
            "Number of seconds {purpose} ({MIN_WINDOW_SECS}-{MAX_WINDOW_SECS}, default: {DEFAULT_TOOL_WINDOW_SECS})"
        )
    })
}

fn reading_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bpm": {"type": "number", "description": "Heart rate in beats per minute"},
            "zone": {"type": "number", "description": "Heart rate zone (1-5)"},
            "timestamp": {"type": "string", "description": "ISO timestamp of the reading"}
        },
        "required": ["bpm", "zone", "timestamp"]
    })
}

/// Every tool this server offers, in listing order.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CHECK_CONNECTION,
            description: "Check if a user is connected and streaming heart rate data. \
                          Call this before other tools to verify the user is active.",
            input_schema: json!({
                "type": "object",
                "properties": {"pairingCode": pairing_code_schema()},
                "required": ["pairingCode"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "connected": {"type": "boolean", "description": "Whether the user is connected"},
                    "lastSeen": {
                        "type": ["string", "null"],
                        "description": "ISO timestamp of last reading, or null if never connected"
                    },
                    "status": {
                        "type": "string",
                        "enum": ["streaming", "idle", "disconnected"],
                        "description": "streaming = active data flow, idle = connected but no recent data, \
                                        disconnected = no connection"
                    }
                },
                "required": ["connected", "lastSeen", "status"]
            }),
        },
        ToolDefinition {
            name: GET_HEART_RATE,
            description: "Get the current heart rate reading. Returns BPM, zone (1-5), and timestamp.",
            input_schema: json!({
                "type": "object",
                "properties": {"pairingCode": pairing_code_schema()},
                "required": ["pairingCode"]
            }),
            output_schema: reading_schema(),
        },
        ToolDefinition {
            name: GET_HEART_RATE_HISTORY,
            description: "Get heart rate readings from the last N seconds. \
                          Returns an array of readings for trend analysis.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pairingCode": pairing_code_schema(),
                    "seconds": seconds_schema("of history to retrieve")
                },
                "required": ["pairingCode"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "readings": {
                        "type": "array",
                        "items": reading_schema(),
                        "description": "Array of heart rate readings, oldest first"
                    }
                },
                "required": ["readings"]
            }),
        },
        ToolDefinition {
            name: GET_HEART_RATE_STATS,
            description: "Get heart rate statistics for the last N seconds. \
                          Includes average, min, max, and time spent in each zone.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pairingCode": pairing_code_schema(),
                    "seconds": seconds_schema("to calculate stats over")
                },
                "required": ["pairingCode"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "avg": {"type": "number", "description": "Average BPM"},
                    "min": {"type": "number", "description": "Minimum BPM"},
                    "max": {"type": "number", "description": "Maximum BPM"},
                    "count": {"type": "number", "description": "Number of readings"},
                    "timeInZone": {
                        "type": "object",
                        "additionalProperties": {"type": "number"},
                        "description": "Readings (~seconds at 1 Hz) in each zone, keyed 1-5"
                    }
                },
                "required": ["avg", "min", "max", "count", "timeInZone"]
            }),
        },
    ]
}

/// Run a tool by name.
///
/// Returns a JSON-RPC error only for unknown tools or results that fail to
/// serialize; everything else is a [`ToolResult`].
pub fn call(
    store: &ReadingStore,
    name: &str,
    arguments: Option<&Value>,
) -> Result<ToolResult, JsonRpcError> {
    let args = match arguments {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => return Err(JsonRpcError::invalid_params("arguments must be an object")),
    };
    let arg = |key: &str| args.and_then(|m| m.get(key));

    let code = match validation::pairing_code_value(arg("pairingCode")) {
        Ok(code) => code,
        Err(_) if is_known(name) => return Ok(ToolResult::error(INVALID_CODE_TEXT)),
        Err(_) => return Err(unknown_tool(name)),
    };

    match name {
        CHECK_CONNECTION => check_connection(store, code),
        GET_HEART_RATE | GET_CURRENT_HEART_RATE => heart_rate(store, code),
        GET_HEART_RATE_HISTORY => match window(arg("seconds")) {
            Ok(seconds) => history(store, code, seconds),
            Err(result) => Ok(result),
        },
        GET_HEART_RATE_STATS => match window(arg("seconds")) {
            Ok(seconds) => stats(store, code, seconds),
            Err(result) => Ok(result),
        },
        _ => Err(unknown_tool(name)),
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        CHECK_CONNECTION
            | GET_HEART_RATE
            | GET_CURRENT_HEART_RATE
            | GET_HEART_RATE_HISTORY
            | GET_HEART_RATE_STATS
    )
}

fn unknown_tool(name: &str) -> JsonRpcError {
    JsonRpcError::invalid_params(format!("Tool {name} not found"))
}

fn window(value: Option<&Value>) -> Result<u32, ToolResult> {
    validation::window_value(value, DEFAULT_TOOL_WINDOW_SECS)
        .map_err(|e: ValidationError| ToolResult::error(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("Failed to serialize tool result: {e}");
        JsonRpcError::internal()
    })
}

fn no_data(seconds: u32) -> ToolResult {
    ToolResult::error(format!(
        "No heart rate data in the last {seconds} seconds. \
         Use {CHECK_CONNECTION} to verify the user is streaming."
    ))
}

fn check_connection(store: &ReadingStore, code: &str) -> Result<ToolResult, JsonRpcError> {
    let result = status::connection_status(store, code);
    let text = match result.status {
        ConnectionState::Streaming => "User is actively streaming heart rate data.",
        ConnectionState::Idle => {
            "User is connected but no recent data. They may have paused or backgrounded the app."
        }
        ConnectionState::Disconnected => "User is not connected. No heart rate data available.",
    };
    Ok(ToolResult::ok(text, to_value(&result)?))
}

fn heart_rate(store: &ReadingStore, code: &str) -> Result<ToolResult, JsonRpcError> {
    let Some(reading) = store.latest(code) else {
        return Ok(ToolResult::error(format!(
            "No heart rate data available for {code}. \
             Use {CHECK_CONNECTION} to verify the user is streaming."
        )));
    };

    let age = (store.now() - reading.timestamp).num_seconds();
    let text = format!(
        "Heart rate: {} BPM (Zone {}), {age}s ago",
        reading.bpm, reading.zone
    );
    Ok(ToolResult::ok(text, to_value(&reading)?))
}

fn history(store: &ReadingStore, code: &str, seconds: u32) -> Result<ToolResult, JsonRpcError> {
    let readings = store.range(code, seconds);
    let (Some(min), Some(max)) = (
        readings.iter().map(|r| r.bpm).min(),
        readings.iter().map(|r| r.bpm).max(),
    ) else {
        return Ok(no_data(seconds));
    };

    let text = format!(
        "Retrieved {} readings from the last {seconds} seconds. Range: {min}-{max} BPM.",
        readings.len()
    );
    Ok(ToolResult::ok(text, json!({ "readings": to_value(&readings)? })))
}

fn stats(store: &ReadingStore, code: &str, seconds: u32) -> Result<ToolResult, JsonRpcError> {
    let Some(stats) = store.stats(code, seconds) else {
        return Ok(no_data(seconds));
    };

    let text = format!(
        "Stats (last {seconds}s): Avg {} BPM, Range {}-{} BPM. Time in zones: {}",
        stats.avg,
        stats.min,
        stats.max,
        zone_summary(&stats.time_in_zone)
    );
    Ok(ToolResult::ok(text, to_value(&stats)?))
}

fn zone_summary(zones: &ZoneCounts) -> String {
    let parts: Vec<String> = zones
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(zone, count)| format!("Zone {zone}: {count}s"))
        .collect();

    if parts.is_empty() {
        "no zone data".to_string()
    } else {
        parts.join(", ")
    }
}
