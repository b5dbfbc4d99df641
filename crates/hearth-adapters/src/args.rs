//! Argument extraction shared by the home-automation tools.
//!
//! Every helper reports a `ToolError` so a malformed call is answered to the
//! model instead of reaching Home Assistant.

use chrono::NaiveDateTime;
use hearth_runtime::ToolError;
use serde_json::{json, Map, Value};

/// Wire format for calendar time arguments
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn entity_ids(args: &Map<String, Value>) -> Result<Vec<String>, ToolError> {
    let list = args
        .get("entity_ids")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::invalid("entity_ids must be a list of strings"))?;

    let ids = list
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ToolError::invalid("entity_ids must be a list of strings"))?;

    if ids.is_empty() {
        return Err(ToolError::invalid("entity_ids must contain at least one entity ID"));
    }
    Ok(ids)
}

pub fn required_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid(format!("{} must be a string", field)))
}

pub fn entity_id(args: &Map<String, Value>) -> Result<String, ToolError> {
    required_str(args, "entity_id").map(str::to_string)
}

/// Numeric argument, returned as the JSON value the model sent
pub fn number(args: &Map<String, Value>, field: &str) -> Result<Value, ToolError> {
    match args.get(field) {
        Some(v) if v.is_number() => Ok(v.clone()),
        _ => Err(ToolError::invalid(format!("{} must be a number", field))),
    }
}

/// String argument restricted to a fixed set of values
pub fn choice(args: &Map<String, Value>, field: &str, allowed: &[&str]) -> Result<String, ToolError> {
    let value = required_str(args, field)?;
    if !allowed.contains(&value) {
        return Err(ToolError::InvalidChoice {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        });
    }
    Ok(value.to_string())
}

fn parse_time(args: &Map<String, Value>, field: &str) -> Result<NaiveDateTime, ToolError> {
    let raw = required_str(args, field)?;
    if raw.is_empty() {
        return Err(ToolError::invalid(format!("{} must not be empty", field)));
    }
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT).map_err(|_| {
        ToolError::invalid(format!("{} must be in the format 'YYYY-MM-DD HH:MM:SS'", field))
    })
}

/// `start_date`/`end_date` pair; start must not be after end
pub fn time_range(args: &Map<String, Value>) -> Result<(NaiveDateTime, NaiveDateTime), ToolError> {
    let start = parse_time(args, "start_date")?;
    let end = parse_time(args, "end_date")?;
    if start > end {
        return Err(ToolError::invalid("start_date must be before end_date"));
    }
    Ok((start, end))
}

pub fn entity_ids_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "entity_ids": {
                "type": "array",
                "items": {"type": "string"},
                "description": description
            }
        },
        "required": ["entity_ids"]
    })
}

pub fn time_range_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        "start_date".into(),
        json!({"type": "string", "description": "Start of the range, formatted 'YYYY-MM-DD HH:MM:SS'"}),
    );
    props.insert(
        "end_date".into(),
        json!({"type": "string", "description": "End of the range, formatted 'YYYY-MM-DD HH:MM:SS'"}),
    );
    props
}
