use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hearth_runtime::dispatch::{execute_for_entity, partition_by_domain};
use hearth_runtime::{ActionExecutor, Tool, ToolError, ToolOutput, ToolSchema};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::args::{self, TIME_FORMAT};

const CALENDAR: &[&str] = &["calendar"];

fn event_window(start: &NaiveDateTime, end: &NaiveDateTime) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("start_date_time".into(), json!(start.format(TIME_FORMAT).to_string()));
    data.insert("end_date_time".into(), json!(end.format(TIME_FORMAT).to_string()));
    data
}

fn range_schema(entity_key: &str, entity: Value, extra: &[(&str, Value)], required: &[&str]) -> Value {
    let mut props = args::time_range_properties();
    props.insert(entity_key.to_string(), entity);
    for (name, schema) in extra {
        props.insert(name.to_string(), schema.clone());
    }
    json!({"type": "object", "properties": props, "required": required})
}

// ============================================================================
// Open slots
// ============================================================================

/// Free interval between calendar events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: String,
    pub end: String,
}

impl Slot {
    fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: start.format(TIME_FORMAT).to_string(),
            end: end.format(TIME_FORMAT).to_string(),
        }
    }
}

/// Parse an event timestamp as local wall time.
///
/// Accepts RFC 3339 (offset dropped), naive date-times and all-day dates.
pub fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", TIME_FORMAT, "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Gaps between `events` inside `[start, end]`
pub fn open_slots(
    mut events: Vec<(NaiveDateTime, NaiveDateTime)>,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<Slot> {
    events.sort_by_key(|(event_start, _)| *event_start);

    let mut slots = Vec::new();
    let mut cursor = start;
    for (event_start, event_end) in events {
        if event_end <= start || event_start >= end {
            continue;
        }
        if cursor < event_start {
            slots.push(Slot::new(cursor, event_start));
        }
        cursor = cursor.max(event_end);
    }
    if cursor < end {
        slots.push(Slot::new(cursor, end));
    }
    slots
}

/// Collect `(start, end)` for every event of `entity_id` in a `get_events` response
fn events_for(response: &Value, entity_id: &str) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let events = response
        .get(entity_id)
        .and_then(|c| c.get("events"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    events
        .iter()
        .filter_map(|event| {
            let start = event.get("start").and_then(Value::as_str).and_then(parse_event_time);
            let end = event.get("end").and_then(Value::as_str).and_then(parse_event_time);
            match (start, end) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => {
                    warn!(entity_id, event = %event, "Skipping event with unreadable times");
                    None
                }
            }
        })
        .collect()
}

// ============================================================================
// Tools
// ============================================================================

/// Events on one or more calendars within a time range
pub struct GetAgendaTool {
    executor: Arc<dyn ActionExecutor>,
}

impl GetAgendaTool {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for GetAgendaTool {
    fn name(&self) -> &str {
        "hass_get_agenda"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_get_agenda".to_string(),
            description: "Get events on the calendars specified in the 'entity_ids' parameter between 'start_date' and 'end_date'.".to_string(),
            input_schema: range_schema(
                "entity_ids",
                json!({"type": "array", "items": {"type": "string"}, "description": "Calendar entity IDs"}),
                &[],
                &["entity_ids", "start_date", "end_date"],
            ),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let ids = args::entity_ids(&args)?;
        let (start, end) = args::time_range(&args)?;

        let (groups, validation) = partition_by_domain(&ids, CALENDAR);
        if validation.has_validation_errors() {
            return Ok(ToolOutput::Result(validation));
        }
        let calendars = groups.into_values().flatten().collect::<Vec<_>>();
        debug!(calendars = ?calendars, %start, %end, "Fetching agenda");

        let events = self
            .executor
            .query_action(&calendars, "calendar", "get_events", Some(event_window(&start, &end)))
            .await?;
        Ok(ToolOutput::Data(events))
    }
}

/// Open time slots on one calendar within a time range
pub struct GetAvailabilityTool {
    executor: Arc<dyn ActionExecutor>,
}

impl GetAvailabilityTool {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for GetAvailabilityTool {
    fn name(&self) -> &str {
        "hass_get_availability"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_get_availability".to_string(),
            description: "Find time slots that are open in the calendar specified in the 'entity_id' parameter between 'start_date' and 'end_date'.".to_string(),
            input_schema: range_schema(
                "entity_id",
                json!({"type": "string", "description": "Calendar entity ID"}),
                &[],
                &["entity_id", "start_date", "end_date"],
            ),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let entity_id = args::entity_id(&args)?;
        let (start, end) = args::time_range(&args)?;

        let (_, validation) = partition_by_domain(&[entity_id.clone()], CALENDAR);
        if validation.has_validation_errors() {
            return Ok(ToolOutput::Result(validation));
        }

        let response = self
            .executor
            .query_action(
                &[entity_id.clone()],
                "calendar",
                "get_events",
                Some(event_window(&start, &end)),
            )
            .await?;
        let slots = open_slots(events_for(&response, &entity_id), start, end);
        Ok(ToolOutput::Data(json!({ "open_slots": slots })))
    }
}

/// Adds an event to a calendar
pub struct CreateEventTool {
    executor: Arc<dyn ActionExecutor>,
}

impl CreateEventTool {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "hass_create_event"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_create_event".to_string(),
            description: "Create an event in the calendar specified in the 'entity_id' parameter between 'start_date' and 'end_date'.".to_string(),
            input_schema: range_schema(
                "entity_id",
                json!({"type": "string", "description": "Calendar entity ID"}),
                &[("summary", json!({"type": "string", "description": "Title of the event"}))],
                &["entity_id", "start_date", "end_date", "summary"],
            ),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let entity_id = args::entity_id(&args)?;
        let (start, end) = args::time_range(&args)?;
        let summary = args::required_str(&args, "summary")?;
        if summary.trim().is_empty() {
            return Err(ToolError::invalid("summary must not be empty"));
        }

        let mut data = event_window(&start, &end);
        data.insert("summary".into(), json!(summary));
        let result =
            execute_for_entity(self.executor.as_ref(), &entity_id, CALENDAR, "create_event", Some(data))
                .await;
        Ok(ToolOutput::Result(result))
    }
}

pub fn calendar_tools(executor: &Arc<dyn ActionExecutor>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetAgendaTool::new(executor.clone())),
        Arc::new(GetAvailabilityTool::new(executor.clone())),
        Arc::new(CreateEventTool::new(executor.clone())),
    ]
}
