use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use hearth_runtime::dispatch::{execute_for_entity, partition_by_domain};
use hearth_runtime::{
    ActionExecutor, EntityDirectory, EntityState, Tool, ToolError, ToolOutput, ToolSchema,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::args;

const CLIMATE: &[&str] = &["climate"];

/// Setpoint changed while the device holds a low/high range
const BOUNDS: &[&str] = &["high", "low"];

/// Sets a thermostat target, adapting to its current HVAC mode.
///
/// An `off` device is turned on first and re-read. In `auto`/`heat_cool` only
/// the requested bound changes and the other one is written back exactly as it
/// was read; in `heat`/`cool` the single `temperature` setpoint is written.
pub struct SetTemperatureTool {
    executor: Arc<dyn ActionExecutor>,
    directory: Arc<dyn EntityDirectory>,
}

impl SetTemperatureTool {
    pub fn new(executor: Arc<dyn ActionExecutor>, directory: Arc<dyn EntityDirectory>) -> Self {
        Self {
            executor,
            directory,
        }
    }

    async fn current_state(&self, entity_id: &str) -> Result<EntityState, ToolError> {
        self.directory
            .entity_state(entity_id)
            .await?
            .ok_or_else(|| ToolError::invalid(format!("entity '{}' does not exist", entity_id)))
    }
}

#[async_trait]
impl Tool for SetTemperatureTool {
    fn name(&self) -> &str {
        "hass_set_temperature"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_set_temperature".to_string(),
            description: "Set the temperature of the climate device specified in the 'entity_id' parameter to the value specified in the 'temperature' parameter. When the device keeps a temperature range, 'bound' selects which end of the range to change.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_id": {"type": "string", "description": "Entity ID of the climate device"},
                    "temperature": {"type": "number", "description": "The temperature value to set"},
                    "bound": {
                        "type": "string",
                        "enum": BOUNDS,
                        "description": "Range end to change in auto or heat_cool mode (default: high)"
                    }
                },
                "required": ["entity_id", "temperature"]
            }),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let entity_id = args::entity_id(&args)?;
        let temperature = args::number(&args, "temperature")?;
        if temperature.as_f64().is_some_and(|t| t < 0.0) {
            return Err(ToolError::invalid("temperature must be greater than or equal to 0"));
        }
        let bound = match args.get("bound") {
            None | Some(Value::Null) => "high".to_string(),
            Some(_) => args::choice(&args, "bound", BOUNDS)?,
        };

        let (_, validation) = partition_by_domain(&[entity_id.clone()], CLIMATE);
        if validation.has_validation_errors() {
            return Ok(ToolOutput::Result(validation));
        }

        let mut state = self.current_state(&entity_id).await?;
        if state.state == "off" {
            debug!(entity_id = %entity_id, "Climate device is off, turning it on first");
            let result =
                execute_for_entity(self.executor.as_ref(), &entity_id, CLIMATE, "turn_on", None).await;
            if !result.success {
                return Ok(ToolOutput::Result(result));
            }
            state = self.current_state(&entity_id).await?;
        }

        let mut data = Map::new();
        match state.state.as_str() {
            "auto" | "heat_cool" => {
                let (changed, kept) = if bound == "low" {
                    ("target_temp_low", "target_temp_high")
                } else {
                    ("target_temp_high", "target_temp_low")
                };
                let preserved = state.attribute(kept).cloned().ok_or_else(|| {
                    ToolError::Upstream(anyhow!("{} reports no {} to preserve", entity_id, kept))
                })?;
                debug!(entity_id = %entity_id, changed, kept, "Updating one bound of the range");
                data.insert(kept.to_string(), preserved);
                data.insert(changed.to_string(), temperature);
            }
            "heat" | "cool" => {
                data.insert("temperature".to_string(), temperature);
            }
            mode => {
                return Err(ToolError::invalid(format!(
                    "cannot set the temperature of {} while its HVAC mode is '{}'",
                    entity_id, mode
                )));
            }
        }

        let result = execute_for_entity(
            self.executor.as_ref(),
            &entity_id,
            CLIMATE,
            "set_temperature",
            Some(data),
        )
        .await;
        Ok(ToolOutput::Result(result))
    }
}
