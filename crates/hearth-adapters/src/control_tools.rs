use std::sync::Arc;

use async_trait::async_trait;
use hearth_runtime::dispatch::execute_for_entity;
use hearth_runtime::{ActionExecutor, Tool, ToolError, ToolOutput, ToolSchema};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::args;

/// How the validated choice reaches Home Assistant
pub enum ChoiceTarget {
    /// The choice is the service name itself (`vacuum.start`)
    Service,
    /// The choice is sent as `{field: choice}` to a fixed service
    Data { service: &'static str },
}

/// Single entity, one enumerated value
pub struct ChoiceSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub domain: &'static str,
    pub field: &'static str,
    pub allowed: &'static [&'static str],
    pub target: ChoiceTarget,
}

pub const CHOICE_TOOLS: &[ChoiceSpec] = &[
    ChoiceSpec {
        name: "hass_vacuum_control",
        description: "Control the vacuum specified in the 'entity_id' parameter with the action specified in the 'action' parameter.",
        domain: "vacuum",
        field: "action",
        allowed: &["start", "stop", "pause", "return_to_base"],
        target: ChoiceTarget::Service,
    },
    ChoiceSpec {
        name: "hass_media_control",
        description: "Control the media player specified in the 'entity_id' parameter with the action specified in the 'action' parameter.",
        domain: "media_player",
        field: "action",
        allowed: &[
            "media_play",
            "media_pause",
            "media_stop",
            "media_next_track",
            "media_previous_track",
            "volume_up",
            "volume_down",
        ],
        target: ChoiceTarget::Service,
    },
    ChoiceSpec {
        name: "hass_fan_control",
        description: "Control the fan specified in the 'entity_id' parameter with the action specified in the 'action' parameter.",
        domain: "fan",
        field: "action",
        allowed: &["increase_speed", "decrease_speed"],
        target: ChoiceTarget::Service,
    },
    ChoiceSpec {
        name: "hass_set_hvac_mode",
        description: "Set the HVAC mode of the climate device specified in the 'entity_id' parameter.",
        domain: "climate",
        field: "hvac_mode",
        allowed: &["off", "heat", "cool", "auto", "heat_cool", "fan_only"],
        target: ChoiceTarget::Data {
            service: "set_hvac_mode",
        },
    },
    ChoiceSpec {
        name: "hass_set_preset_mode",
        description: "Set the preset mode of the climate device specified in the 'entity_id' parameter.",
        domain: "climate",
        field: "preset_mode",
        allowed: &["home", "away", "eco", "auto"],
        target: ChoiceTarget::Data {
            service: "set_preset_mode",
        },
    },
    ChoiceSpec {
        name: "hass_set_fan_mode",
        description: "Set the fan mode of the climate device specified in the 'entity_id' parameter.",
        domain: "climate",
        field: "fan_mode",
        allowed: &["On Low", "On High", "Auto Low", "Auto High", "Off"],
        target: ChoiceTarget::Data {
            service: "set_fan_mode",
        },
    },
];

/// Validates the enumerated value before anything is sent downstream
pub struct ChoiceTool {
    spec: &'static ChoiceSpec,
    executor: Arc<dyn ActionExecutor>,
}

impl ChoiceTool {
    pub fn new(spec: &'static ChoiceSpec, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { spec, executor }
    }
}

#[async_trait]
impl Tool for ChoiceTool {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.spec.name.to_string(),
            description: self.spec.description.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_id": {
                        "type": "string",
                        "description": format!("Entity ID of the {} device", self.spec.domain)
                    },
                    (self.spec.field): {
                        "type": "string",
                        "enum": self.spec.allowed
                    }
                },
                "required": ["entity_id", self.spec.field]
            }),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let entity_id = args::entity_id(&args)?;
        let value = args::choice(&args, self.spec.field, self.spec.allowed)?;
        debug!(tool = self.spec.name, entity_id = %entity_id, value = %value, "Running control");

        let (service, data) = match self.spec.target {
            ChoiceTarget::Service => (value.as_str(), None),
            ChoiceTarget::Data { service } => {
                let mut data = Map::new();
                data.insert(self.spec.field.to_string(), Value::String(value.clone()));
                (service, Some(data))
            }
        };

        let result = execute_for_entity(
            self.executor.as_ref(),
            &entity_id,
            &[self.spec.domain],
            service,
            data,
        )
        .await;
        Ok(ToolOutput::Result(result))
    }
}

/// Sets the target humidity of a climate device
pub struct SetHumidityTool {
    executor: Arc<dyn ActionExecutor>,
}

impl SetHumidityTool {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Tool for SetHumidityTool {
    fn name(&self) -> &str {
        "hass_set_humidity"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "hass_set_humidity".to_string(),
            description: "Set the humidity of the climate device specified in the 'entity_id' parameter to the value specified in the 'humidity' parameter.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_id": {"type": "string", "description": "Entity ID of the climate device"},
                    "humidity": {"type": "number", "description": "The desired humidity"}
                },
                "required": ["entity_id", "humidity"]
            }),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let entity_id = args::entity_id(&args)?;
        let humidity = args::number(&args, "humidity")?;

        let mut data = Map::new();
        data.insert("humidity".into(), humidity);
        let result = execute_for_entity(
            self.executor.as_ref(),
            &entity_id,
            &["climate"],
            "set_humidity",
            Some(data),
        )
        .await;
        Ok(ToolOutput::Result(result))
    }
}

/// One tool per entry of `CHOICE_TOOLS`, plus humidity
pub fn control_tools(executor: &Arc<dyn ActionExecutor>) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = CHOICE_TOOLS
        .iter()
        .map(|spec| Arc::new(ChoiceTool::new(spec, executor.clone())) as Arc<dyn Tool>)
        .collect();
    tools.push(Arc::new(SetHumidityTool::new(executor.clone())));
    tools
}
