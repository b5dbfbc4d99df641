use std::sync::Arc;

use async_trait::async_trait;
use hearth_runtime::dispatch::execute_for_entities;
use hearth_runtime::{ActionExecutor, Tool, ToolError, ToolOutput, ToolSchema};
use serde_json::{Map, Value};
use tracing::debug;

use crate::args;

/// Static description of a tool that runs one action over a list of entities
pub struct EntityActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub action: &'static str,
    pub domains: &'static [&'static str],
}

pub const ENTITY_ACTIONS: &[EntityActionSpec] = &[
    EntityActionSpec {
        name: "hass_turn_on",
        description: "Turn on the entities specified in the 'entity_ids' parameter. Supported entity types are: light, switch, fan, climate, media_player, automation, script, and scene.",
        action: "turn_on",
        domains: &["light", "switch", "fan", "climate", "media_player", "automation", "script", "scene"],
    },
    EntityActionSpec {
        name: "hass_turn_off",
        description: "Turn off the entities specified in the 'entity_ids' parameter. Supported entity types are: light, switch, fan, climate, media_player, automation, and script.",
        action: "turn_off",
        domains: &["light", "switch", "fan", "climate", "media_player", "automation", "script"],
    },
    EntityActionSpec {
        name: "hass_toggle",
        description: "Toggle the entities specified in the 'entity_ids' parameter. Supported entity types are: light, switch, fan, climate, media_player, lock, cover, automation, and script.",
        action: "toggle",
        domains: &["light", "switch", "fan", "climate", "media_player", "lock", "cover", "automation", "script"],
    },
    EntityActionSpec {
        name: "hass_open",
        description: "Open the entities specified in the 'entity_ids' parameter. Only supported for covers, such as garage doors or blinds.",
        action: "open_cover",
        domains: &["cover"],
    },
    EntityActionSpec {
        name: "hass_close",
        description: "Close the entities specified in the 'entity_ids' parameter. Only supported for covers, such as garage doors or blinds.",
        action: "close_cover",
        domains: &["cover"],
    },
    EntityActionSpec {
        name: "hass_lock",
        description: "Lock the entities specified in the 'entity_ids' parameter. Only supported for locks.",
        action: "lock",
        domains: &["lock"],
    },
    EntityActionSpec {
        name: "hass_unlock",
        description: "Unlock the entities specified in the 'entity_ids' parameter. Only supported for locks.",
        action: "unlock",
        domains: &["lock"],
    },
];

/// Runs a fixed action against every requested entity, batched by domain
pub struct EntityActionTool {
    spec: &'static EntityActionSpec,
    executor: Arc<dyn ActionExecutor>,
}

impl EntityActionTool {
    pub fn new(spec: &'static EntityActionSpec, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { spec, executor }
    }
}

#[async_trait]
impl Tool for EntityActionTool {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.spec.name.to_string(),
            description: self.spec.description.to_string(),
            input_schema: args::entity_ids_schema("The entity IDs to act on, e.g. light.kitchen"),
        }
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let ids = args::entity_ids(&args)?;
        debug!(tool = self.spec.name, entities = ?ids, "Running entity action");

        let result = execute_for_entities(
            self.executor.as_ref(),
            &ids,
            self.spec.domains,
            self.spec.action,
            None,
        )
        .await;
        Ok(ToolOutput::Result(result))
    }
}

/// One tool per entry of `ENTITY_ACTIONS`
pub fn entity_action_tools(executor: &Arc<dyn ActionExecutor>) -> Vec<Arc<dyn Tool>> {
    ENTITY_ACTIONS
        .iter()
        .map(|spec| Arc::new(EntityActionTool::new(spec, executor.clone())) as Arc<dyn Tool>)
        .collect()
}
