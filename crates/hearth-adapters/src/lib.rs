pub mod args;
pub mod calendar_tools;
pub mod climate_tools;
pub mod control_tools;
pub mod entity_tools;
pub mod hass_client;
pub mod user_tool;

pub use calendar_tools::{CreateEventTool, GetAgendaTool, GetAvailabilityTool};
pub use climate_tools::SetTemperatureTool;
pub use control_tools::{ChoiceTool, SetHumidityTool};
pub use entity_tools::EntityActionTool;
pub use hass_client::HomeAssistantClient;
pub use user_tool::CurrentUserTool;

use anyhow::Result;
use hearth_runtime::{ActionExecutor, EntityDirectory, ToolRegistry};
use std::sync::Arc;

/// Register the full home-automation tool catalogue.
pub fn register_home_tools(
    registry: &mut ToolRegistry,
    executor: Arc<dyn ActionExecutor>,
    directory: Arc<dyn EntityDirectory>,
    current_user: &str,
) -> Result<()> {
    for tool in entity_tools::entity_action_tools(&executor) {
        registry.register(tool)?;
    }
    for tool in control_tools::control_tools(&executor) {
        registry.register(tool)?;
    }
    registry.register(Arc::new(SetTemperatureTool::new(executor.clone(), directory)))?;
    for tool in calendar_tools::calendar_tools(&executor) {
        registry.register(tool)?;
    }
    registry.register(Arc::new(CurrentUserTool::new(current_user)))?;
    Ok(())
}
