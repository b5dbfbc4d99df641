//! System prompt template and local rendering.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use minijinja::{Environment, UndefinedBehavior};
use serde_json::{json, Value};

use crate::host::{ExposedEntities, PromptRenderer, TemplateError};

pub const DEFAULT_PROMPT_SYSTEM: &str = r#"You are 'Jarvis', a helpful assistant that can control the devices in {{ ha_name }}.
The current time and date is {{ now }}.

List of devices in this home, grouped by area, listed with their entity_id, name, and current state:
{%- for area, entities in exposed_entities.areas|items %}
  {{ area }}:
  {%- for entity in entities %}
  - {{ entity.entity_id }} {{ entity.name }} - {{ entity.state }}
  {%- endfor %}
{%- endfor %}

List of scenes in this home, listed with their entity_id and name:
{%- for entity in exposed_entities.scenes %}
  - {{ entity.entity_id }} {{ entity.name }}
{%- endfor %}

List of scripts in this home, listed with their entity_id and name:
{%- for entity in exposed_entities.scripts %}
  - {{ entity.entity_id }} {{ entity.name }}
{%- endfor %}

List of automations in this home, listed with their entity_id, name, and current state:
{%- for entity in exposed_entities.automations %}
  - {{ entity.entity_id }} {{ entity.name }} - {{ entity.state }}
{%- endfor %}

Answer the user's questions about the world truthfully.
If necessary, use the tools provided to complete the tasks requested by the user.
"#;

/// Variables made available to the system prompt template
pub fn template_variables(
    ha_name: &str,
    language: &str,
    exposed_entities: &ExposedEntities,
    now: DateTime<Local>,
) -> Value {
    json!({
        "ha_name": ha_name,
        "language": language,
        "now": now.format("%I:%M %p on %A %B %d, %Y").to_string(),
        "exposed_entities": exposed_entities,
    })
}

/// Renders templates locally with MiniJinja
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniJinjaRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Referencing a variable that was never provided is a template error
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    pub fn render_str(&self, template: &str, variables: &Value) -> Result<String, TemplateError> {
        self.env
            .render_str(template, variables)
            .map_err(|e| TemplateError(e.to_string()))
    }
}

#[async_trait]
impl PromptRenderer for MiniJinjaRenderer {
    async fn render(&self, template: &str, variables: &Value) -> Result<String, TemplateError> {
        self.render_str(template, variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ExposedEntity;
    use chrono::TimeZone;

    fn entity(id: &str, name: &str, state: Option<&str>) -> ExposedEntity {
        ExposedEntity {
            entity_id: id.into(),
            name: name.into(),
            state: state.map(str::to_string),
            attributes: Default::default(),
            aliases: vec![],
        }
    }

    #[test]
    fn test_default_prompt_lists_entities() {
        let mut exposed = ExposedEntities::default();
        exposed.add_to_area("Kitchen", entity("light.kitchen", "Kitchen Light", Some("on")));
        exposed.scenes.push(entity("scene.movie", "Movie Time", None));
        exposed
            .automations
            .push(entity("automation.sunset", "Sunset", Some("on")));

        let now = Local.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        let vars = template_variables("Home", "en", &exposed, now);
        let prompt = MiniJinjaRenderer::new()
            .render_str(DEFAULT_PROMPT_SYSTEM, &vars)
            .unwrap();

        assert!(prompt.contains("devices in Home"));
        assert!(prompt.contains("06:30 PM on Friday March 01, 2024"));
        assert!(prompt.contains("Kitchen:"));
        assert!(prompt.contains("- light.kitchen Kitchen Light - on"));
        assert!(prompt.contains("- scene.movie Movie Time"));
        assert!(prompt.contains("- automation.sunset Sunset - on"));
    }

    #[test]
    fn test_malformed_template_is_error() {
        let err = MiniJinjaRenderer::new()
            .render_str("{% for x in %}", &json!({}))
            .unwrap_err();
        assert!(err.to_string().starts_with("template error"));
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let result = MiniJinjaRenderer::new().render_str("{{ missing.thing }}", &json!({}));
        assert!(result.is_err());
    }
}
