//! Collaborators owned by the hosting platform.
//!
//! The engine and the tools receive these as `Arc<dyn ..>` at construction time;
//! nothing in the runtime reaches for a process-wide handle.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity surfaced to the model in the system prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposedEntity {
    pub entity_id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Snapshot of exposed entities: grouped by area, plus three reserved buckets
/// for entities that are not grouped by area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposedEntities {
    pub areas: BTreeMap<String, Vec<ExposedEntity>>,
    pub scenes: Vec<ExposedEntity>,
    pub scripts: Vec<ExposedEntity>,
    pub automations: Vec<ExposedEntity>,
}

impl ExposedEntities {
    pub fn add_to_area(&mut self, area: &str, entity: ExposedEntity) {
        self.areas.entry(area.to_string()).or_default().push(entity);
    }

    pub fn len(&self) -> usize {
        self.areas.values().map(Vec::len).sum::<usize>()
            + self.scenes.len()
            + self.scripts.len()
            + self.automations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Current state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }
}

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn exposed_entities(&self) -> Result<ExposedEntities>;

    /// `Ok(None)` when the entity does not exist
    async fn entity_state(&self, entity_id: &str) -> Result<Option<EntityState>>;
}

/// Outcome of one batched action call
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub failed_entity_ids: Vec<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            failed_entity_ids: Vec::new(),
        }
    }

    pub fn failed(entity_ids: &[String]) -> Self {
        Self {
            success: false,
            failed_entity_ids: entity_ids.to_vec(),
        }
    }
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Perform `domain.action` against all `entity_ids` in one call
    async fn call_action(
        &self,
        entity_ids: &[String],
        domain: &str,
        action: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<ActionOutcome>;

    /// Same as `call_action` for actions that return data (e.g. calendar events)
    async fn query_action(
        &self,
        entity_ids: &[String],
        domain: &str,
        action: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Value>;
}

/// Template rendering failure
#[derive(Debug, thiserror::Error)]
#[error("template error: {0}")]
pub struct TemplateError(pub String);

#[async_trait]
pub trait PromptRenderer: Send + Sync {
    async fn render(&self, template: &str, variables: &Value) -> Result<String, TemplateError>;
}
