use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use hearth_runtime::dispatch::split_domain;
use hearth_runtime::{
    ActionExecutor, ActionOutcome, EntityDirectory, EntityState, ExposedEntities, ExposedEntity,
    PromptRenderer, TemplateError,
};
use reqwest::{Client, Response};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

/// Bucket for entities without an assigned area
pub const NO_AREA: &str = "No Area";

/// Resolves area names for a list of entity ids in one template call
const AREA_TEMPLATE: &str = "{{ entity_ids | map('area_name') | list | tojson }}";

/// Home Assistant REST API client.
///
/// Serves as entity directory, action executor and remote template renderer.
pub struct HomeAssistantClient {
    http: Client,
    url: String,
    token: String,
    expose_domains: Vec<String>,
}

impl HomeAssistantClient {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            expose_domains: Vec::new(),
        })
    }

    /// Only surface entities of these domains in the prompt (empty = all)
    pub fn with_expose_domains(mut self, domains: Vec<String>) -> Self {
        self.expose_domains = domains;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn is_exposed(&self, domain: &str) -> bool {
        self.expose_domains.is_empty() || self.expose_domains.iter().any(|d| d == domain)
    }

    fn send_error(&self, endpoint: &str, e: reqwest::Error) -> anyhow::Error {
        if e.is_connect() {
            anyhow!(
                "Cannot connect to Home Assistant at '{}'. Please check the URL and ensure Home Assistant is running.",
                self.url
            )
        } else if e.is_timeout() {
            anyhow!("Timeout connecting to Home Assistant at '{}'", self.url)
        } else {
            anyhow!("Network error accessing {}: {}", endpoint, e)
        }
    }

    async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status.as_u16() {
            401 => bail!("Authentication failed. Please check your HASS_TOKEN is valid and has not expired."),
            403 => bail!("Access forbidden. Your HASS_TOKEN may not have sufficient permissions."),
            404 => bail!("Home Assistant API endpoint not found: {}", endpoint),
            500..=599 => bail!("Home Assistant server error ({}): {}", status, error_text),
            _ => bail!("HTTP error {} accessing {}: {}", status, endpoint, error_text),
        }
    }

    async fn rest_get(&self, endpoint: &str) -> Result<Response> {
        let response = self
            .http
            .get(format!("{}/{}", self.url, endpoint))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.send_error(endpoint, e))?;
        Self::check_status(endpoint, response).await
    }

    async fn rest_post(&self, endpoint: &str, body: &Value) -> Result<Response> {
        let response = self
            .http
            .post(format!("{}/{}", self.url, endpoint))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(endpoint, e))?;
        Self::check_status(endpoint, response).await
    }

    /// Render a template on the Home Assistant side
    pub async fn render_template(&self, template: &str, variables: &Value) -> Result<String> {
        let body = json!({"template": template, "variables": variables});
        self.rest_post("api/template", &body)
            .await?
            .text()
            .await
            .context("Failed to read rendered template")
    }

    async fn area_names(&self, entity_ids: &[String]) -> Result<Vec<Option<String>>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rendered = self
            .render_template(AREA_TEMPLATE, &json!({ "entity_ids": entity_ids }))
            .await?;
        let names: Vec<Option<String>> =
            serde_json::from_str(&rendered).context("Area lookup returned invalid JSON")?;
        if names.len() != entity_ids.len() {
            bail!(
                "Area lookup returned {} names for {} entities",
                names.len(),
                entity_ids.len()
            );
        }
        Ok(names)
    }

    fn service_body(entity_ids: &[String], data: Option<Map<String, Value>>) -> Value {
        let mut body = data.unwrap_or_default();
        body.insert("entity_id".into(), json!(entity_ids));
        Value::Object(body)
    }
}

fn display_name(state: &EntityState) -> String {
    state
        .attribute("friendly_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| state.entity_id.clone())
}

#[async_trait]
impl EntityDirectory for HomeAssistantClient {
    /// `aliases` stay empty: the REST API does not expose the entity registry.
    async fn exposed_entities(&self) -> Result<ExposedEntities> {
        let states: Vec<EntityState> = self
            .rest_get("api/states")
            .await?
            .json()
            .await
            .context("Failed to parse entity states")?;

        let mut exposed = ExposedEntities::default();
        let mut area_bound = Vec::new();

        for state in states {
            let Some((domain, _)) = split_domain(&state.entity_id) else {
                continue;
            };
            if !self.is_exposed(domain) {
                continue;
            }
            let name = display_name(&state);
            match domain {
                "scene" | "script" => {
                    let bucket = if domain == "scene" {
                        &mut exposed.scenes
                    } else {
                        &mut exposed.scripts
                    };
                    bucket.push(ExposedEntity {
                        entity_id: state.entity_id,
                        name,
                        state: None,
                        attributes: Map::new(),
                        aliases: Vec::new(),
                    });
                }
                "automation" => exposed.automations.push(ExposedEntity {
                    entity_id: state.entity_id,
                    name,
                    state: Some(state.state),
                    attributes: Map::new(),
                    aliases: Vec::new(),
                }),
                _ => area_bound.push(ExposedEntity {
                    entity_id: state.entity_id,
                    name,
                    state: Some(state.state),
                    attributes: state.attributes,
                    aliases: Vec::new(),
                }),
            }
        }

        let ids: Vec<String> = area_bound.iter().map(|e| e.entity_id.clone()).collect();
        let areas = self.area_names(&ids).await?;
        for (entity, area) in area_bound.into_iter().zip(areas) {
            let area = area.filter(|a| !a.is_empty());
            exposed.add_to_area(area.as_deref().unwrap_or(NO_AREA), entity);
        }

        info!(count = exposed.len(), "Loaded exposed entities");
        Ok(exposed)
    }

    async fn entity_state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        let endpoint = format!("api/states/{}", entity_id);
        let response = self
            .http
            .get(format!("{}/{}", self.url, endpoint))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.send_error(&endpoint, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let state = Self::check_status(&endpoint, response)
            .await?
            .json()
            .await
            .context("Failed to parse entity state")?;
        Ok(Some(state))
    }
}

#[async_trait]
impl ActionExecutor for HomeAssistantClient {
    async fn call_action(
        &self,
        entity_ids: &[String],
        domain: &str,
        action: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<ActionOutcome> {
        let endpoint = format!("api/services/{}/{}", domain, action);
        let body = Self::service_body(entity_ids, data);
        debug!(endpoint = %endpoint, body = %body, "Calling service");

        match self.rest_post(&endpoint, &body).await {
            Ok(_) => Ok(ActionOutcome::ok()),
            Err(e) => {
                error!(domain, action, entities = ?entity_ids, error = %e, "Service call failed");
                Ok(ActionOutcome::failed(entity_ids))
            }
        }
    }

    async fn query_action(
        &self,
        entity_ids: &[String],
        domain: &str,
        action: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let endpoint = format!("api/services/{}/{}?return_response", domain, action);
        let body = Self::service_body(entity_ids, data);
        debug!(endpoint = %endpoint, body = %body, "Calling service with response");

        let mut payload: Value = self
            .rest_post(&endpoint, &body)
            .await?
            .json()
            .await
            .context("Failed to parse service response")?;

        Ok(match payload.get_mut("service_response") {
            Some(inner) => inner.take(),
            None => payload,
        })
    }
}

#[async_trait]
impl PromptRenderer for HomeAssistantClient {
    async fn render(&self, template: &str, variables: &Value) -> Result<String, TemplateError> {
        self.render_template(template, variables)
            .await
            .map_err(|e| TemplateError(format!("{:#}", e)))
    }
}
