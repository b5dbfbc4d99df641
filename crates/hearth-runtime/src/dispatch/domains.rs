//! Entity-id validation, grouping by domain and batched execution.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, error};

use super::result::ToolCallResult;
use crate::host::ActionExecutor;

const DOMAIN_SEPARATOR: char = '.';

/// Split `light.kitchen` into (`light`, `kitchen`); both halves must be non-empty
pub fn split_domain(entity_id: &str) -> Option<(&str, &str)> {
    let (domain, object_id) = entity_id.split_once(DOMAIN_SEPARATOR)?;
    if domain.is_empty() || object_id.is_empty() {
        return None;
    }
    Some((domain, object_id))
}

/// Entity ids grouped by domain, in domain order
pub type DomainGroups = BTreeMap<String, Vec<String>>;

/// Validate entity ids against a tool's supported domains.
///
/// Ids without a domain and ids whose domain is not allowed are recorded in
/// the returned result; the remaining ids are grouped by domain.
pub fn partition_by_domain(entity_ids: &[String], supported: &[&str]) -> (DomainGroups, ToolCallResult) {
    let mut groups = DomainGroups::new();
    let mut result = ToolCallResult::new();

    for entity_id in entity_ids {
        let Some((domain, _)) = split_domain(entity_id) else {
            result.add_missing_domain(entity_id);
            continue;
        };
        if !supported.contains(&domain) {
            result.add_unsupported_domain(entity_id);
            continue;
        }
        groups
            .entry(domain.to_string())
            .or_default()
            .push(entity_id.clone());
    }

    (groups, result)
}

/// Invoke the executor once per domain group and fold outcomes into `result`
pub async fn call_by_domain(
    executor: &dyn ActionExecutor,
    groups: &DomainGroups,
    action: &str,
    data: Option<Map<String, Value>>,
    result: &mut ToolCallResult,
) {
    for (domain, ids) in groups {
        debug!(domain = %domain, action, entities = ?ids, "Calling action");
        match executor.call_action(ids, domain, action, data.clone()).await {
            Ok(outcome) => result.record_outcome(ids, &outcome),
            Err(e) => {
                error!(domain = %domain, action, error = %e, "Action call failed");
                result.add_errored(ids.iter().cloned());
            }
        }
    }
}

/// Validate, group and execute `action` over a list of entities
pub async fn execute_for_entities(
    executor: &dyn ActionExecutor,
    entity_ids: &[String],
    supported: &[&str],
    action: &str,
    data: Option<Map<String, Value>>,
) -> ToolCallResult {
    let (groups, mut result) = partition_by_domain(entity_ids, supported);
    call_by_domain(executor, &groups, action, data, &mut result).await;
    result
}

/// Single-entity variant of `execute_for_entities`
pub async fn execute_for_entity(
    executor: &dyn ActionExecutor,
    entity_id: &str,
    supported: &[&str],
    action: &str,
    data: Option<Map<String, Value>>,
) -> ToolCallResult {
    execute_for_entities(executor, &[entity_id.to_string()], supported, action, data).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_domain() {
        assert_eq!(split_domain("light.kitchen"), Some(("light", "kitchen")));
        assert_eq!(split_domain("media_player.tv.2"), Some(("media_player", "tv.2")));
        assert_eq!(split_domain("kitchen"), None);
        assert_eq!(split_domain(".kitchen"), None);
        assert_eq!(split_domain("light."), None);
    }

    #[test]
    fn test_partition_groups_by_domain() {
        let (groups, result) = partition_by_domain(
            &ids(&["light.a", "switch.b", "light.c"]),
            &["light", "switch"],
        );
        assert!(result.success);
        assert_eq!(groups["light"], ids(&["light.a", "light.c"]));
        assert_eq!(groups["switch"], ids(&["switch.b"]));
    }

    #[test]
    fn test_partition_records_validation_failures() {
        let (groups, result) = partition_by_domain(
            &ids(&["bad_id_no_domain", "sensor.temp", "light.a"]),
            &["light"],
        );
        assert!(!result.success);
        assert!(result.entities_missing_domain.contains("bad_id_no_domain"));
        assert!(result.entities_with_unsupported_domain.contains("sensor.temp"));
        assert_eq!(groups.len(), 1);
    }
}
