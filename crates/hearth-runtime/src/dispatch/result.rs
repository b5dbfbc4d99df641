use std::collections::BTreeSet;
use std::fmt;

use crate::host::ActionOutcome;

/// Aggregated outcome of a tool call over a set of entities.
///
/// `success` is true iff no validation failure was recorded and every
/// action call succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub success: bool,
    pub errored_entities: BTreeSet<String>,
    pub entities_missing_domain: BTreeSet<String>,
    pub entities_with_unsupported_domain: BTreeSet<String>,
    call_failed: bool,
}

impl Default for ToolCallResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallResult {
    pub fn new() -> Self {
        Self {
            success: true,
            errored_entities: BTreeSet::new(),
            entities_missing_domain: BTreeSet::new(),
            entities_with_unsupported_domain: BTreeSet::new(),
            call_failed: false,
        }
    }

    pub fn add_missing_domain(&mut self, entity_id: &str) {
        self.entities_missing_domain.insert(entity_id.to_string());
        self.refresh();
    }

    pub fn add_unsupported_domain(&mut self, entity_id: &str) {
        self.entities_with_unsupported_domain
            .insert(entity_id.to_string());
        self.refresh();
    }

    /// Mark entities whose action failed
    pub fn add_errored<I, S>(&mut self, entity_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errored_entities
            .extend(entity_ids.into_iter().map(Into::into));
        self.call_failed = true;
        self.refresh();
    }

    /// Fold in the outcome of one batched call over `entity_ids`
    pub fn record_outcome(&mut self, entity_ids: &[String], outcome: &ActionOutcome) {
        if outcome.success {
            return;
        }
        if outcome.failed_entity_ids.is_empty() {
            self.add_errored(entity_ids.iter().cloned());
        } else {
            self.add_errored(outcome.failed_entity_ids.iter().cloned());
        }
    }

    /// Merge another result (e.g. a preparatory call) into this one
    pub fn merge(&mut self, other: ToolCallResult) {
        self.errored_entities.extend(other.errored_entities);
        self.entities_missing_domain
            .extend(other.entities_missing_domain);
        self.entities_with_unsupported_domain
            .extend(other.entities_with_unsupported_domain);
        self.call_failed |= other.call_failed;
        self.refresh();
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.entities_missing_domain.is_empty() || !self.entities_with_unsupported_domain.is_empty()
    }

    fn refresh(&mut self) {
        self.success = !self.call_failed && !self.has_validation_errors();
    }
}

fn join(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ToolCallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.success { "Success" } else { "Failure" })?;
        if !self.errored_entities.is_empty() {
            write!(
                f,
                ", an error occurred for the following entity IDs: {}",
                join(&self.errored_entities)
            )?;
        }
        if !self.entities_missing_domain.is_empty() {
            write!(
                f,
                ", the following entity IDs are missing a valid domain: {}",
                join(&self.entities_missing_domain)
            )?;
        }
        if !self.entities_with_unsupported_domain.is_empty() {
            write!(
                f,
                ", the following entity IDs have a domain that is not supported by this tool: {}",
                join(&self.entities_with_unsupported_domain)
            )?;
        }
        Ok(())
    }
}
