//! Flow state derivation for completion variables.
//!
//! Evaluating the full flow-state rules is a collaborator concern; the core only
//! needs something that maps a committed record to a [`FlowState`].

use crate::models::{CaseRecord, FlowState};
use serde_json::Value;

pub trait FlowStateResolver: Send + Sync {
    fn evaluate(&self, record: &CaseRecord) -> Option<FlowState>;
}

/// Reads the flow state name and flags from fields of the case payload
#[derive(Debug, Clone)]
pub struct FieldFlowStateResolver {
    name_pointer: String,
    flags_pointer: String,
}

impl Default for FieldFlowStateResolver {
    fn default() -> Self {
        Self::new("/flowState", "/flowFlags")
    }
}

impl FieldFlowStateResolver {
    pub fn new(name_pointer: impl Into<String>, flags_pointer: impl Into<String>) -> Self {
        Self {
            name_pointer: name_pointer.into(),
            flags_pointer: flags_pointer.into(),
        }
    }
}

impl FlowStateResolver for FieldFlowStateResolver {
    fn evaluate(&self, record: &CaseRecord) -> Option<FlowState> {
        let name = record.field(&self.name_pointer)?.as_str()?;
        let mut state = FlowState::new(name);

        if let Some(Value::Object(flags)) = record.field(&self.flags_pointer) {
            for (flag, value) in flags {
                if let Some(enabled) = value.as_bool() {
                    state = state.with_flag(flag.clone(), enabled);
                }
            }
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessProcess;

    #[test]
    fn test_reads_name_and_boolean_flags() {
        let record = CaseRecord::new("1", BusinessProcess::default()).with_case_data(
            serde_json::json!({
                "flowState": "MAIN.DRAFT",
                "flowFlags": {"ONE_RESPONDENT": true, "NOTE": "ignored"}
            }),
        );

        let state = FieldFlowStateResolver::default().evaluate(&record).unwrap();
        assert_eq!(state.name, "MAIN.DRAFT");
        assert_eq!(state.flags.len(), 1);
        assert_eq!(state.flags.get("ONE_RESPONDENT"), Some(&true));
    }

    #[test]
    fn test_missing_name_yields_none() {
        let record = CaseRecord::new("1", BusinessProcess::default());
        assert!(FieldFlowStateResolver::default().evaluate(&record).is_none());
    }
}
