use crate::constants::variables;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Flow state derived from a case record, handed back to the engine on completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub name: String,
    pub flags: BTreeMap<String, bool>,
}

impl FlowState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.flags.insert(flag.into(), value);
        self
    }
}

/// Variable map passed to the engine when a task completes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessVariables(HashMap<String, Value>);

impl ProcessVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flow_state(flow_state: &FlowState) -> Self {
        let mut vars = Self::new();
        vars.insert(variables::FLOW_STATE, Value::String(flow_state.name.clone()));
        vars.insert(
            variables::FLOW_FLAGS,
            serde_json::to_value(&flow_state.flags).unwrap_or(Value::Null),
        );
        vars
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn flow_state(&self) -> Option<&str> {
        self.get(variables::FLOW_STATE).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.0
    }
}
