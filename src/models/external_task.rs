use crate::constants::variables;
use crate::error::{HandlerError, HandlerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A locked unit of work fetched from the orchestration engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTask {
    pub id: String,
    pub topic_name: String,
    pub worker_id: String,
    /// Correlation id of the orchestration run this task belongs to
    pub process_instance_id: String,
    #[serde(default)]
    pub activity_id: Option<String>,
    /// Retries left as tracked by the engine; absent on the first attempt
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub business_key: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl ExternalTask {
    pub fn new(
        id: impl Into<String>,
        topic_name: impl Into<String>,
        process_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            topic_name: topic_name.into(),
            worker_id: String::new(),
            process_instance_id: process_instance_id.into(),
            activity_id: None,
            retries: None,
            business_key: None,
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// String form of a variable; numeric ids are accepted as well
    pub fn string_variable(&self, name: &str) -> Option<String> {
        match self.variables.get(name)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn required_variable(&self, name: &str) -> HandlerResult<String> {
        self.string_variable(name).ok_or_else(|| {
            HandlerError::InvalidInput(format!(
                "external task {} is missing variable '{name}'",
                self.id
            ))
        })
    }

    pub fn case_id(&self) -> HandlerResult<String> {
        self.required_variable(variables::CASE_ID)
    }

    /// The logical event that caused this unit of work
    pub fn case_event(&self) -> HandlerResult<String> {
        self.required_variable(variables::CASE_EVENT)
    }

    pub fn general_application_case_id(&self) -> HandlerResult<String> {
        self.required_variable(variables::GENERAL_APPLICATION_CASE_ID)
    }
}
