//! # Linked Document Sync
//!
//! Document collections raised on a linked sub-record are copied into the parent
//! case. Which collection lands where is a static table of [`DocumentCopyRule`]s;
//! the copy is a plain loop over that table, skipping documents the parent already
//! holds so a redelivered task copies nothing.

use super::{ExternalTaskData, TaskHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::models::{CaseRecord, ExternalTask, RecordRef};
use crate::record_store::OptimisticRecordUpdater;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

/// Who may see a copied collection on the parent case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentVisibility {
    /// Court staff only; always copied
    Staff,
    /// The party that raised the application
    Applicant,
    /// Other parties; only once the application has been served on them
    Respondent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCopyRule {
    pub source_field: &'static str,
    pub destination_field: &'static str,
    pub visibility: DocumentVisibility,
}

impl DocumentCopyRule {
    const fn new(
        source_field: &'static str,
        destination_field: &'static str,
        visibility: DocumentVisibility,
    ) -> Self {
        Self {
            source_field,
            destination_field,
            visibility,
        }
    }
}

pub const DOCUMENT_COPY_RULES: &[DocumentCopyRule] = &[
    DocumentCopyRule::new(
        "generalOrderDocument",
        "generalOrderDocStaff",
        DocumentVisibility::Staff,
    ),
    DocumentCopyRule::new(
        "generalOrderDocument",
        "generalOrderDocClaimant",
        DocumentVisibility::Applicant,
    ),
    DocumentCopyRule::new(
        "generalOrderDocument",
        "generalOrderDocRespondent",
        DocumentVisibility::Respondent,
    ),
    DocumentCopyRule::new("gaEvidenceDocument", "gaEvidenceDocStaff", DocumentVisibility::Staff),
    DocumentCopyRule::new(
        "gaEvidenceDocument",
        "gaEvidenceDocClaimant",
        DocumentVisibility::Applicant,
    ),
    DocumentCopyRule::new(
        "hearingNoticeDocument",
        "hearingNoticeDocStaff",
        DocumentVisibility::Staff,
    ),
    DocumentCopyRule::new(
        "hearingNoticeDocument",
        "hearingNoticeDocClaimant",
        DocumentVisibility::Applicant,
    ),
    DocumentCopyRule::new(
        "hearingNoticeDocument",
        "hearingNoticeDocRespondent",
        DocumentVisibility::Respondent,
    ),
];

/// Visibility facts read from the linked sub-record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityContext {
    pub served_on_respondent: bool,
}

impl VisibilityContext {
    pub const SERVED_FIELD: &'static str = "/isWithNotice";

    pub fn from_record(record: &CaseRecord) -> Self {
        let served_on_respondent = match record.field(Self::SERVED_FIELD) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("yes"),
            _ => false,
        };
        Self {
            served_on_respondent,
        }
    }

    pub fn allows(&self, visibility: DocumentVisibility) -> bool {
        match visibility {
            DocumentVisibility::Staff | DocumentVisibility::Applicant => true,
            DocumentVisibility::Respondent => self.served_on_respondent,
        }
    }
}

/// Copy every visible source collection into `destination`; returns the number of
/// documents added. Documents already present (by `id`, else by value) are skipped.
pub fn copy_documents(
    rules: &[DocumentCopyRule],
    source: &Value,
    destination: &mut Value,
    context: &VisibilityContext,
) -> HandlerResult<usize> {
    if destination.is_null() {
        *destination = Value::Object(Map::new());
    }
    let target = destination
        .as_object_mut()
        .ok_or_else(|| {
            HandlerError::InvalidInput("parent case data is not an object".to_string())
        })?;

    let mut copied = 0;
    for rule in rules {
        if !context.allows(rule.visibility) {
            continue;
        }
        let Some(documents) = source.get(rule.source_field).and_then(Value::as_array) else {
            continue;
        };

        let slot = target
            .entry(rule.destination_field)
            .or_insert_with(|| Value::Array(Vec::new()));
        let existing = slot.as_array_mut().ok_or_else(|| {
            HandlerError::InvalidInput(format!("{} is not a collection", rule.destination_field))
        })?;

        for document in documents {
            if !existing.iter().any(|held| same_document(held, document)) {
                existing.push(document.clone());
                copied += 1;
            }
        }
    }
    Ok(copied)
}

fn same_document(a: &Value, b: &Value) -> bool {
    match (a.get("id"), b.get("id")) {
        (Some(left), Some(right)) => left == right,
        _ => a == b,
    }
}

/// Copies document collections from the linked sub-record into its parent case
#[derive(Debug)]
pub struct SyncLinkedDocumentsHandler {
    topic: String,
    updater: OptimisticRecordUpdater,
    rules: &'static [DocumentCopyRule],
}

impl SyncLinkedDocumentsHandler {
    pub fn new(topic: impl Into<String>, updater: OptimisticRecordUpdater) -> Self {
        Self {
            topic: topic.into(),
            updater,
            rules: DOCUMENT_COPY_RULES,
        }
    }

    pub fn with_rules(mut self, rules: &'static [DocumentCopyRule]) -> Self {
        self.rules = rules;
        self
    }
}

#[async_trait]
impl TaskHandler for SyncLinkedDocumentsHandler {
    fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn execute(&self, task: &ExternalTask) -> HandlerResult<Option<ExternalTaskData>> {
        let parent_ref = RecordRef::primary(task.case_id()?);
        let linked_ref = RecordRef::linked(task.general_application_case_id()?);
        let event = task.case_event()?;

        let linked = self.updater.get(&linked_ref).await?;
        let context = VisibilityContext::from_record(&linked);

        let mut session = self.updater.start_update(parent_ref.clone(), &event).await?;
        let copied = copy_documents(
            self.rules,
            &linked.case_data,
            &mut session.record.case_data,
            &context,
        )?;

        if copied == 0 {
            debug!(parent = %parent_ref, linked = %linked_ref, "No new documents to copy");
            return Ok(Some(ExternalTaskData::unchanged(session.record).with_metadata("copied", 0)));
        }

        session.record.business_process.triggering_event = Some(event);
        let committed = self.updater.submit_update(session).await?;
        info!(
            parent = %parent_ref,
            linked = %linked_ref,
            copied,
            "Linked documents copied to parent case"
        );
        Ok(Some(ExternalTaskData::committed(committed).with_metadata("copied", copied)))
    }
}
