use super::{
    errors::{StateMachineError, StateMachineResult},
    events::BusinessProcessEvent,
    states::BusinessProcessStatus,
};
use crate::models::BusinessProcess;
use chrono::Utc;
use tracing::debug;

/// Transition rules for the business process embedded in a case record.
///
/// The machine is pure: it rewrites the in-memory [`BusinessProcess`] and leaves
/// persistence to the caller's update session.
pub struct BusinessProcessStateMachine;

impl BusinessProcessStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current: BusinessProcessStatus,
        event: &BusinessProcessEvent,
    ) -> StateMachineResult<BusinessProcessStatus> {
        use BusinessProcessEvent as E;
        use BusinessProcessStatus as S;

        let target = match (current, event) {
            (S::NotStarted, E::Ready) => S::Ready,
            (S::Ready | S::Finished | S::Dispatched, E::Claim { .. }) => S::Started,
            (S::Started, E::Finish) => S::Finished,
            (S::Started, E::Dispatch) => S::Dispatched,
            (_, E::Fail { .. }) => S::Failed,
            (S::Failed, E::Resume { .. }) => S::Started,
            (S::Failed, E::Reset) => S::Ready,

            (from, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Apply `event` to `bp`, stamping ownership fields alongside the new status
    pub fn transition(
        bp: &mut BusinessProcess,
        event: &BusinessProcessEvent,
    ) -> StateMachineResult<BusinessProcessStatus> {
        let from = bp.status;
        let target = Self::determine_target_state(from, event)?;

        match event {
            BusinessProcessEvent::Claim { run_id } | BusinessProcessEvent::Resume { run_id } => {
                bp.process_instance_id = Some(run_id.clone());
                bp.failed_external_task_id = None;
            }
            BusinessProcessEvent::Fail {
                run_id,
                external_task_id,
            } => {
                bp.process_instance_id = Some(run_id.clone());
                bp.failed_external_task_id = Some(external_task_id.clone());
            }
            BusinessProcessEvent::Finish
            | BusinessProcessEvent::Dispatch
            | BusinessProcessEvent::Reset => {
                bp.process_instance_id = None;
                bp.failed_external_task_id = None;
            }
            BusinessProcessEvent::Ready => {}
        }

        bp.status = target;
        bp.last_updated = Some(Utc::now());

        debug!(
            from = %from,
            to = %target,
            event = event.event_type(),
            process_instance_id = ?bp.process_instance_id,
            "Business process transition"
        );

        Ok(target)
    }
}
