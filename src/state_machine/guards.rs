use super::errors::{GuardError, GuardResult};
use super::states::BusinessProcessStatus;
use crate::models::BusinessProcess;

/// Trait for implementing state transition guards
pub trait StateGuard<T> {
    type Decision;

    /// Decide whether the transition may go ahead
    fn check(&self, entity: &T) -> Self::Decision;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Outcome of a fresh task trying to claim a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimDecision {
    /// The record is free; stamp the run and move to STARTED
    Proceed,
    /// Same run already holds the record: a redelivered task
    DuplicateDelivery,
    /// Another run (or an unidentified one) holds the record; leave it untouched
    AlreadyClaimed { owner: Option<String> },
    /// The record is in a status no run may claim from
    Rejected { status: BusinessProcessStatus },
}

/// Claim-ownership check applied before a run starts new work on a record.
///
/// Redelivery of the same task must never apply the claim twice, and a record held
/// by another run is never overwritten.
pub struct ClaimGuard<'a> {
    run_id: &'a str,
}

impl<'a> ClaimGuard<'a> {
    pub fn new(run_id: &'a str) -> Self {
        Self { run_id }
    }
}

impl StateGuard<BusinessProcess> for ClaimGuard<'_> {
    type Decision = ClaimDecision;

    fn check(&self, bp: &BusinessProcess) -> ClaimDecision {
        match bp.status {
            BusinessProcessStatus::Finished | BusinessProcessStatus::Dispatched => {
                ClaimDecision::Proceed
            }
            BusinessProcessStatus::Started if bp.is_owned_by(self.run_id) => {
                ClaimDecision::DuplicateDelivery
            }
            BusinessProcessStatus::Started => ClaimDecision::AlreadyClaimed {
                owner: bp.process_instance_id.clone(),
            },
            status => ClaimDecision::Rejected { status },
        }
    }

    fn description(&self) -> &'static str {
        "Record must be free or finished before a new run claims it"
    }
}

/// How the owning run may continue on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDecision {
    /// The run holds a started process
    Owned,
    /// The run failed earlier and was re-triggered; resume before continuing
    Resume,
}

/// Only the owning run may mutate or end its business process
pub struct OwnershipGuard<'a> {
    run_id: &'a str,
}

impl<'a> OwnershipGuard<'a> {
    pub fn new(run_id: &'a str) -> Self {
        Self { run_id }
    }
}

impl StateGuard<BusinessProcess> for OwnershipGuard<'_> {
    type Decision = GuardResult<OwnershipDecision>;

    fn check(&self, bp: &BusinessProcess) -> GuardResult<OwnershipDecision> {
        let decision = match bp.status {
            BusinessProcessStatus::Started => OwnershipDecision::Owned,
            BusinessProcessStatus::Failed => OwnershipDecision::Resume,
            status => {
                return Err(GuardError::InvalidState {
                    state: status.to_string(),
                    expected: BusinessProcessStatus::Started.to_string(),
                })
            }
        };
        if !bp.is_owned_by(self.run_id) {
            return Err(GuardError::NotOwner {
                run_id: self.run_id.to_string(),
                owner: bp.process_instance_id.clone(),
            });
        }
        Ok(decision)
    }

    fn description(&self) -> &'static str {
        "Business process must be started or failed by this run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(status: BusinessProcessStatus, owner: Option<&str>) -> BusinessProcess {
        BusinessProcess {
            status,
            process_instance_id: owner.map(str::to_string),
            ..BusinessProcess::default()
        }
    }

    #[test]
    fn test_finished_and_dispatched_proceed() {
        let guard = ClaimGuard::new("run-x");
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Finished, Some("old"))),
            ClaimDecision::Proceed
        );
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Dispatched, None)),
            ClaimDecision::Proceed
        );
    }

    #[test]
    fn test_same_run_is_duplicate_delivery() {
        let guard = ClaimGuard::new("run-x");
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Started, Some("run-x"))),
            ClaimDecision::DuplicateDelivery
        );
    }

    #[test]
    fn test_other_or_absent_owner_is_already_claimed() {
        let guard = ClaimGuard::new("run-x");
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Started, Some("run-y"))),
            ClaimDecision::AlreadyClaimed {
                owner: Some("run-y".to_string())
            }
        );
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Started, None)),
            ClaimDecision::AlreadyClaimed { owner: None }
        );
    }

    #[test]
    fn test_other_statuses_rejected() {
        let guard = ClaimGuard::new("run-x");
        for status in [
            BusinessProcessStatus::NotStarted,
            BusinessProcessStatus::Ready,
            BusinessProcessStatus::Failed,
        ] {
            assert_eq!(
                guard.check(&bp(status, Some("run-x"))),
                ClaimDecision::Rejected { status }
            );
        }
    }

    #[test]
    fn test_ownership_guard() {
        let guard = OwnershipGuard::new("run-x");
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Started, Some("run-x"))),
            Ok(OwnershipDecision::Owned)
        );
        assert!(matches!(
            guard.check(&bp(BusinessProcessStatus::Started, Some("run-y"))),
            Err(GuardError::NotOwner { .. })
        ));
        assert!(matches!(
            guard.check(&bp(BusinessProcessStatus::Finished, Some("run-x"))),
            Err(GuardError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_run_resumes_only_for_its_owner() {
        let guard = OwnershipGuard::new("run-x");
        assert_eq!(
            guard.check(&bp(BusinessProcessStatus::Failed, Some("run-x"))),
            Ok(OwnershipDecision::Resume)
        );
        assert!(matches!(
            guard.check(&bp(BusinessProcessStatus::Failed, Some("run-y"))),
            Err(GuardError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_guard_descriptions() {
        assert_eq!(
            OwnershipGuard::new("r").description(),
            "Business process must be started or failed by this run"
        );
    }
}
