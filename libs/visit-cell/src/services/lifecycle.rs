// libs/visit-cell/src/services/lifecycle.rs
use tracing::debug;

use shared_models::UserRole;

use crate::models::{LogicalStatus, VisitActions, VisitRequest};

/// Client-initiated actions that move a visit between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    Accept,
    Reject,
    Cancel,
}

pub struct VisitLifecycleService;

impl VisitLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Status the server is expected to report after a successful `action`.
    /// `None` when the action is not offered from `current`. Nothing here
    /// leads into `Completed`: that transition is server-driven only.
    pub fn next_status(&self, current: LogicalStatus, action: VisitAction) -> Option<LogicalStatus> {
        match (current, action) {
            (LogicalStatus::Pending, VisitAction::Accept) => Some(LogicalStatus::Accepted),
            (LogicalStatus::Pending, VisitAction::Reject) => Some(LogicalStatus::Refused),
            (LogicalStatus::Accepted, VisitAction::Cancel) => Some(LogicalStatus::Refused),
            _ => None,
        }
    }

    pub fn get_valid_actions(&self, current: LogicalStatus) -> Vec<VisitAction> {
        [VisitAction::Accept, VisitAction::Reject, VisitAction::Cancel]
            .into_iter()
            .filter(|action| self.next_status(current, *action).is_some())
            .collect()
    }

    pub fn available_actions(&self, visit: &VisitRequest, role: UserRole) -> VisitActions {
        let status = visit.status;
        let is_owner = role == UserRole::Owner;
        let valid = self.get_valid_actions(status);

        let actions = VisitActions {
            accept: is_owner && valid.contains(&VisitAction::Accept),
            reject: is_owner && valid.contains(&VisitAction::Reject),
            cancel: valid.contains(&VisitAction::Cancel),
            edit: matches!(status, LogicalStatus::Pending | LogicalStatus::Accepted),
            delete: visit.id.is_some(),
            chat: visit.is_chat_available(),
            review: !is_owner && status == LogicalStatus::Completed && !visit.has_review(),
        };

        debug!("Actions for visit {:?} ({}): {:?}", visit.id, status, actions);
        actions
    }
}

impl Default for VisitLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(status: LogicalStatus) -> VisitRequest {
        VisitRequest {
            id: Some("1".to_string()),
            logement_id: "l1".to_string(),
            logement_title: None,
            client_username: None,
            date_visite: "2030-01-01T10:00:00.000Z".to_string(),
            status,
            notes: None,
            contact_phone: None,
            review_id: None,
        }
    }

    #[test]
    fn test_transition_table() {
        let lifecycle = VisitLifecycleService::new();

        assert_eq!(
            lifecycle.next_status(LogicalStatus::Pending, VisitAction::Accept),
            Some(LogicalStatus::Accepted)
        );
        assert_eq!(
            lifecycle.next_status(LogicalStatus::Pending, VisitAction::Reject),
            Some(LogicalStatus::Refused)
        );
        assert_eq!(
            lifecycle.next_status(LogicalStatus::Accepted, VisitAction::Cancel),
            Some(LogicalStatus::Refused)
        );
        assert!(lifecycle.get_valid_actions(LogicalStatus::Completed).is_empty());
        assert!(lifecycle.get_valid_actions(LogicalStatus::Refused).is_empty());
    }

    #[test]
    fn test_no_client_transition_into_completed() {
        let lifecycle = VisitLifecycleService::new();
        for status in LogicalStatus::ALL {
            for action in [VisitAction::Accept, VisitAction::Reject, VisitAction::Cancel] {
                assert_ne!(lifecycle.next_status(status, action), Some(LogicalStatus::Completed));
            }
        }
    }

    #[test]
    fn test_owner_sees_decision_buttons_on_pending() {
        let actions = VisitLifecycleService::new().available_actions(&visit(LogicalStatus::Pending), UserRole::Owner);
        assert!(actions.accept && actions.reject);
        assert!(!actions.chat);

        let requester = VisitLifecycleService::new().available_actions(&visit(LogicalStatus::Pending), UserRole::Requester);
        assert!(!requester.accept && !requester.reject);
        assert!(requester.edit);
    }

    #[test]
    fn test_refused_hides_actions_and_chat() {
        let actions = VisitLifecycleService::new().available_actions(&visit(LogicalStatus::Refused), UserRole::Owner);
        assert!(!actions.has_status_actions());
        assert!(!actions.chat);
        assert!(!actions.edit);
    }

    #[test]
    fn test_completed_allows_single_review() {
        let lifecycle = VisitLifecycleService::new();
        let mut completed = visit(LogicalStatus::Completed);

        let actions = lifecycle.available_actions(&completed, UserRole::Requester);
        assert!(actions.review);
        assert!(!actions.has_status_actions());

        completed.review_id = Some("r1".to_string());
        assert!(!lifecycle.available_actions(&completed, UserRole::Requester).review);
    }
}
