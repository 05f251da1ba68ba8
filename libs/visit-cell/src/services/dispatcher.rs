// libs/visit-cell/src/services/dispatcher.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use shared_models::{AppError, AppResult, SessionContext};

use crate::models::{
    CreateVisitRequest, LogicalStatus, Review, SubmitReviewRequest, UpdateVisitRequest,
    VisitActions, VisitRequest,
};
use crate::services::api::VisitApi;
use crate::services::lifecycle::{VisitAction, VisitLifecycleService};
use crate::services::store::{VisitSnapshot, VisitStore};

/// Turns user intents into exactly one remote call each and reconciles the
/// store with the outcome. At most one mutating call per visit id is
/// outstanding at a time.
pub struct VisitActionDispatcher {
    api: Arc<dyn VisitApi>,
    store: Arc<VisitStore>,
    session: SessionContext,
    lifecycle: VisitLifecycleService,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a visit id busy until dropped.
struct InFlightGuard {
    visit_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_ids(&self.in_flight).remove(&self.visit_id);
    }
}

fn lock_ids(ids: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    // The set stays consistent even if a holder panicked.
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl VisitActionDispatcher {
    pub fn new(api: Arc<dyn VisitApi>, store: Arc<VisitStore>, session: SessionContext) -> Self {
        Self {
            api,
            store,
            session,
            lifecycle: VisitLifecycleService::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<VisitStore> {
        &self.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_in_flight(&self, visit_id: &str) -> bool {
        lock_ids(&self.in_flight).contains(visit_id)
    }

    fn begin(&self, visit_id: &str) -> AppResult<InFlightGuard> {
        let mut ids = lock_ids(&self.in_flight);
        if !ids.insert(visit_id.to_string()) {
            warn!("Action already in flight for visit {}", visit_id);
            return Err(AppError::Conflict(format!(
                "An action is already pending for visit {}",
                visit_id
            )));
        }
        Ok(InFlightGuard {
            visit_id: visit_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Affordances for one cached visit; everything is disabled while an
    /// action for it is outstanding.
    pub async fn available_actions(&self, visit_id: &str) -> Option<VisitActions> {
        let visit = self.store.get(visit_id).await?;
        if self.is_in_flight(visit_id) {
            return Some(VisitActions::none());
        }
        Some(self.lifecycle.available_actions(&visit, self.session.role))
    }

    pub async fn refresh(&self, force: bool) -> AppResult<VisitSnapshot> {
        self.store
            .load(self.api.as_ref(), self.session.role, force)
            .await
            .map_err(|e| {
                error!("Failed to load visits: {}", e);
                e
            })
    }

    pub async fn create(&self, request: CreateVisitRequest) -> AppResult<VisitRequest> {
        // Validate before touching the network.
        request.to_body()?;

        let created = self.api.create_visit(&request).await?;
        if !self.store.upsert(created.clone()).await {
            // Server replied without an id; the next load brings the record in.
            self.store.invalidate().await;
        }
        Ok(created)
    }

    pub async fn accept(&self, visit_id: &str) -> AppResult<()> {
        self.require_owner("accept")?;
        self.status_action(visit_id, VisitAction::Accept).await
    }

    pub async fn reject(&self, visit_id: &str) -> AppResult<()> {
        self.require_owner("reject")?;
        self.status_action(visit_id, VisitAction::Reject).await
    }

    pub async fn cancel(&self, visit_id: &str) -> AppResult<()> {
        self.status_action(visit_id, VisitAction::Cancel).await
    }

    async fn status_action(&self, visit_id: &str, action: VisitAction) -> AppResult<()> {
        let _guard = self.begin(visit_id)?;

        if let Some(current) = self.store.get(visit_id).await {
            if self.lifecycle.next_status(current.status, action).is_none() {
                // The server decides; a stale cache must not block a re-sync.
                debug!(
                    "{:?} requested on visit {} cached as {}",
                    action, visit_id, current.status
                );
            }
        }

        let result = match action {
            VisitAction::Accept => self.api.accept_visit(visit_id).await,
            VisitAction::Reject => self.api.reject_visit(visit_id).await,
            VisitAction::Cancel => self.api.cancel_visit(visit_id).await,
        };

        let updated = result.map_err(|e| {
            error!("{:?} failed for visit {}: {}", action, visit_id, e);
            e
        })?;

        // A reply carrying a status is authoritative; otherwise the expected
        // transition is applied locally. Both are no-ops for uncached ids.
        let reply_has_status = updated.as_ref().is_some_and(|reply| reply.status.is_some());
        if !reply_has_status {
            match action {
                VisitAction::Accept => self.store.apply_accept(visit_id).await,
                VisitAction::Reject => self.store.apply_reject(visit_id).await,
                VisitAction::Cancel => self.store.apply_cancel(visit_id).await,
            };
        }
        if let Some(reply) = &updated {
            self.store.apply_reply(visit_id, reply).await;
        }

        info!("{:?} applied to visit {}", action, visit_id);
        Ok(())
    }

    pub async fn update(&self, visit_id: &str, request: UpdateVisitRequest) -> AppResult<()> {
        let update = request.validated()?;
        let _guard = self.begin(visit_id)?;

        let updated = self.api.update_visit(visit_id, &update).await.map_err(|e| {
            error!("Update failed for visit {}: {}", visit_id, e);
            e
        })?;

        self.store.apply_update(visit_id, &update).await;
        if let Some(reply) = &updated {
            self.store.apply_reply(visit_id, reply).await;
        }

        info!("Visit {} updated", visit_id);
        Ok(())
    }

    pub async fn delete(&self, visit_id: &str) -> AppResult<()> {
        let _guard = self.begin(visit_id)?;

        self.api.delete_visit(visit_id).await.map_err(|e| {
            error!("Delete failed for visit {}: {}", visit_id, e);
            e
        })?;

        self.store.apply_delete(visit_id).await;
        info!("Visit {} deleted", visit_id);
        Ok(())
    }

    /// Reviews are only fetched once the visit carries a `reviewId`. A
    /// permission denial (403) reads as "no reviews"; an invalid or expired
    /// token (401) is surfaced.
    pub async fn fetch_reviews(&self, visit_id: &str) -> AppResult<Vec<Review>> {
        let visit = self.cached(visit_id).await?;
        if !visit.has_review() {
            debug!("Visit {} has no review yet", visit_id);
            return Ok(Vec::new());
        }

        match self.api.list_reviews(visit_id).await {
            Ok(reviews) => Ok(reviews),
            Err(AppError::Forbidden(message)) => {
                warn!("Not allowed to read reviews of visit {}: {}", visit_id, message);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn submit_review(&self, visit_id: &str, request: SubmitReviewRequest) -> AppResult<Review> {
        request.to_body()?;

        let visit = self.cached(visit_id).await?;
        if visit.status != LogicalStatus::Completed {
            return Err(AppError::ValidationError(
                "Seule une visite terminée peut être évaluée".to_string(),
            ));
        }
        if visit.has_review() {
            return Err(AppError::ValidationError(
                "Cette visite a déjà été évaluée".to_string(),
            ));
        }

        let _guard = self.begin(visit_id)?;
        let review = self.api.submit_review(visit_id, &request).await?;
        self.store.apply_review(visit_id, &review.id).await;

        info!("Review {} submitted for visit {}", review.id, visit_id);
        Ok(review)
    }

    async fn cached(&self, visit_id: &str) -> AppResult<VisitRequest> {
        self.store
            .get(visit_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Visit {} is not loaded", visit_id)))
    }

    fn require_owner(&self, action: &str) -> AppResult<()> {
        if self.session.is_owner() {
            Ok(())
        } else {
            Err(AppError::ValidationError(format!(
                "Only the listing owner can {} a visit",
                action
            )))
        }
    }
}
