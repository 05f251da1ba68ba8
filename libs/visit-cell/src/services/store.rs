// libs/visit-cell/src/services/store.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared_models::{AppResult, UserRole};
use shared_utils::datetime::parse_wire;

use crate::models::{LogicalStatus, UpdateVisitRequest, VisitPatch, VisitRequest};
use crate::services::api::VisitApi;

pub type VisitSnapshot = Arc<Vec<VisitRequest>>;

#[derive(Debug, Clone, Copy)]
struct LoadStamp {
    role: UserRole,
    at: Instant,
}

/// Client-side cache of the last fetched visits.
///
/// Readers get an immutable snapshot; every mutation builds a new list and
/// swaps it in under the write lock, so a reader never observes a partially
/// applied change.
pub struct VisitStore {
    visits: RwLock<VisitSnapshot>,
    loaded: RwLock<Option<LoadStamp>>,
    cache_ttl: Duration,
}

impl VisitStore {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            visits: RwLock::new(Arc::new(Vec::new())),
            loaded: RwLock::new(None),
            cache_ttl,
        }
    }

    pub fn with_visits(visits: Vec<VisitRequest>) -> Self {
        Self {
            visits: RwLock::new(Arc::new(visits)),
            loaded: RwLock::new(None),
            cache_ttl: Duration::ZERO,
        }
    }

    /// Fetches the authoritative list for `role`. Without `force`, a list
    /// loaded for the same role within the cache TTL is reused. On failure
    /// the cache is left as it was.
    pub async fn load(&self, api: &dyn VisitApi, role: UserRole, force: bool) -> AppResult<VisitSnapshot> {
        if !force && self.is_fresh(role).await {
            debug!("Visit cache is fresh for {:?}, skipping fetch", role);
            return Ok(self.snapshot().await);
        }

        let fetched = api.list_visits(role).await?;
        info!("Loaded {} visits for {:?}", fetched.len(), role);

        let snapshot = Arc::new(fetched);
        *self.visits.write().await = Arc::clone(&snapshot);
        *self.loaded.write().await = Some(LoadStamp {
            role,
            at: Instant::now(),
        });
        Ok(snapshot)
    }

    async fn is_fresh(&self, role: UserRole) -> bool {
        match *self.loaded.read().await {
            Some(stamp) => stamp.role == role && stamp.at.elapsed() < self.cache_ttl,
            None => false,
        }
    }

    /// Forces the next non-forced `load` to hit the network.
    pub async fn invalidate(&self) {
        *self.loaded.write().await = None;
    }

    pub async fn snapshot(&self) -> VisitSnapshot {
        Arc::clone(&*self.visits.read().await)
    }

    pub async fn get(&self, visit_id: &str) -> Option<VisitRequest> {
        self.snapshot()
            .await
            .iter()
            .find(|visit| visit.has_id(visit_id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    pub async fn by_status(&self, status: LogicalStatus) -> Vec<VisitRequest> {
        self.snapshot()
            .await
            .iter()
            .filter(|visit| visit.status == status)
            .cloned()
            .collect()
    }

    /// Pending or accepted visits scheduled after `now`, soonest first.
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Vec<VisitRequest> {
        let mut upcoming: Vec<(DateTime<Utc>, VisitRequest)> = self
            .snapshot()
            .await
            .iter()
            .filter(|visit| !visit.status.is_terminal())
            .filter_map(|visit| {
                parse_wire(&visit.date_visite)
                    .ok()
                    .filter(|at| *at > now)
                    .map(|at| (at, visit.clone()))
            })
            .collect();
        upcoming.sort_by_key(|(at, _)| *at);
        upcoming.into_iter().map(|(_, visit)| visit).collect()
    }

    pub async fn apply_accept(&self, visit_id: &str) -> bool {
        self.set_status(visit_id, LogicalStatus::Accepted).await
    }

    pub async fn apply_reject(&self, visit_id: &str) -> bool {
        self.set_status(visit_id, LogicalStatus::Refused).await
    }

    pub async fn apply_cancel(&self, visit_id: &str) -> bool {
        self.set_status(visit_id, LogicalStatus::Refused).await
    }

    /// Removes the record with this id, keeping the order of the others.
    pub async fn apply_delete(&self, visit_id: &str) -> bool {
        self.mutate(|visits| match visits.iter().position(|v| v.has_id(visit_id)) {
            Some(index) => {
                visits.remove(index);
                true
            }
            None => false,
        })
        .await
    }

    /// Merges the edited fields that are present into the record.
    pub async fn apply_update(&self, visit_id: &str, update: &UpdateVisitRequest) -> bool {
        self.mutate(|visits| match visits.iter_mut().find(|v| v.has_id(visit_id)) {
            Some(visit) => {
                if let Some(date) = &update.date_visite {
                    visit.date_visite = date.clone();
                }
                if let Some(notes) = &update.notes {
                    visit.notes = Some(notes.clone());
                }
                if let Some(phone) = &update.contact_phone {
                    visit.contact_phone = Some(phone.clone());
                }
                true
            }
            None => false,
        })
        .await
    }

    pub async fn apply_review(&self, visit_id: &str, review_id: &str) -> bool {
        self.mutate(|visits| match visits.iter_mut().find(|v| v.has_id(visit_id)) {
            Some(visit) => {
                visit.review_id = Some(review_id.to_string());
                true
            }
            None => false,
        })
        .await
    }

    /// Merges a server reply into the cached record with this id. Fields the
    /// reply leaves out keep their cached value. A visit that is not cached,
    /// or a reply about another visit, leaves the store untouched.
    pub async fn apply_reply(&self, visit_id: &str, reply: &VisitPatch) -> bool {
        if !reply.concerns(visit_id) {
            warn!("Reply for visit {:?} ignored while updating {}", reply.id, visit_id);
            return false;
        }

        let merged = self
            .mutate(|visits| match visits.iter_mut().find(|v| v.has_id(visit_id)) {
                Some(visit) => {
                    reply.apply_to(visit);
                    true
                }
                None => false,
            })
            .await;

        if !merged {
            debug!("Visit {} not in store, server reply ignored", visit_id);
        }
        merged
    }

    /// Replaces the record with the same id, or appends it. Used for freshly
    /// created visits.
    pub async fn upsert(&self, record: VisitRequest) -> bool {
        let Some(visit_id) = record.id.clone() else {
            debug!("Ignoring visit record without id");
            return false;
        };

        self.mutate(move |visits| {
            match visits.iter_mut().find(|v| v.has_id(&visit_id)) {
                Some(existing) => *existing = record,
                None => visits.push(record),
            }
            true
        })
        .await
    }

    async fn set_status(&self, visit_id: &str, status: LogicalStatus) -> bool {
        let changed = self
            .mutate(|visits| match visits.iter_mut().find(|v| v.has_id(visit_id)) {
                Some(visit) => {
                    visit.status = status;
                    true
                }
                None => false,
            })
            .await;

        if !changed {
            debug!("Visit {} not in store, status update to {} ignored", visit_id, status);
        }
        changed
    }

    /// Copy-on-write: `f` edits a private copy which replaces the shared list
    /// only when it reports a change.
    async fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<VisitRequest>) -> bool,
    {
        let mut guard = self.visits.write().await;
        let mut next = (**guard).clone();
        let changed = f(&mut next);
        if changed {
            *guard = Arc::new(next);
        }
        changed
    }
}

impl Default for VisitStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use shared_models::AppError;

    use crate::models::{CreateVisitRequest, Review, SubmitReviewRequest, VisitPatch};

    fn visit(id: &str, status: LogicalStatus) -> VisitRequest {
        VisitRequest {
            id: Some(id.to_string()),
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

    struct CountingApi {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingApi {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl VisitApi for CountingApi {
        async fn list_visits(&self, _role: UserRole) -> AppResult<Vec<VisitRequest>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Network("offline".into()));
            }
            Ok(vec![visit("server", LogicalStatus::Pending)])
        }

        async fn create_visit(&self, _request: &CreateVisitRequest) -> AppResult<VisitRequest> {
            unimplemented!()
        }

        async fn accept_visit(&self, _visit_id: &str) -> AppResult<Option<VisitPatch>> {
            unimplemented!()
        }

        async fn reject_visit(&self, _visit_id: &str) -> AppResult<Option<VisitPatch>> {
            unimplemented!()
        }

        async fn cancel_visit(&self, _visit_id: &str) -> AppResult<Option<VisitPatch>> {
            unimplemented!()
        }

        async fn update_visit(
            &self,
            _visit_id: &str,
            _request: &UpdateVisitRequest,
        ) -> AppResult<Option<VisitPatch>> {
            unimplemented!()
        }

        async fn delete_visit(&self, _visit_id: &str) -> AppResult<()> {
            unimplemented!()
        }

        async fn list_reviews(&self, _visit_id: &str) -> AppResult<Vec<Review>> {
            unimplemented!()
        }

        async fn submit_review(&self, _visit_id: &str, _request: &SubmitReviewRequest) -> AppResult<Review> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_apply_accept_on_missing_id_is_noop() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);
        let before = store.snapshot().await;

        assert!(!store.apply_accept("missing").await);
        assert_eq!(*store.snapshot().await, *before);
    }

    #[tokio::test]
    async fn test_apply_accept_only_touches_target() {
        let store = VisitStore::with_visits(vec![
            visit("1", LogicalStatus::Pending),
            visit("2", LogicalStatus::Pending),
        ]);

        assert!(store.apply_accept("1").await);
        assert_eq!(store.get("1").await.unwrap().status, LogicalStatus::Accepted);
        assert_eq!(store.get("2").await.unwrap().status, LogicalStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_reject_scenario() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);
        store.apply_reject("1").await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, LogicalStatus::Refused);
        assert!(!snapshot[0].is_chat_available());
        assert_eq!(serde_json::to_value(&snapshot[0]).unwrap()["status"], "refused");
    }

    #[tokio::test]
    async fn test_apply_cancel_moves_to_refused() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Accepted)]);
        store.apply_cancel("1").await;
        assert_eq!(store.get("1").await.unwrap().status, LogicalStatus::Refused);
    }

    #[tokio::test]
    async fn test_apply_delete_preserves_order() {
        let store = VisitStore::with_visits(vec![
            visit("a", LogicalStatus::Pending),
            visit("b", LogicalStatus::Accepted),
            visit("c", LogicalStatus::Refused),
        ]);

        assert!(store.apply_delete("b").await);
        let ids: Vec<_> = store
            .snapshot()
            .await
            .iter()
            .map(|v| v.id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!store.apply_delete("b").await);
    }

    #[tokio::test]
    async fn test_filter_by_status() {
        let store = VisitStore::with_visits(vec![
            visit("p", LogicalStatus::Pending),
            visit("a", LogicalStatus::Accepted),
            visit("r", LogicalStatus::Refused),
            visit("c", LogicalStatus::Completed),
        ]);

        let accepted = store.by_status(LogicalStatus::Accepted).await;
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_apply_update_merges_present_fields() {
        let mut original = visit("1", LogicalStatus::Pending);
        original.notes = Some("old".into());
        original.contact_phone = Some("+33 1 23 45 67 89".into());
        let store = VisitStore::with_visits(vec![original]);

        let update = UpdateVisitRequest {
            date_visite: Some("2030-02-02T09:00:00.000Z".into()),
            notes: None,
            contact_phone: Some("+216 22 333 444".into()),
        };
        assert!(store.apply_update("1", &update).await);

        let updated = store.get("1").await.unwrap();
        assert_eq!(updated.date_visite, "2030-02-02T09:00:00.000Z");
        assert_eq!(updated.notes.as_deref(), Some("old"));
        assert_eq!(updated.contact_phone.as_deref(), Some("+216 22 333 444"));
    }

    #[tokio::test]
    async fn test_snapshot_is_not_affected_by_later_writes() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);
        let before = store.snapshot().await;

        store.apply_accept("1").await;

        assert_eq!(before[0].status, LogicalStatus::Pending);
        assert_eq!(store.snapshot().await[0].status, LogicalStatus::Accepted);
    }

    #[tokio::test]
    async fn test_upsert_replaces_or_appends() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);

        let mut server_copy = visit("1", LogicalStatus::Accepted);
        server_copy.notes = Some("confirmé par le propriétaire".into());
        assert!(store.upsert(server_copy).await);
        assert!(store.upsert(visit("2", LogicalStatus::Pending)).await);

        let mut no_id = visit("x", LogicalStatus::Pending);
        no_id.id = None;
        assert!(!store.upsert(no_id).await);

        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("1").await.unwrap().status, LogicalStatus::Accepted);
    }

    #[tokio::test]
    async fn test_apply_reply_never_appends() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);
        let before = store.snapshot().await;

        let stranger = VisitPatch {
            id: Some("9".into()),
            status: Some(LogicalStatus::Accepted),
            ..Default::default()
        };
        assert!(!store.apply_reply("9", &stranger).await);
        assert!(!store.apply_reply("1", &stranger).await);

        assert!(Arc::ptr_eq(&before, &store.snapshot().await));
    }

    #[tokio::test]
    async fn test_apply_reply_merges_present_fields() {
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Pending)]);
        let reply = VisitPatch {
            id: Some("1".into()),
            status: Some(LogicalStatus::Accepted),
            ..Default::default()
        };

        assert!(store.apply_reply("1", &reply).await);

        let merged = store.get("1").await.unwrap();
        assert_eq!(merged.status, LogicalStatus::Accepted);
        assert_eq!(merged.logement_id, "l1");
        assert_eq!(merged.date_visite, "2030-01-01T10:00:00.000Z");
    }

    #[tokio::test]
    async fn test_upcoming_skips_terminal_and_past() {
        let mut past = visit("past", LogicalStatus::Pending);
        past.date_visite = "2020-01-01T10:00:00.000Z".into();
        let mut later = visit("later", LogicalStatus::Accepted);
        later.date_visite = "2031-01-01T10:00:00.000Z".into();
        let sooner = visit("sooner", LogicalStatus::Pending);
        let refused = visit("refused", LogicalStatus::Refused);

        let store = VisitStore::with_visits(vec![past, later, sooner, refused]);
        let now = parse_wire("2025-01-01T00:00:00.000Z").unwrap();

        let ids: Vec<_> = store
            .upcoming(now)
            .await
            .into_iter()
            .map(|v| v.id.unwrap())
            .collect();
        assert_eq!(ids, vec!["sooner", "later"]);
    }

    #[tokio::test]
    async fn test_load_uses_cache_until_forced() {
        let api = CountingApi::new(false);
        let store = VisitStore::new(Duration::from_secs(60));

        store.load(&api, UserRole::Requester, false).await.unwrap();
        store.load(&api, UserRole::Requester, false).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        store.load(&api, UserRole::Requester, true).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        store.load(&api, UserRole::Owner, false).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_cache() {
        let api = CountingApi::new(true);
        let store = VisitStore::with_visits(vec![visit("1", LogicalStatus::Accepted)]);

        let result = store.load(&api, UserRole::Requester, true).await;
        assert!(matches!(result, Err(AppError::Network(_))));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("1").await.unwrap().status, LogicalStatus::Accepted);
    }
}
