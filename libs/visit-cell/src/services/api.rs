use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};
use urlencoding::encode;

use shared_api::RestClient;
use shared_config::AppConfig;
use shared_models::{AppResult, UserRole};

use crate::models::{
    CreateVisitRequest, Review, SubmitReviewRequest, UpdateVisitRequest, VisitPatch, VisitRequest,
};

/// Remote operations on visits. The store and dispatcher only see this trait.
#[async_trait]
pub trait VisitApi: Send + Sync {
    async fn list_visits(&self, role: UserRole) -> AppResult<Vec<VisitRequest>>;

    async fn create_visit(&self, request: &CreateVisitRequest) -> AppResult<VisitRequest>;

    /// The status calls may answer with some or all of the updated record,
    /// or with a bare acknowledgement (`None`).
    async fn accept_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>>;

    async fn reject_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>>;

    async fn cancel_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>>;

    async fn update_visit(
        &self,
        visit_id: &str,
        request: &UpdateVisitRequest,
    ) -> AppResult<Option<VisitPatch>>;

    async fn delete_visit(&self, visit_id: &str) -> AppResult<()>;

    async fn list_reviews(&self, visit_id: &str) -> AppResult<Vec<Review>>;

    async fn submit_review(&self, visit_id: &str, request: &SubmitReviewRequest) -> AppResult<Review>;
}

pub struct HttpVisitApi {
    rest: RestClient,
}

impl HttpVisitApi {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    pub fn with_client(rest: RestClient) -> Self {
        Self { rest }
    }

    fn list_path(role: UserRole) -> &'static str {
        match role {
            UserRole::Requester => "/visites",
            UserRole::Owner => "/logements/visites",
        }
    }

    async fn status_call(&self, visit_id: &str, verb: &str) -> AppResult<Option<VisitPatch>> {
        let path = format!("/visites/{}/{}", encode(visit_id), verb);
        let updated = self
            .rest
            .request_optional::<VisitPatch>(Method::POST, &path, None)
            .await?
            .filter(|reply| *reply != VisitPatch::default());

        info!(
            "Visit {} {} (server returned record: {})",
            visit_id,
            verb,
            updated.is_some()
        );
        Ok(updated)
    }
}

#[async_trait]
impl VisitApi for HttpVisitApi {
    async fn list_visits(&self, role: UserRole) -> AppResult<Vec<VisitRequest>> {
        let visits: Vec<VisitRequest> = self.rest.get(Self::list_path(role)).await?;
        debug!("Fetched {} visits for role {:?}", visits.len(), role);
        Ok(visits)
    }

    async fn create_visit(&self, request: &CreateVisitRequest) -> AppResult<VisitRequest> {
        let body = request.to_body()?;
        let visit: VisitRequest = self.rest.post("/visites", body).await?;
        info!("Created visit {:?} for logement {}", visit.id, visit.logement_id);
        Ok(visit)
    }

    async fn accept_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>> {
        self.status_call(visit_id, "accept").await
    }

    async fn reject_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>> {
        self.status_call(visit_id, "reject").await
    }

    async fn cancel_visit(&self, visit_id: &str) -> AppResult<Option<VisitPatch>> {
        self.status_call(visit_id, "cancel").await
    }

    async fn update_visit(
        &self,
        visit_id: &str,
        request: &UpdateVisitRequest,
    ) -> AppResult<Option<VisitPatch>> {
        let path = format!("/visites/{}", encode(visit_id));
        let updated = self
            .rest
            .request_optional::<VisitPatch>(Method::PUT, &path, Some(request.to_body()))
            .await?;
        Ok(updated.filter(|reply| *reply != VisitPatch::default()))
    }

    async fn delete_visit(&self, visit_id: &str) -> AppResult<()> {
        self.rest.delete(&format!("/visites/{}", encode(visit_id))).await
    }

    async fn list_reviews(&self, visit_id: &str) -> AppResult<Vec<Review>> {
        self.rest
            .get(&format!("/visites/{}/reviews", encode(visit_id)))
            .await
    }

    async fn submit_review(&self, visit_id: &str, request: &SubmitReviewRequest) -> AppResult<Review> {
        let body = request.to_body()?;
        self.rest
            .post(&format!("/visites/{}/reviews", encode(visit_id)), body)
            .await
    }
}
