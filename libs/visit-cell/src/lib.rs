// libs/visit-cell/src/lib.rs
//! # Visit Cell
//!
//! Client-side view of visit requests: a prospective tenant asks to visit a
//! listing, the owner accepts or refuses, either side may cancel or edit,
//! and the backend marks the visit completed once it has taken place.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                    Visit Cell                       |
//! +-----------------------------------------------------+
//! |  models.rs        |  VisitRequest, LogicalStatus    |
//! |  services/        |                                 |
//! |    classifier.rs  |  raw status -> LogicalStatus    |
//! |    store.rs       |  snapshot cache of visits       |
//! |    lifecycle.rs   |  transitions and affordances    |
//! |    dispatcher.rs  |  user intent -> remote call     |
//! |    api.rs         |  REST endpoints                 |
//! +-----------------------------------------------------+
//! ```
//!
//! The backend is authoritative: the store only changes after a remote call
//! succeeds, and a failed call leaves it untouched.

pub mod models;
pub mod services;

pub use models::{
    CreateVisitRequest, LogicalStatus, Review, SubmitReviewRequest, UpdateVisitRequest,
    VisitActions, VisitPatch, VisitRequest,
};

pub use services::{
    classify, HttpVisitApi, VisitAction, VisitActionDispatcher, VisitApi, VisitLifecycleService,
    VisitSnapshot, VisitStore,
};

use shared_models::AppResult;
use shared_utils::datetime::localize;

/// Display form of the visit date; the stored value is left untouched.
pub fn format_visit_date(visit: &VisitRequest, offset_minutes: i32) -> AppResult<String> {
    localize(&visit.date_visite, offset_minutes)
}
