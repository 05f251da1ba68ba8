pub mod api;
pub mod classifier;
pub mod dispatcher;
pub mod lifecycle;
pub mod store;

pub use api::{HttpVisitApi, VisitApi};
pub use classifier::classify;
pub use dispatcher::VisitActionDispatcher;
pub use lifecycle::{VisitAction, VisitLifecycleService};
pub use store::{VisitSnapshot, VisitStore};
