pub mod error;
pub mod session;

pub use error::{AppError, AppResult};
pub use session::{SessionContext, UserRole};
