use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The credentials were missing, invalid or expired (HTTP 401).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The caller is authenticated but not allowed to see the resource (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Chat unavailable: {0}")]
    ChatUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether re-issuing the same call can succeed without user input.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) | AppError::Conflict(_) => true,
            AppError::ServerRejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short message suitable for a dismissible banner.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => {
                "Connexion impossible. Vérifiez votre réseau puis réessayez.".to_string()
            }
            AppError::ServerRejected { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            AppError::ServerRejected { .. } => "Le serveur a refusé la demande.".to_string(),
            AppError::NotFound(_) => "Cette visite n'existe plus.".to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Auth(_) => "Votre session a expiré. Veuillez vous reconnecter.".to_string(),
            AppError::Forbidden(_) => {
                "Vous n'êtes pas autorisé à effectuer cette action.".to_string()
            }
            AppError::Conflict(_) => "Une action est déjà en cours pour cette visite.".to_string(),
            AppError::ChatUnavailable(_) => {
                "Le chat est disponible une fois la visite acceptée.".to_string()
            }
            AppError::Internal(_) => "Une erreur inattendue est survenue.".to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Invalid payload: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::Network("timeout".into()).is_retryable());
        assert!(AppError::ServerRejected { status: 503, message: String::new() }.is_retryable());
        assert!(!AppError::ServerRejected { status: 400, message: String::new() }.is_retryable());
        assert!(!AppError::ValidationError("missing date".into()).is_retryable());
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = AppError::ServerRejected {
            status: 409,
            message: "Créneau déjà pris".to_string(),
        };
        assert_eq!(err.user_message(), "Créneau déjà pris");

        let blank = AppError::ServerRejected { status: 500, message: "  ".to_string() };
        assert_eq!(blank.user_message(), "Le serveur a refusé la demande.");
    }
}
