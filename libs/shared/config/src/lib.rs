use std::env;
use std::time::Duration;
use tracing::warn;

use shared_models::session::{SessionContext, UserRole};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_VISIT_CACHE_TTL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub user_id: String,
    pub user_role: UserRole,
    pub request_timeout_secs: u64,
    pub visit_cache_ttl_secs: u64,
    pub display_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_base_url: env::var("COLOCATION_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("COLOCATION_API_URL not set, using empty value");
                    String::new()
                }),
            api_token: env::var("COLOCATION_API_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            user_id: env::var("COLOCATION_USER_ID")
                .unwrap_or_else(|_| {
                    warn!("COLOCATION_USER_ID not set, using empty value");
                    String::new()
                }),
            user_role: env::var("COLOCATION_USER_ROLE")
                .ok()
                .and_then(|raw| {
                    let role = UserRole::parse(&raw);
                    if role.is_none() {
                        warn!("COLOCATION_USER_ROLE has unknown value {:?}, using requester", raw);
                    }
                    role
                })
                .unwrap_or_default(),
            request_timeout_secs: parse_or_default(
                "COLOCATION_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            visit_cache_ttl_secs: parse_or_default(
                "COLOCATION_VISIT_CACHE_TTL_SECS",
                DEFAULT_VISIT_CACHE_TTL_SECS,
            ),
            display_utc_offset_minutes: parse_or_default("COLOCATION_DISPLAY_UTC_OFFSET_MINUTES", 0),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty() && !self.user_id.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn visit_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.visit_cache_ttl_secs)
    }

    /// Explicit session handed to the cells instead of a global user lookup.
    pub fn session(&self) -> SessionContext {
        SessionContext {
            user_id: self.user_id.clone(),
            role: self.user_role,
            auth_token: self.api_token.clone(),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
