//! Model Trainer API Module
//!
//! HTTP endpoints for training models from uploaded datasets and for
//! listing and deleting the caller's saved models.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use auth::{CallerIdentity, USER_ID_HEADER};
pub use error::ApiError;
pub use handlers::*;
pub use models::*;
pub use server::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_creation() {
        let config = ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 1024,
        };

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.body_limit(), 1024 + 1024 * 1024);
    }
}
