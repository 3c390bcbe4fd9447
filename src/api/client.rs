//! HTTP action handlers.
//!
//! Each configured route maps an action type to a backend path; the handler
//! POSTs the payload there as JSON and treats any non-2xx status as a
//! failed attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ApiConfig;
use crate::error::ShopSyncError;
use crate::queue::{ActionHandler, HandlerError, HandlerRegistry};

/// Posts an action payload to one backend endpoint.
pub struct HttpActionHandler {
    client: Client,
    url: String,
}

impl HttpActionHandler {
    /// Create a handler posting to `url`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ActionHandler for HttpActionHandler {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| HandlerError::new(format!("Request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        Err(if body.is_empty() {
            HandlerError::new(format!("HTTP {status}"))
        } else {
            HandlerError::new(format!("HTTP {status}: {body}"))
        })
    }
}

fn join_url(base_url: &str, route: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

/// Register an [`HttpActionHandler`] for every configured route.
///
/// Returns the number of handlers registered.
///
/// # Errors
///
/// Returns `ShopSyncError::Api` if the HTTP client cannot be built.
pub fn register_http_handlers(
    registry: &HandlerRegistry,
    config: &ApiConfig,
) -> Result<usize, ShopSyncError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ShopSyncError::Api(format!("Failed to create HTTP client: {e}")))?;

    for (action_type, route) in &config.routes {
        let url = join_url(&config.base_url, route);
        tracing::debug!(action_type = %action_type, url = %url, "Registering HTTP handler");
        registry.register(
            action_type.clone(),
            Arc::new(HttpActionHandler::new(client.clone(), url)),
        );
    }

    Ok(config.routes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:8080/api", "/orders"),
            "http://localhost:8080/api/orders"
        );
        assert_eq!(
            join_url("http://localhost:8080/api/", "orders"),
            "http://localhost:8080/api/orders"
        );
    }

    #[test]
    fn test_register_default_routes() {
        let registry = HandlerRegistry::new();
        let count = register_http_handlers(&registry, &ApiConfig::default()).unwrap();

        assert_eq!(count, 4);
        assert_eq!(
            registry.registered_types(),
            vec![
                "chat:send".to_string(),
                "order:place".to_string(),
                "return:request".to_string(),
                "wallet:topup".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_handler_error() {
        let handler = HttpActionHandler::new(Client::new(), "http://127.0.0.1:1/orders");

        let err = handler.handle(&json!({"total": 5000})).await.unwrap_err();
        assert!(err.message.contains("Request to http://127.0.0.1:1/orders failed"));
    }
}
