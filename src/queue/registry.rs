//! Action handler registry.
//!
//! Features register how their action types are executed at startup; the
//! processor resolves handlers by type tag at execution time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a handler; recorded on the action verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable description shown to the user.
    pub message: String,
}

impl HandlerError {
    /// Create an error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Executes the network effect of one action type.
///
/// Handlers may be invoked more than once for the same action and must
/// tolerate duplicates.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform the action described by `payload`.
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), HandlerError> {
        (self.f)(payload.clone()).await
    }
}

/// Maps action type tags to handlers. Last registration wins.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action_type`, replacing any previous one.
    pub fn register(&self, action_type: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let action_type = action_type.into();
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if handlers.insert(action_type.clone(), handler).is_some() {
            tracing::debug!(action_type = %action_type, "Replaced action handler");
        }
    }

    /// Register an async closure as the handler for `action_type`.
    pub fn register_fn<F, Fut>(&self, action_type: impl Into<String>, f: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(action_type, Arc::new(FnHandler { f }));
    }

    /// Look up the handler for `action_type`.
    #[must_use]
    pub fn resolve(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(action_type)
            .cloned()
    }

    /// Registered type tags, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Rejecting;

    #[async_trait]
    impl ActionHandler for Rejecting {
        async fn handle(&self, _payload: &serde_json::Value) -> Result<(), HandlerError> {
            Err("server unavailable".into())
        }
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = HandlerRegistry::new();
        registry.register_fn("order:place", |payload| async move {
            if payload["total"].as_u64() == Some(5000) {
                Ok(())
            } else {
                Err(HandlerError::new("unexpected payload"))
            }
        });

        let handler = registry.resolve("order:place").unwrap();
        assert!(handler.handle(&json!({"total": 5000})).await.is_ok());
        assert!(handler.handle(&json!({"total": 1})).await.is_err());

        assert!(registry.resolve("chat:send").is_none());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = HandlerRegistry::new();
        registry.register_fn("chat:send", |_| async { Ok(()) });
        registry.register("chat:send", Arc::new(Rejecting));

        let err = registry
            .resolve("chat:send")
            .unwrap()
            .handle(&json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "server unavailable");
        assert_eq!(registry.registered_types(), vec!["chat:send".to_string()]);
    }

    #[test]
    fn test_registered_types_sorted() {
        let registry = HandlerRegistry::new();
        registry.register("wallet:topup", Arc::new(Rejecting));
        registry.register("chat:send", Arc::new(Rejecting));

        assert_eq!(
            registry.registered_types(),
            vec!["chat:send".to_string(), "wallet:topup".to_string()]
        );
    }
}
