//! HTTP front end for multiplayer blackjack tables.
//!
//! [`GameService`] applies turns against the [`GameStore`] and doubles as the
//! game boundary the automated players poll. [`WebServer`] exposes it over
//! JSON routes and runs the agent loop next to the listener.

pub mod errors;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod service;
pub mod settings;
pub mod store;

pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use logging::{init_logging, LogEntry, LogFormat, TestLogSubscriber};
pub use server::{AppContext, ServerError, ServerHandle, WebServer};
pub use service::{GameService, ServiceError};
pub use settings::{
    ConfigError, ResolvedSettings, ServerArgs, ServiceSettings, SettingsSources, ValueSource,
};
pub use store::{GameGuard, GameStore, StoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn context_shares_one_store() {
        let ctx = AppContext::new_for_tests();
        assert!(ctx.store().is_empty());
        assert!(Arc::ptr_eq(&ctx.store(), &ctx.service().store()));
        assert!(ctx.service().agent().is_none());
    }
}
