//! Extension model: pluggable modules contributing named endpoints.
//!
//! Extensions are assembled at build time by the host and registered once;
//! the set is immutable for the gateway's lifetime. Each extension answers
//! requests routed to its endpoints and may emit broadcasts at any time
//! through a [`Broadcaster`] handle handed to it at construction.

pub mod broadcast;
pub mod endpoint;
pub mod registry;

use async_trait::async_trait;

pub use {
    broadcast::{Broadcaster, SubscriberId},
    endpoint::{Endpoint, Params, Reply, ReplyBody, Verb},
    registry::ExtensionRegistry,
};

/// Core extension trait. Each pluggable module implements this.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Unique extension identifier, used as the first route segment.
    fn id(&self) -> &str;

    /// Human-readable extension name.
    fn name(&self) -> &str;

    /// One-line description for the extension listing.
    fn description(&self) -> &str;

    /// Endpoints this extension serves, in declaration order.
    fn endpoints(&self) -> Vec<Endpoint>;

    /// Handle a request routed to one of this extension's endpoints.
    ///
    /// `params` is the parsed query string; `body` is the JSON body for
    /// POST endpoints, `None` otherwise.
    async fn handle_request(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        body: Option<&serde_json::Value>,
    ) -> Reply;
}
