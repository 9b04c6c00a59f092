use {async_trait::async_trait, serde_json::json};

use tiller_extension::{Broadcaster, Endpoint, Extension, Params, Reply};

/// Built-in extension reporting host information and relaying announcements.
pub struct SystemExtension {
    broadcaster: Broadcaster,
}

impl SystemExtension {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self { broadcaster }
    }

    fn info(&self) -> Reply {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Reply::json(json!({
            "hostname": host,
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}

#[async_trait]
impl Extension for SystemExtension {
    fn id(&self) -> &str {
        "system"
    }

    fn name(&self) -> &str {
        "System"
    }

    fn description(&self) -> &str {
        "Host information and client announcements."
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![Endpoint::get("info"), Endpoint::post("announce")]
    }

    async fn handle_request(
        &self,
        endpoint: &Endpoint,
        _params: &Params,
        body: Option<&serde_json::Value>,
    ) -> Reply {
        match endpoint.name.as_str() {
            "info" => self.info(),
            "announce" => {
                let Some(payload) = body else {
                    return Reply::status_only(400);
                };
                // Relay the announcement to every authorized WebSocket client.
                self.broadcaster.broadcast(payload.to_string().as_bytes());
                Reply::status_only(204)
            }
            _ => Reply::status_only(404),
        }
    }
}
