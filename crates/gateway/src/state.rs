use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use {serde::Serialize, tokio::sync::mpsc, tracing::debug};

use {tiller_auth::AuthService, tiller_extension::ExtensionRegistry};

// ── WebSocket hub ────────────────────────────────────────────────────────────

/// The set of currently authorized WebSocket connections.
///
/// Each entry is the sender half of a per-connection channel; the write
/// loop on the other end owns the socket. Fan-out iterates under the lock
/// and drops entries whose channel is gone, so a failed peer never stalls
/// the others.
#[derive(Default)]
pub struct SocketHub {
    next_id: AtomicU64,
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>,
}

impl SocketHub {
    pub fn add(&self, sender: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.insert(id, sender);
        id
    }

    pub fn remove(&self, id: u64) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.remove(&id);
    }

    pub fn clear(&self) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.clear();
    }

    pub fn count(&self) -> usize {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.len()
    }

    /// Push `data` to every authorized connection as a text frame.
    pub fn broadcast(&self, data: &[u8]) {
        let text = String::from_utf8_lossy(data).into_owned();
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|id, sender| {
            let alive = sender.send(text.clone()).is_ok();
            if !alive {
                debug!(conn_id = id, "dropping dead websocket sender");
            }
            alive
        });
    }
}

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across handlers.
pub struct GatewayState {
    /// Authentication guard (shared with the host).
    pub auth: Arc<AuthService>,
    /// Extension snapshot taken at construction.
    pub registry: Arc<ExtensionRegistry>,
    /// Authorized WebSocket connections.
    pub hub: Arc<SocketHub>,
    /// Memoized `/api/list` body. Computed once per process and never
    /// invalidated; the extension set cannot change after startup.
    list_cache: OnceLock<String>,
}

impl GatewayState {
    pub fn new(auth: Arc<AuthService>, registry: Arc<ExtensionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            auth,
            registry,
            hub: Arc::new(SocketHub::default()),
            list_cache: OnceLock::new(),
        })
    }

    /// JSON descriptor array for `/api/list`.
    pub fn api_list(&self) -> &str {
        self.list_cache.get_or_init(|| {
            let descriptors: Vec<ExtensionDescriptor> = self
                .registry
                .extensions()
                .iter()
                .map(|extension| ExtensionDescriptor {
                    id: extension.id().to_string(),
                    name: extension.name().to_string(),
                    description: extension.description().to_string(),
                    endpoints: extension
                        .endpoints()
                        .iter()
                        .map(|endpoint| EndpointDescriptor {
                            name: endpoint.name.clone(),
                            kind: endpoint.verb.as_str(),
                        })
                        .collect(),
                })
                .collect();
            serde_json::to_string(&descriptors).unwrap_or_else(|_| "[]".to_string())
        })
    }
}

#[derive(Serialize)]
struct ExtensionDescriptor {
    id: String,
    name: String,
    description: String,
    endpoints: Vec<EndpointDescriptor>,
}

#[derive(Serialize)]
struct EndpointDescriptor {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
}
