#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {async_trait::async_trait, serde_json::json};

use {
    tiller_auth::AuthService,
    tiller_extension::{Broadcaster, Endpoint, Extension, ExtensionRegistry, Params, Reply},
    tiller_gateway::{GatewayState, routes::build_router},
};

/// Extension that echoes back what the gateway handed it.
pub struct EchoExtension;

#[async_trait]
impl Extension for EchoExtension {
    fn id(&self) -> &str {
        "test"
    }

    fn name(&self) -> &str {
        "Tiller test extension"
    }

    fn description(&self) -> &str {
        "The Tiller test extension."
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![
            Endpoint::get("test_get"),
            Endpoint::post("test_post"),
            Endpoint::delete("test_delete"),
        ]
    }

    async fn handle_request(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        body: Option<&serde_json::Value>,
    ) -> Reply {
        Reply::json(json!({
            "name": endpoint.name,
            "type": endpoint.verb.as_str(),
            "params": params.to_json_object(),
            "body": body.cloned().unwrap_or_else(|| json!({})),
        }))
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub auth: Arc<AuthService>,
    pub registry: Arc<ExtensionRegistry>,
    pub state: Arc<GatewayState>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/ws", self.addr)
    }

    /// Wait until the hub holds `count` authorized sockets.
    pub async fn wait_for_sockets(&self, count: usize) {
        for _ in 0..200 {
            if self.state.hub.count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("hub never reached {count} sockets");
    }
}

/// Serve the production router over plain TCP on an ephemeral port.
pub async fn spawn_app() -> TestApp {
    // reqwest's no-provider rustls build needs a process-default provider.
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    );
    let auth = Arc::new(AuthService::new(b"integration-secret".to_vec()));
    let registry = Arc::new(ExtensionRegistry::new(Broadcaster::new(), vec![Arc::new(
        EchoExtension,
    )]));
    let state = GatewayState::new(Arc::clone(&auth), Arc::clone(&registry));

    // Wire the hub into the broadcaster the way Server::start does.
    let hub = Arc::clone(&state.hub);
    registry.broadcaster().subscribe(move |data| hub.broadcast(data));

    let router = build_router(Arc::clone(&state), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        addr,
        auth,
        registry,
        state,
    }
}

/// Exchange the current access code for a signed token.
pub async fn obtain_token(app: &TestApp, client: &reqwest::Client) -> String {
    let response = client
        .post(app.url("/authenticate"))
        .json(&json!({ "password": app.auth.password() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}
