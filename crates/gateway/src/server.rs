use std::{
    io::Cursor,
    net::{SocketAddr, TcpListener},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use {
    anyhow::Context,
    axum::Router,
    axum_server::{Handle, tls_rustls::RustlsConfig},
    tokio::sync::Mutex,
    tracing::{info, warn},
};

use {
    tiller_auth::AuthService,
    tiller_extension::{ExtensionRegistry, SubscriberId},
    tiller_tls::CertificateProvider,
};

use crate::{routes, state::GatewayState};

/// Gateway listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory holding the TLS material (created on first start).
    pub data_dir: PathBuf,
    /// Optional directory served as static files on unmatched routes.
    pub public_dir: Option<PathBuf>,
}

struct RunningServer {
    handle: Handle,
    subscription: SubscriberId,
    local_addr: SocketAddr,
}

/// How long `stop` waits for accepted connections to finish their responses.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The gateway server. Borrows the guard and registry from the host; routes
/// are built once at construction from the registry snapshot, so extensions
/// added later are not discoverable.
pub struct Server {
    config: ServerConfig,
    state: Arc<GatewayState>,
    router: Router,
    running: Mutex<Option<RunningServer>>,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        auth: Arc<AuthService>,
        registry: Arc<ExtensionRegistry>,
    ) -> Self {
        let state = GatewayState::new(auth, registry);
        let router = routes::build_router(Arc::clone(&state), config.public_dir.as_deref());
        Self {
            config,
            state,
            router,
            running: Mutex::new(None),
        }
    }

    /// Shared runtime state (connection hub, list cache).
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Start serving. Idempotent: returns false if already running, and
    /// false on any provisioning failure (certificate, bind), in which case
    /// no partial state is left behind.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }

        let provider = CertificateProvider::new(&self.config.data_dir);
        let pem_path = match provider.certificate_path() {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "certificate provisioning failed");
                return false;
            }
        };

        let tls = match load_tls_config(&pem_path).await {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "failed to load TLS material");
                return false;
            }
        };

        let addr = format!("{}:{}", self.config.bind, self.config.port);
        let (listener, local_addr) = match bind_listener(&addr) {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%addr, %err, "failed to bind listener");
                return false;
            }
        };

        let handle = Handle::new();
        let server = axum_server::from_tcp_rustls(listener, tls).handle(handle.clone());
        let app = self.router.clone();
        tokio::spawn(async move {
            if let Err(err) = server.serve(app.into_make_service()).await {
                warn!(%err, "gateway serve loop ended with error");
            }
        });

        let hub = Arc::clone(&self.state.hub);
        let subscription = self
            .state
            .registry
            .broadcaster()
            .subscribe(move |data| hub.broadcast(data));

        info!(%local_addr, "gateway listening");
        *running = Some(RunningServer {
            handle,
            subscription,
            local_addr,
        });
        true
    }

    /// Stop serving. Idempotent: returns false if not running. The listener
    /// stops accepting and the WebSocket set is cleared; in-flight handlers
    /// on already-accepted connections finish within [`SHUTDOWN_GRACE`].
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(active) = running.take() else {
            return false;
        };
        self.state
            .registry
            .broadcaster()
            .unsubscribe(active.subscription);
        // Dropping the hub senders ends the socket pumps, so the grace
        // period is only spent on requests that are actually in flight.
        self.state.hub.clear();
        active.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        info!("gateway stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Address the listener is bound to, while running. Reflects the actual
    /// port when the configuration asked for port 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }
}

fn bind_listener(addr: &str) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Split the combined PEM (certificate then key) into rustls material.
async fn load_tls_config(path: &std::path::Path) -> anyhow::Result<RustlsConfig> {
    let pem = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let mut reader = Cursor::new(&pem);
    let certs: Vec<Vec<u8>> = rustls_pemfile::certs(&mut reader)
        .map(|cert| cert.map(|der| der.to_vec()))
        .collect::<Result<_, _>>()
        .context("parsing certificates")?;
    anyhow::ensure!(!certs.is_empty(), "no certificate in PEM");

    let mut reader = Cursor::new(&pem);
    let key = rustls_pemfile::private_key(&mut reader)
        .context("parsing private key")?
        .context("no private key in PEM")?
        .secret_der()
        .to_vec();

    RustlsConfig::from_der(certs, key)
        .await
        .context("building rustls config")
}
