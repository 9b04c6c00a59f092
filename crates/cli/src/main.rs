mod system_extension;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    rand::RngCore,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    tiller_auth::AuthService,
    tiller_extension::{Broadcaster, ExtensionRegistry},
    tiller_gateway::{Server, ServerConfig},
};

use system_extension::SystemExtension;

#[derive(Parser)]
#[command(name = "tiller", about = "Tiller — embedded control-plane gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Directory for TLS material (defaults to the platform data dir).
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Serve static files from this directory on unmatched routes.
        #[arg(long)]
        public_dir: Option<PathBuf>,
    },
    /// Print a freshly generated access code and exit.
    Password,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "tiller", "tiller")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Commands::Serve {
            bind,
            port,
            data_dir,
            public_dir,
        } => serve(bind, port, data_dir, public_dir).await,
        Commands::Password => {
            println!("{}", fresh_password());
            Ok(())
        }
    }
}

/// A throwaway guard's access code, useful for eyeballing the format.
fn fresh_password() -> String {
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    AuthService::new(secret.to_vec()).password()
}

async fn serve(
    bind: String,
    port: u16,
    data_dir: Option<PathBuf>,
    public_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "tiller starting");

    // Tokens die with the process; the signing key is never persisted.
    let mut secret = [0u8; 32];
    rand::rng().fill_bytes(&mut secret);

    let auth = Arc::new(
        AuthService::new(secret.to_vec())
            .with_password_changed(|password| info!(code = password, "access code rotated")),
    );
    info!(code = %auth.password(), "access code");

    let broadcaster = Broadcaster::new();
    let registry = Arc::new(ExtensionRegistry::new(broadcaster.clone(), vec![Arc::new(
        SystemExtension::new(broadcaster),
    )]));

    let server = Server::new(
        ServerConfig {
            bind,
            port,
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            public_dir,
        },
        auth,
        registry,
    );

    if !server.start().await {
        anyhow::bail!("gateway failed to start");
    }

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::fresh_password;

    #[test]
    fn fresh_password_is_a_zero_padded_code() {
        let code = fresh_password();
        assert_eq!(code.len(), tiller_auth::PASSWORD_LENGTH);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }
}
