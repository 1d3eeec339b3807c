//! Mentor Tríade - terminal client for the mentoring backend
//!
//! A conversational mentoring client that:
//! - Logs in against the backend and keeps identity/session in local state
//! - Resolves the active session reuse-first before any message traffic
//! - Drives the chat loop (send, reply, end session, new session)

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use mentor_chat::api::types::Identity;
use mentor_chat::api::ApiClient;
use mentor_chat::config::{self, Config};
use mentor_chat::repl::{colors, Repl};
use mentor_chat::storage::{self, FileStore, Storage, KEY_SESSION_ID, KEY_USER_NAME};

#[derive(Parser)]
#[command(name = "mentor-chat")]
#[command(about = "Terminal client for the Mentor Tríade mentoring backend")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "MENTOR_API_BASE")]
    api_base: Option<String>,

    /// Open the chat bound to this session id (the /chat/:id route)
    #[arg(long)]
    session: Option<String>,

    /// Act as this user id, bypassing the stored identity
    #[arg(long)]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from ~/.mentor/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".mentor").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv();
    }

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Config file (~/.mentor/config.toml); flags and env vars win over it
    let file_config = Config::load();
    let api_base = config::resolve_api_base(args.api_base, &file_config);
    let ambiente = file_config
        .ambiente
        .clone()
        .unwrap_or_else(|| config::DEFAULT_AMBIENTE.to_string());

    let api = ApiClient::new(api_base);
    let store: Arc<dyn Storage> = Arc::new(FileStore::open(FileStore::default_path()));

    // Identity: explicit --user beats the stored one; switching users
    // invalidates any stored session
    let identity = match args.user {
        Some(user_id) => {
            if store.get(storage::KEY_USER_ID).as_deref() != Some(user_id.as_str()) {
                store.remove(KEY_SESSION_ID);
            }
            Some(Identity {
                display_name: store
                    .get(KEY_USER_NAME)
                    .unwrap_or_else(|| "Você".to_string()),
                user_id,
            })
        }
        None => storage::load_identity(store.as_ref()),
    };

    // Startup banner
    println!();
    println!(
        "  {}",
        colors::banner_accent(&format!("Mentor Tríade {}", env!("CARGO_PKG_VERSION")))
    );
    println!(
        "  {}",
        colors::status("Seu mentor pessoal, 24h por dia, com memória de longo prazo")
    );
    println!("{}", colors::separator(50));
    println!("{}", colors::banner_line("Backend", api.base_url()));
    println!("{}", colors::banner_line("Ambiente", &ambiente));
    match &identity {
        Some(identity) => {
            println!(
                "{}",
                colors::banner_line("Conta", &identity.display_name)
            );
        }
        None => {
            println!(
                "{}",
                colors::banner_line("Conta", "nenhuma (faça login)")
            );
        }
    }
    println!("{}", colors::separator(50));
    println!();

    Repl::new(api, store, ambiente)?.run(identity, args.session).await
}
