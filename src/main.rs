mod bulk;
mod config;
mod error;
mod funding;
mod lnurl;
mod models;
mod redeem;
mod routes;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use clap::{Parser, Subcommand};
use config::Config;
use funding::lnd::LndClient;
use redeem::{Coordinator, RedeemPolicy};
use sqlx::PgPool;
use store::postgres::PgInviteStore;
use store::InviteStore;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn InviteStore>,
    pub coordinator: Arc<Coordinator>,
}

#[derive(Parser)]
#[command(about = "Single-use invite codes redeemable for inbound Lightning channels")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Load invites from a CSV file of `code,funding_amount,push_amount` rows
    Load { csv: PathBuf },
    /// Create random invite codes and print them
    Generate {
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long)]
        funding_amount: u64,
        #[arg(long, default_value_t = 0)]
        push_amount: u64,
    },
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("health check failed: {e}");
            false
        }
    };
    Json(serde_json::json!({ "status": "ok", "db": db }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    let db = PgPool::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&db)
        .await
        .expect("failed to run migrations");

    let store = Arc::new(PgInviteStore::new(db));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::Load { csv } => {
            let input = std::fs::read_to_string(&csv)
                .unwrap_or_else(|e| fail(format!("failed to read {}: {e}", csv.display())));
            let invites = bulk::parse_csv(&input).unwrap_or_else(|e| fail(e));
            let count = store.insert_batch(&invites).await.unwrap_or_else(|e| fail(e.to_string()));
            tracing::info!("{count} invites loaded");
        }
        Command::Generate {
            count,
            funding_amount,
            push_amount,
        } => {
            let invites = bulk::generate_invites(count, funding_amount, push_amount)
                .unwrap_or_else(|e| fail(e));
            store.insert_batch(&invites).await.unwrap_or_else(|e| fail(e.to_string()));
            for invite in &invites {
                println!("{}", invite.code);
            }
        }
    }
}

fn fail(message: String) -> ! {
    tracing::error!("{message}");
    std::process::exit(1);
}

async fn serve(config: Config, store: Arc<PgInviteStore>) {
    let funding = LndClient::new(&config.lnd).expect("failed to set up LND client");
    let policy = RedeemPolicy {
        force_private: config.lnd.force_private,
        fee_rate: config.lnd.fee_rate,
    };
    let coordinator = Coordinator::new(store.clone(), Arc::new(funding), policy);

    let addr = format!("{}:{}", config.host, config.port);
    let static_dir = config.static_dir.clone();

    let state = AppState {
        config: Arc::new(config),
        store,
        coordinator: Arc::new(coordinator),
    };

    let mut app = Router::new()
        .route("/api/health", get(health))
        .merge(routes::router());

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
