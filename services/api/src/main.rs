use std::sync::Arc;

use accounts::Accounts;
use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, HttpServer};
use api::create_app;
use api::state::{AppState, Settings};
use db::{AccountStore, MemoryStore};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env().expect("settings");

    let store: Arc<dyn AccountStore> = if s.uses_memory_store() {
        tracing::warn!("using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        let db = db::connect(&s.database_url, s.db_max_connections())
            .await
            .expect("db");
        db::migrate(&db).await.expect("migrations");
        Arc::new(db)
    };

    let accounts = Accounts::new(store, s.accounts_config());
    let state = AppState::new(accounts, &s);

    let governor_conf = GovernorConfigBuilder::default()
        .burst_size(s.rate_limit_burst())
        .finish()
        .expect("rate limiter config");

    let bind_addr = s.bind_addr().to_string();
    tracing::info!(addr = %bind_addr, "starting server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allow_any_method();
        create_app(state.clone())
            .wrap(Governor::new(&governor_conf))
            .wrap(cors)
            .wrap(Logger::default())
    })
    .bind(bind_addr)?
    .run()
    .await
}
