use std::sync::Arc;

use anyhow::Result;
use common::database;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use auth::{
    AppState, AuthService, SessionConfig,
    jwt::{JwtConfig, TokenIssuer},
    password::PasswordHasher,
    repositories::{PgSessionStore, PgUserDirectory},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let jwt_config = JwtConfig::from_env()?;
    let session_config = SessionConfig::from_env()?;

    let users = PgUserDirectory::new(pool.clone(), db_config.query_timeout());
    let sessions = PgSessionStore::new(pool.clone(), db_config.query_timeout());

    let auth_service = AuthService::new(
        Arc::new(users),
        Arc::new(sessions),
        TokenIssuer::new(jwt_config),
        PasswordHasher::default(),
        session_config,
    );

    let app_state = AppState {
        db_pool: pool,
        auth_service,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_address =
        std::env::var("AUTH_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Authentication service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
