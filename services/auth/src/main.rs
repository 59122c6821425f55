use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

mod password;
mod rate_limiter;
mod routes;
mod service;
mod state;
mod validation;

use common::{
    auth::PgAuthRepository,
    database::{self, DatabaseConfig, init_pool, run_migrations},
    middleware::{Authenticator, with_http_layers},
    response::expose_error_details,
    settings::Settings,
    telemetry,
    token::TokenService,
};
use tokio::net::TcpListener;

use crate::{
    rate_limiter::{LoginThrottle, ThrottleConfig},
    service::AccountService,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    info!("Starting authentication service");

    let settings = Settings::load("0.0.0.0:3000")?;
    expose_error_details(settings.is_development());

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let tokens = TokenService::from_secret(settings.token_secret.as_deref(), settings.token_lifetime_ms);
    if !tokens.is_signed() {
        warn!("HOMECARE_TOKEN_SECRET is not set; issuing unsigned legacy tokens");
    }

    let throttle = LoginThrottle::new(ThrottleConfig {
        max_attempts: settings.login_max_attempts,
        window_seconds: settings.login_window_seconds,
        lockout_seconds: settings.login_lockout_seconds,
    });
    info!(
        "Login throttle: {} attempts per {}s, {}s lockout",
        throttle.config().max_attempts,
        throttle.config().window_seconds,
        throttle.config().lockout_seconds
    );

    let accounts = Arc::new(PgAuthRepository::new(pool));
    let app_state = AppState {
        authenticator: Authenticator::new(tokens.clone(), accounts.clone()),
        accounts: AccountService::new(accounts, tokens, throttle),
    };

    let app = with_http_layers(routes::create_router(app_state), &settings);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("Authentication service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
