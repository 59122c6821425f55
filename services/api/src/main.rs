use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

mod geo;
mod geocoder;
mod handlers;
mod models;
mod repositories;
mod routes;
mod state;

use common::{
    auth::PgAuthRepository,
    crypto::FieldCipher,
    database::{self, DatabaseConfig, init_pool, run_migrations},
    middleware::{Authenticator, with_http_layers},
    response::expose_error_details,
    settings::Settings,
    telemetry,
    token::TokenService,
};
use tokio::net::TcpListener;

use crate::{
    geocoder::{Geocoder, NominatimGeocoder},
    repositories::{
        PgAddressRepository, PgAssignmentRepository, PgPatientRepository, PgUserRepository,
        PgVisitRepository,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    info!("Starting API service");

    let settings = Settings::load("0.0.0.0:3001")?;
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

    let cipher = settings.field_encryption_key.as_deref().map(FieldCipher::from_secret);
    if cipher.is_none() {
        warn!("HOMECARE_FIELD_ENCRYPTION_KEY is not set; SSN updates are disabled");
    }

    let geocoder = match settings.geocoder_url.as_deref() {
        Some(url) => {
            info!("Geocoding addresses through {}", url);
            Some(Arc::new(NominatimGeocoder::new(url)?) as Arc<dyn Geocoder>)
        }
        None => None,
    };

    let app_state = AppState {
        authenticator: Authenticator::new(tokens, Arc::new(PgAuthRepository::new(pool.clone()))),
        users: Arc::new(PgUserRepository::new(pool.clone())),
        patients: Arc::new(PgPatientRepository::new(pool.clone())),
        addresses: Arc::new(PgAddressRepository::new(pool.clone())),
        visits: Arc::new(PgVisitRepository::new(pool.clone())),
        assignments: Arc::new(PgAssignmentRepository::new(pool)),
        geocoder,
        cipher,
    };

    let app = with_http_layers(routes::create_router(app_state), &settings);

    let listener = TcpListener::bind(&settings.bind_address).await?;
    info!("API service listening on {}", settings.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
