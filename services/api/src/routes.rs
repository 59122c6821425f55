//! API service routes

use axum::{
    Router, middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use common::{middleware::auth_middleware, response::ApiResponse};

use crate::{
    handlers::{addresses, assignments, patients, users, visits},
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/patients",
            post(patients::create_patient).get(patients::list_patients),
        )
        .route(
            "/patients/:id",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route("/patients/:id/activate", put(patients::activate_patient))
        .route("/patients/:id/archive", put(patients::archive_patient))
        .route("/patients/:id/delete", put(patients::soft_delete_patient))
        .route(
            "/addresses",
            post(addresses::create_address).get(addresses::list_addresses),
        )
        .route("/addresses/nearby", get(addresses::nearby_addresses))
        .route(
            "/addresses/:id",
            get(addresses::get_address)
                .put(addresses::update_address)
                .delete(addresses::delete_address),
        )
        .route(
            "/addresses/:id/distance/:other_id",
            get(addresses::address_distance),
        )
        .route("/addresses/:id/geocode", post(addresses::geocode_address))
        .route("/visits", post(visits::create_visit).get(visits::list_visits))
        .route(
            "/visits/:id",
            get(visits::get_visit)
                .put(visits::update_visit)
                .delete(visits::delete_visit),
        )
        .route("/visits/:id/activate", put(visits::activate_visit))
        .route("/visits/:id/archive", put(visits::archive_visit))
        .route("/visits/:id/delete", put(visits::soft_delete_visit))
        .route("/visits/:id/checkin", put(visits::checkin_visit))
        .route("/visits/:id/checkout", put(visits::checkout_visit))
        .route("/visits/:id/approve", put(visits::approve_visit))
        .route("/visits/:id/cancel", put(visits::cancel_visit))
        .route(
            "/assignments",
            post(assignments::create_assignment).get(assignments::list_assignments),
        )
        .route(
            "/assignments/:id",
            put(assignments::update_assignment).delete(assignments::delete_assignment),
        )
        .route(
            "/assignments/:id/activate",
            put(assignments::activate_assignment),
        )
        .route(
            "/assignments/:id/inactivate",
            put(assignments::inactivate_assignment),
        )
        .route_layer(middleware::from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    ApiResponse::ok(json!({ "service": "api" }))
}
