//! Application state shared across handlers

use common::middleware::Authenticator;

use crate::service::AccountService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub accounts: AccountService,
}
