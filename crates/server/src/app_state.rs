use server_api::ApiContext;

use crate::auth::AuthConfig;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiContext,
    pub auth: AuthConfig,
}
