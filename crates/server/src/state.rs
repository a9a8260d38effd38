//! Shared application state handed to every axum handler (§6): the kernel
//! facade plus the bit of auth material the middleware needs that doesn't
//! belong on `Kernel` itself.

use std::sync::Arc;

use seed_kernel::Kernel;

#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<Kernel>,
    /// SHA-256 hex digest of the required bearer token. `None` disables
    /// auth entirely (local/dev use only, §6 "Auth").
    pub bearer_token_hash: Option<Arc<str>>,
}

impl AppState {
    pub fn new(kernel: Arc<Kernel>, bearer_token_hash: Option<String>) -> Self {
        Self {
            kernel,
            bearer_token_hash: bearer_token_hash.map(Arc::from),
        }
    }
}
