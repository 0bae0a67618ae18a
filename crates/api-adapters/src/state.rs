use std::sync::Arc;

use domains::{IdentityProvider, MessageRepository, DEFAULT_PAGE_SIZE};
use services::MessageService;

use crate::metrics::Metrics;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub messages: MessageService,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
    /// Page size used when a listing request does not specify one
    pub default_page_size: u32,
}

impl AppState {
    pub fn new(repo: Arc<dyn MessageRepository>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            messages: MessageService::new(repo),
            identity,
            metrics: Arc::new(Metrics::new()),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }
}
