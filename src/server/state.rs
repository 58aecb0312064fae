use std::sync::Arc;

use crate::auth::{AuthDelegate, HttpAuthDelegate};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::registry::{ConnectionRegistry, IdentityIndex, UsageTracker};
use crate::relay::{EventDispatcher, EventRouter};
use crate::ws::SubscriptionIndex;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub connections: Arc<ConnectionRegistry>,
    pub identities: Arc<IdentityIndex>,
    pub usage: Arc<UsageTracker>,
    pub subscriptions: Arc<SubscriptionIndex>,
    pub dispatcher: Arc<EventDispatcher>,
    pub router: Arc<EventRouter>,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let delegate = HttpAuthDelegate::new(&settings.backend)
            .map_err(|e| AppError::Internal(format!("failed to build backend client: {}", e)))?;

        Ok(Self::with_delegate(settings, Arc::new(delegate)))
    }

    /// Assemble the state around an injected auth delegate (tests use a fake).
    pub fn with_delegate(settings: Settings, delegate: Arc<dyn AuthDelegate>) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let identities = Arc::new(IdentityIndex::new());
        let usage = Arc::new(UsageTracker::new());
        let subscriptions = Arc::new(SubscriptionIndex::new());

        let dispatcher = Arc::new(EventDispatcher::new(
            connections.clone(),
            identities.clone(),
            subscriptions.clone(),
        ));

        let router = Arc::new(EventRouter::new(
            connections.clone(),
            identities.clone(),
            usage.clone(),
            delegate,
            dispatcher.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            connections,
            identities,
            usage,
            subscriptions,
            dispatcher,
            router,
        }
    }
}
