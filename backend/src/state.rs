use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;

use crate::auth::TokenKeys;
use crate::db::{AssetRepository, ClientRepository, InvestmentRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<dyn ClientRepository>,
    pub investments: Arc<dyn InvestmentRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub users: Arc<dyn UserRepository>,
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub tokens: TokenKeys,
    pub page_size: u32,
}

impl AppState {
    /// Wires every repository seam to the same backing store.
    pub fn new<S>(
        store: S,
        clock: Arc<dyn Clock + Send + Sync>,
        tokens: TokenKeys,
        page_size: u32,
    ) -> Self
    where
        S: ClientRepository + InvestmentRepository + AssetRepository + UserRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            clients: store.clone(),
            investments: store.clone(),
            assets: store.clone(),
            users: store,
            clock,
            tokens,
            page_size,
        }
    }

    /// Server calendar date, used for "not in the future" and month bounds.
    pub fn today(&self) -> NaiveDate {
        self.clock.local().date_naive()
    }
}
