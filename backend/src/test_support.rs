//! In-memory stand-ins for the Postgres store and the system clock.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use mockable::Clock;
use parking_lot::Mutex;
use sqlx::error::{DatabaseError, ErrorKind};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::TokenKeys;
use crate::db::{AssetRepository, ClientRepository, InvestmentRepository, UserRepository};
use crate::models::{
    Asset, AssetOption, AssetTotal, AssetType, Client, ClientOption, CreateClient,
    CreateInvestment, Investment, InvestmentDetail, InvestmentDetailRow, NewUser, OwnerScope, Page,
    PageRequest, UpdateClient, UpdateInvestment, User,
};
use crate::services::auth_service;
use crate::state::AppState;

pub const TEST_SECRET: &[u8] = b"test-secret";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    clients: Vec<Client>,
    assets: Vec<Asset>,
    investments: Vec<Investment>,
    unavailable: bool,
    stale_lookups: bool,
}

impl Tables {
    fn check_available(&self) -> Result<(), sqlx::Error> {
        if self.unavailable {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    /// Mirrors the partial unique index on active clients' `(user_id, email)`.
    fn check_client_email(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let taken = email.is_some_and(|email| {
            self.clients.iter().any(|c| {
                c.is_active()
                    && c.is_owned_by(user_id)
                    && c.email.as_deref() == Some(email)
                    && c.id != id
            })
        });
        if taken {
            return Err(unique_violation("uq_clients_user_email_active"));
        }
        Ok(())
    }

    fn active_client(&self, id: Uuid) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id && c.is_active())
    }

    /// Investments visible in `scope`, each with its client.
    fn scoped(&self, scope: OwnerScope) -> Vec<(&Investment, &Client)> {
        self.investments
            .iter()
            .filter_map(|inv| {
                let client = self.clients.iter().find(|c| c.id == inv.client_id)?;
                scope.admits(client).then_some((inv, client))
            })
            .collect()
    }

    // Keeps creation timestamps strictly increasing, like rows written one
    // after another.
    fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.investments.iter().map(|i| i.created_at).max() {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        }
    }
}

/// Unique-index violation as the Postgres driver reports it.
#[derive(Debug)]
pub struct UniqueViolation {
    constraint: &'static str,
}

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.constraint)
    }
}

impl StdError for UniqueViolation {}

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.constraint)
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

pub fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation { constraint }))
}

fn newest_first(a: &Investment, b: &Investment) -> std::cmp::Ordering {
    b.investment_date
        .cmp(&a.investment_date)
        .then(b.created_at.cmp(&a.created_at))
        .then(b.id.cmp(&a.id))
}

/// Implements every repository trait over plain vectors.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the same assets the seed migration inserts.
    pub fn with_reference_assets() -> Self {
        let store = Self::new();
        for (symbol, asset_type) in [
            ("PETR4", AssetType::Variable),
            ("VALE3", AssetType::Variable),
            ("TESOURO_SELIC", AssetType::Fixed),
            ("CDB_INTER", AssetType::Fixed),
            ("HGLG11", AssetType::Variable),
        ] {
            store.add_asset(symbol, asset_type);
        }
        store
    }

    /// Makes every repository call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.tables.lock().unavailable = unavailable;
    }

    /// Makes email lookups miss, as when a concurrent writer commits between
    /// the check and the insert. Unique indexes still apply.
    pub fn set_stale_lookups(&self, stale: bool) {
        self.tables.lock().stale_lookups = stale;
    }

    pub fn add_user(&self, name: &str, email: &str) -> User {
        self.add_user_with_password(name, email, "senha-segura")
    }

    pub fn add_user_with_password(&self, name: &str, email: &str, password: &str) -> User {
        let password_hash = auth_service::hash_password(password).unwrap_or_default();
        let user = User::new(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        });
        self.tables.lock().users.push(user.clone());
        user
    }

    pub fn add_asset(&self, symbol: &str, asset_type: AssetType) -> Asset {
        let asset = Asset::new(symbol, format!("{} asset", symbol), asset_type);
        self.tables.lock().assets.push(asset.clone());
        asset
    }

    pub fn asset_by_symbol(&self, symbol: &str) -> Option<Asset> {
        self.tables
            .lock()
            .assets
            .iter()
            .find(|a| a.symbol == symbol)
            .cloned()
    }

    pub fn add_client(&self, user_id: Uuid, name: &str, email: &str) -> Client {
        let client = Client::new(user_id, name.to_string(), Some(email.to_string()));
        self.tables.lock().clients.push(client.clone());
        client
    }

    pub fn soft_delete_client(&self, id: Uuid) {
        let mut tables = self.tables.lock();
        if let Some(client) = tables.clients.iter_mut().find(|c| c.id == id) {
            client.deleted_at = Some(Utc::now());
        }
    }

    /// Client row regardless of soft-delete state.
    pub fn client_row(&self, id: Uuid) -> Option<Client> {
        self.tables.lock().clients.iter().find(|c| c.id == id).cloned()
    }

    pub fn add_investment(
        &self,
        client_id: Uuid,
        asset_id: Uuid,
        amount: &str,
        investment_date: NaiveDate,
    ) -> Investment {
        let mut tables = self.tables.lock();
        let mut investment = Investment::new(CreateInvestment {
            client_id,
            asset_id,
            amount: BigDecimal::from_str(amount).unwrap_or_default(),
            investment_date,
        });
        investment.created_at = tables.next_created_at();
        tables.investments.push(investment.clone());
        investment
    }

    pub fn investment_row(&self, id: Uuid) -> Option<Investment> {
        self.tables
            .lock()
            .investments
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn investment_count(&self) -> usize {
        self.tables.lock().investments.len()
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        let mut clients: Vec<Client> = tables
            .clients
            .iter()
            .filter(|c| c.is_active() && c.is_owned_by(user_id))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()).then(a.id.cmp(&b.id)));
        Ok(clients)
    }

    async fn list_for_select(&self, user_id: Uuid) -> Result<Vec<ClientOption>, sqlx::Error> {
        let clients = ClientRepository::list_by_owner(self, user_id).await?;
        Ok(clients
            .into_iter()
            .map(|c| ClientOption {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Client>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables.active_client(id).cloned())
    }

    async fn email_taken(
        &self,
        user_id: Uuid,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        if tables.stale_lookups {
            return Ok(false);
        }
        Ok(tables.clients.iter().any(|c| {
            c.is_active()
                && c.is_owned_by(user_id)
                && c.email.as_deref() == Some(email)
                && Some(c.id) != except
        }))
    }

    async fn insert(&self, user_id: Uuid, input: CreateClient) -> Result<Client, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        let client = Client::new(user_id, input.name, input.email);
        tables.check_client_email(user_id, client.email.as_deref(), client.id)?;
        tables.clients.push(client.clone());
        Ok(client)
    }

    async fn update(&self, id: Uuid, changes: UpdateClient) -> Result<Option<Client>, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        let Some(owner) = tables.active_client(id).map(|c| c.user_id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email.as_deref() {
            tables.check_client_email(owner, Some(email), id)?;
        }
        let Some(client) = tables.clients.iter_mut().find(|c| c.id == id && c.is_active()) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            client.name = name;
        }
        if let Some(email) = changes.email {
            client.email = Some(email);
        }
        client.updated_at = Utc::now();
        Ok(Some(client.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        match tables.clients.iter_mut().find(|c| c.id == id && c.is_active()) {
            Some(client) => {
                client.deleted_at = Some(Utc::now());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl InvestmentRepository for InMemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Investment>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables.investments.iter().find(|i| i.id == id).cloned())
    }

    async fn insert(&self, input: CreateInvestment) -> Result<Investment, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        let mut investment = Investment::new(input);
        investment.created_at = tables.next_created_at();
        tables.investments.push(investment.clone());
        Ok(investment)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: UpdateInvestment,
    ) -> Result<Option<Investment>, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables
            .investments
            .iter_mut()
            .find(|i| i.id == id)
            .map(|investment| {
                investment.apply(&changes);
                investment.clone()
            }))
    }

    async fn delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        let before = tables.investments.len();
        tables.investments.retain(|i| i.id != id);
        Ok((before - tables.investments.len()) as u64)
    }

    async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<Investment>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        let mut investments: Vec<Investment> = tables
            .investments
            .iter()
            .filter(|i| i.client_id == client_id)
            .cloned()
            .collect();
        investments.sort_by(newest_first);
        Ok(investments)
    }

    async fn page_by_owner(
        &self,
        scope: OwnerScope,
        page: PageRequest,
    ) -> Result<Page<InvestmentDetail>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        let mut rows = tables.scoped(scope);
        rows.sort_by(|(a, _), (b, _)| newest_first(a, b));
        let total = rows.len() as i64;

        let data = rows
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .filter_map(|(inv, client)| {
                let asset = tables.assets.iter().find(|a| a.id == inv.asset_id)?;
                Some(InvestmentDetail::from(InvestmentDetailRow {
                    id: inv.id,
                    client_id: inv.client_id,
                    asset_id: inv.asset_id,
                    amount: inv.amount.clone(),
                    investment_date: inv.investment_date,
                    created_at: inv.created_at,
                    updated_at: inv.updated_at,
                    client_name: client.name.clone(),
                    asset_symbol: asset.symbol.clone(),
                    asset_name: asset.name.clone(),
                    asset_type: asset.asset_type,
                }))
            })
            .collect();

        Ok(Page::new(data, page, total))
    }

    async fn sum_between(
        &self,
        scope: OwnerScope,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<BigDecimal, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables
            .scoped(scope)
            .into_iter()
            .filter(|(inv, _)| inv.investment_date >= from && inv.investment_date < until)
            .fold(BigDecimal::from(0), |sum, (inv, _)| sum + &inv.amount))
    }

    async fn totals_by_asset(&self, scope: OwnerScope) -> Result<Vec<AssetTotal>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        let mut totals: Vec<AssetTotal> = Vec::new();
        for (inv, _) in tables.scoped(scope) {
            match totals.iter_mut().find(|t| t.asset_id == inv.asset_id) {
                Some(total) => total.total = total.total.clone() + &inv.amount,
                None => {
                    let symbol = tables
                        .assets
                        .iter()
                        .find(|a| a.id == inv.asset_id)
                        .map(|a| a.symbol.clone())
                        .unwrap_or_default();
                    totals.push(AssetTotal {
                        asset_id: inv.asset_id,
                        symbol,
                        total: inv.amount.clone(),
                    });
                }
            }
        }
        Ok(totals)
    }
}

#[async_trait]
impl AssetRepository for InMemoryStore {
    async fn list_for_select(&self) -> Result<Vec<AssetOption>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        let mut options: Vec<AssetOption> = tables.assets.iter().map(AssetOption::from).collect();
        options.sort_by(|a, b| a.symbol.as_bytes().cmp(b.symbol.as_bytes()));
        Ok(options)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Asset>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables.assets.iter().find(|a| a.id == id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let tables = self.tables.lock();
        tables.check_available()?;
        if tables.stale_lookups {
            return Ok(None);
        }
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, input: NewUser) -> Result<User, sqlx::Error> {
        let mut tables = self.tables.lock();
        tables.check_available()?;
        if tables.users.iter().any(|u| u.email == input.email) {
            return Err(unique_violation("users_email_key"));
        }
        let user = User::new(input);
        tables.users.push(user.clone());
        Ok(user)
    }
}

/// Clock frozen at noon (server local time) of a given day.
pub struct FixedClock {
    today: NaiveDate,
}

impl FixedClock {
    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        let noon = self.today.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
        Local
            .from_local_datetime(&noon)
            .earliest()
            .unwrap_or_else(|| Utc.from_utc_datetime(&noon).with_timezone(&Local))
    }

    fn utc(&self) -> DateTime<Utc> {
        self.local().with_timezone(&Utc)
    }
}

/// Application state over `store`, signing tokens with [`TEST_SECRET`].
pub fn test_state(store: InMemoryStore, clock: Arc<dyn Clock + Send + Sync>) -> AppState {
    AppState::new(store, clock, TokenKeys::new(TEST_SECRET, 60), 15)
}
