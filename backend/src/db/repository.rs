use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{asset_queries, client_queries, investment_queries, user_queries};
use crate::models::{
    Asset, AssetOption, AssetTotal, Client, ClientOption, CreateClient, CreateInvestment,
    Investment, InvestmentDetail, NewUser, OwnerScope, Page, PageRequest, UpdateClient,
    UpdateInvestment, User,
};

// Persistence seams used by the services. `PgStore` backs them with Postgres;
// tests swap in an in-memory store.

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Active clients of `user_id`, ordered by name.
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>, sqlx::Error>;

    async fn list_for_select(&self, user_id: Uuid) -> Result<Vec<ClientOption>, sqlx::Error>;

    /// Active client by id.
    async fn find(&self, id: Uuid) -> Result<Option<Client>, sqlx::Error>;

    /// Whether another active client of `user_id` already uses `email`.
    async fn email_taken(
        &self,
        user_id: Uuid,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>;

    async fn insert(&self, user_id: Uuid, input: CreateClient) -> Result<Client, sqlx::Error>;

    async fn update(&self, id: Uuid, changes: UpdateClient) -> Result<Option<Client>, sqlx::Error>;

    /// Marks the client deleted. Returns the number of rows touched.
    async fn soft_delete(&self, id: Uuid) -> Result<u64, sqlx::Error>;
}

#[async_trait]
pub trait InvestmentRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Investment>, sqlx::Error>;

    async fn insert(&self, input: CreateInvestment) -> Result<Investment, sqlx::Error>;

    async fn update(
        &self,
        id: Uuid,
        changes: UpdateInvestment,
    ) -> Result<Option<Investment>, sqlx::Error>;

    async fn delete(&self, id: Uuid) -> Result<u64, sqlx::Error>;

    async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<Investment>, sqlx::Error>;

    async fn page_by_owner(
        &self,
        scope: OwnerScope,
        page: PageRequest,
    ) -> Result<Page<InvestmentDetail>, sqlx::Error>;

    /// Sum of amounts dated in `[from, until)`.
    async fn sum_between(
        &self,
        scope: OwnerScope,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<BigDecimal, sqlx::Error>;

    /// All-time totals per asset, one entry per asset with investments in scope.
    async fn totals_by_asset(&self, scope: OwnerScope) -> Result<Vec<AssetTotal>, sqlx::Error>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn list_for_select(&self) -> Result<Vec<AssetOption>, sqlx::Error>;

    async fn find(&self, id: Uuid) -> Result<Option<Asset>, sqlx::Error>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    async fn insert(&self, input: NewUser) -> Result<User, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for PgStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>, sqlx::Error> {
        client_queries::fetch_by_owner(&self.pool, user_id).await
    }

    async fn list_for_select(&self, user_id: Uuid) -> Result<Vec<ClientOption>, sqlx::Error> {
        client_queries::fetch_options(&self.pool, user_id).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Client>, sqlx::Error> {
        client_queries::fetch_one(&self.pool, id).await
    }

    async fn email_taken(
        &self,
        user_id: Uuid,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        client_queries::email_taken(&self.pool, user_id, email, except).await
    }

    async fn insert(&self, user_id: Uuid, input: CreateClient) -> Result<Client, sqlx::Error> {
        client_queries::insert(&self.pool, Client::new(user_id, input.name, input.email)).await
    }

    async fn update(&self, id: Uuid, changes: UpdateClient) -> Result<Option<Client>, sqlx::Error> {
        client_queries::update(&self.pool, id, changes).await
    }

    async fn soft_delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        client_queries::soft_delete(&self.pool, id).await
    }
}

#[async_trait]
impl InvestmentRepository for PgStore {
    async fn find(&self, id: Uuid) -> Result<Option<Investment>, sqlx::Error> {
        investment_queries::fetch_one(&self.pool, id).await
    }

    async fn insert(&self, input: CreateInvestment) -> Result<Investment, sqlx::Error> {
        investment_queries::insert(&self.pool, Investment::new(input)).await
    }

    async fn update(
        &self,
        id: Uuid,
        changes: UpdateInvestment,
    ) -> Result<Option<Investment>, sqlx::Error> {
        investment_queries::update(&self.pool, id, changes).await
    }

    async fn delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        investment_queries::delete(&self.pool, id).await
    }

    async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<Investment>, sqlx::Error> {
        investment_queries::fetch_by_client(&self.pool, client_id).await
    }

    async fn page_by_owner(
        &self,
        scope: OwnerScope,
        page: PageRequest,
    ) -> Result<Page<InvestmentDetail>, sqlx::Error> {
        investment_queries::fetch_page_by_owner(&self.pool, scope, page).await
    }

    async fn sum_between(
        &self,
        scope: OwnerScope,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<BigDecimal, sqlx::Error> {
        investment_queries::sum_between(&self.pool, scope, from, until).await
    }

    async fn totals_by_asset(&self, scope: OwnerScope) -> Result<Vec<AssetTotal>, sqlx::Error> {
        investment_queries::totals_by_asset(&self.pool, scope).await
    }
}

#[async_trait]
impl AssetRepository for PgStore {
    async fn list_for_select(&self) -> Result<Vec<AssetOption>, sqlx::Error> {
        asset_queries::fetch_options(&self.pool).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<Asset>, sqlx::Error> {
        asset_queries::fetch_one(&self.pool, id).await
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        user_queries::fetch_one(&self.pool, id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        user_queries::fetch_by_email(&self.pool, email).await
    }

    async fn insert(&self, input: NewUser) -> Result<User, sqlx::Error> {
        user_queries::insert(&self.pool, User::new(input)).await
    }
}
