use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{AssetType, Client};

// One contribution ("aporte") of an amount into an asset on behalf of a client.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Investment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub amount: BigDecimal,
    pub investment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvestment {
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub amount: BigDecimal,
    pub investment_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvestment {
    pub client_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub amount: Option<BigDecimal>,
    pub investment_date: Option<NaiveDate>,
}

impl Investment {
    pub(crate) fn new(input: CreateInvestment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id: input.client_id,
            asset_id: input.asset_id,
            amount: input.amount,
            investment_date: input.investment_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply(&mut self, changes: &UpdateInvestment) {
        if let Some(client_id) = changes.client_id {
            self.client_id = client_id;
        }
        if let Some(asset_id) = changes.asset_id {
            self.asset_id = asset_id;
        }
        if let Some(amount) = &changes.amount {
            self.amount = amount.clone();
        }
        if let Some(date) = changes.investment_date {
            self.investment_date = date;
        }
        self.updated_at = Utc::now();
    }
}

/// Which investments an aggregate or listing may see: those of active
/// clients owned by `user_id`, optionally narrowed to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    pub user_id: Uuid,
    pub client_id: Option<Uuid>,
}

impl OwnerScope {
    pub fn new(user_id: Uuid, client_id: Option<Uuid>) -> Self {
        Self { user_id, client_id }
    }

    /// In-memory twin of the SQL owner predicate.
    pub fn admits(&self, client: &Client) -> bool {
        client.is_active()
            && client.is_owned_by(self.user_id)
            && self.client_id.map_or(true, |id| id == client.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetSummary {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
}

/// Investment row eager-joined with its client and asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentDetail {
    pub id: Uuid,
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub amount: BigDecimal,
    pub investment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client: ClientSummary,
    pub asset: AssetSummary,
}

/// Flat shape of the investments/clients/assets join as it comes off the wire.
#[derive(Debug, Clone, FromRow)]
pub struct InvestmentDetailRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub asset_id: Uuid,
    pub amount: BigDecimal,
    pub investment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client_name: String,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_type: AssetType,
}

impl From<InvestmentDetailRow> for InvestmentDetail {
    fn from(row: InvestmentDetailRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            asset_id: row.asset_id,
            amount: row.amount,
            investment_date: row.investment_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            client: ClientSummary {
                id: row.client_id,
                name: row.client_name,
            },
            asset: AssetSummary {
                id: row.asset_id,
                symbol: row.asset_symbol,
                name: row.asset_name,
                asset_type: row.asset_type,
            },
        }
    }
}

/// Cumulative amount invested into one asset within a scope.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AssetTotal {
    pub asset_id: Uuid,
    pub symbol: String,
    pub total: BigDecimal,
}

/// Dashboard figures for an owner scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentStats {
    pub total_current_month: BigDecimal,
    pub top_asset: Option<String>,
    pub top_asset_amount: Option<BigDecimal>,
}
