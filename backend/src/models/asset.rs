use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Income class of an asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Fixed,
    Variable,
}

// A global investable instrument (stock, bond, fund). Not owned by any advisor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Asset {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct AssetOption {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            name: name.into(),
            asset_type,
            created_at: Utc::now(),
        }
    }
}

impl From<&Asset> for AssetOption {
    fn from(asset: &Asset) -> Self {
        Self {
            id: asset.id,
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
        }
    }
}
