use uuid::Uuid;

use crate::db::AssetRepository;
use crate::errors::AppError;
use crate::models::AssetOption;

pub async fn list_for_select(repo: &dyn AssetRepository) -> Result<Vec<AssetOption>, AppError> {
    let assets = repo.list_for_select().await?;
    Ok(assets)
}

pub async fn exists(repo: &dyn AssetRepository, id: Uuid) -> Result<bool, AppError> {
    Ok(repo.find(id).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn test_assets_are_listed_by_symbol() {
        let store = InMemoryStore::with_reference_assets();
        let symbols: Vec<String> = list_for_select(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.symbol)
            .collect();

        assert_eq!(
            symbols,
            vec!["CDB_INTER", "HGLG11", "PETR4", "TESOURO_SELIC", "VALE3"]
        );
    }

    #[tokio::test]
    async fn test_exists() {
        let store = InMemoryStore::with_reference_assets();
        let petr = store.asset_by_symbol("PETR4").unwrap();

        assert!(exists(&store, petr.id).await.unwrap());
        assert!(!exists(&store, Uuid::new_v4()).await.unwrap());
    }
}
