use tracing::{info, warn};
use uuid::Uuid;

use crate::db::ClientRepository;
use crate::errors::{is_unique_violation, AppError};
use crate::models::{Client, ClientOption, CreateClient, UpdateClient};

const DUPLICATE_EMAIL: &str = "Já existe um cliente com este e-mail.";

pub async fn list_by_owner(repo: &dyn ClientRepository, user_id: Uuid) -> Result<Vec<Client>, AppError> {
    let clients = repo.list_by_owner(user_id).await?;
    Ok(clients)
}

pub async fn list_for_select(
    repo: &dyn ClientRepository,
    user_id: Uuid,
) -> Result<Vec<ClientOption>, AppError> {
    let options = repo.list_for_select(user_id).await?;
    Ok(options)
}

pub async fn get_by_id(repo: &dyn ClientRepository, id: Uuid) -> Result<Client, AppError> {
    repo.find(id).await?.ok_or(AppError::NotFound)
}

/// The client if `user_id` owns it. Missing and foreign ids look the same.
pub async fn ensure_owned(
    repo: &dyn ClientRepository,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<Client, AppError> {
    match repo.find(client_id).await? {
        Some(client) if client.is_owned_by(user_id) => Ok(client),
        Some(_) => {
            warn!("User {} attempted to act on client {} owned by someone else", user_id, client_id);
            Err(AppError::Forbidden)
        }
        None => Err(AppError::Forbidden),
    }
}

pub async fn create(repo: &dyn ClientRepository, input: CreateClient) -> Result<Client, AppError> {
    let user_id = input
        .user_id
        .ok_or_else(|| AppError::invalid("user_id", "O cliente precisa pertencer a um consultor."))?;

    if let Some(email) = input.email.as_deref() {
        if repo.email_taken(user_id, email, None).await? {
            return Err(AppError::invalid("email", DUPLICATE_EMAIL));
        }
    }

    let client = repo.insert(user_id, input).await.map_err(map_write_error)?;
    info!("Created client {} for user {}", client.id, user_id);
    Ok(client)
}

pub async fn update(
    repo: &dyn ClientRepository,
    id: Uuid,
    input: UpdateClient,
) -> Result<Client, AppError> {
    let existing = get_by_id(repo, id).await?;

    if let Some(email) = input.email.as_deref() {
        if repo.email_taken(existing.user_id, email, Some(existing.id)).await? {
            return Err(AppError::invalid("email", DUPLICATE_EMAIL));
        }
    }

    repo.update(id, input)
        .await
        .map_err(map_write_error)?
        .ok_or(AppError::NotFound)
}

pub async fn delete(repo: &dyn ClientRepository, id: Uuid) -> Result<(), AppError> {
    match repo.soft_delete(id).await? {
        0 => Err(AppError::NotFound),
        _ => {
            info!("Soft-deleted client {}", id);
            Ok(())
        }
    }
}

// The unique index on (user_id, email) is the real guard; the pre-check above
// only gives a friendlier path when there is no race.
fn map_write_error(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::invalid("email", DUPLICATE_EMAIL)
    } else {
        AppError::Db(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    fn new_client(user_id: Uuid, name: &str, email: &str) -> CreateClient {
        CreateClient {
            user_id: Some(user_id),
            name: name.to_string(),
            email: Some(email.to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_for_same_owner_fails() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;

        create(&store, new_client(owner, "Ana Costa", "ana@x.com")).await.unwrap();
        let err = create(&store, new_client(owner, "Ana C.", "ana@x.com")).await.unwrap_err();

        match err {
            AppError::Validation(errors) => assert_eq!(errors.get("email"), Some(DUPLICATE_EMAIL)),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(list_by_owner(&store, owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_email_under_different_owners_succeeds() {
        let store = InMemoryStore::new();
        let first = store.add_user("Um", "um@x.com").id;
        let second = store.add_user("Dois", "dois@x.com").id;

        assert!(create(&store, new_client(first, "Ana", "ana@x.com")).await.is_ok());
        assert!(create(&store, new_client(second, "Ana", "ana@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_owner_fails_validation() {
        let store = InMemoryStore::new();
        let input = CreateClient {
            user_id: None,
            name: "Sem Dono".into(),
            email: None,
        };

        let err = create(&store, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.has("user_id")));
    }

    #[tokio::test]
    async fn test_soft_deleted_client_frees_its_email() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        let client = create(&store, new_client(owner, "Ana", "ana@x.com")).await.unwrap();

        delete(&store, client.id).await.unwrap();

        assert!(create(&store, new_client(owner, "Ana", "ana@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_sorted_by_name() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Um", "um@x.com").id;
        let other = store.add_user("Dois", "dois@x.com").id;
        store.add_client(owner, "Carlos", "carlos@x.com");
        store.add_client(owner, "Ana", "ana@x.com");
        store.add_client(owner, "Bruno", "bruno@x.com");
        store.add_client(other, "Aaron", "aaron@x.com");

        let names: Vec<String> = list_by_owner(&store, owner)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Bruno", "Carlos"]);

        let options = list_for_select(&store, owner).await.unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_update_rechecks_email_excluding_self() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        let ana = store.add_client(owner, "Ana", "ana@x.com");
        store.add_client(owner, "Bruno", "bruno@x.com");

        let same = UpdateClient {
            name: Some("Ana Costa".into()),
            email: Some("ana@x.com".into()),
        };
        let updated = update(&store, ana.id, same).await.unwrap();
        assert_eq!(updated.name, "Ana Costa");

        let clash = UpdateClient {
            name: None,
            email: Some("bruno@x.com".into()),
        };
        let err = update(&store, ana.id, clash).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.has("email")));
    }

    #[tokio::test]
    async fn test_update_unknown_client_is_not_found() {
        let store = InMemoryStore::new();
        let err = update(&store, Uuid::new_v4(), UpdateClient::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_hides_client_but_keeps_row() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        let client = store.add_client(owner, "Ana", "ana@x.com");

        delete(&store, client.id).await.unwrap();

        assert!(matches!(get_by_id(&store, client.id).await, Err(AppError::NotFound)));
        assert!(list_by_owner(&store, owner).await.unwrap().is_empty());
        assert!(store.client_row(client.id).unwrap().deleted_at.is_some());
        assert!(matches!(delete(&store, client.id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_ensure_owned_hides_foreign_and_missing_clients() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Um", "um@x.com").id;
        let intruder = store.add_user("Dois", "dois@x.com").id;
        let client = store.add_client(owner, "Ana", "ana@x.com");

        assert!(ensure_owned(&store, owner, client.id).await.is_ok());
        assert!(matches!(
            ensure_owned(&store, intruder, client.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_owned(&store, owner, Uuid::new_v4()).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_unique_index_violation_on_insert_is_an_email_error() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        store.add_client(owner, "Ana Costa", "ana@x.com");
        store.set_stale_lookups(true);

        let err = create(&store, new_client(owner, "Ana C.", "ana@x.com")).await.unwrap_err();

        match err {
            AppError::Validation(errors) => assert_eq!(errors.get("email"), Some(DUPLICATE_EMAIL)),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(list_by_owner(&store, owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_index_violation_on_update_is_an_email_error() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        let ana = store.add_client(owner, "Ana", "ana@x.com");
        store.add_client(owner, "Bruno", "bruno@x.com");
        store.set_stale_lookups(true);

        let clash = UpdateClient {
            name: None,
            email: Some("bruno@x.com".into()),
        };
        let err = update(&store, ana.id, clash).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ref e) if e.get("email") == Some(DUPLICATE_EMAIL)
        ));
        assert_eq!(store.client_row(ana.id).unwrap().email.as_deref(), Some("ana@x.com"));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_db_error() {
        let store = InMemoryStore::new();
        let owner = store.add_user("Consultor", "consultor@x.com").id;
        store.set_unavailable(true);

        assert!(matches!(list_by_owner(&store, owner).await, Err(AppError::Db(_))));
        assert!(matches!(
            create(&store, new_client(owner, "Ana", "ana@x.com")).await,
            Err(AppError::Db(_))
        ));
    }
}
