use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{Client, ClientOption, UpdateClient};

const CLIENT_COLUMNS: &str = "id, user_id, name, email, deleted_at, created_at, updated_at";

pub async fn fetch_by_owner(pool: &PgPool, user_id: Uuid) -> Result<Vec<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        r#"
        SELECT {CLIENT_COLUMNS}
        FROM clients
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY name COLLATE "C" ASC, id ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_options(pool: &PgPool, user_id: Uuid) -> Result<Vec<ClientOption>, sqlx::Error> {
    sqlx::query_as::<_, ClientOption>(
        r#"
        SELECT id, name
        FROM clients
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY name COLLATE "C" ASC, id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn email_taken(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    except: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let (taken,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM clients
            WHERE user_id = $1
              AND email = $2
              AND deleted_at IS NULL
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn insert(pool: &PgPool, input: Client) -> Result<Client, sqlx::Error> {
    sqlx::query_as::<_, Client>(&format!(
        r#"
        INSERT INTO clients (id, user_id, name, email, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CLIENT_COLUMNS}
        "#
    ))
    .bind(input.id)
    .bind(input.user_id)
    .bind(input.name)
    .bind(input.email)
    .bind(input.created_at)
    .bind(input.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: UpdateClient,
) -> Result<Option<Client>, sqlx::Error> {
    if changes.is_empty() {
        return fetch_one(pool, id).await;
    }

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE clients SET ");
    let mut separated = query_builder.separated(", ");

    if let Some(name) = changes.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name);
    }
    if let Some(email) = changes.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    query_builder.push(", updated_at = NOW() WHERE id = ");
    query_builder.push_bind(id);
    query_builder.push(" AND deleted_at IS NULL RETURNING ");
    query_builder.push(CLIENT_COLUMNS);

    query_builder
        .build_query_as::<Client>()
        .fetch_optional(pool)
        .await
}

pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE clients SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
