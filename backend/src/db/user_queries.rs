use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn insert(pool: &PgPool, input: User) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, name, email, password_hash, created_at",
    )
    .bind(input.id)
    .bind(input.name)
    .bind(input.email)
    .bind(input.password_hash)
    .bind(input.created_at)
    .fetch_one(pool)
    .await
}
