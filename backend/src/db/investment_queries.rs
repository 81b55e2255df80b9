use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{
    AssetTotal, Investment, InvestmentDetail, InvestmentDetailRow, OwnerScope, Page, PageRequest,
    UpdateInvestment,
};

const INVESTMENT_COLUMNS: &str =
    "id, client_id, asset_id, amount, investment_date, created_at, updated_at";

const OWNED_INVESTMENTS: &str = " FROM investments JOIN clients ON clients.id = investments.client_id";

/// Restricts a query over `OWNED_INVESTMENTS` to the scope. Every query that
/// reaches investments through their client goes through here, so soft-deleted
/// clients never leak into listings or aggregates.
fn push_owner_scope(query_builder: &mut QueryBuilder<'_, Postgres>, scope: OwnerScope) {
    query_builder.push(" WHERE clients.deleted_at IS NULL AND clients.user_id = ");
    query_builder.push_bind(scope.user_id);
    if let Some(client_id) = scope.client_id {
        query_builder.push(" AND investments.client_id = ");
        query_builder.push_bind(client_id);
    }
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Investment>, sqlx::Error> {
    sqlx::query_as::<_, Investment>(&format!(
        "SELECT {INVESTMENT_COLUMNS} FROM investments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert(pool: &PgPool, input: Investment) -> Result<Investment, sqlx::Error> {
    sqlx::query_as::<_, Investment>(&format!(
        r#"
        INSERT INTO investments (id, client_id, asset_id, amount, investment_date, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {INVESTMENT_COLUMNS}
        "#
    ))
    .bind(input.id)
    .bind(input.client_id)
    .bind(input.asset_id)
    .bind(input.amount)
    .bind(input.investment_date)
    .bind(input.created_at)
    .bind(input.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: UpdateInvestment,
) -> Result<Option<Investment>, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE investments SET ");
    let mut separated = query_builder.separated(", ");

    if let Some(client_id) = changes.client_id {
        separated.push("client_id = ");
        separated.push_bind_unseparated(client_id);
    }
    if let Some(asset_id) = changes.asset_id {
        separated.push("asset_id = ");
        separated.push_bind_unseparated(asset_id);
    }
    if let Some(amount) = changes.amount {
        separated.push("amount = ");
        separated.push_bind_unseparated(amount);
    }
    if let Some(investment_date) = changes.investment_date {
        separated.push("investment_date = ");
        separated.push_bind_unseparated(investment_date);
    }
    separated.push("updated_at = NOW()");

    query_builder.push(" WHERE id = ");
    query_builder.push_bind(id);
    query_builder.push(" RETURNING ");
    query_builder.push(INVESTMENT_COLUMNS);

    query_builder
        .build_query_as::<Investment>()
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM investments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_by_client(
    pool: &PgPool,
    client_id: Uuid,
) -> Result<Vec<Investment>, sqlx::Error> {
    sqlx::query_as::<_, Investment>(&format!(
        r#"
        SELECT {INVESTMENT_COLUMNS}
        FROM investments
        WHERE client_id = $1
        ORDER BY investment_date DESC, created_at DESC, id DESC
        "#
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_page_by_owner(
    pool: &PgPool,
    scope: OwnerScope,
    page: PageRequest,
) -> Result<Page<InvestmentDetail>, sqlx::Error> {
    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*)");
    count_builder.push(OWNED_INVESTMENTS);
    push_owner_scope(&mut count_builder, scope);
    let (total,): (i64,) = count_builder.build_query_as().fetch_one(pool).await?;

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT investments.id, investments.client_id, investments.asset_id,
               investments.amount, investments.investment_date,
               investments.created_at, investments.updated_at,
               clients.name AS client_name,
               assets.symbol AS asset_symbol,
               assets.name AS asset_name,
               assets.type AS asset_type
        "#,
    );
    query_builder.push(OWNED_INVESTMENTS);
    query_builder.push(" JOIN assets ON assets.id = investments.asset_id");
    push_owner_scope(&mut query_builder, scope);
    query_builder.push(
        " ORDER BY investments.investment_date DESC, investments.created_at DESC, investments.id DESC",
    );
    query_builder.push(" LIMIT ");
    query_builder.push_bind(page.limit());
    query_builder.push(" OFFSET ");
    query_builder.push_bind(page.offset());

    let rows = query_builder
        .build_query_as::<InvestmentDetailRow>()
        .fetch_all(pool)
        .await?;

    Ok(Page::new(
        rows.into_iter().map(InvestmentDetail::from).collect(),
        page,
        total,
    ))
}

pub async fn sum_between(
    pool: &PgPool,
    scope: OwnerScope,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<BigDecimal, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COALESCE(SUM(investments.amount), 0)");
    query_builder.push(OWNED_INVESTMENTS);
    push_owner_scope(&mut query_builder, scope);
    query_builder.push(" AND investments.investment_date >= ");
    query_builder.push_bind(from);
    query_builder.push(" AND investments.investment_date < ");
    query_builder.push_bind(until);

    let (sum,): (BigDecimal,) = query_builder.build_query_as().fetch_one(pool).await?;
    Ok(sum)
}

pub async fn totals_by_asset(
    pool: &PgPool,
    scope: OwnerScope,
) -> Result<Vec<AssetTotal>, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT assets.id AS asset_id, assets.symbol, SUM(investments.amount) AS total",
    );
    query_builder.push(OWNED_INVESTMENTS);
    query_builder.push(" JOIN assets ON assets.id = investments.asset_id");
    push_owner_scope(&mut query_builder, scope);
    query_builder.push(" GROUP BY assets.id, assets.symbol");
    query_builder.push(r#" ORDER BY total DESC, assets.symbol COLLATE "C" ASC"#);

    query_builder
        .build_query_as::<AssetTotal>()
        .fetch_all(pool)
        .await
}
