use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::InvestmentRepository;
use crate::errors::AppError;
use crate::models::{
    AssetTotal, CreateInvestment, Investment, InvestmentDetail, InvestmentStats, OwnerScope, Page,
    PageRequest, UpdateInvestment,
};
use crate::validation::{check_contribution, AmountFloor};

/// Records a contribution. Ownership of the target client is the caller's job.
pub async fn create(
    repo: &dyn InvestmentRepository,
    input: CreateInvestment,
    today: NaiveDate,
) -> Result<Investment, AppError> {
    check_contribution(
        Some(&input.amount),
        AmountFloor::Contribution,
        Some(input.investment_date),
        today,
    )
    .into_result()
    .map_err(|e| {
        warn!("Rejected investment for client {}: {}", input.client_id, e);
        e
    })?;

    let investment = repo.insert(input).await?;
    info!("Created investment {} for client {}", investment.id, investment.client_id);
    Ok(investment)
}

pub async fn update(
    repo: &dyn InvestmentRepository,
    id: Uuid,
    input: UpdateInvestment,
    today: NaiveDate,
) -> Result<Investment, AppError> {
    repo.find(id).await?.ok_or(AppError::NotFound)?;

    check_contribution(
        input.amount.as_ref(),
        AmountFloor::Adjustment,
        input.investment_date,
        today,
    )
    .into_result()?;

    repo.update(id, input).await?.ok_or(AppError::NotFound)
}

pub async fn delete(repo: &dyn InvestmentRepository, id: Uuid) -> Result<(), AppError> {
    match repo.delete(id).await? {
        0 => Err(AppError::NotFound),
        _ => {
            info!("Deleted investment {}", id);
            Ok(())
        }
    }
}

pub async fn get_by_id(repo: &dyn InvestmentRepository, id: Uuid) -> Result<Investment, AppError> {
    repo.find(id).await?.ok_or(AppError::NotFound)
}

pub async fn list_by_client(
    repo: &dyn InvestmentRepository,
    client_id: Uuid,
) -> Result<Vec<Investment>, AppError> {
    let investments = repo.list_by_client(client_id).await?;
    Ok(investments)
}

/// Newest contributions first, across the owner's active clients.
pub async fn list_by_owner(
    repo: &dyn InvestmentRepository,
    user_id: Uuid,
    page_size: u32,
    client_filter: Option<Uuid>,
    page: Option<u32>,
) -> Result<Page<InvestmentDetail>, AppError> {
    let scope = OwnerScope::new(user_id, client_filter);
    let page = repo
        .page_by_owner(scope, PageRequest::new(page, page_size))
        .await?;
    Ok(page)
}

pub async fn get_stats(
    repo: &dyn InvestmentRepository,
    user_id: Uuid,
    client_filter: Option<Uuid>,
    today: NaiveDate,
) -> Result<InvestmentStats, AppError> {
    let scope = OwnerScope::new(user_id, client_filter);
    let (from, until) = month_bounds(today);

    let total_current_month = repo.sum_between(scope, from, until).await?;
    let top = top_asset(repo.totals_by_asset(scope).await?);

    Ok(InvestmentStats {
        total_current_month,
        top_asset: top.as_ref().map(|t| t.symbol.clone()),
        top_asset_amount: top.map(|t| t.total),
    })
}

/// `[first day of the month, first day of the next month)` around `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    (first, next.unwrap_or(NaiveDate::MAX))
}

/// Largest cumulative amount wins; equal totals go to the lowest symbol so the
/// answer never depends on row order.
pub fn top_asset(totals: Vec<AssetTotal>) -> Option<AssetTotal> {
    totals.into_iter().reduce(|best, candidate| {
        if candidate.total > best.total
            || (candidate.total == best.total && candidate.symbol < best.symbol)
        {
            candidate
        } else {
            best
        }
    })
}
