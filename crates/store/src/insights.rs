//! Aggregate views over the ledger: summary statistics, top categories,
//! and a this-month-vs-last-month comparison.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;

use finsight_core::date_range::DateRange;
use finsight_core::transaction::Flow;

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct InsightSummary {
    pub transactions: i64,
    pub income_total: f64,
    pub expense_total: f64,
    pub income_mean: f64,
    pub expense_mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub frequency: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthComparison {
    pub income_this_month: f64,
    pub expense_this_month: f64,
    pub income_last_month: f64,
    pub expense_last_month: f64,
}

/// Totals and means over the range. `None` when the table is empty in range.
pub async fn summary(
    pool: &SqlitePool,
    range: &DateRange,
) -> Result<Option<InsightSummary>, StoreError> {
    let (count, income_total, expense_total, income_mean, expense_mean): (i64, f64, f64, f64, f64) =
        sqlx::query_as(
            "SELECT COUNT(*), \
             COALESCE(SUM(CASE WHEN amount >= 0 THEN amount END), 0.0), \
             COALESCE(SUM(CASE WHEN amount < 0 THEN amount END), 0.0), \
             COALESCE(AVG(CASE WHEN amount >= 0 THEN amount END), 0.0), \
             COALESCE(AVG(CASE WHEN amount < 0 THEN amount END), 0.0) \
             FROM bank WHERE DATE(date) BETWEEN ?1 AND ?2",
        )
        .bind(range.start_str())
        .bind(range.end_str())
        .fetch_one(pool)
        .await?;
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(InsightSummary {
        transactions: count,
        income_total,
        expense_total,
        income_mean,
        expense_mean,
    }))
}

/// The `n` most frequent top-level categories for one flow direction.
pub async fn top_categories(
    pool: &SqlitePool,
    range: &DateRange,
    flow: Flow,
    n: u32,
) -> Result<Vec<CategoryCount>, StoreError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT c1, COUNT(*) AS frequency FROM bank \
         WHERE inc_or_exp = ?1 AND c1 IS NOT NULL AND DATE(date) BETWEEN ?2 AND ?3 \
         GROUP BY c1 ORDER BY frequency DESC, c1 ASC LIMIT ?4",
    )
    .bind(flow.as_str())
    .bind(range.start_str())
    .bind(range.end_str())
    .bind(n)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(category, frequency)| CategoryCount { category, frequency })
        .collect())
}

/// Income and expense sums for the month containing `today` vs the month
/// before it (calendar months, year-aware).
pub async fn month_over_month(
    pool: &SqlitePool,
    today: NaiveDate,
) -> Result<MonthComparison, StoreError> {
    let this_month = format!("{:04}-{:02}", today.year(), today.month());
    let (last_year, last_month) = match today.month() {
        1 => (today.year() - 1, 12),
        m => (today.year(), m - 1),
    };
    let last_month = format!("{:04}-{:02}", last_year, last_month);

    let (income_this_month, expense_this_month) = month_sums(pool, &this_month).await?;
    let (income_last_month, expense_last_month) = month_sums(pool, &last_month).await?;
    Ok(MonthComparison {
        income_this_month,
        expense_this_month,
        income_last_month,
        expense_last_month,
    })
}

async fn month_sums(pool: &SqlitePool, bucket: &str) -> Result<(f64, f64), StoreError> {
    let row: (f64, f64) = sqlx::query_as(
        "SELECT \
         COALESCE(SUM(CASE WHEN amount >= 0 THEN amount END), 0.0), \
         COALESCE(SUM(CASE WHEN amount < 0 THEN amount END), 0.0) \
         FROM bank WHERE strftime('%Y-%m', date) = ?1",
    )
    .bind(bucket)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
