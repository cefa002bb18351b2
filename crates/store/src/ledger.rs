use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;

use finsight_core::date_range::{DateRange, DATE_FORMAT};
use finsight_core::transaction::{Flow, HeatPoint, Transaction};

use crate::error::StoreError;
use crate::ingest::IngestBatch;

/// Sort direction for ledger reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(sqlx::FromRow)]
struct BankRow {
    transaction_id: String,
    account_id: Option<String>,
    date: String,
    amount: f64,
    name: Option<String>,
    c1: Option<String>,
    c2: Option<String>,
    c3: Option<String>,
}

impl BankRow {
    fn into_transaction(self) -> Result<Transaction, StoreError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|_| StoreError::Ingest(format!("stored date is not {}: {}", DATE_FORMAT, self.date)))?;
        Ok(Transaction {
            flow: Flow::from_amount(self.amount),
            transaction_id: self.transaction_id,
            account_id: self.account_id,
            date,
            amount: self.amount,
            name: self.name,
            c1: self.c1,
            c2: self.c2,
            c3: self.c3,
        })
    }
}

/// Read/write access to the bank transaction tables.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch transactions with dates inside the range, ordered by date.
    pub async fn fetch_range(
        &self,
        range: &DateRange,
        order: SortOrder,
    ) -> Result<Vec<Transaction>, StoreError> {
        let query = format!(
            "SELECT transaction_id, account_id, date, amount, name, c1, c2, c3 \
             FROM bank WHERE DATE(date) BETWEEN ?1 AND ?2 ORDER BY DATE(date) {}",
            order.as_sql()
        );
        let rows: Vec<BankRow> = sqlx::query_as(&query)
            .bind(range.start_str())
            .bind(range.end_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BankRow::into_transaction).collect()
    }

    /// Lat/lon/amount triples for the spending heatmap: transactions inside
    /// the range joined to their merchant locations.
    pub async fn heatmap_points(&self, range: &DateRange) -> Result<Vec<HeatPoint>, StoreError> {
        let rows: Vec<(f64, f64, f64)> = sqlx::query_as(
            "SELECT l.lat, l.lon, b.amount FROM bank b \
             INNER JOIN location l ON b.transaction_id = l.transaction_id \
             WHERE DATE(b.date) BETWEEN ?1 AND ?2 \
             AND l.lat IS NOT NULL AND l.lon IS NOT NULL",
        )
        .bind(range.start_str())
        .bind(range.end_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(lat, lon, amount)| HeatPoint { lat, lon, amount })
            .collect())
    }

    /// Upsert an ingest batch into the bank, location, and payment_meta
    /// tables in one transaction. Re-uploading the same export is a no-op
    /// row-for-row (INSERT OR REPLACE keyed on transaction_id).
    pub async fn merge(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for t in &batch.transactions {
            sqlx::query(
                "INSERT OR REPLACE INTO bank \
                 (transaction_id, account_id, date, amount, name, c1, c2, c3, inc_or_exp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&t.transaction_id)
            .bind(&t.account_id)
            .bind(t.date.format(DATE_FORMAT).to_string())
            .bind(t.amount)
            .bind(&t.name)
            .bind(&t.c1)
            .bind(&t.c2)
            .bind(&t.c3)
            .bind(t.flow.as_str())
            .execute(&mut *tx)
            .await?;
        }
        for l in &batch.locations {
            sqlx::query(
                "INSERT OR REPLACE INTO location \
                 (transaction_id, address, city, state, zip, lat, lon, store_number) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&l.transaction_id)
            .bind(&l.address)
            .bind(&l.city)
            .bind(&l.state)
            .bind(&l.zip)
            .bind(l.lat)
            .bind(l.lon)
            .bind(&l.store_number)
            .execute(&mut *tx)
            .await?;
        }
        for m in &batch.payment_meta {
            sqlx::query(
                "INSERT OR REPLACE INTO payment_meta \
                 (transaction_id, payee, payer, payment_method, payment_processor, \
                  reference_number, reason, by_order_of, ppd_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&m.transaction_id)
            .bind(&m.payee)
            .bind(&m.payer)
            .bind(&m.payment_method)
            .bind(&m.payment_processor)
            .bind(&m.reference_number)
            .bind(&m.reason)
            .bind(&m.by_order_of)
            .bind(&m.ppd_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!(
            "Merged {} transactions ({} locations, {} payment rows)",
            batch.transactions.len(),
            batch.locations.len(),
            batch.payment_meta.len()
        );
        Ok(())
    }

    /// Update the category levels of one transaction. Returns whether a row
    /// matched. Callers must invalidate the artifact cache afterwards.
    pub async fn update_categories(
        &self,
        transaction_id: &str,
        c1: Option<&str>,
        c2: Option<&str>,
        c3: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE bank SET c1 = ?2, c2 = ?3, c3 = ?4 WHERE transaction_id = ?1")
            .bind(transaction_id)
            .bind(c1)
            .bind(c2)
            .bind(c3)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every row from the data tables. Callers must invalidate the
    /// artifact cache afterwards.
    pub async fn truncate_all(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in ["bank", "location", "payment_meta"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Truncated all data tables");
        Ok(())
    }

    pub async fn most_recent_transaction_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT date FROM bank ORDER BY DATE(date) DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((date,)) => Ok(Some(NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(
                |_| StoreError::Ingest(format!("stored date is not {}: {}", DATE_FORMAT, date)),
            )?)),
            None => Ok(None),
        }
    }
}
