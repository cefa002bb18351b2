use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FinsightError;

/// Whether a transaction moved money in or out, derived from the amount sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Income,
    Expense,
}

impl Flow {
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 { Flow::Expense } else { Flow::Income }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Income => "income",
            Flow::Expense => "expense",
        }
    }
}

/// One bank transaction after upload preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: Option<String>,
    pub date: NaiveDate,
    pub amount: f64,
    pub name: Option<String>,
    /// Category hierarchy levels, broadest first.
    pub c1: Option<String>,
    pub c2: Option<String>,
    pub c3: Option<String>,
    pub flow: Flow,
}

/// Merchant location attached to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub transaction_id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub store_number: Option<String>,
}

/// Payment metadata attached to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMeta {
    pub transaction_id: String,
    pub payee: Option<String>,
    pub payer: Option<String>,
    pub payment_method: Option<String>,
    pub payment_processor: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub by_order_of: Option<String>,
    pub ppd_id: Option<String>,
}

/// One weighted point for the geographic spending heatmap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub amount: f64,
}

/// Decode a serialized category hierarchy (a JSON array of strings, e.g.
/// `["Food and Drink", "Restaurants"]`) into at most three levels.
///
/// The upstream export encodes this field as a string; levels past the
/// third are dropped, empty strings become None. Anything that is not a
/// JSON array of strings is rejected.
pub fn decode_category_levels(raw: &str) -> Result<[Option<String>; 3], FinsightError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok([None, None, None]);
    }
    let levels: Vec<String> = serde_json::from_str(trimmed)
        .map_err(|_| FinsightError::CategoryDecode(raw.to_string()))?;
    let mut out = [None, None, None];
    for (slot, level) in out.iter_mut().zip(levels) {
        if !level.is_empty() {
            *slot = Some(level);
        }
    }
    Ok(out)
}
