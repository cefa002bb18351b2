//! Upload preprocessing: turn a raw bank CSV export into typed rows.
//!
//! The export encodes the category hierarchy and the location/payment
//! sub-records as JSON strings inside CSV fields. Those are decoded
//! strictly: a malformed value fails the ingest with the offending row,
//! it is never evaluated or guessed at.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use finsight_core::date_range::DATE_FORMAT;
use finsight_core::transaction::{
    decode_category_levels, Flow, Location, PaymentMeta, Transaction,
};

use crate::error::StoreError;

/// Typed rows produced from one uploaded export, ready for `Ledger::merge`.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub transactions: Vec<Transaction>,
    pub locations: Vec<Location>,
    pub payment_meta: Vec<PaymentMeta>,
}

/// Parse a CSV export. The first record is the header; header names are
/// normalized to lowercase with non-alphanumeric runs collapsed to `_`
/// (so "Transaction ID" and "transaction_id" address the same column).
pub fn parse_csv(input: &str) -> Result<IngestBatch, StoreError> {
    let mut records = split_records(input).into_iter();
    let header = records
        .next()
        .ok_or_else(|| StoreError::Ingest("empty upload".to_string()))?;
    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (normalize_header(name), i))
        .collect();
    for required in ["transaction_id", "date", "amount"] {
        if !columns.contains_key(required) {
            return Err(StoreError::Ingest(format!("missing required column: {}", required)));
        }
    }

    let mut batch = IngestBatch::default();
    for (row_number, record) in records.enumerate() {
        if record.len() > header.len() {
            return Err(StoreError::Ingest(format!(
                "row {} has {} fields, header has {}",
                row_number + 2,
                record.len(),
                header.len()
            )));
        }
        let field = |name: &str| -> Option<&str> {
            columns
                .get(name)
                .and_then(|&i| record.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };

        let transaction_id = field("transaction_id")
            .ok_or_else(|| StoreError::Ingest(format!("row {}: missing transaction_id", row_number + 2)))?
            .to_string();
        let date = parse_date(
            field("date")
                .ok_or_else(|| StoreError::Ingest(format!("row {}: missing date", row_number + 2)))?,
        )
        .ok_or_else(|| StoreError::Ingest(format!("row {}: unparseable date", row_number + 2)))?;
        let amount: f64 = field("amount")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| StoreError::Ingest(format!("row {}: unparseable amount", row_number + 2)))?;

        let [c1, c2, c3] = match field("category") {
            Some(raw) => decode_category_levels(raw)?,
            None => [None, None, None],
        };

        if let Some(raw) = field("location") {
            batch.locations.push(decode_location(&transaction_id, raw)?);
        }
        if let Some(raw) = field("payment_meta") {
            batch.payment_meta.push(decode_payment_meta(&transaction_id, raw)?);
        }

        batch.transactions.push(Transaction {
            flow: Flow::from_amount(amount),
            transaction_id,
            account_id: field("account_id").map(str::to_string),
            date,
            amount,
            name: field("name").map(str::to_string),
            c1,
            c2,
            c3,
        });
    }
    Ok(batch)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// Lowercase, collapse every non-alphanumeric run to a single `_`.
fn normalize_header(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn decode_object(transaction_id: &str, raw: &str) -> Result<serde_json::Map<String, Value>, StoreError> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(StoreError::Ingest(format!(
            "transaction {}: field is not a JSON object: {}",
            transaction_id, raw
        ))),
    }
}

fn str_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn f64_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

fn decode_location(transaction_id: &str, raw: &str) -> Result<Location, StoreError> {
    let map = decode_object(transaction_id, raw)?;
    Ok(Location {
        transaction_id: transaction_id.to_string(),
        address: str_field(&map, "address"),
        city: str_field(&map, "city"),
        state: str_field(&map, "state"),
        zip: str_field(&map, "zip"),
        lat: f64_field(&map, "lat"),
        lon: f64_field(&map, "lon"),
        store_number: str_field(&map, "store_number"),
    })
}

fn decode_payment_meta(transaction_id: &str, raw: &str) -> Result<PaymentMeta, StoreError> {
    let map = decode_object(transaction_id, raw)?;
    Ok(PaymentMeta {
        transaction_id: transaction_id.to_string(),
        payee: str_field(&map, "payee"),
        payer: str_field(&map, "payer"),
        payment_method: str_field(&map, "payment_method"),
        payment_processor: str_field(&map, "payment_processor"),
        reference_number: str_field(&map, "reference_number"),
        reason: str_field(&map, "reason"),
        by_order_of: str_field(&map, "by_order_of"),
        ppd_id: str_field(&map, "ppd_id"),
    })
}

/// Split CSV text into records of fields, honoring quoted fields (with `""`
/// escapes) that may contain commas and newlines.
fn split_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field_buf = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field_buf.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut field_buf));
            }
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field_buf));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field_buf.push(c),
        }
    }
    if !field_buf.is_empty() || !record.is_empty() {
        record.push(field_buf);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        "Transaction ID,Account ID,Date,Amount,Name,Category,Location\n",
        "t1,a1,2024-03-10,-20.50,Corner Cafe,\"[\"\"Food and Drink\"\", \"\"Restaurants\"\"]\",",
        "\"{\"\"city\"\": \"\"Fresno\"\", \"\"lat\"\": 36.74, \"\"lon\"\": -119.78}\"\n",
        "t2,a1,03/11/2024,1500.00,Payroll,\"[\"\"Transfer\"\"]\",\n",
    );

    #[test]
    fn parses_export_with_nested_json_fields() {
        let batch = parse_csv(SAMPLE).unwrap();
        assert_eq!(batch.transactions.len(), 2);
        assert_eq!(batch.locations.len(), 1);

        let t1 = &batch.transactions[0];
        assert_eq!(t1.transaction_id, "t1");
        assert_eq!(t1.date.to_string(), "2024-03-10");
        assert_eq!(t1.flow, Flow::Expense);
        assert_eq!(t1.c1.as_deref(), Some("Food and Drink"));
        assert_eq!(t1.c2.as_deref(), Some("Restaurants"));

        let t2 = &batch.transactions[1];
        assert_eq!(t2.date.to_string(), "2024-03-11");
        assert_eq!(t2.flow, Flow::Income);

        let loc = &batch.locations[0];
        assert_eq!(loc.city.as_deref(), Some("Fresno"));
        assert_eq!(loc.lat, Some(36.74));
    }

    #[test]
    fn rejects_malformed_category() {
        let input = "transaction_id,date,amount,category\nt1,2024-03-10,-5.0,\"not json\"\n";
        assert!(parse_csv(input).is_err());
    }

    #[test]
    fn rejects_missing_required_columns() {
        assert!(parse_csv("date,amount\n2024-03-10,-5.0\n").is_err());
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("Transaction ID"), "transaction_id");
        assert_eq!(normalize_header("  Amount ($) "), "amount");
        assert_eq!(normalize_header("inc_or_exp"), "inc_or_exp");
    }

    #[test]
    fn quoted_fields_may_contain_commas_and_newlines() {
        let records = split_records("a,\"x, y\nz\",c\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], vec!["a", "x, y\nz", "c"]);
    }
}
