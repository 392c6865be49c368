//! Recovery of one JSON object from free-form generated text.
//!
//! Strategies are tried in a fixed order and the first that yields a JSON
//! object wins:
//!
//! 1. the whole text,
//! 2. the interior of a fenced block (```` ```json ... ``` ````),
//! 3. the span from the first `{` to the last `}`.
//!
//! When all three fail the raw text is returned inside
//! [`InsightsError::MalformedResponse`]. A partial object is never returned.

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use crate::normalizer::{InvoiceFields, RecordNormalizer, INVOICE_DATE_FORMAT};
use crate::schema::{InvoiceRecord, LineItem};
use crate::utils::parse_amount;
use chrono::NaiveDate;
use log::{debug, warn};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("fence regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Fenced,
    BraceSpan,
}

fn parse_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(Value::is_object)
}

fn try_strategy(strategy: Strategy, text: &str) -> Option<Value> {
    match strategy {
        Strategy::Direct => parse_object(text.trim()),
        Strategy::Fenced => fence_re()
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_object(m.as_str())),
        Strategy::BraceSpan => {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            if end <= start {
                return None;
            }
            parse_object(&text[start..=end])
        }
    }
}

/// Extracts a single JSON object from `text`.
pub fn coerce_response(text: &str) -> Result<Value> {
    for strategy in [Strategy::Direct, Strategy::Fenced, Strategy::BraceSpan] {
        if let Some(value) = try_strategy(strategy, text) {
            debug!("Response coerced with {:?} strategy", strategy);
            return Ok(value);
        }
    }

    warn!("No JSON object could be recovered from {} bytes of response text", text.len());
    Err(InsightsError::MalformedResponse {
        raw: text.to_string(),
    })
}

/// Coerces `text` and deserializes the object into `T`.
pub fn coerce_into<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = coerce_response(text)?;
    Ok(serde_json::from_value(value)?)
}

/// Lowercased key with everything but letters and digits removed, so
/// `Invoice No`, `invoice_no` and `invoiceNo` compare equal.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn lookup<'v>(object: &'v Map<String, Value>, aliases: &[&str]) -> Option<&'v Value> {
    object
        .iter()
        .find(|(key, value)| !value.is_null() && aliases.contains(&normalize_key(key).as_str()))
        .map(|(_, value)| value)
}

fn loose_text(object: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match lookup(object, aliases)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn loose_amount(object: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    match lookup(object, aliases)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.chars().any(|c| c.is_ascii_digit()) => Some(parse_amount(s)),
        _ => None,
    }
}

/// Invoice dates arrive as `MM/DD/YYYY` or ISO `YYYY-MM-DD`; the latter is
/// rewritten into the invoice format.
fn loose_date(object: &Map<String, Value>) -> Option<String> {
    let raw = loose_text(object, &["date", "invoicedate", "dateofissue", "issuedate"])?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date.format(INVOICE_DATE_FORMAT).to_string()),
        Err(_) => Some(raw),
    }
}

fn loose_line_items(object: &Map<String, Value>) -> Vec<LineItem> {
    let Some(Value::Array(items)) = lookup(object, &["lineitems", "items"]) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(i, item)| LineItem {
            item_no: i + 1,
            description: loose_text(item, &["description", "name"])
                .unwrap_or_else(|| format!("Item {}", i + 1)),
            quantity: loose_amount(item, &["quantity", "qty"]).unwrap_or(0.0),
            unit_price: loose_amount(item, &["unitprice", "price"]).unwrap_or(0.0),
            net_worth: loose_amount(item, &["networth", "net"]).unwrap_or(0.0),
            vat_percent: loose_amount(item, &["vatpercent", "vatrate", "vat"]).unwrap_or(0.0),
            gross_worth: loose_amount(item, &["grossworth", "gross", "total"]).unwrap_or(0.0),
        })
        .collect()
}

/// Maps a loosely keyed JSON object onto [`InvoiceFields`].
pub fn invoice_fields_from_value(value: &Value) -> InvoiceFields {
    let Some(object) = value.as_object() else {
        return InvoiceFields::default();
    };

    InvoiceFields {
        invoice_no: loose_text(object, &["invoiceno", "invoicenumber", "id"]),
        date: loose_date(object),
        seller: loose_text(object, &["seller", "vendor", "supplier"]),
        client: loose_text(object, &["client", "party", "customer"]),
        category: loose_text(object, &["category"]),
        total_amount: loose_amount(object, &["totalamount", "total", "grossworth"]),
        vat: loose_amount(object, &["vat", "vatamount", "tax"]),
        net_amount: loose_amount(object, &["netamount", "net", "networth"]),
        line_items: loose_line_items(object),
    }
}

/// Coerces generated text into an invoice record through the same normalizer
/// used for OCR text.
pub fn coerce_invoice(text: &str, config: &InsightsConfig) -> Result<InvoiceRecord> {
    let value = coerce_response(text)?;
    let fields = invoice_fields_from_value(&value);
    Ok(RecordNormalizer::new(config).normalize(&fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VatSource;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_fenced_object_inside_prose() {
        let value = coerce_response("prefix ```json {\"a\":1} ``` suffix").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_no_json_is_malformed() {
        match coerce_response("no json here") {
            Err(InsightsError::MalformedResponse { raw }) => assert_eq!(raw, "no json here"),
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            try_strategy(Strategy::Direct, "  {\"a\": [1, 2]}\n"),
            Some(json!({"a": [1, 2]}))
        );
        assert_eq!(try_strategy(Strategy::Direct, "42"), None);

        let text = "Here you go:\n```\n{\"b\": true}\n```";
        assert_eq!(try_strategy(Strategy::Fenced, text), Some(json!({"b": true})));

        let text = "Result: {\"c\": {\"d\": 1}} hope this helps";
        assert_eq!(try_strategy(Strategy::Fenced, text), None);
        assert_eq!(coerce_response(text).unwrap(), json!({"c": {"d": 1}}));
    }

    #[test]
    fn test_broken_span_fails_whole_chain() {
        let err = coerce_response("start { not: valid } end").unwrap_err();
        assert!(matches!(err, InsightsError::MalformedResponse { .. }));
        assert!(coerce_response("} reversed {").is_err());
    }

    #[test]
    fn test_coerce_into_typed() {
        #[derive(Debug, Deserialize)]
        struct Reply {
            title: String,
        }
        let reply: Reply = coerce_into("```json\n{\"title\": \"Plan\"}\n```").unwrap();
        assert_eq!(reply.title, "Plan");

        let err = coerce_into::<Reply>("{\"other\": 1}").unwrap_err();
        assert!(matches!(err, InsightsError::SerializationError(_)));
    }

    #[test]
    fn test_coerce_invoice_with_loose_keys() {
        let text = r#"Sure! ```json
{"Invoice No": "INV-9", "Date": "2021-03-15", "Client": "Castro PLC",
 "Total Amount": "$1,234.56", "VAT": 123.45, "Net Amount": null,
 "items": [{"qty": 2, "unit_price": "46.55", "net_worth": 93.1, "vat_percent": "10%", "gross_worth": 102.41}]}
```"#;
        let record = coerce_invoice(text, &InsightsConfig::default()).unwrap();
        assert_eq!(record.id, "INV-9");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2021, 3, 15).unwrap());
        assert_eq!(record.party, "Castro PLC");
        assert_eq!(record.total_amount, 1234.56);
        assert_eq!(record.vat, 123.45);
        assert_eq!(record.net_amount, 1234.56);
        assert_eq!(record.vat_source, VatSource::Extracted);
        assert_eq!(record.line_items.len(), 1);
        assert_eq!(record.line_items[0].description, "Item 1");
        assert_eq!(record.line_items[0].quantity, 2.0);
        assert_eq!(record.line_items[0].vat_percent, 10.0);
    }

    #[test]
    fn test_coerce_invoice_defaults_missing_fields() {
        let record = coerce_invoice("{}", &InsightsConfig::default()).unwrap();
        assert_eq!(record.id, "Unknown");
        assert_eq!(record.total_amount, 0.0);
        assert_eq!(record.vat_source, VatSource::Derived);
    }
}
