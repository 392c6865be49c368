use crate::config::{InsightsConfig, VatMode};
use crate::fields::{FieldExtractor, FieldName, GENERAL_CATEGORY, UNKNOWN};
use crate::schema::{InvoiceRecord, LineItem, VatSource};
use crate::tables::extract_line_items;
use crate::utils::{clean_whitespace, parse_date_or_sentinel, round_cents};
use log::debug;
use serde::{Deserialize, Serialize};

/// Date format printed on invoices.
pub const INVOICE_DATE_FORMAT: &str = "%m/%d/%Y";

/// Raw per-invoice extraction result. `None` means the field was not present
/// in the source text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub invoice_no: Option<String>,
    /// Date as printed, `MM/DD/YYYY`.
    pub date: Option<String>,
    pub seller: Option<String>,
    pub client: Option<String>,
    pub category: Option<String>,
    pub total_amount: Option<f64>,
    pub vat: Option<f64>,
    pub net_amount: Option<f64>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl InvoiceFields {
    pub fn from_text(text: &str) -> Self {
        let fields = FieldExtractor::invoice();
        Self {
            invoice_no: fields.text(FieldName::InvoiceNo, text),
            date: fields.text(FieldName::Date, text),
            seller: fields.text(FieldName::Seller, text),
            client: fields.text(FieldName::Client, text),
            category: fields.text(FieldName::Category, text),
            total_amount: fields.amount(FieldName::Total, text),
            vat: fields.amount(FieldName::Vat, text),
            net_amount: fields.amount(FieldName::Net, text),
            line_items: extract_line_items(text),
        }
    }

    pub fn has_vat_breakdown(&self) -> bool {
        self.vat.is_some() || self.net_amount.is_some()
    }
}

/// Turns [`InvoiceFields`] into an [`InvoiceRecord`]. A pure function of the
/// fields and the configured VAT policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordNormalizer {
    vat_mode: VatMode,
    derived_vat_rate: f64,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(&InsightsConfig::default())
    }
}

impl RecordNormalizer {
    pub fn new(config: &InsightsConfig) -> Self {
        Self {
            vat_mode: config.vat_mode,
            derived_vat_rate: config.derived_vat_rate,
        }
    }

    pub fn select_policy(&self, fields: &InvoiceFields) -> VatSource {
        match self.vat_mode {
            VatMode::Extracted => VatSource::Extracted,
            VatMode::Derived => VatSource::Derived,
            VatMode::Auto if fields.has_vat_breakdown() => VatSource::Extracted,
            VatMode::Auto => VatSource::Derived,
        }
    }

    pub fn normalize(&self, fields: &InvoiceFields) -> InvoiceRecord {
        let total_amount = fields.total_amount.unwrap_or(0.0).max(0.0);
        let policy = self.select_policy(fields);

        let (vat, net_amount) = match policy {
            VatSource::Derived => (round_cents(total_amount * self.derived_vat_rate), total_amount),
            VatSource::Extracted => {
                let net = fields.net_amount.map(|n| n.max(0.0));
                let vat = match (fields.vat, net) {
                    (Some(vat), _) => vat.max(0.0),
                    (None, Some(net)) => round_cents((total_amount - net).max(0.0)),
                    (None, None) => 0.0,
                };
                (vat, net.unwrap_or(total_amount))
            }
        };

        let id = text_or(&fields.invoice_no, UNKNOWN);
        debug!("Invoice {} normalized with {:?} VAT policy", id, policy);

        InvoiceRecord {
            id,
            date: fields
                .date
                .as_deref()
                .map(|raw| parse_date_or_sentinel(raw, INVOICE_DATE_FORMAT))
                .unwrap_or_else(crate::utils::sentinel_date),
            party: text_or(&fields.client, UNKNOWN),
            seller: text_or(&fields.seller, UNKNOWN),
            category: text_or(&fields.category, GENERAL_CATEGORY),
            total_amount,
            vat,
            net_amount,
            vat_source: policy,
            line_items: fields.line_items.clone(),
        }
    }
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(clean_whitespace)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
