//! # Invoice Insights
//!
//! Turns noisy OCR text from scanned invoices and project overview documents
//! into structured records, and folds invoice records into dashboard-ready
//! spending statistics.
//!
//! ## Core Concepts
//!
//! - **Field extraction**: declarative regex field specs, each resolving to a
//!   sentinel default when it does not match
//! - **Table blocks**: sections bounded by the next known heading, split into
//!   bullet or semicolon entries that degrade to partial entries instead of
//!   being dropped
//! - **Normalization**: one canonical [`InvoiceRecord`] per document, with the
//!   VAT policy chosen from what the text actually contained
//! - **Aggregation**: sums, monthly and client rollups, a 5-bucket amount
//!   histogram and a naive linear forecast
//! - **Response coercion**: recovery of one JSON object from free-form
//!   generated text
//!
//! ## Example
//!
//! ```rust,ignore
//! use invoice_insights::*;
//!
//! let config = InsightsConfig::default();
//! let text = "Invoice no: 84652373\nDate of issue: 02/23/2021\n\
//!             Client: Castro PLC\nTax Id: 994-72-1270\nTotal $ 232.95";
//!
//! let record = parse_invoice_text(text, &config);
//! assert_eq!(record.id, "84652373");
//!
//! let payload = aggregate(&[record], &config).unwrap();
//! payload.write_json("public/invoice-dashboard.json").unwrap();
//! ```

pub mod aggregator;
pub mod coercer;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fields;
pub mod forecast;
pub mod normalizer;
pub mod overview;
pub mod schema;
pub mod tables;
pub mod utils;

pub use aggregator::{
    aggregate, aggregate_with_noise, amount_distribution, category_spending, client_spending,
    monthly_spending, InvoicePortfolio,
};
pub use coercer::{coerce_into, coerce_invoice, coerce_response};
pub use collaborators::{
    generate_structured, parse_invoice_image, parse_overview_document, process_invoice_folder,
    CollaboratorError, TextFromDocument, TextFromImage, TextGenerator,
};
pub use config::{InsightsConfig, VatMode};
pub use error::{InsightsError, Result};
pub use fields::{FieldExtractor, FieldName, FieldSpec};
pub use forecast::{
    least_squares_slope, GaussianNoise, NoiseSource, SpendingTrend, TrendSummary, ZeroNoise,
};
pub use normalizer::{InvoiceFields, RecordNormalizer};
pub use overview::parse_overview_text;
pub use schema::*;
pub use tables::SectionSpec;
pub use utils::*;

use log::{debug, info};
use std::path::Path;

/// Parses one invoice's OCR text into a fully defaulted record. Never fails.
pub fn parse_invoice_text(text: &str, config: &InsightsConfig) -> InvoiceRecord {
    let fields = InvoiceFields::from_text(text);
    debug!(
        "Extracted invoice fields: {} line items, VAT breakdown present: {}",
        fields.line_items.len(),
        fields.has_vat_breakdown()
    );
    RecordNormalizer::new(config).normalize(&fields)
}

/// Entry point bundling a validated configuration with the operations that
/// need it.
#[derive(Debug, Clone)]
pub struct InsightsProcessor {
    config: InsightsConfig,
}

impl InsightsProcessor {
    pub fn new(config: InsightsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(InsightsConfig::load(path)?)
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn parse_invoice_text(&self, text: &str) -> InvoiceRecord {
        parse_invoice_text(text, &self.config)
    }

    pub fn parse_invoice_texts<'a, I>(&self, texts: I) -> InvoicePortfolio
    where
        I: IntoIterator<Item = &'a str>,
    {
        texts
            .into_iter()
            .map(|text| self.parse_invoice_text(text))
            .collect()
    }

    pub fn process_folder(&self, ocr: &dyn TextFromImage, dir: impl AsRef<Path>) -> InvoicePortfolio {
        process_invoice_folder(ocr, dir.as_ref(), &self.config)
    }

    pub fn aggregate(&self, portfolio: &InvoicePortfolio) -> Result<AggregatePayload> {
        info!("Aggregating portfolio of {} invoices", portfolio.len());
        portfolio.aggregate(&self.config)
    }

    /// Aggregates `portfolio` and writes the dashboard payload to `path`.
    pub fn export_dashboard(
        &self,
        portfolio: &InvoicePortfolio,
        path: impl AsRef<Path>,
    ) -> Result<AggregatePayload> {
        let payload = self.aggregate(portfolio)?;
        payload.write_json(path)?;
        Ok(payload)
    }
}
