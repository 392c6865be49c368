//! Opaque collaborators (OCR, document text, text generation) and the
//! boundary that shields the core from their failures.
//!
//! A collaborator error never reaches the parsers: it is logged and replaced
//! by empty text, which parses into an all-defaults record.

use crate::aggregator::InvoicePortfolio;
use crate::coercer::coerce_response;
use crate::config::InsightsConfig;
use crate::error::Result;
use crate::normalizer::{InvoiceFields, RecordNormalizer};
use crate::overview::parse_overview_text;
use crate::schema::{InvoiceRecord, ProjectOverviewRecord};
use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Text recognition over an image file.
pub trait TextFromImage {
    fn extract_text_from_image(&self, path: &Path) -> std::result::Result<String, CollaboratorError>;
}

/// Text extraction from a document such as a PDF, pages concatenated.
pub trait TextFromDocument {
    fn extract_text_from_document(
        &self,
        path: &Path,
    ) -> std::result::Result<String, CollaboratorError>;
}

/// Free-form text generation from a prompt. Output format is not guaranteed.
pub trait TextGenerator {
    fn generate_text(&self, prompt: &str) -> std::result::Result<String, CollaboratorError>;
}

fn or_empty(what: &str, subject: &str, result: std::result::Result<String, CollaboratorError>) -> String {
    result.unwrap_or_else(|e| {
        warn!("{} failed for {}: {}; continuing with empty text", what, subject, e);
        String::new()
    })
}

pub fn image_text(ocr: &dyn TextFromImage, path: &Path) -> String {
    or_empty("OCR", &path.display().to_string(), ocr.extract_text_from_image(path))
}

pub fn document_text(reader: &dyn TextFromDocument, path: &Path) -> String {
    or_empty(
        "Document text extraction",
        &path.display().to_string(),
        reader.extract_text_from_document(path),
    )
}

pub fn generated_text(generator: &dyn TextGenerator, prompt: &str) -> String {
    or_empty(
        "Text generation",
        &format!("a {}-byte prompt", prompt.len()),
        generator.generate_text(prompt),
    )
}

pub fn parse_invoice_image(
    ocr: &dyn TextFromImage,
    path: &Path,
    config: &InsightsConfig,
) -> InvoiceRecord {
    let text = image_text(ocr, path);
    RecordNormalizer::new(config).normalize(&InvoiceFields::from_text(&text))
}

pub fn parse_overview_document(reader: &dyn TextFromDocument, path: &Path) -> ProjectOverviewRecord {
    parse_overview_text(&document_text(reader, path))
}

/// Image files directly inside `dir`, sorted by file name. A missing or
/// unreadable directory yields no files.
pub fn list_invoice_images(dir: &Path, config: &InsightsConfig) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read invoice folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && config.is_image_file(path))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// OCRs and parses every invoice image in `dir`, sequentially, in file name
/// order.
pub fn process_invoice_folder(
    ocr: &dyn TextFromImage,
    dir: &Path,
    config: &InsightsConfig,
) -> InvoicePortfolio {
    let files = list_invoice_images(dir, config);
    info!("Processing {} invoice images from {}", files.len(), dir.display());

    let mut portfolio = InvoicePortfolio::new();
    for path in &files {
        portfolio.push(parse_invoice_image(ocr, path, config));
    }

    info!("Processed {} invoices", portfolio.len());
    portfolio
}

/// Asks `generator` for a structured answer and coerces the reply into a
/// JSON object. A failed generation surfaces as `MalformedResponse` with
/// empty raw text.
pub fn generate_structured(generator: &dyn TextGenerator, prompt: &str) -> Result<Value> {
    coerce_response(&generated_text(generator, prompt))
}
