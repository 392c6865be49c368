//! Single-field recovery from OCR text.
//!
//! Every field is described by a [`FieldSpec`]: a label pattern, a value
//! pattern, case sensitivity and an optional list of terminator labels. Fields
//! are independent of each other; a field that does not match resolves to its
//! default and never fails the document.
//!
//! Terminated fields capture lazily up to the first terminator label found
//! anywhere after the field label. When the label that normally follows is
//! missing from the text, the capture runs on to the next terminator that does
//! appear and may include unrelated lines. That over-capture is kept as is.

use crate::utils::{clean_whitespace, parse_amount};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

pub const UNKNOWN: &str = "Unknown";
pub const GENERAL_CATEGORY: &str = "General";

/// Every field the invoice and overview tables know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    InvoiceNo,
    Date,
    Seller,
    Client,
    Category,
    Total,
    Vat,
    Net,
    Title,
    Product,
    Summary,
    Currency,
    BudgetTotal,
    Capex,
    Opex,
    Contingency,
    Funding,
}

impl FieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::InvoiceNo => "invoice_no",
            FieldName::Date => "date",
            FieldName::Seller => "seller",
            FieldName::Client => "client",
            FieldName::Category => "category",
            FieldName::Total => "total",
            FieldName::Vat => "vat",
            FieldName::Net => "net",
            FieldName::Title => "title",
            FieldName::Product => "product",
            FieldName::Summary => "summary",
            FieldName::Currency => "currency",
            FieldName::BudgetTotal => "budget_total",
            FieldName::Capex => "capex",
            FieldName::Opex => "opex",
            FieldName::Contingency => "contingency",
            FieldName::Funding => "funding",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: FieldName,
    /// Label regex, including whatever separator follows the label.
    pub label: &'static str,
    /// Value regex with exactly one capture group. Ignored when `until` is set.
    pub value: &'static str,
    pub case_insensitive: bool,
    /// Terminator labels bounding a multi-line capture.
    pub until: &'static [&'static str],
    pub default: &'static str,
}

impl FieldSpec {
    pub fn pattern(&self) -> String {
        let flags = match (self.case_insensitive, self.until.is_empty()) {
            (true, true) => "(?i)",
            (true, false) => "(?is)",
            (false, true) => "",
            (false, false) => "(?s)",
        };

        if self.until.is_empty() {
            format!("{}{}{}", flags, self.label, self.value)
        } else {
            let terminators = self
                .until
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            format!("{}{}(.*?)(?:{})", flags, self.label, terminators)
        }
    }

    pub fn compile(self) -> Result<CompiledField, regex::Error> {
        let regex = Regex::new(&self.pattern())?;
        Ok(CompiledField { spec: self, regex })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    spec: FieldSpec,
    regex: Regex,
}

impl CompiledField {
    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// First match's captured value, trimmed. Empty captures count as missing.
    pub fn find(&self, text: &str) -> Option<String> {
        let value = self
            .regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty());

        if value.is_none() {
            debug!("Field '{}' not found, default applies", self.spec.name.as_str());
        }
        value
    }

    pub fn find_or_default(&self, text: &str) -> String {
        self.find(text)
            .unwrap_or_else(|| self.spec.default.to_string())
    }

    pub fn find_amount(&self, text: &str) -> Option<f64> {
        self.find(text).map(|raw| parse_amount(&raw))
    }
}

/// An ordered table of compiled fields.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    fields: Vec<CompiledField>,
}

impl FieldExtractor {
    pub fn new(specs: &[FieldSpec]) -> Result<Self, regex::Error> {
        let fields = specs
            .iter()
            .map(|spec| spec.compile())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }

    pub fn invoice() -> &'static FieldExtractor {
        static EXTRACTOR: OnceLock<FieldExtractor> = OnceLock::new();
        EXTRACTOR.get_or_init(|| FieldExtractor::new(INVOICE_FIELDS).expect("invoice field table"))
    }

    pub fn overview() -> &'static FieldExtractor {
        static EXTRACTOR: OnceLock<FieldExtractor> = OnceLock::new();
        EXTRACTOR
            .get_or_init(|| FieldExtractor::new(OVERVIEW_FIELDS).expect("overview field table"))
    }

    /// `None` when `name` belongs to another table.
    pub fn field(&self, name: FieldName) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &CompiledField> {
        self.fields.iter()
    }

    pub fn text(&self, name: FieldName, text: &str) -> Option<String> {
        self.field(name).and_then(|f| f.find(text))
    }

    /// Like [`FieldExtractor::text`] with internal whitespace collapsed.
    pub fn clean_text(&self, name: FieldName, text: &str) -> Option<String> {
        self.text(name, text).map(|v| clean_whitespace(&v))
    }

    pub fn text_or_default(&self, name: FieldName, text: &str) -> String {
        self.field(name)
            .map(|f| f.find_or_default(text))
            .unwrap_or_default()
    }

    pub fn amount(&self, name: FieldName, text: &str) -> Option<f64> {
        self.field(name).and_then(|f| f.find_amount(text))
    }
}

pub const INVOICE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: FieldName::InvoiceNo,
        label: r"Invoice\s+no[:\s]+",
        value: r"([A-Z0-9\-]+)",
        case_insensitive: true,
        until: &[],
        default: UNKNOWN,
    },
    FieldSpec {
        name: FieldName::Date,
        label: r"Date\s+of\s+issue[:\s]+",
        value: r"(\d{2}/\d{2}/\d{4})",
        case_insensitive: true,
        until: &[],
        default: "01/01/2000",
    },
    FieldSpec {
        name: FieldName::Seller,
        label: r"Seller[:\s]+",
        value: "",
        case_insensitive: true,
        until: &["Client:", "Tax Id:"],
        default: UNKNOWN,
    },
    FieldSpec {
        name: FieldName::Client,
        label: r"Client[:\s]+",
        value: "",
        case_insensitive: true,
        until: &["Tax Id:", "IBAN:"],
        default: UNKNOWN,
    },
    FieldSpec {
        name: FieldName::Category,
        label: r"Category[:\s]+",
        value: r"([^\n]+)",
        case_insensitive: true,
        until: &[],
        default: GENERAL_CATEGORY,
    },
    FieldSpec {
        name: FieldName::Total,
        label: r"Total\s+\$\s*",
        value: r"([\d,]+\.?\d*)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Vat,
        label: r"VAT\s+\$\s*",
        value: r"([\d,]+\.?\d*)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Net,
        label: r"Net\s+worth\s+\$\s*",
        value: r"([\d,]+\.?\d*)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
];

pub const OVERVIEW_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: FieldName::Title,
        label: r"(?m)^Title:\s*",
        value: r"(.+)$",
        case_insensitive: true,
        until: &[],
        default: "",
    },
    FieldSpec {
        name: FieldName::Product,
        label: r"Product:\s*",
        value: r"(.+)",
        case_insensitive: true,
        until: &[],
        default: "",
    },
    FieldSpec {
        name: FieldName::Summary,
        label: r"Summary:\s*",
        value: r"(.+)",
        case_insensitive: true,
        until: &[],
        default: "",
    },
    FieldSpec {
        name: FieldName::Currency,
        label: r"Currency:\s*",
        value: r"([A-Z]{3})",
        case_insensitive: true,
        until: &[],
        default: "",
    },
    FieldSpec {
        name: FieldName::BudgetTotal,
        label: r"Total:\s*",
        value: r"([\d,\.]+)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Capex,
        label: r"Capex:\s*",
        value: r"([\d,\.]+)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Opex,
        label: r"Opex:\s*",
        value: r"([\d,\.]+)",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Contingency,
        label: r"Contingency:\s*",
        value: r"([\d\.]+)\s*%",
        case_insensitive: true,
        until: &[],
        default: "0",
    },
    FieldSpec {
        name: FieldName::Funding,
        label: r"Funding:\s*",
        value: r"(.+)",
        case_insensitive: true,
        until: &[],
        default: "",
    },
];
