use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which policy produced an invoice's VAT and net amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VatSource {
    #[schemars(description = "VAT and/or net worth were read from the document text")]
    Extracted,

    #[schemars(description = "Net equals total and VAT is a fixed fraction of the total")]
    Derived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LineItem {
    /// 1-based position on the invoice.
    pub item_no: usize,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub net_worth: f64,
    /// VAT rate printed on the row, in percent.
    pub vat_percent: f64,
    pub gross_worth: f64,
}

/// Canonical record for one invoice document. Every field is populated; fields
/// that could not be recovered carry their sentinel default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct InvoiceRecord {
    #[schemars(description = "Invoice number, or \"Unknown\"")]
    pub id: String,

    #[schemars(description = "Date of issue; 2000-01-01 when unreadable")]
    pub date: NaiveDate,

    #[schemars(description = "Client name, or \"Unknown\"")]
    pub party: String,

    pub seller: String,

    pub category: String,

    pub total_amount: f64,

    pub vat: f64,

    pub net_amount: f64,

    pub vat_source: VatSource,

    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Person {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Milestone {
    pub name: String,
    #[schemars(description = "YYYY-MM-DD, or empty when the line carried no parseable date")]
    pub due: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Budget {
    pub currency: String,
    pub total: f64,
    pub capex: f64,
    pub opex: f64,
    pub contingency_percent: f64,
    pub funding_sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Kpi {
    pub name: String,
    pub target: String,
    pub measure: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Risk {
    #[schemars(description = "Identifier from the text, or R{n} by position")]
    pub id: String,
    pub description: String,
    pub likelihood: String,
    pub impact: String,
    pub owner: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Deliverable {
    pub name: String,
    pub due: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Reporting {
    pub deliverables: Vec<Deliverable>,
}

/// Structured view of a project overview (planning) document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ProjectOverviewRecord {
    pub project_title: String,
    pub company_name: String,
    pub product_name: String,
    pub product_summary: String,
    pub problem_statement: String,
    pub objective: String,
    pub key_outcomes: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub milestones: Vec<Milestone>,
    pub budget: Budget,
    pub sponsor: Person,
    pub lead: Person,
    pub team: Vec<Person>,
    pub stakeholders: Vec<String>,
    pub partners: Vec<String>,
    pub kpis: Vec<Kpi>,
    pub risks: Vec<Risk>,
    pub reporting: Reporting,

    #[schemars(
        description = "Starting technology readiness level. Absent (not zero) when the document does not state it."
    )]
    pub trl_start: Option<u32>,

    pub trl_end: Option<u32>,
}

impl ProjectOverviewRecord {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ProjectOverviewRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DateRange {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Summary {
    pub total_spent: f64,
    pub average_invoice_amount: f64,
    pub total_vat_paid: f64,
    pub number_of_invoices: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MonthlySpending {
    #[schemars(description = "Calendar month as YYYY-MM")]
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ClientSpending {
    pub client: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct CategorySpending {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct VatNetPoint {
    pub net: f64,
    pub vat: f64,
}

/// One equal-width interval of the invoice amount histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AmountBucket {
    #[schemars(description = "Label such as \"$100-$180\" (bounds truncated to whole units)")]
    pub range: String,
    pub low: f64,
    pub high: f64,
    pub count: usize,
    #[serde(rename = "totalValue")]
    pub total_value: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct VatShare {
    pub name: String,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Prediction {
    #[schemars(description = "Forecast period label, e.g. \"Jul 2021\"")]
    pub month: String,
    pub forecast: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct InvoiceRow {
    pub invoice_no: String,
    pub date: NaiveDate,
    pub total_amount: f64,
    pub vat: f64,
    pub net_amount: f64,
    pub client: String,
}

impl From<&InvoiceRecord> for InvoiceRow {
    fn from(record: &InvoiceRecord) -> Self {
        Self {
            invoice_no: record.id.clone(),
            date: record.date,
            total_amount: record.total_amount,
            vat: record.vat,
            net_amount: record.net_amount,
            client: record.party.clone(),
        }
    }
}

/// Dashboard payload produced from a set of invoice records. Field names are
/// the external JSON contract consumed by the dashboard front-end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AggregatePayload {
    pub summary: Summary,
    pub monthly_spending: Vec<MonthlySpending>,
    pub client_spending: Vec<ClientSpending>,
    pub vat_vs_net: Vec<VatNetPoint>,
    pub invoice_amount_distribution: Vec<AmountBucket>,
    pub vat_analysis: Vec<VatShare>,
    pub predictions: Vec<Prediction>,
    pub invoices: Vec<InvoiceRow>,
}

impl AggregatePayload {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AggregatePayload)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
