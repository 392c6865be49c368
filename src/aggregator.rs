//! Cross-document statistics over a set of invoice records.
//!
//! Records are collected into an append-only [`InvoicePortfolio`] and folded
//! in a single pass into an [`AggregatePayload`]. Time groups are ordered
//! chronologically; client and category groups by descending amount, ties in
//! first-seen order.

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use crate::forecast::{forecast, noise_from_config, NoiseSource, TrendSummary};
use crate::schema::{
    AggregatePayload, AmountBucket, CategorySpending, ClientSpending, DateRange, InvoiceRecord,
    InvoiceRow, MonthlySpending, Prediction, Summary, VatNetPoint, VatShare,
};
use crate::utils::{add_months, month_key, month_start};
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub const HISTOGRAM_BUCKETS: usize = 5;
pub const NET_COLOR: &str = "#3B82F6";
pub const VAT_COLOR: &str = "#EF4444";

/// Ordered, append-only collection of normalized invoices. Insertion order is
/// processing order and decides ties in the grouped series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoicePortfolio {
    records: Vec<InvoiceRecord>,
}

impl InvoicePortfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: InvoiceRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    pub fn aggregate(&self, config: &InsightsConfig) -> Result<AggregatePayload> {
        aggregate(&self.records, config)
    }

    pub fn trend(&self) -> TrendSummary {
        let monthly: Vec<f64> = monthly_totals(&self.records).into_values().collect();
        TrendSummary::from_monthly(&monthly)
    }

    pub fn category_spending(&self) -> Vec<CategorySpending> {
        category_spending(&self.records)
    }
}

impl FromIterator<InvoiceRecord> for InvoicePortfolio {
    fn from_iter<I: IntoIterator<Item = InvoiceRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl Extend<InvoiceRecord> for InvoicePortfolio {
    fn extend<I: IntoIterator<Item = InvoiceRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

/// Aggregates with the noise source described by `config`.
pub fn aggregate(records: &[InvoiceRecord], config: &InsightsConfig) -> Result<AggregatePayload> {
    let mut noise = noise_from_config(config)?;
    aggregate_with_noise(records, config, noise.as_mut())
}

pub fn aggregate_with_noise(
    records: &[InvoiceRecord],
    config: &InsightsConfig,
    noise: &mut dyn NoiseSource,
) -> Result<AggregatePayload> {
    if records.is_empty() {
        return Err(InsightsError::EmptyDataset);
    }
    config.validate()?;

    let summary = summarize(records);
    let amounts: Vec<f64> = records.iter().map(|r| r.total_amount).collect();

    let payload = AggregatePayload {
        monthly_spending: monthly_spending(records),
        client_spending: client_spending(records),
        vat_vs_net: records
            .iter()
            .map(|r| VatNetPoint {
                net: r.net_amount,
                vat: r.vat,
            })
            .collect(),
        invoice_amount_distribution: amount_distribution(&amounts),
        vat_analysis: vat_analysis(records),
        predictions: predictions(records, config.forecast_horizon, noise),
        invoices: records.iter().map(InvoiceRow::from).collect(),
        summary,
    };

    info!(
        "Aggregated {} invoices: total {:.2}, {} months, {} clients",
        payload.summary.number_of_invoices,
        payload.summary.total_spent,
        payload.monthly_spending.len(),
        payload.client_spending.len()
    );

    Ok(payload)
}

pub fn summarize(records: &[InvoiceRecord]) -> Summary {
    let total_spent: f64 = records.iter().map(|r| r.total_amount).sum();
    let count = records.len();

    Summary {
        total_spent,
        average_invoice_amount: if count == 0 {
            0.0
        } else {
            total_spent / count as f64
        },
        total_vat_paid: records.iter().map(|r| r.vat).sum(),
        number_of_invoices: count,
        date_range: DateRange {
            min: records.iter().map(|r| r.date).min(),
            max: records.iter().map(|r| r.date).max(),
        },
    }
}

/// Totals per calendar month, keyed by month start.
pub fn monthly_totals(records: &[InvoiceRecord]) -> BTreeMap<NaiveDate, f64> {
    let mut totals = BTreeMap::new();
    for record in records {
        *totals.entry(month_start(record.date)).or_insert(0.0) += record.total_amount;
    }
    totals
}

pub fn monthly_spending(records: &[InvoiceRecord]) -> Vec<MonthlySpending> {
    monthly_totals(records)
        .into_iter()
        .map(|(month, amount)| MonthlySpending {
            month: month_key(month),
            amount,
        })
        .collect()
}

/// Sums by key in first-seen order, then stable-sorts by descending amount.
fn ranked_totals<'a, F>(records: &'a [InvoiceRecord], key: F) -> Vec<(String, f64)>
where
    F: Fn(&'a InvoiceRecord) -> &'a str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(String, f64)> = Vec::new();

    for record in records {
        let k = key(record);
        match index.get(k) {
            Some(&i) => totals[i].1 += record.total_amount,
            None => {
                index.insert(k, totals.len());
                totals.push((k.to_string(), record.total_amount));
            }
        }
    }

    totals.sort_by(|a, b| b.1.total_cmp(&a.1));
    totals
}

pub fn client_spending(records: &[InvoiceRecord]) -> Vec<ClientSpending> {
    ranked_totals(records, |r| r.party.as_str())
        .into_iter()
        .map(|(client, amount)| ClientSpending { client, amount })
        .collect()
}

pub fn category_spending(records: &[InvoiceRecord]) -> Vec<CategorySpending> {
    ranked_totals(records, |r| r.category.as_str())
        .into_iter()
        .map(|(category, amount)| CategorySpending { category, amount })
        .collect()
}

/// `count / total` as a percentage rounded to one decimal, ties to even on the
/// binary value of the quotient (`1/16` gives 6.2, `15/16` gives 93.8).
fn share_percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let tenths = count * 1000 / total;
    let twice_rem = 2 * (count * 1000 % total);

    let rounded = if twice_rem < total {
        tenths
    } else if twice_rem > total {
        tenths + 1
    } else {
        // Exact tie in the rational; the f64 quotient decides unless it is exact too.
        let quotient = count as f64 * 100.0 / total as f64;
        let offset = quotient.mul_add(20.0, -((2 * tenths + 1) as f64));
        if offset > 0.0 || (offset == 0.0 && tenths % 2 == 1) {
            tenths + 1
        } else {
            tenths
        }
    };
    rounded as f64 / 10.0
}

/// Equal-width histogram over `amounts`. Buckets are half-open except the
/// last, which is closed. When every amount is equal there is a single bucket
/// `[min, min + 1]`.
pub fn amount_distribution(amounts: &[f64]) -> Vec<AmountBucket> {
    let (Some(min), Some(max)) = (
        amounts.iter().copied().reduce(f64::min),
        amounts.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };

    let edges: Vec<f64> = if max == min {
        vec![min, min + 1.0]
    } else {
        let step = (max - min) / HISTOGRAM_BUCKETS as f64;
        (0..=HISTOGRAM_BUCKETS).map(|i| min + i as f64 * step).collect()
    };
    let last = edges.len() - 2;

    let mut buckets: Vec<AmountBucket> = edges
        .windows(2)
        .map(|w| AmountBucket {
            range: format!("${}-${}", w[0].trunc() as i64, w[1].trunc() as i64),
            low: w[0],
            high: w[1],
            count: 0,
            total_value: 0.0,
            percentage: 0.0,
        })
        .collect();

    for &value in amounts {
        let idx = (0..=last)
            .find(|&i| value >= edges[i] && (i == last || value < edges[i + 1]))
            .unwrap_or(last);
        buckets[idx].count += 1;
        buckets[idx].total_value += value;
    }

    for bucket in &mut buckets {
        bucket.percentage = share_percent(bucket.count, amounts.len());
    }

    buckets
}

pub fn vat_analysis(records: &[InvoiceRecord]) -> Vec<VatShare> {
    vec![
        VatShare {
            name: "Net Amount".to_string(),
            value: records.iter().map(|r| r.net_amount).sum(),
            color: NET_COLOR.to_string(),
        },
        VatShare {
            name: "VAT Amount".to_string(),
            value: records.iter().map(|r| r.vat).sum(),
            color: VAT_COLOR.to_string(),
        },
    ]
}

/// Forecasts for the `horizon` months following the last observed month,
/// labelled `%b %Y`.
pub fn predictions(
    records: &[InvoiceRecord],
    horizon: usize,
    noise: &mut dyn NoiseSource,
) -> Vec<Prediction> {
    let totals = monthly_totals(records);
    let Some(&last_month) = totals.keys().next_back() else {
        return Vec::new();
    };
    let monthly: Vec<f64> = totals.into_values().collect();

    forecast(&monthly, horizon, noise)
        .into_iter()
        .enumerate()
        .map(|(i, value)| Prediction {
            month: add_months(last_month, i + 1).format("%b %Y").to_string(),
            forecast: value,
        })
        .collect()
}

impl AggregatePayload {
    /// Writes the pretty-printed payload to `path`, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Dashboard payload written to {}", path.display());
        Ok(())
    }
}
