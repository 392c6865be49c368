//! Project overview (planning document) parsing.
//!
//! Sections are located by heading and bounded by a blank line or the heading
//! that conventionally follows. A section whose heading is absent leaves its
//! field at the default; nothing here fails.

use crate::fields::{FieldExtractor, FieldName};
use crate::schema::{Budget, Person, ProjectOverviewRecord, Reporting};
use crate::tables::{
    bullet_lines, parse_deliverables, parse_kpi, parse_milestone, parse_risks, parse_team,
    split_list, SectionSpec,
};
use crate::utils::{clean_whitespace, parse_amount};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

static PROBLEM_STATEMENT: SectionSpec = SectionSpec::new("Problem Statement", &[r"Objective\b"]);
static OBJECTIVE: SectionSpec = SectionSpec::new("Objective", &[r"Key Outcomes\b"]);
static KEY_OUTCOMES: SectionSpec = SectionSpec::new("Key Outcomes", &[r"Timeline\b"]);
static MILESTONES: SectionSpec = SectionSpec::new("Milestones", &[r"Budget\b", r"People\b"]);
static TEAM: SectionSpec = SectionSpec::new(r"Team:", &[r"Stakeholders\b"]);
static STAKEHOLDERS: SectionSpec = SectionSpec::new("Stakeholders", &[r"Partners\b"]);
static PARTNERS: SectionSpec = SectionSpec::new("Partners", &[r"KPIs\b"]);
static KPIS: SectionSpec = SectionSpec::new("KPIs", &[r"Risks\b"]);
static RISKS: SectionSpec = SectionSpec::new("Risks", &[r"Reporting\b"]);
static REPORTING: SectionSpec = SectionSpec::new("Reporting", &[r"TRL\b", "$"]);

fn timeline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Start\s*Date:\s*([0-9\-/]+)\s*\|\s*End\s*Date:\s*([0-9\-/]+)")
            .expect("timeline regex")
    })
}

fn sponsor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Sponsor:\s*(.*?)\s*\((.*?)\)").expect("sponsor regex"))
}

fn lead_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Project Lead:\s*(.*?)\s*\((.*?)\)").expect("lead regex"))
}

fn trl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)TRL\s*Start:\s*(\d+)\s*;\s*End:\s*(\d+)").expect("trl regex")
    })
}

fn funding_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;,]").expect("funding separator regex"))
}

/// Company name from a `<Company> — <Project>` or `<Company> - <Project>` title.
pub fn company_from_title(title: &str) -> String {
    if let Some((company, _)) = title.split_once('—') {
        clean_whitespace(company)
    } else if let Some((company, _)) = title.split_once(" - ") {
        clean_whitespace(company)
    } else {
        String::new()
    }
}

fn labelled_person(re: &Regex, text: &str) -> Person {
    re.captures(text)
        .map(|c| Person {
            name: clean_whitespace(&c[1]),
            role: clean_whitespace(&c[2]),
        })
        .unwrap_or_default()
}

fn parse_budget(text: &str) -> Budget {
    let fields = FieldExtractor::overview();

    let funding_sources = fields
        .text(FieldName::Funding, text)
        .map(|raw| {
            funding_separator_re()
                .split(&raw)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    Budget {
        currency: fields
            .text(FieldName::Currency, text)
            .map(|c| c.to_uppercase())
            .unwrap_or_default(),
        total: fields.amount(FieldName::BudgetTotal, text).unwrap_or(0.0),
        capex: fields.amount(FieldName::Capex, text).unwrap_or(0.0),
        opex: fields.amount(FieldName::Opex, text).unwrap_or(0.0),
        contingency_percent: fields
            .text(FieldName::Contingency, text)
            .map(|raw| parse_amount(&raw))
            .unwrap_or(0.0),
        funding_sources,
    }
}

/// Parses the text of a project overview document. Never fails; sections that
/// cannot be located stay at their empty defaults.
pub fn parse_overview_text(text: &str) -> ProjectOverviewRecord {
    let t = text.replace('\r', "");
    let fields = FieldExtractor::overview();

    let mut record = ProjectOverviewRecord::default();

    if let Some(title) = fields.clean_text(FieldName::Title, &t) {
        record.company_name = company_from_title(&title);
        record.project_title = title;
    }
    record.product_name = fields.clean_text(FieldName::Product, &t).unwrap_or_default();
    record.product_summary = fields.clean_text(FieldName::Summary, &t).unwrap_or_default();

    record.problem_statement = PROBLEM_STATEMENT
        .block(&t)
        .map(clean_whitespace)
        .unwrap_or_default();
    record.objective = OBJECTIVE.block(&t).map(clean_whitespace).unwrap_or_default();
    record.key_outcomes = KEY_OUTCOMES.block(&t).map(bullet_lines).unwrap_or_default();

    if let Some(cap) = timeline_re().captures(&t) {
        record.start_date = cap[1].to_string();
        record.end_date = cap[2].to_string();
    }

    if let Some(block) = MILESTONES.block(&t) {
        record.milestones = bullet_lines(block).iter().map(|l| parse_milestone(l)).collect();
    }

    record.budget = parse_budget(&t);

    record.sponsor = labelled_person(sponsor_re(), &t);
    record.lead = labelled_person(lead_re(), &t);
    record.team = TEAM.block(&t).map(parse_team).unwrap_or_default();
    record.stakeholders = STAKEHOLDERS.block(&t).map(split_list).unwrap_or_default();
    record.partners = PARTNERS.block(&t).map(split_list).unwrap_or_default();

    if let Some(block) = KPIS.block(&t) {
        record.kpis = bullet_lines(block).iter().map(|l| parse_kpi(l)).collect();
    }
    if let Some(block) = RISKS.block(&t) {
        record.risks = parse_risks(&bullet_lines(block));
    }
    if let Some(block) = REPORTING.block(&t) {
        record.reporting = Reporting {
            deliverables: parse_deliverables(block),
        };
    }

    if let Some(cap) = trl_re().captures(&t) {
        record.trl_start = cap[1].parse().ok();
        record.trl_end = cap[2].parse().ok();
    }

    debug!(
        "Overview '{}' parsed: {} milestones, {} risks, {} team members",
        record.project_title,
        record.milestones.len(),
        record.risks.len(),
        record.team.len()
    );

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Title: Acme Robotics — Smart Sorting Pilot\r\n\
Product: SortBot 2\n\
Summary: Vision-guided parcel sorting\n\
\n\
Problem Statement\n\
Manual sorting is slow\n\
and error prone.\n\
\n\
Objective\n\
Automate 80% of sorting.\n\
\n\
Key Outcomes\n\
- Throughput doubled\n\
- Error rate below 1%\n\
\n\
Timeline\n\
Start Date: 2024-01-15 | End Date: 2025-06-30\n\
Milestones\n\
- Prototype (2024-06-01, Owner: Engineering)\n\
- Field trial sometime\n\
\n\
Budget\n\
Currency: aud\n\
Total: 1,200,000\n\
Capex: 700,000\n\
Opex: 500,000\n\
Contingency: 10 %\n\
Funding: Internal; Grant, Partner co-funding\n\
\n\
People\n\
Sponsor: Jane Smith (CEO)\n\
Project Lead: Raj Patel (CTO)\n\
Team: Ann Lee (ML Engineer); Bob Stone\n\
\n\
Stakeholders\n\
Operations; Finance\n\
\n\
Partners\n\
University of Sydney\n\
\n\
KPIs\n\
- Throughput — Target: 2x — Measure: Parcels per hour\n\
\n\
Risks\n\
- R1: Sensor drift (Likelihood: Low, Impact: High, Owner: QA) — Mitigation: Weekly calibration\n\
- Vendor lock-in\n\
\n\
Reporting\n\
- Quarterly report — due 2024-03-31\n\
- Final report — due 2025-06-30\n\
TRL Start: 4; End: 7\n";

    #[test]
    fn test_parse_full_overview() {
        let record = parse_overview_text(SAMPLE);

        assert_eq!(record.project_title, "Acme Robotics — Smart Sorting Pilot");
        assert_eq!(record.company_name, "Acme Robotics");
        assert_eq!(record.product_name, "SortBot 2");
        assert_eq!(record.product_summary, "Vision-guided parcel sorting");
        assert_eq!(record.problem_statement, "Manual sorting is slow and error prone.");
        assert_eq!(record.objective, "Automate 80% of sorting.");
        assert_eq!(record.key_outcomes, vec!["Throughput doubled", "Error rate below 1%"]);
        assert_eq!(record.start_date, "2024-01-15");
        assert_eq!(record.end_date, "2025-06-30");

        assert_eq!(record.milestones.len(), 2);
        assert_eq!(record.milestones[0].due, "2024-06-01");
        assert_eq!(record.milestones[1].name, "Field trial sometime");
        assert_eq!(record.milestones[1].due, "");

        assert_eq!(record.budget.currency, "AUD");
        assert_eq!(record.budget.total, 1_200_000.0);
        assert_eq!(record.budget.capex, 700_000.0);
        assert_eq!(record.budget.opex, 500_000.0);
        assert_eq!(record.budget.contingency_percent, 10.0);
        assert_eq!(
            record.budget.funding_sources,
            vec!["Internal", "Grant", "Partner co-funding"]
        );

        assert_eq!(record.sponsor.name, "Jane Smith");
        assert_eq!(record.sponsor.role, "CEO");
        assert_eq!(record.lead.name, "Raj Patel");
        assert_eq!(record.team.len(), 2);
        assert_eq!(record.team[1].name, "Bob Stone");
        assert_eq!(record.stakeholders, vec!["Operations", "Finance"]);
        assert_eq!(record.partners, vec!["University of Sydney"]);

        assert_eq!(record.kpis.len(), 1);
        assert_eq!(record.kpis[0].target, "2x");

        assert_eq!(record.risks.len(), 2);
        assert_eq!(record.risks[0].mitigation, "Weekly calibration");
        assert_eq!(record.risks[1].id, "R2");
        assert_eq!(record.risks[1].description, "Vendor lock-in");

        assert_eq!(record.reporting.deliverables.len(), 2);
        assert_eq!(record.trl_start, Some(4));
        assert_eq!(record.trl_end, Some(7));
    }

    #[test]
    fn test_team_members_on_separate_lines() {
        let record = parse_overview_text(
            "Team: Ann Lee (ML Engineer)\nBob Stone (Designer)\n\nStakeholders\nOps\n",
        );
        assert_eq!(
            record.team,
            vec![
                Person {
                    name: "Ann Lee".to_string(),
                    role: "ML Engineer".to_string(),
                },
                Person {
                    name: "Bob Stone".to_string(),
                    role: "Designer".to_string(),
                },
            ]
        );

        let record = parse_overview_text("Team: Ann Lee\nBob Stone\n\nStakeholders\nOps\n");
        let names: Vec<&str> = record.team.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ann Lee", "Bob Stone"]);
    }

    #[test]
    fn test_empty_text_yields_defaults() {
        let record = parse_overview_text("");
        assert_eq!(record, ProjectOverviewRecord::default());
        assert!(record.trl_start.is_none());
    }

    #[test]
    fn test_budget_fields_are_independent() {
        let record = parse_overview_text("Capex: 10\nOpex: 20\nTotal: 5");
        assert_eq!(record.budget.total, 5.0);
        assert_eq!(record.budget.capex, 10.0);
        assert_eq!(record.budget.opex, 20.0);
        assert_eq!(record.budget.contingency_percent, 0.0);
        assert!(record.budget.funding_sources.is_empty());
    }

    #[test]
    fn test_company_from_title() {
        assert_eq!(company_from_title("Acme — Pilot"), "Acme");
        assert_eq!(company_from_title("Acme Ltd - Pilot"), "Acme Ltd");
        assert_eq!(company_from_title("Standalone Pilot"), "");
    }
}
