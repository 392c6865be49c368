//! Repeated structures recovered from loosely delimited text blocks: invoice
//! line items, milestones, team members, KPIs, risks and deliverables.
//!
//! Every bullet line yields exactly one entry. A line that does not match its
//! entry pattern becomes a partial entry carrying the line text as its name
//! or description.

use crate::schema::{Deliverable, Kpi, LineItem, Milestone, Person, Risk};
use crate::utils::{clean_whitespace, parse_amount};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^- (.+)$").expect("bullet regex"))
}

fn list_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r";|\n").expect("list separator regex"))
}

fn line_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d+\.?\d*)\s+each\s+([\d,]+\.?\d*)\s+([\d,]+\.?\d*)\s+(\d+(?:\.\d+)?)%\s+([\d,]+\.?\d*)",
        )
        .expect("line item regex")
    })
}

fn milestone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*?)\s*\((\d{4}-\d{2}-\d{2}),\s*Owner:\s*(.*?)\)\s*$")
            .expect("milestone regex")
    })
}

fn person_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\s*\((.*?)\)").expect("person regex"))
}

fn kpi_name_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"—|-").expect("kpi split regex"))
}

fn kpi_target_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Target:\s*([^—-]+)").expect("kpi target regex"))
}

fn kpi_measure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Measure:\s*(.+)$").expect("kpi measure regex"))
}

fn risk_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(R\d+):\s*(.*)").expect("risk id regex"))
}

fn risk_meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(Likelihood:\s*(.*?),\s*Impact:\s*(.*?),\s*Owner:\s*(.*?)\)")
            .expect("risk meta regex")
    })
}

fn risk_mitigation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"—\s*Mitigation:\s*(.+)$").expect("risk mitigation regex"))
}

fn deliverable_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s*—\s*due\s*([0-9\-/]+)").expect("deliverable regex")
    })
}

/// A section heading and the patterns that end its block. The block regex is
/// compiled on first use and kept, so specs are meant to live in `static`s.
#[derive(Debug)]
pub struct SectionSpec {
    pub heading: &'static str,
    /// Regex fragments for the headings that may follow. A blank line always ends the block.
    pub terminators: &'static [&'static str],
    regex: OnceLock<Regex>,
}

impl SectionSpec {
    pub const fn new(heading: &'static str, terminators: &'static [&'static str]) -> Self {
        Self {
            heading,
            terminators,
            regex: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> String {
        let mut ends = vec![r"\n\s*\n"];
        ends.extend(self.terminators.iter().copied());
        format!(r"(?is){}\s*(.+?)(?:{})", self.heading, ends.join("|"))
    }

    /// Text between the heading and the first blank line or following heading.
    /// Matching is case-insensitive and spans lines.
    pub fn block<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .get_or_init(|| Regex::new(&self.pattern()).expect("section regex"))
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// `- ` prefixed lines of a block, whitespace-collapsed.
pub fn bullet_lines(block: &str) -> Vec<String> {
    bullet_re()
        .captures_iter(block)
        .map(|c| clean_whitespace(&c[1]))
        .collect()
}

/// Flat list split on semicolons and newlines, blanks dropped.
pub fn split_list(block: &str) -> Vec<String> {
    list_separator_re()
        .split(block)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Rows shaped `<qty> each <unit price> <net worth> <vat>% <gross worth>`.
pub fn extract_line_items(text: &str) -> Vec<LineItem> {
    line_item_re()
        .captures_iter(text)
        .enumerate()
        .map(|(i, cap)| LineItem {
            item_no: i + 1,
            description: format!("Item {}", i + 1),
            quantity: parse_amount(&cap[1]),
            unit_price: parse_amount(&cap[2]),
            net_worth: parse_amount(&cap[3]),
            vat_percent: parse_amount(&cap[4]),
            gross_worth: parse_amount(&cap[5]),
        })
        .collect()
}

/// `Name (YYYY-MM-DD, Owner: Role)`. An invalid calendar date keeps name and
/// owner with an empty due date; a line without the pattern becomes the name.
pub fn parse_milestone(line: &str) -> Milestone {
    match milestone_re().captures(line) {
        Some(cap) => {
            let due = NaiveDate::parse_from_str(&cap[2], "%Y-%m-%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            Milestone {
                name: clean_whitespace(&cap[1]),
                due,
                owner: clean_whitespace(&cap[3]),
            }
        }
        None => Milestone {
            name: line.to_string(),
            due: String::new(),
            owner: String::new(),
        },
    }
}

/// `Name (Role)`, or a bare name.
pub fn parse_person(entry: &str) -> Person {
    match person_re().captures(entry) {
        Some(cap) => Person {
            name: clean_whitespace(&cap[1]),
            role: clean_whitespace(&cap[2]),
        },
        None => Person {
            name: clean_whitespace(entry),
            role: String::new(),
        },
    }
}

/// Team members separated by semicolons or newlines.
pub fn parse_team(block: &str) -> Vec<Person> {
    split_list(block).iter().map(|entry| parse_person(entry)).collect()
}

/// `Name — Target: T — Measure: M`; missing parts stay empty.
pub fn parse_kpi(line: &str) -> Kpi {
    let name = kpi_name_split_re()
        .split(line)
        .next()
        .map(clean_whitespace)
        .unwrap_or_default();
    let target = kpi_target_re()
        .captures(line)
        .map(|c| clean_whitespace(&c[1]))
        .unwrap_or_default();
    let measure = kpi_measure_re()
        .captures(line)
        .map(|c| clean_whitespace(&c[1]))
        .unwrap_or_default();

    Kpi {
        name,
        target,
        measure,
    }
}

/// `R<n>: description (Likelihood: L, Impact: I, Owner: O) — Mitigation: M`.
/// `position` is the 1-based index of the line and supplies `R{position}`
/// when the line carries no identifier.
pub fn parse_risk(line: &str, position: usize) -> Risk {
    let (id, rest) = match risk_id_re().captures(line) {
        Some(cap) => (cap[1].to_string(), cap[2].to_string()),
        None => (format!("R{}", position), line.to_string()),
    };

    let mitigation = risk_mitigation_re()
        .captures(line)
        .map(|c| clean_whitespace(&c[1]))
        .unwrap_or_default();

    let mut description = risk_mitigation_re().replace(&rest, "").to_string();

    let (likelihood, impact, owner) = match risk_meta_re().captures(&description) {
        Some(cap) => (
            clean_whitespace(&cap[1]),
            clean_whitespace(&cap[2]),
            clean_whitespace(&cap[3]),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    description = risk_meta_re().replace(&description, "").to_string();

    Risk {
        id,
        description: clean_whitespace(&description),
        likelihood,
        impact,
        owner,
        mitigation,
    }
}

pub fn parse_risks(lines: &[String]) -> Vec<Risk> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_risk(line, i + 1))
        .collect()
}

/// `- Name — due DATE` lines. A bullet without a due date keeps its text as
/// the name.
pub fn parse_deliverables(block: &str) -> Vec<Deliverable> {
    bullet_lines(block)
        .into_iter()
        .map(|line| match deliverable_re().captures(&line) {
            Some(c) => Deliverable {
                name: clean_whitespace(&c[1]),
                due: c[2].to_string(),
            },
            None => Deliverable {
                name: line,
                due: String::new(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_block_stops_at_blank_line_or_heading() {
        let spec = SectionSpec::new("Milestones", &[r"Budget\b", r"People\b"]);

        let text = "Milestones\n- A (2024-01-01, Owner: X)\n- B\nBudget\nTotal: 5";
        assert_eq!(spec.block(text), Some("- A (2024-01-01, Owner: X)\n- B\n"));

        let text = "Milestones\n- A\n\nSomething else";
        assert_eq!(spec.block(text), Some("- A"));

        assert_eq!(spec.block("no such heading"), None);
    }

    #[test]
    fn test_section_pattern_is_compiled_once() {
        let spec = SectionSpec::new("Team:", &[r"Stakeholders\b"]);
        assert_eq!(spec.pattern(), r"(?is)Team:\s*(.+?)(?:\n\s*\n|Stakeholders\b)");

        let first = spec.block("Team: Ann\nStakeholders\nOps");
        let cached = spec.regex.get().map(|re| re.as_str().to_string());
        assert_eq!(first, Some("Ann\n"));
        assert_eq!(spec.block("Team: Bob\n\nOther"), Some("Bob"));
        assert_eq!(spec.regex.get().map(|re| re.as_str().to_string()), cached);
        assert_eq!(cached.as_deref(), Some(spec.pattern().as_str()));
    }

    #[test]
    fn test_section_block_until_end_of_text() {
        let spec = SectionSpec::new("Reporting", &[r"TRL\b", "$"]);
        assert_eq!(spec.block("Reporting\n- Final — due 2025-01-01"), Some("- Final — due 2025-01-01"));
    }

    #[test]
    fn test_bullet_lines_and_split_list() {
        let block = "- First   item\nnot a bullet\n- Second\n-missing space";
        assert_eq!(bullet_lines(block), vec!["First item", "Second"]);

        assert_eq!(
            split_list("Board; Investors\n Customers ;;"),
            vec!["Board", "Investors", "Customers"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_milestone_parsing() {
        let m = parse_milestone("Launch (2024-06-01, Owner: Alice)");
        assert_eq!(
            m,
            Milestone {
                name: "Launch".to_string(),
                due: "2024-06-01".to_string(),
                owner: "Alice".to_string(),
            }
        );

        let m = parse_milestone("Launch sometime");
        assert_eq!(m.name, "Launch sometime");
        assert_eq!(m.due, "");
        assert_eq!(m.owner, "");

        let m = parse_milestone("Pilot (2024-13-45, Owner: Bob)");
        assert_eq!(m.name, "Pilot");
        assert_eq!(m.due, "");
        assert_eq!(m.owner, "Bob");
    }

    #[test]
    fn test_team_parsing() {
        let team = parse_team("Jane Doe (CTO); John Roe ; Ann (Data Scientist)");
        assert_eq!(team.len(), 3);
        assert_eq!(team[0].name, "Jane Doe");
        assert_eq!(team[0].role, "CTO");
        assert_eq!(team[1].name, "John Roe");
        assert_eq!(team[1].role, "");
        assert_eq!(team[2].role, "Data Scientist");

        let team = parse_team("Ann Lee\nBob Stone (Designer)\n");
        assert_eq!(team.len(), 2);
        assert_eq!(team[0].name, "Ann Lee");
        assert_eq!(team[1].name, "Bob Stone");
        assert_eq!(team[1].role, "Designer");
    }

    #[test]
    fn test_kpi_parsing() {
        let kpi = parse_kpi("Accuracy — Target: 95% — Measure: F1 on holdout set");
        assert_eq!(kpi.name, "Accuracy");
        assert_eq!(kpi.target, "95%");
        assert_eq!(kpi.measure, "F1 on holdout set");

        let kpi = parse_kpi("Customer interviews");
        assert_eq!(kpi.name, "Customer interviews");
        assert_eq!(kpi.target, "");
        assert_eq!(kpi.measure, "");
    }

    #[test]
    fn test_risk_parsing_full_line() {
        let risk = parse_risk(
            "R2: Supplier delay (Likelihood: Medium, Impact: High, Owner: Ops) — Mitigation: Dual sourcing",
            1,
        );
        assert_eq!(risk.id, "R2");
        assert_eq!(risk.description, "Supplier delay");
        assert_eq!(risk.likelihood, "Medium");
        assert_eq!(risk.impact, "High");
        assert_eq!(risk.owner, "Ops");
        assert_eq!(risk.mitigation, "Dual sourcing");
    }

    #[test]
    fn test_risk_ids_synthesized_by_position() {
        let lines = vec![
            "Regulatory change".to_string(),
            "R7: Key staff loss".to_string(),
            "Budget overrun".to_string(),
        ];
        let risks = parse_risks(&lines);
        let ids: Vec<&str> = risks.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R7", "R3"]);
        assert_eq!(risks[0].description, "Regulatory change");
        assert_eq!(risks[0].likelihood, "");
    }

    #[test]
    fn test_deliverables() {
        let block = "- Progress report — due 2024-03-31\n- Final report — due 2025/01/01\n- Undated";
        let items = parse_deliverables(block);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "Progress report");
        assert_eq!(items[1].due, "2025/01/01");
        assert_eq!(
            items[2],
            Deliverable {
                name: "Undated".to_string(),
                due: String::new(),
            }
        );
    }

    #[test]
    fn test_line_items() {
        let text = "1. Wine rack 2.00 each 46.55 93.10 10% 102.41\n\
                    2. Glass holder 1.00 each 15.40 15.40 10% 16.94";
        let items = extract_line_items(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].item_no, 2);
        assert_eq!(items[1].description, "Item 2");
        assert_eq!(items[1].quantity, 1.0);
        assert_eq!(items[1].unit_price, 15.40);
        assert_eq!(items[1].net_worth, 15.40);
        assert_eq!(items[1].vat_percent, 10.0);
        assert_eq!(items[1].gross_worth, 16.94);
    }
}
