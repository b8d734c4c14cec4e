// Summaries of a report: JSON for files and comparisons, plain text for the terminal.

use std::fmt::Write;

use lab_aggregation::session::{Report, Session};
use lab_aggregation::*;
use serde_json::json;

use crate::dash::config_reader::ReportPlan;
use crate::dash::io_common::simplify_file_name;
use crate::dash::JSValue;

const NO_DATA: &str = "No data to display";

pub fn build_summary_js(
    plan: &ReportPlan,
    session: &Session,
    report: &Report,
    view: &DerivedTables,
) -> JSValue {
    let config = json!({
        "reportName": plan.report_name,
        "input": simplify_file_name(&plan.input_path),
        "records": session.dataset().len(),
        "filteredRecords": report.filtered.len(),
        "selectedTests": session.selection().test_names.len(),
        "selectedFranchisees": session.selection().franchisees.len(),
    });
    json!({
        "config": config,
        "results": tables_to_json(view),
    })
}

fn tables_to_json(tables: &DerivedTables) -> JSValue {
    let volume: Vec<JSValue> = tables
        .volume_by_franchisee
        .iter()
        .map(|(f, c)| json!({"franchisee": f, "sampleVolume": c}))
        .collect();
    let top_tests: Vec<JSValue> = tables
        .top_tests
        .iter()
        .map(|(t, c)| json!({"testName": t, "frequency": c}))
        .collect();
    let partners: Vec<JSValue> = tables
        .lab_partner_usage
        .iter()
        .map(|(p, c)| {
            let name = match p {
                PartnerKey::Named(s) => JSValue::String(s.clone()),
                PartnerKey::Missing => JSValue::Null,
            };
            json!({"labPartner": name, "sampleVolume": c})
        })
        .collect();
    let per_franchisee: Vec<JSValue> = tables
        .top_tests_per_franchisee
        .iter()
        .map(|ft| {
            let tests: Vec<JSValue> = ft
                .tests
                .iter()
                .map(|t| json!({"rank": t.rank, "testName": t.test_name, "count": t.count}))
                .collect();
            json!({"franchisee": ft.franchisee, "tests": tests})
        })
        .collect();
    let percents: Vec<JSValue> = tables
        .franchisee_sub_account_percent
        .iter()
        .map(|(f, p)| json!({"franchisee": f, "percent": p.as_f64()}))
        .collect();
    json!({
        "volumeByFranchisee": volume,
        "topTests": top_tests,
        "labPartnerUsage": partners,
        "subAccountStatus": {
            "subAccountUsed": tables.sub_account_status.sub_account_used,
            "directAccount": tables.sub_account_status.direct_account,
        },
        "topTestsPerFranchisee": per_franchisee,
        "franchiseeSubAccountPercent": percents,
    })
}

fn section(out: &mut String, title: &str) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "\n== {} ==", title);
}

/// Plain text rendering of the tables, one section per table.
pub fn render_text(tables: &DerivedTables) -> String {
    let mut out = String::new();

    section(&mut out, "Sample volume by franchisee");
    if tables.volume_by_franchisee.is_empty() {
        let _ = writeln!(out, "{}", NO_DATA);
    }
    for (f, c) in &tables.volume_by_franchisee {
        let _ = writeln!(out, "{:<40} {:>8}", f, c);
    }

    section(&mut out, "Most frequent tests");
    if tables.top_tests.is_empty() {
        let _ = writeln!(out, "{}", NO_DATA);
    }
    for (t, c) in &tables.top_tests {
        let _ = writeln!(out, "{:<40} {:>8}", t, c);
    }

    section(&mut out, "Lab partner usage");
    if tables.lab_partner_usage.is_empty() {
        let _ = writeln!(out, "{}", NO_DATA);
    }
    for (p, c) in &tables.lab_partner_usage {
        let _ = writeln!(out, "{:<40} {:>8}", p.to_string(), c);
    }

    section(&mut out, "Sub account usage");
    let status = tables.sub_account_status;
    if status.sub_account_used + status.direct_account == 0 {
        let _ = writeln!(out, "{}", NO_DATA);
    } else {
        let _ = writeln!(out, "{:<40} {:>8}", "Sub account used", status.sub_account_used);
        let _ = writeln!(out, "{:<40} {:>8}", "Direct account", status.direct_account);
    }

    section(&mut out, "Top tests per franchisee");
    if tables.top_tests_per_franchisee.is_empty() {
        let _ = writeln!(out, "{}", NO_DATA);
    }
    for ft in &tables.top_tests_per_franchisee {
        let _ = writeln!(out, "{}", ft.franchisee);
        for t in &ft.tests {
            let _ = writeln!(out, "  {:>2}. {:<35} {:>8}", t.rank, t.test_name, t.count);
        }
    }

    section(&mut out, "Sub account usage by franchisee (%)");
    if tables.franchisee_sub_account_percent.is_empty() {
        let _ = writeln!(out, "{}", NO_DATA);
    }
    for (f, p) in &tables.franchisee_sub_account_percent {
        let _ = writeln!(out, "{:<40} {:>8}", f, p.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> DerivedTables {
        DerivedTables {
            volume_by_franchisee: vec![("Acme".to_string(), 3)],
            top_tests: vec![("CBC".to_string(), 2), ("CMP".to_string(), 1)],
            lab_partner_usage: vec![
                (PartnerKey::Named("LabX".to_string()), 2),
                (PartnerKey::Missing, 1),
            ],
            sub_account_status: SubAccountStatus {
                sub_account_used: 1,
                direct_account: 2,
            },
            top_tests_per_franchisee: vec![FranchiseeTopTests {
                franchisee: "Acme".to_string(),
                tests: vec![RankedTest {
                    rank: 1,
                    test_name: "CBC".to_string(),
                    count: 2,
                }],
            }],
            franchisee_sub_account_percent: vec![("Acme".to_string(), Percent(3333))],
        }
    }

    #[test]
    fn json_tables() {
        let js = tables_to_json(&tables());
        assert_eq!(js["volumeByFranchisee"][0], json!({"franchisee": "Acme", "sampleVolume": 3}));
        assert_eq!(js["topTests"][1], json!({"testName": "CMP", "frequency": 1}));
        assert_eq!(js["labPartnerUsage"][1]["labPartner"], JSValue::Null);
        assert_eq!(
            js["subAccountStatus"],
            json!({"subAccountUsed": 1, "directAccount": 2})
        );
        assert_eq!(
            js["topTestsPerFranchisee"][0]["tests"][0],
            json!({"rank": 1, "testName": "CBC", "count": 2})
        );
        assert_eq!(js["franchiseeSubAccountPercent"][0]["percent"], json!(33.33));
    }

    #[test]
    fn text_rendering() {
        let text = render_text(&tables());
        assert!(text.contains("== Lab partner usage =="));
        assert!(text.contains("(missing)"));
        assert!(text.contains("33.33"));
        assert!(!text.contains(NO_DATA));
    }

    #[test]
    fn text_rendering_without_data() {
        let text = render_text(&DerivedTables::default());
        assert_eq!(text.matches(NO_DATA).count(), 6);
    }
}
