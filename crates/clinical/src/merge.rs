use std::collections::HashSet;

use extract::StructuredReport;

pub const MERGED_REPORT_TYPE: &str = "combined";

/// Combine several reports into one.
///
/// Zero or one report is returned as-is. Otherwise the result keeps the
/// first non-empty patient info, the first occurrence of each test name
/// (compared trimmed and lowercased), and every report's notes tagged with
/// its type.
pub fn merge_reports(reports: Vec<StructuredReport>) -> Vec<StructuredReport> {
    if reports.len() <= 1 {
        return reports;
    }

    let patient_info = reports
        .iter()
        .filter_map(|report| report.patient_info.as_ref())
        .find(|info| info.has_any())
        .cloned();

    let mut seen = HashSet::new();
    let mut test_results = Vec::new();
    let mut notes = Vec::new();

    for report in reports {
        if let Some(text) = report.notes_text() {
            notes.push(format!("[{} REPORT] {}", type_label(&report), text));
        }

        for test in report.test_results {
            let key = test.name().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            test_results.push(test);
        }
    }

    let merged = StructuredReport {
        patient_info,
        report_type: MERGED_REPORT_TYPE.to_string(),
        test_results,
        doctor_notes: (!notes.is_empty()).then(|| notes.join("\n\n")),
        summary: None,
    };

    vec![merged]
}

fn type_label(report: &StructuredReport) -> String {
    match report.report_type.trim() {
        "" => "UNKNOWN".to_string(),
        label => label.to_uppercase(),
    }
}
