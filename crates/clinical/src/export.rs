use serde_json::{Map, Value};

use extract::StructuredReport;

/// Flatten every report's results into `test name -> "value unit"`.
///
/// Names are kept as written (trimmed); a later report overwrites an
/// earlier value for the same name but keeps its original position.
pub fn collect_test_results(reports: &[StructuredReport]) -> Map<String, Value> {
    let mut results = Map::new();

    for test in reports.iter().flat_map(|report| &report.test_results) {
        let name = test.name();
        if name.is_empty() {
            continue;
        }

        let display = match test.unit_text() {
            "" => test.value_text().to_string(),
            unit => format!("{} {}", test.value_text(), unit),
        };
        results.insert(name.to_string(), Value::String(display));
    }

    results
}

/// Pretty-printed JSON document of [`collect_test_results`].
pub fn test_results_json(reports: &[StructuredReport]) -> String {
    let results = Value::Object(collect_test_results(reports));
    serde_json::to_string_pretty(&results).unwrap_or_else(|_| "{}".to_string())
}
