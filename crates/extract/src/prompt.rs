pub const SYSTEM_PROMPT: &str = r#"Extract structured medical data as JSON with schema:
{
  "patient_info": {"name": string, "age": number, "sex": string},
  "report_type": string,
  "test_results": [{"test_name": string, "value": string, "unit": string, "reference_range": string}],
  "doctor_notes": string,
  "summary": string
}

For blood/urine tests: Include parameters, values, units, ranges.
For imaging/pathology: Include findings, impressions, specimen details, diagnosis."#;

pub fn build_report_prompt(report_text: &str) -> String {
    format!(
        "Parse this medical report into structured JSON:\n\n{}",
        report_text
    )
}
