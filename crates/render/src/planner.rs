use std::sync::Arc;

use clinical::{
    DomainClass, LabeledSectionExtractor, RangeStatus, ReferenceRange, SectionExtractor, Status,
    classify, compare_to_range, extract_narrative, numeric_reading, status::evaluate_urine,
};
use extract::{PatientInfo, StructuredReport, TestResult};

use crate::blocks::{ChartBar, ChartBlock, Color, ContentBlock, SwatchBlock, TableBlock, TableStyle};

pub const REPORT_TITLE: &str = "Medical Report";
pub const NO_BLOOD_DATA: &str = "No valid numerical data found for blood test chart generation.";
pub const NO_URINE_DATA: &str = "No urine test data found for visualization.";
pub const NO_IMAGING_DATA: &str = "No structured findings or impressions found in this imaging report.";
pub const NO_PATHOLOGY_DATA: &str = "No structured pathology data found in this report.";
pub const GENERAL_REPORT: &str = "This is a general medical report without specific visualization.";

const RAW_ROWS_PER_TABLE: usize = 5;
const TESTS_PER_CHART: usize = 4;

const RAW_HEADER_FILLS: [Color; 2] = [Color::rgb(0x4C, 0xAF, 0x50), Color::rgb(0x21, 0x96, 0xF3)];
const COMPARISON_HEADER: Color = Color::rgb(0x34, 0x49, 0x5E);
const URINE_HEADER: Color = Color::rgb(0x34, 0x98, 0xDB);
const SUMMARY_HEADER: Color = Color::rgb(0x9B, 0x59, 0xB6);

const PALE_YELLOW: Color = Color::rgb(0xFF, 0xFF, 0xA0);

// First name contained in the reported value wins.
const URINE_SWATCHES: &[(&str, Color)] = &[
    ("pale yellow", PALE_YELLOW),
    ("yellow", Color::rgb(0xFF, 0xFF, 0x00)),
    ("dark yellow", Color::rgb(0xCC, 0xCC, 0x00)),
    ("amber", Color::rgb(0xFF, 0xBF, 0x00)),
    ("orange", Color::rgb(0xFF, 0xA5, 0x00)),
    ("red", Color::rgb(0xFF, 0x00, 0x00)),
    ("pink", Color::rgb(0xFF, 0xC0, 0xCB)),
    ("brown", Color::rgb(0xA5, 0x2A, 0x2A)),
    ("clear", Color::rgb(0xF0, 0xF8, 0xFF)),
    ("cloudy", Color::rgb(0xE6, 0xE6, 0xFA)),
];

/// Turns one structured report into an ordered list of content blocks.
#[derive(Clone)]
pub struct ReportPlanner {
    sections: Arc<dyn SectionExtractor>,
}

impl Default for ReportPlanner {
    fn default() -> Self {
        Self::new(Arc::new(LabeledSectionExtractor))
    }
}

impl ReportPlanner {
    pub fn new(sections: Arc<dyn SectionExtractor>) -> Self {
        Self { sections }
    }

    /// Never returns an empty plan.
    pub fn plan(&self, report: &StructuredReport) -> Vec<ContentBlock> {
        let mut blocks = vec![ContentBlock::Title(REPORT_TITLE.to_string())];

        if let Some(patient) = &report.patient_info {
            blocks.push(patient_fields(patient));
        }

        let report_type = match report.report_type.trim() {
            "" => "Unknown",
            label => label,
        };
        blocks.push(ContentBlock::Heading(format!("Report Type: {}", report_type)));

        plan_raw_results(report, &mut blocks);

        let domain = classify(report);
        match domain {
            DomainClass::Blood => plan_blood(report, &mut blocks),
            DomainClass::Urine => plan_urine(report, &mut blocks),
            DomainClass::Imaging | DomainClass::Pathology => {
                self.plan_narrative(report, domain, &mut blocks)
            }
            DomainClass::Other => plan_other(report, &mut blocks),
        }

        if let Some(notes) = report.notes_text() {
            blocks.push(ContentBlock::SubHeading("Doctor Notes:".to_string()));
            blocks.push(ContentBlock::Paragraph(notes.to_string()));
        }

        blocks
    }

    fn plan_narrative(
        &self,
        report: &StructuredReport,
        domain: DomainClass,
        blocks: &mut Vec<ContentBlock>,
    ) {
        let sections = extract_narrative(report, domain, self.sections.as_ref());
        if sections.is_empty() {
            let notice = if domain == DomainClass::Imaging {
                NO_IMAGING_DATA
            } else {
                NO_PATHOLOGY_DATA
            };
            blocks.push(ContentBlock::notice(notice));
            return;
        }

        for section in sections {
            blocks.push(ContentBlock::SubHeading(format!("{}:", section.field.heading())));
            blocks.push(ContentBlock::Paragraph(section.text));
        }
    }
}

fn patient_fields(patient: &PatientInfo) -> ContentBlock {
    let field = |label: &str, value: &Option<String>| {
        let value = value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("N/A");
        (label.to_string(), value.to_string())
    };

    ContentBlock::Fields(vec![
        field("Name", &patient.name),
        field("Age", &patient.age),
        field("Sex", &patient.sex),
    ])
}

fn plan_raw_results(report: &StructuredReport, blocks: &mut Vec<ContentBlock>) {
    let rows: Vec<Vec<String>> = report
        .test_results
        .iter()
        .filter(|test| {
            !test.name().is_empty()
                && !(test.value_text().is_empty()
                    && test.unit_text().is_empty()
                    && test.range_text().is_empty())
        })
        .map(|test| {
            vec![
                test.name().to_string(),
                test.value_text().to_string(),
                test.unit_text().to_string(),
                test.range_text().to_string(),
            ]
        })
        .collect();

    for (idx, chunk) in rows.chunks(RAW_ROWS_PER_TABLE).enumerate() {
        let style = TableStyle::with_header(RAW_HEADER_FILLS[idx % RAW_HEADER_FILLS.len()]);
        let mut table = TableBlock::new(&["Test Name", "Value", "Unit", "Reference Range"], style);
        for row in chunk {
            table.push_row(row.clone());
        }
        blocks.push(ContentBlock::Table(table));
    }
}

fn range_fill(status: RangeStatus) -> Color {
    match status {
        RangeStatus::Normal => Color::LIGHT_GREEN,
        RangeStatus::BelowNormal => Color::LIGHT_YELLOW,
        RangeStatus::AboveNormal => Color::LIGHT_CORAL,
    }
}

fn status_fill(status: Status) -> Color {
    match status {
        Status::Normal => Color::LIGHT_GREEN,
        Status::Abnormal => Color::LIGHT_CORAL,
    }
}

fn plan_blood(report: &StructuredReport, blocks: &mut Vec<ContentBlock>) {
    // Tests without a usable value and range stay in the raw table only.
    let readings: Vec<(&TestResult, f64, ReferenceRange)> = report
        .test_results
        .iter()
        .filter(|test| !test.name().is_empty())
        .filter_map(|test| numeric_reading(test).map(|(value, range)| (test, value, range)))
        .collect();

    if readings.is_empty() {
        blocks.push(ContentBlock::notice(NO_BLOOD_DATA));
        return;
    }

    let chart_count = readings.len().div_ceil(TESTS_PER_CHART);
    for (idx, chunk) in readings.chunks(TESTS_PER_CHART).enumerate() {
        let suffix = if chart_count > 1 {
            format!(" (Chart {} of {})", idx + 1, chart_count)
        } else {
            String::new()
        };

        blocks.push(ContentBlock::SubHeading(format!("Blood Test Comparison Chart{}", suffix)));
        blocks.push(ContentBlock::Chart(ChartBlock {
            title: format!("Your Blood Test Results vs Normal Range{}", suffix),
            bars: chunk
                .iter()
                .map(|(test, value, range)| ChartBar {
                    label: test.name().to_string(),
                    value: *value,
                    min: range.min,
                    max: range.max,
                })
                .collect(),
        }));
    }

    blocks.push(ContentBlock::SubHeading("Values Comparison Table:".to_string()));
    let mut table = TableBlock::new(
        &["Test Name", "Your Value", "Normal Range", "Status"],
        TableStyle::with_header(COMPARISON_HEADER),
    );
    for (test, value, range) in &readings {
        let status = compare_to_range(*value, *range);
        table.push_row(vec![
            test.name().to_string(),
            test.value_text().to_string(),
            test.range_text().to_string(),
            status.label().to_string(),
        ]);
        table.highlight_last(3, range_fill(status));
    }
    blocks.push(ContentBlock::Table(table));
}

fn plan_urine(report: &StructuredReport, blocks: &mut Vec<ContentBlock>) {
    let mut table = TableBlock::new(
        &["Parameter", "Result", "Reference Range", "Status"],
        TableStyle::with_header(URINE_HEADER),
    );

    for test in &report.test_results {
        let name = test.name().to_lowercase();
        let value = test.value_text().to_lowercase();
        if name.is_empty() || value.is_empty() {
            continue;
        }

        let status = evaluate_urine(test);
        table.push_row(vec![
            title_case(&name),
            value,
            test.range_text().to_string(),
            status.label().to_string(),
        ]);
        table.highlight_last(3, status_fill(status));
    }

    if table.rows.is_empty() {
        blocks.push(ContentBlock::notice(NO_URINE_DATA));
        return;
    }

    blocks.push(ContentBlock::SubHeading("Urine Test Results:".to_string()));
    blocks.push(ContentBlock::Table(table));

    let reported_color = report
        .test_results
        .iter()
        .filter(|test| test.name().to_lowercase().contains("color"))
        .map(|test| test.value_text().to_lowercase())
        .find(|value| !value.is_empty());

    if let Some(value) = reported_color {
        blocks.push(ContentBlock::SubHeading("Urine Color Representation:".to_string()));
        blocks.push(ContentBlock::Swatch(SwatchBlock {
            color: swatch_color(&value),
            caption: format!("Reported color: {}", value),
        }));
    }
}

fn swatch_color(value: &str) -> Color {
    URINE_SWATCHES
        .iter()
        .find(|(name, _)| value.contains(name))
        .map(|(_, color)| *color)
        .unwrap_or(PALE_YELLOW)
}

fn plan_other(report: &StructuredReport, blocks: &mut Vec<ContentBlock>) {
    blocks.push(ContentBlock::notice(GENERAL_REPORT));

    let mut table = TableBlock::new(
        &["Test", "Result", "Unit", "Reference Range"],
        TableStyle::with_header(SUMMARY_HEADER),
    );
    for test in &report.test_results {
        if test.name().is_empty() || test.value_text().is_empty() {
            continue;
        }
        table.push_row(vec![
            test.name().to_string(),
            test.value_text().to_string(),
            test.unit_text().to_string(),
            test.range_text().to_string(),
        ]);
    }

    if !table.rows.is_empty() {
        blocks.push(ContentBlock::SubHeading("Test Results Summary:".to_string()));
        blocks.push(ContentBlock::Table(table));
    }
}

/// Capitalise the first letter of every alphabetic run: `"urine ph"` -> `"Urine Ph"`.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() && !prev_alpha {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}
