use regex::Regex;
use std::sync::LazyLock;

use crate::classify::DomainClass;
use extract::StructuredReport;

/// Free-text field pulled out of an imaging or pathology report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrativeField {
    Findings,
    Impression,
    Specimen,
    Diagnosis,
    Microscopic,
}

impl NarrativeField {
    pub fn heading(&self) -> &'static str {
        match self {
            NarrativeField::Findings => "Findings",
            NarrativeField::Impression => "Impression",
            NarrativeField::Specimen => "Specimen",
            NarrativeField::Diagnosis => "Diagnosis",
            NarrativeField::Microscopic => "Microscopic Description",
        }
    }

    /// Substring looked for in lowercased test names.
    pub fn keyword(&self) -> &'static str {
        match self {
            NarrativeField::Findings => "finding",
            NarrativeField::Impression => "impression",
            NarrativeField::Specimen => "specimen",
            NarrativeField::Diagnosis => "diagnosis",
            NarrativeField::Microscopic => "microscopic",
        }
    }

    /// Fields a domain reports on, in display order. Empty for numeric domains.
    pub fn for_domain(domain: DomainClass) -> &'static [NarrativeField] {
        match domain {
            DomainClass::Imaging => &[NarrativeField::Findings, NarrativeField::Impression],
            DomainClass::Pathology => &[
                NarrativeField::Specimen,
                NarrativeField::Diagnosis,
                NarrativeField::Microscopic,
            ],
            _ => &[],
        }
    }
}

/// One discovered narrative field.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeSection {
    pub field: NarrativeField,
    pub text: String,
}

/// Pulls a labelled section out of free text.
pub trait SectionExtractor: Send + Sync {
    fn extract(&self, field: NarrativeField, text: &str) -> Option<String>;
}

fn section_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("section pattern is valid")
}

static FINDINGS: LazyLock<Regex> = LazyLock::new(|| {
    section_pattern(r"(?is)findings?:(.+?)(?:impression:|assessment:|conclusion:|$)")
});
static IMPRESSION: LazyLock<Regex> =
    LazyLock::new(|| section_pattern(r"(?is)impression:(.+?)(?:recommendation:|plan:|$)"));
static SPECIMEN: LazyLock<Regex> = LazyLock::new(|| {
    section_pattern(r"(?is)specimen:(.+?)(?:clinical|gross|microscopic|diagnosis:|$)")
});
static DIAGNOSIS: LazyLock<Regex> =
    LazyLock::new(|| section_pattern(r"(?is)diagnosis:(.+?)(?:comment:|note:|$)"));
static MICROSCOPIC: LazyLock<Regex> =
    LazyLock::new(|| section_pattern(r"(?is)microscopic:(.+?)(?:diagnosis:|assessment:|$)"));

/// Regex extraction between a `Label:` and the next known label or the end
/// of the text. Boundaries are loose; a report that reuses a label inside a
/// section will be cut short.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabeledSectionExtractor;

impl LabeledSectionExtractor {
    fn pattern(field: NarrativeField) -> &'static Regex {
        match field {
            NarrativeField::Findings => &FINDINGS,
            NarrativeField::Impression => &IMPRESSION,
            NarrativeField::Specimen => &SPECIMEN,
            NarrativeField::Diagnosis => &DIAGNOSIS,
            NarrativeField::Microscopic => &MICROSCOPIC,
        }
    }
}

impl SectionExtractor for LabeledSectionExtractor {
    fn extract(&self, field: NarrativeField, text: &str) -> Option<String> {
        Self::pattern(field)
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|captured| !captured.is_empty())
    }
}

/// Narrative fields for an imaging or pathology report.
///
/// Test results are scanned first; the notes are only consulted when no
/// test result supplied any field.
pub fn extract_narrative(
    report: &StructuredReport,
    domain: DomainClass,
    extractor: &dyn SectionExtractor,
) -> Vec<NarrativeSection> {
    let fields = NarrativeField::for_domain(domain);
    if fields.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<Option<String>> = vec![None; fields.len()];
    for test in &report.test_results {
        let name = test.name().to_lowercase();
        let value = test.value_text();
        if value.is_empty() {
            continue;
        }
        if let Some(slot) = fields.iter().position(|field| name.contains(field.keyword())) {
            found[slot] = Some(value.to_string());
        }
    }

    if found.iter().all(Option::is_none) {
        if let Some(notes) = report.notes_text() {
            for (slot, field) in fields.iter().enumerate() {
                found[slot] = extractor.extract(*field, notes);
            }
        }
    }

    fields
        .iter()
        .zip(found)
        .filter_map(|(field, text)| text.map(|text| NarrativeSection { field: *field, text }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::TestResult;

    fn imaging(tests: Vec<TestResult>, notes: Option<&str>) -> StructuredReport {
        StructuredReport {
            report_type: "Chest X-Ray".to_string(),
            test_results: tests,
            doctor_notes: notes.map(str::to_string),
            ..StructuredReport::default()
        }
    }

    #[test]
    fn findings_stop_at_impression() {
        let extractor = LabeledSectionExtractor;
        let notes = "Findings: Clear lungs.\nImpression: Normal chest.";

        assert_eq!(
            extractor.extract(NarrativeField::Findings, notes).as_deref(),
            Some("Clear lungs.")
        );
        assert_eq!(
            extractor.extract(NarrativeField::Impression, notes).as_deref(),
            Some("Normal chest.")
        );
    }

    #[test]
    fn labels_match_case_insensitively_across_lines() {
        let extractor = LabeledSectionExtractor;
        let notes = "SPECIMEN: Skin punch\nbiopsy, left arm\nGross: 4mm core";

        assert_eq!(
            extractor.extract(NarrativeField::Specimen, notes).as_deref(),
            Some("Skin punch\nbiopsy, left arm")
        );
    }

    #[test]
    fn empty_capture_is_not_found() {
        let extractor = LabeledSectionExtractor;
        assert_eq!(extractor.extract(NarrativeField::Diagnosis, "Diagnosis:   "), None);
        assert_eq!(extractor.extract(NarrativeField::Diagnosis, "nothing here"), None);
    }

    #[test]
    fn test_results_take_precedence_over_notes() {
        let report = imaging(
            vec![TestResult::new("Impression", "No acute process")],
            Some("Findings: Should not be used."),
        );

        let sections = extract_narrative(&report, DomainClass::Imaging, &LabeledSectionExtractor);
        assert_eq!(
            sections,
            vec![NarrativeSection {
                field: NarrativeField::Impression,
                text: "No acute process".to_string(),
            }]
        );
    }

    #[test]
    fn later_test_results_overwrite_earlier() {
        let report = imaging(
            vec![
                TestResult::new("Finding 1", "Small nodule"),
                TestResult::new("Finding 2", "Stable effusion"),
                TestResult::new("Finding 3", ""),
            ],
            None,
        );

        let sections = extract_narrative(&report, DomainClass::Imaging, &LabeledSectionExtractor);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "Stable effusion");
    }

    #[test]
    fn notes_fallback_for_pathology() {
        let report = StructuredReport {
            report_type: "Pathology".to_string(),
            doctor_notes: Some(
                "Specimen: Colon polyp. Microscopic: Tubular glands. Diagnosis: Tubular adenoma."
                    .to_string(),
            ),
            ..StructuredReport::default()
        };

        let sections =
            extract_narrative(&report, DomainClass::Pathology, &LabeledSectionExtractor);
        let fields: Vec<_> = sections.iter().map(|s| s.field).collect();
        assert_eq!(
            fields,
            vec![
                NarrativeField::Specimen,
                NarrativeField::Diagnosis,
                NarrativeField::Microscopic
            ]
        );
        assert_eq!(sections[0].text, "Colon polyp.");
        assert_eq!(sections[1].text, "Tubular adenoma.");
        assert_eq!(sections[2].text, "Tubular glands.");
    }

    #[test]
    fn nothing_found_is_empty() {
        let report = imaging(Vec::new(), None);
        assert!(extract_narrative(&report, DomainClass::Imaging, &LabeledSectionExtractor).is_empty());
        assert!(extract_narrative(&report, DomainClass::Blood, &LabeledSectionExtractor).is_empty());
    }

    struct FixedExtractor;

    impl SectionExtractor for FixedExtractor {
        fn extract(&self, field: NarrativeField, _text: &str) -> Option<String> {
            (field == NarrativeField::Impression).then(|| "structured".to_string())
        }
    }

    #[test]
    fn extractor_is_replaceable() {
        let report = imaging(Vec::new(), Some("free text"));
        let sections = extract_narrative(&report, DomainClass::Imaging, &FixedExtractor);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].field, NarrativeField::Impression);
    }
}
