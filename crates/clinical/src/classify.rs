use serde::{Deserialize, Serialize};
use std::fmt;

use extract::StructuredReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainClass {
    Blood,
    Urine,
    Imaging,
    Pathology,
    Other,
}

impl DomainClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainClass::Blood => "blood",
            DomainClass::Urine => "urine",
            DomainClass::Imaging => "imaging",
            DomainClass::Pathology => "pathology",
            DomainClass::Other => "other",
        }
    }
}

impl fmt::Display for DomainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule inspects test names.
enum NameMatch {
    /// Whole (lowercased) name equals one of the keywords.
    Exact(&'static [&'static str]),
    /// Name contains one of the keywords.
    Contains(&'static [&'static str]),
}

struct DomainRule {
    domain: DomainClass,
    type_keywords: &'static [&'static str],
    test_names: NameMatch,
}

impl DomainRule {
    fn matches(&self, report_type: &str, test_names: &[String]) -> bool {
        if self.type_keywords.iter().any(|k| report_type.contains(k)) {
            return true;
        }
        test_names.iter().any(|name| match self.test_names {
            NameMatch::Exact(keywords) => keywords.contains(&name.as_str()),
            NameMatch::Contains(keywords) => keywords.iter().any(|k| name.contains(k)),
        })
    }
}

// Checked in order; the first matching rule wins.
const RULES: &[DomainRule] = &[
    DomainRule {
        domain: DomainClass::Blood,
        type_keywords: &["blood", "hematology", "serum", "plasma", "cbc", "lipid", "glucose"],
        test_names: NameMatch::Exact(&[
            "hemoglobin",
            "wbc count",
            "rbc count",
            "platelet count",
            "glucose",
            "cholesterol",
        ]),
    },
    DomainRule {
        domain: DomainClass::Urine,
        type_keywords: &["urine", "urinalysis", "ua"],
        test_names: NameMatch::Exact(&[
            "urine color",
            "urine ph",
            "specific gravity",
            "leukocytes",
            "nitrite",
            "protein",
            "glucose in urine",
            "ketones",
        ]),
    },
    DomainRule {
        domain: DomainClass::Imaging,
        type_keywords: &[
            "x-ray",
            "xray",
            "mri",
            "ct scan",
            "ultrasound",
            "imaging",
            "radiograph",
            "sonogram",
        ],
        test_names: NameMatch::Contains(&["impression", "finding"]),
    },
    DomainRule {
        domain: DomainClass::Pathology,
        type_keywords: &["pathology", "histology", "biopsy", "cytology"],
        test_names: NameMatch::Contains(&["specimen", "tissue"]),
    },
];

/// Assign a report to a clinical domain from its declared type and test names.
pub fn classify(report: &StructuredReport) -> DomainClass {
    let report_type = report.report_type.to_lowercase();
    let test_names: Vec<String> = report
        .test_results
        .iter()
        .map(|test| test.name().to_lowercase())
        .collect();

    RULES
        .iter()
        .find(|rule| rule.matches(&report_type, &test_names))
        .map(|rule| rule.domain)
        .unwrap_or(DomainClass::Other)
}
