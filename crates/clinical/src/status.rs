use serde::{Deserialize, Serialize};

use crate::classify::DomainClass;
use crate::value::{ReferenceRange, parse_bounds, parse_number};
use extract::TestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Normal,
    Abnormal,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Normal => "Normal",
            Status::Abnormal => "Abnormal",
        }
    }
}

/// Three-way comparison of a value against its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    BelowNormal,
    Normal,
    AboveNormal,
}

impl RangeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RangeStatus::BelowNormal => "Below Normal",
            RangeStatus::Normal => "Normal",
            RangeStatus::AboveNormal => "Above Normal",
        }
    }
}

pub fn compare_to_range(value: f64, range: ReferenceRange) -> RangeStatus {
    if value < range.min {
        RangeStatus::BelowNormal
    } else if value > range.max {
        RangeStatus::AboveNormal
    } else {
        RangeStatus::Normal
    }
}

/// Numeric value and both bounds, when all of them parse.
pub fn numeric_reading(test: &TestResult) -> Option<(f64, ReferenceRange)> {
    let value = parse_number(test.value_text())?;
    let range = parse_bounds(test.range_text())?;
    Some((value, range))
}

/// Range comparison, or `None` when the value or range is unusable.
pub fn evaluate_numeric(test: &TestResult) -> Option<Status> {
    numeric_reading(test).map(|(value, range)| {
        if range.contains(value) {
            Status::Normal
        } else {
            Status::Abnormal
        }
    })
}

/// Rule for one urinalysis parameter.
#[derive(Debug, Clone, Copy)]
pub enum UrineRule {
    /// Normal when the value contains a `normal` term and no `abnormal` term.
    SubstringMatch {
        normal: &'static [&'static str],
        abnormal: &'static [&'static str],
    },
    /// Normal when the parsed value satisfies `check`.
    NumericPredicate { check: fn(f64) -> bool },
}

impl UrineRule {
    pub fn evaluate(&self, value: &str) -> Status {
        let is_normal = match self {
            UrineRule::SubstringMatch { normal, abnormal } => {
                normal.iter().any(|term| value.contains(term))
                    && !abnormal.iter().any(|term| value.contains(term))
            }
            UrineRule::NumericPredicate { check } => parse_number(value).is_some_and(check),
        };

        if is_normal { Status::Normal } else { Status::Abnormal }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UrineParameter {
    pub name: &'static str,
    pub rule: UrineRule,
}

const NEGATIVE: &[&str] = &["negative", "none", "0", "normal"];
const GRADED: &[&str] = &["positive", "trace", "1+", "2+", "3+", "4+"];

fn ph_in_range(value: f64) -> bool {
    (4.5..=8.0).contains(&value)
}

fn specific_gravity_in_range(value: f64) -> bool {
    (1.005..=1.030).contains(&value)
}

/// Urinalysis rule table. Parameters are matched as substrings of the
/// lowercased test name, in this order.
pub const URINE_PARAMETERS: &[UrineParameter] = &[
    UrineParameter {
        name: "color",
        rule: UrineRule::SubstringMatch {
            normal: &["pale yellow", "yellow", "straw", "amber", "clear"],
            abnormal: &["red", "brown", "orange", "green", "blue", "cloudy", "turbid"],
        },
    },
    UrineParameter {
        name: "clarity",
        rule: UrineRule::SubstringMatch {
            normal: &["clear", "transparent"],
            abnormal: &["cloudy", "turbid", "hazy"],
        },
    },
    UrineParameter {
        name: "ph",
        rule: UrineRule::NumericPredicate { check: ph_in_range },
    },
    UrineParameter {
        name: "specific gravity",
        rule: UrineRule::NumericPredicate { check: specific_gravity_in_range },
    },
    UrineParameter {
        name: "glucose",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: GRADED },
    },
    UrineParameter {
        name: "protein",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: GRADED },
    },
    UrineParameter {
        name: "ketones",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: GRADED },
    },
    UrineParameter {
        name: "blood",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: GRADED },
    },
    UrineParameter {
        name: "nitrite",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: &["positive"] },
    },
    UrineParameter {
        name: "leukocytes",
        rule: UrineRule::SubstringMatch { normal: NEGATIVE, abnormal: GRADED },
    },
    UrineParameter {
        name: "bacteria",
        rule: UrineRule::SubstringMatch {
            normal: &["negative", "none", "0", "normal", "not seen"],
            abnormal: &["positive", "present", "few", "moderate", "many"],
        },
    },
    UrineParameter {
        name: "epithelial cells",
        rule: UrineRule::SubstringMatch {
            normal: &["negative", "none", "0", "normal", "few", "occasional"],
            abnormal: &["moderate", "many"],
        },
    },
];

pub fn urine_parameter(test_name: &str) -> Option<&'static UrineParameter> {
    let name = test_name.trim().to_lowercase();
    URINE_PARAMETERS.iter().find(|param| name.contains(param.name))
}

/// Urinalysis status. Unknown parameters fall back to the numeric range;
/// when that cannot be evaluated either, the result reads Normal.
pub fn evaluate_urine(test: &TestResult) -> Status {
    let value = test.value_text().to_lowercase();

    match urine_parameter(&test.test_name) {
        Some(param) => param.rule.evaluate(&value),
        None => evaluate_numeric(test).unwrap_or(Status::Normal),
    }
}

/// Per-test status for a domain. Imaging and pathology have none; blood
/// and other return `None` when the numbers cannot be compared.
pub fn evaluate(domain: DomainClass, test: &TestResult) -> Option<Status> {
    if test.name().is_empty() {
        return None;
    }

    match domain {
        DomainClass::Blood | DomainClass::Other => evaluate_numeric(test),
        DomainClass::Urine => Some(evaluate_urine(test)),
        DomainClass::Imaging | DomainClass::Pathology => None,
    }
}
