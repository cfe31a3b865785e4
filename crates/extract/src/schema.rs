use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sex: Option<String>,
}

impl PatientInfo {
    /// True when at least one field carries non-blank text.
    pub fn has_any(&self) -> bool {
        [&self.name, &self.age, &self.sex]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default, deserialize_with = "lenient_text")]
    pub test_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_range: Option<String>,
}

impl TestResult {
    pub fn new(test_name: &str, value: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            value: value.to_string(),
            ..Self::default()
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_range(mut self, range: &str) -> Self {
        self.reference_range = Some(range.to_string());
        self
    }

    pub fn name(&self) -> &str {
        self.test_name.trim()
    }

    pub fn value_text(&self) -> &str {
        self.value.trim()
    }

    pub fn unit_text(&self) -> &str {
        self.unit.as_deref().unwrap_or("").trim()
    }

    pub fn range_text(&self) -> &str {
        self.reference_range.as_deref().unwrap_or("").trim()
    }
}

/// One report as returned by the structuring service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub report_type: String,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl StructuredReport {
    /// Build a report from an arbitrary JSON object, skipping malformed
    /// test entries instead of rejecting the whole report.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct RawReport {
            #[serde(default)]
            patient_info: Option<Value>,
            #[serde(default, deserialize_with = "lenient_text")]
            report_type: String,
            #[serde(default)]
            test_results: Option<Vec<Value>>,
            #[serde(default, deserialize_with = "lenient_string")]
            doctor_notes: Option<String>,
            #[serde(default, deserialize_with = "lenient_string")]
            summary: Option<String>,
        }

        let raw: RawReport = serde_json::from_value(value)?;

        let patient_info = raw
            .patient_info
            .filter(Value::is_object)
            .and_then(|v| serde_json::from_value(v).ok());

        let test_results = raw
            .test_results
            .unwrap_or_default()
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok(Self {
            patient_info,
            report_type: raw.report_type,
            test_results,
            doctor_notes: raw.doctor_notes,
            summary: raw.summary,
        })
    }

    pub fn notes_text(&self) -> Option<&str> {
        self.doctor_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
    }
}

/// Render any JSON scalar as text. Numbers keep their JSON spelling.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}
