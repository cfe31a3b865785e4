use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use clinical::{DomainClass, Status, classify, collect_test_results, evaluate, merge_reports};
use extract::{Extractor, StructuredReport};
use ingest::{TextExtractor, Truncator, UploadedDocument, ingest_bytes};
use render::{DocumentAssembler, RenderBackend};

use crate::metrics::{Metrics, TimedOperation};

/// One file received in an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Warning,
    Error,
}

/// Per-file message surfaced to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SessionNotice {
    pub kind: NoticeKind,
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestEvaluation {
    pub test_name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEvaluation {
    pub report_type: String,
    pub domain: DomainClass,
    pub tests: Vec<TestEvaluation>,
}

/// Everything one upload request produced.
#[derive(Debug, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub files_received: usize,
    pub files_structured: usize,
    pub notices: Vec<SessionNotice>,
    /// Reports as they go to the document; merged when several files came in.
    pub reports: Vec<StructuredReport>,
    pub merged: bool,
    pub evaluations: Vec<ReportEvaluation>,
    pub test_results: Map<String, Value>,
}

impl SessionOutcome {
    pub fn test_results_json(&self) -> String {
        serde_json::to_string_pretty(&self.test_results).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Upload -> text -> structured reports -> document, one session at a time.
#[derive(Clone)]
pub struct ReportPipeline {
    text_extractor: Arc<dyn TextExtractor>,
    truncator: Arc<Truncator>,
    extractor: Extractor,
    assembler: DocumentAssembler,
    backend: Arc<dyn RenderBackend>,
    metrics: Arc<Metrics>,
}

impl ReportPipeline {
    pub fn new(
        text_extractor: Arc<dyn TextExtractor>,
        truncator: Truncator,
        extractor: Extractor,
        assembler: DocumentAssembler,
        backend: Arc<dyn RenderBackend>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            text_extractor,
            truncator: Arc::new(truncator),
            extractor,
            assembler,
            backend,
            metrics,
        }
    }

    /// Process files one after another. A file that fails to structure adds
    /// an error notice and contributes nothing; the others carry on.
    pub async fn process(&self, files: Vec<UploadedFile>) -> SessionOutcome {
        let session_id = Uuid::new_v4();
        self.metrics.record_session(files.len());
        info!(%session_id, files = files.len(), "Processing upload session");

        let mut notices = Vec::new();
        let mut extracted = Vec::new();
        let mut files_structured = 0;

        for file in &files {
            let timer = TimedOperation::start();
            let document = self.read_text(file).await;
            self.metrics.record_text_extraction(timer.elapsed());

            if let Some(message) = document.truncation_notice() {
                notices.push(SessionNotice {
                    kind: NoticeKind::Warning,
                    file: file.name.clone(),
                    message,
                });
            }

            let timer = TimedOperation::start();
            match self.extractor.structure(&document.text).await {
                Ok(reports) => {
                    self.metrics.record_structuring(timer.elapsed(), Some(reports.len()));
                    info!(
                        %session_id,
                        file = %file.name,
                        doc_id = %document.doc_id,
                        reports = reports.len(),
                        "File structured"
                    );
                    files_structured += 1;
                    extracted.extend(reports);
                }
                Err(e) => {
                    self.metrics.record_structuring(timer.elapsed(), None);
                    warn!(%session_id, file = %file.name, error = %e, "Structuring failed, skipping file");
                    let message = if e.is_api_error() {
                        format!("API Error: {}", e)
                    } else {
                        format!("Error processing file: {}", e)
                    };
                    notices.push(SessionNotice {
                        kind: NoticeKind::Error,
                        file: file.name.clone(),
                        message,
                    });
                }
            }
        }

        let test_results = collect_test_results(&extracted);

        let merged = files.len() > 1;
        let reports = if merged {
            merge_reports(extracted)
        } else {
            extracted
        };

        let evaluations = reports.iter().map(evaluate_report).collect();

        SessionOutcome {
            session_id,
            files_received: files.len(),
            files_structured,
            notices,
            reports,
            merged,
            evaluations,
            test_results,
        }
    }

    /// Text extraction runs on the blocking pool. A crashed extraction is
    /// treated like a failed one: the file continues with empty text.
    async fn read_text(&self, file: &UploadedFile) -> UploadedDocument {
        let extractor = Arc::clone(&self.text_extractor);
        let truncator = Arc::clone(&self.truncator);
        let name = file.name.clone();
        let bytes = file.bytes.clone();

        let handle = task::spawn_blocking(move || {
            ingest_bytes(&name, &bytes, extractor.as_ref(), &truncator)
        });

        match handle.await {
            Ok(document) => document,
            Err(e) => {
                warn!(file = %file.name, error = %e, "Text extraction task failed, continuing with empty text");
                UploadedDocument::new(file.name.clone(), &file.bytes, String::new(), 0)
            }
        }
    }

    /// Plan and render the session's reports on the blocking pool.
    pub async fn render_pdf(&self, outcome: &SessionOutcome) -> Result<Vec<u8>> {
        let timer = TimedOperation::start();
        let assembler = self.assembler.clone();
        let backend = Arc::clone(&self.backend);
        let reports = outcome.reports.clone();

        let bytes = task::spawn_blocking(move || assembler.render(&reports, backend.as_ref()))
            .await
            .context("PDF rendering task failed")??;

        self.metrics.record_render(timer.elapsed());
        Ok(bytes)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

fn evaluate_report(report: &StructuredReport) -> ReportEvaluation {
    let domain = classify(report);
    let tests = report
        .test_results
        .iter()
        .filter(|test| !test.name().is_empty())
        .map(|test| TestEvaluation {
            test_name: test.name().to_string(),
            value: test.value_text().to_string(),
            status: evaluate(domain, test),
        })
        .collect();

    ReportEvaluation {
        report_type: report.report_type.clone(),
        domain,
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedText, ScriptedService, pipeline_with};

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            bytes: name.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn single_file_is_not_merged() {
        let service = ScriptedService::new(vec![Ok(r#"{
            "report_type": "CBC",
            "test_results": [
                {"test_name": "Glucose", "value": 120, "unit": "mg/dL", "reference_range": "70-110"}
            ]
        }"#)]);
        let pipeline = pipeline_with(FixedText::new("glucose 120"), service, 2500);

        let outcome = pipeline.process(vec![file("cbc.pdf")]).await;

        assert!(!outcome.merged);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].report_type, "CBC");
        assert_eq!(outcome.evaluations[0].domain, DomainClass::Blood);
        assert_eq!(outcome.evaluations[0].tests[0].status, Some(Status::Abnormal));
        assert_eq!(outcome.test_results["Glucose"], "120 mg/dL");
        assert!(outcome.notices.is_empty());
    }

    #[tokio::test]
    async fn failed_file_is_skipped_with_notice() {
        let service = ScriptedService::new(vec![
            Ok(r#"{"report_type": "CBC", "test_results": [{"test_name": "Hemoglobin", "value": "13"}]}"#),
            Err(extract::StructuringError::ApiStatus {
                status: 429,
                body: "rate limited".to_string(),
            }),
            Ok("not json"),
            Ok(r#"[{"report_type": "Urinalysis", "test_results": [{"test_name": "HEMOGLOBIN", "value": "neg"}]}]"#),
        ]);
        let pipeline = pipeline_with(FixedText::new("text"), service, 2500);

        let outcome = pipeline
            .process(vec![file("a.pdf"), file("b.pdf"), file("c.pdf"), file("d.pdf")])
            .await;

        assert_eq!(outcome.files_structured, 2);
        assert_eq!(outcome.notices.len(), 2);
        assert!(outcome.notices[0].message.starts_with("API Error:"));
        assert_eq!(outcome.notices[0].file, "b.pdf");
        assert!(outcome.notices[1].message.starts_with("Error processing file:"));

        assert!(outcome.merged);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].report_type, "combined");
        assert_eq!(outcome.reports[0].test_results.len(), 1);

        // The export keeps names as written, so both spellings appear.
        assert_eq!(outcome.test_results.len(), 2);

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.files_failed, 2);
        assert_eq!(snapshot.reports_extracted, 2);
    }

    #[tokio::test]
    async fn truncation_is_reported() {
        let service = ScriptedService::new(vec![Ok(r#"{"report_type": "X-Ray"}"#)]);
        let pipeline = pipeline_with(FixedText::new("abcdefghij"), service, 4);

        let outcome = pipeline.process(vec![file("scan.pdf")]).await;

        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.notices[0].kind, NoticeKind::Warning);
        assert_eq!(
            outcome.notices[0].message,
            "The PDF text was truncated from 10 to 4 characters to avoid token limit errors."
        );
    }

    #[tokio::test]
    async fn all_failures_still_render() {
        let service = ScriptedService::new(vec![Ok("[]")]);
        let pipeline = pipeline_with(FixedText::failing(), service, 2500);

        let outcome = pipeline.process(vec![file("blank.pdf")]).await;
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.test_results_json(), "{}");

        let pdf = pipeline.render_pdf(&outcome).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(pipeline.metrics().snapshot().documents_rendered, 1);
    }

    #[tokio::test]
    async fn crashed_extraction_continues_with_empty_text() {
        let service = ScriptedService::new(vec![Ok(r#"{"report_type": "CBC"}"#)]);
        let calls = service.call_counter();
        let pipeline = pipeline_with(FixedText::panicking(), service, 2500);

        let outcome = pipeline.process(vec![file("broken.pdf")]).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(outcome.files_structured, 1);
        assert!(outcome.notices.is_empty());
        assert_eq!(outcome.reports[0].report_type, "CBC");
    }

    struct CrashingBackend;

    impl RenderBackend for CrashingBackend {
        fn render(&self, _blocks: &[render::ContentBlock]) -> Result<Vec<u8>> {
            panic!("backend crashed");
        }
    }

    #[tokio::test]
    async fn crashed_render_is_an_error() {
        let pipeline = ReportPipeline::new(
            Arc::new(FixedText::new("text")),
            Truncator::new(ingest::TruncationConfig::default()),
            Extractor::new(Arc::new(ScriptedService::new(vec![]))),
            DocumentAssembler::default(),
            Arc::new(CrashingBackend),
            Metrics::new(),
        );
        let outcome = pipeline.process(vec![file("a.pdf")]).await;

        assert!(pipeline.render_pdf(&outcome).await.is_err());
        assert_eq!(pipeline.metrics().snapshot().documents_rendered, 0);
    }
}
