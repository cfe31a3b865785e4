use anyhow::Result;
use tracing::info;

use extract::StructuredReport;

use crate::blocks::ContentBlock;
use crate::planner::ReportPlanner;

pub const NO_REPORTS: &str = "No reports could be extracted from the uploaded files.";

/// Turns a block sequence into document bytes.
pub trait RenderBackend: Send + Sync {
    fn render(&self, blocks: &[ContentBlock]) -> Result<Vec<u8>>;
}

#[derive(Clone, Default)]
pub struct DocumentAssembler {
    planner: ReportPlanner,
}

impl DocumentAssembler {
    pub fn new(planner: ReportPlanner) -> Self {
        Self { planner }
    }

    /// Plan every report, with a page break between consecutive reports.
    pub fn assemble(&self, reports: &[StructuredReport]) -> Vec<ContentBlock> {
        if reports.is_empty() {
            return vec![ContentBlock::notice(NO_REPORTS)];
        }

        let mut blocks = Vec::new();
        for (i, report) in reports.iter().enumerate() {
            if i > 0 {
                blocks.push(ContentBlock::PageBreak);
            }
            blocks.extend(self.planner.plan(report));
        }
        blocks
    }

    pub fn render(&self, reports: &[StructuredReport], backend: &dyn RenderBackend) -> Result<Vec<u8>> {
        let blocks = self.assemble(reports);
        let bytes = backend.render(&blocks)?;
        info!(reports = reports.len(), blocks = blocks.len(), bytes = bytes.len(), "document rendered");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfBackend;
    use std::sync::Mutex;

    fn report(report_type: &str) -> StructuredReport {
        StructuredReport {
            report_type: report_type.to_string(),
            ..StructuredReport::default()
        }
    }

    #[test]
    fn page_breaks_only_between_reports() {
        let assembler = DocumentAssembler::default();
        let blocks = assembler.assemble(&[report("CBC"), report("X-Ray"), report("Biopsy")]);

        let breaks: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_page_break())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(breaks.len(), 2);
        assert!(!blocks.last().unwrap().is_page_break());
        assert_eq!(blocks[breaks[0] + 1], ContentBlock::Title("Medical Report".to_string()));
    }

    #[test]
    fn single_report_has_no_page_break() {
        let blocks = DocumentAssembler::default().assemble(&[report("CBC")]);
        assert!(!blocks.iter().any(ContentBlock::is_page_break));
    }

    #[test]
    fn no_reports_is_a_notice() {
        let blocks = DocumentAssembler::default().assemble(&[]);
        assert_eq!(blocks, vec![ContentBlock::notice(NO_REPORTS)]);
    }

    #[derive(Default)]
    struct RecordingBackend {
        seen: Mutex<usize>,
    }

    impl RenderBackend for RecordingBackend {
        fn render(&self, blocks: &[ContentBlock]) -> Result<Vec<u8>> {
            *self.seen.lock().unwrap() = blocks.len();
            Ok(b"doc".to_vec())
        }
    }

    #[test]
    fn backend_receives_the_whole_sequence() {
        let assembler = DocumentAssembler::default();
        let reports = [report("CBC"), report("Urinalysis")];
        let expected = assembler.assemble(&reports).len();

        let backend = RecordingBackend::default();
        assert_eq!(assembler.render(&reports, &backend).unwrap(), b"doc");
        assert_eq!(*backend.seen.lock().unwrap(), expected);
    }

    #[test]
    fn pdf_output_starts_with_header() {
        let bytes = DocumentAssembler::default()
            .render(&[report("CBC"), report("")], &PdfBackend::default())
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
