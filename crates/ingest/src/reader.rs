use anyhow::{Context, Result};

/// Text-extraction service: raw file bytes in, one string per page out.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// Extracts the embedded text layer of digital PDFs.
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .context("Failed to extract text from PDF")
    }
}

pub struct FileReader;

impl FileReader {
    /// Concatenate page texts, skipping pages without text.
    pub fn join_pages(pages: &[String]) -> String {
        pages
            .iter()
            .filter(|page| !page.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
