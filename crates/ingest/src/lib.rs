pub mod document;
pub mod reader;
pub mod truncate;

pub use document::UploadedDocument;
pub use reader::{FileReader, PdfTextExtractor, TextExtractor};
pub use truncate::{TruncationConfig, Truncator};

use tracing::{debug, warn};

/// Main ingestion step for one uploaded file.
///
/// Extraction failure is not fatal: the document continues with empty
/// text and structuring runs best-effort on it.
pub fn ingest_bytes(
    source: &str,
    bytes: &[u8],
    extractor: &dyn TextExtractor,
    truncator: &Truncator,
) -> UploadedDocument {
    let full_text = match extractor.extract_pages(bytes) {
        Ok(pages) => FileReader::join_pages(&pages),
        Err(e) => {
            warn!(file = source, error = %e, "Text extraction failed, continuing with empty text");
            String::new()
        }
    };

    let original_chars = full_text.chars().count();
    let kept = truncator.truncate(&full_text).to_string();

    let document = UploadedDocument::new(source.to_string(), bytes, kept, original_chars);
    debug!(
        file = source,
        doc_id = %document.doc_id,
        chars = original_chars,
        truncated = document.truncated,
        "Ingested document"
    );

    document
}
