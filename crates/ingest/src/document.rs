use sha2::{Digest, Sha256};

/// Text of one uploaded file, ready for structuring.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub doc_id: String,
    pub source: String,
    pub text: String,
    pub original_chars: usize,
    pub truncated: bool,
}

impl UploadedDocument {
    pub fn new(source: String, bytes: &[u8], text: String, original_chars: usize) -> Self {
        let doc_id = Self::generate_doc_id(&source, bytes);
        let truncated = text.chars().count() < original_chars;

        Self {
            doc_id,
            source,
            text,
            original_chars,
            truncated,
        }
    }

    fn generate_doc_id(source: &str, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(bytes);
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    pub fn kept_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Warning shown to the caller when the text sent for structuring was cut.
    pub fn truncation_notice(&self) -> Option<String> {
        self.truncated.then(|| {
            format!(
                "The PDF text was truncated from {} to {} characters to avoid token limit errors.",
                self.original_chars,
                self.kept_chars()
            )
        })
    }
}
