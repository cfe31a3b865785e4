pub struct TruncationConfig {
    pub max_chars: usize,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self { max_chars: 2500 }
    }
}

pub struct Truncator {
    config: TruncationConfig,
}

impl Truncator {
    pub fn new(config: TruncationConfig) -> Self {
        Self { config }
    }

    /// Keep at most `max_chars` characters, cutting on a char boundary.
    pub fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.config.max_chars) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        }
    }
}
