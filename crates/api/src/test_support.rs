//! In-process stand-ins for the text extraction and structuring services.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use extract::{CompletionService, Extractor, StructuringError};
use ingest::{TextExtractor, TruncationConfig, Truncator};
use render::{DocumentAssembler, PdfBackend};

use crate::metrics::Metrics;
use crate::pipeline::ReportPipeline;

enum Pages {
    Text(Vec<String>),
    Fail,
    Panic,
}

pub struct FixedText {
    pages: Pages,
}

impl FixedText {
    pub fn new(text: &str) -> Self {
        Self {
            pages: Pages::Text(vec![text.to_string()]),
        }
    }

    pub fn failing() -> Self {
        Self { pages: Pages::Fail }
    }

    pub fn panicking() -> Self {
        Self { pages: Pages::Panic }
    }
}

impl TextExtractor for FixedText {
    fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>> {
        match &self.pages {
            Pages::Text(pages) => Ok(pages.clone()),
            Pages::Fail => bail!("no text layer"),
            Pages::Panic => panic!("corrupt content stream"),
        }
    }
}

/// Replies with the queued responses in order, one per call.
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, StructuringError>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Result<&str, StructuringError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared count of `complete` calls, readable after the service is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StructuringError::MalformedResponse("no scripted reply".into())))
    }
}

pub fn pipeline_with(text: FixedText, service: ScriptedService, max_chars: usize) -> ReportPipeline {
    ReportPipeline::new(
        Arc::new(text),
        Truncator::new(TruncationConfig { max_chars }),
        Extractor::new(Arc::new(service)),
        DocumentAssembler::default(),
        Arc::new(PdfBackend::default()),
        Metrics::new(),
    )
}
