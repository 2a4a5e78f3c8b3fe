//! Shared test utilities for seoscribe integration tests.
//!
//! Provides [`ScriptedGenerator`], a [`Generator`] that replays queued
//! responses instead of calling a provider, plus canned provider output
//! for every generation step of the "vegan protein bars" scenario.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use seoscribe_core::generation::{ChunkStream, GenerationError, GenerationRequest, Generator};
use seoscribe_core::session::KeywordInputs;

/// One queued provider response.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream this text, one word per chunk.
    Text(String),
    /// Fail before producing any text.
    Fail(GenerationError),
    /// Stream `text`, then fail with `error`.
    Truncated { text: String, error: GenerationError },
}

/// Replays [`Script`]s in order, one per `stream`/`complete` call.
///
/// Records every request it receives and counts streams that were dropped
/// before they finished.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
    cancelled: Arc<AtomicUsize>,
    chunk_delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Script that streams each of `texts` in turn.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Script::Text(t.into())))
    }

    /// Sleep before every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Script::Text(text.into()));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Number of streams dropped before their last chunk.
    pub fn cancelled_streams(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn remaining_scripts(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

/// Split text the way the scripted provider streams it.
pub fn chunks_of(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

/// Counts a stream as cancelled if it is dropped before `finished` is set.
struct CancelGuard {
    counter: Arc<AtomicUsize>,
    finished: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream(&self, request: GenerationRequest) -> ChunkStream {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            Script::Fail(GenerationError::Service(
                "no scripted response left".to_string(),
            ))
        });
        let (text, error) = match script {
            Script::Text(text) => (text, None),
            Script::Fail(error) => (String::new(), Some(error)),
            Script::Truncated { text, error } => (text, Some(error)),
        };
        let counter = Arc::clone(&self.cancelled);
        let delay = self.chunk_delay;

        Box::pin(async_stream::stream! {
            let mut guard = CancelGuard { counter, finished: false };
            for chunk in chunks_of(&text) {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(chunk);
            }
            guard.finished = true;
            if let Some(error) = error {
                yield Err(error);
            }
        })
    }
}

/// Collect everything sent on a chunk channel until the sender closes.
pub fn chunk_channel(capacity: usize) -> (mpsc::Sender<String>, JoinHandle<Vec<String>>) {
    let (tx, mut rx) = mpsc::channel(capacity);
    let collector = tokio::spawn(async move {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    });
    (tx, collector)
}

/// Keyword intake for the running example.
pub fn sample_inputs() -> KeywordInputs {
    KeywordInputs {
        primary_keyword: "vegan protein bars".to_string(),
        brand: Some("GreenFuel".to_string()),
        industry: "Food & Beverage".to_string(),
        audience: "Health-conscious millennials".to_string(),
        tone: "friendly, expert".to_string(),
        notes: Some("Mention that our bars are soy-free.".to_string()),
    }
}

/// LSI research output with two keyword rows.
pub const LSI_RESPONSE: &str = "\
Here are the semantically related keywords for \"vegan protein bars\":

| Keyword | Volume | Intent |
|---------|--------|--------|
| plant-based protein | medium | Informational |
| vegan snacks | **High** | Commercial |

Focus on plant-based protein in the introduction.
";

/// LSI research output that ignores the table format.
pub const LSI_RESPONSE_NO_TABLE: &str =
    "Sorry, I could not find related keywords for that topic right now.";

pub const BRIEF_RESPONSE: &str = "\
---ANGLE---
A practical buyer's guide that compares bars by protein source.
---TITLETAG---
Best Vegan Protein Bars: A Practical Buyer's Guide
---METADESC---
Compare the best vegan protein bars by protein source, taste and price, and find the plant-based snack that fits your goals and your budget.
---OUTLINE---
# Best Vegan Protein Bars
## What makes a good plant-based protein bar
### Protein sources
## Vegan snacks for busy days
---FAQS---
- Are vegan protein bars healthy?
- How much protein do they contain?
---END---";

/// A brief with no outline section.
pub const BRIEF_RESPONSE_NO_OUTLINE: &str = "\
---ANGLE---
Something.
---TITLETAG---
Vegan Protein Bars
---METADESC---
A description.
---FAQS---
- Why?
---END---";

pub const ARTICLE_RESPONSE: &str = "\
---KEYWORDS---
plant-based protein, vegan snacks
---TITLETAG---
Best Vegan Protein Bars: A Practical Buyer's Guide
---METADESC---
Compare the best vegan protein bars by protein source, taste and price, and find the plant-based snack that fits your goals and your budget.
---ARTICLETITLE---
# Best Vegan Protein Bars
---ARTICLECOPY---
## What makes a good plant-based protein bar

A good bar balances plant-based protein with fibre and flavour. Pea, rice and pumpkin seed proteins each bring something different.

### Protein sources

Pea protein is smooth and rich in leucine. Brown rice protein rounds out the amino acid profile.

## Vegan snacks for busy days

Keep a bar in your bag for the afternoon slump. GreenFuel bars are soy-free.
---FAQS---
Q1: Are vegan protein bars healthy?
A1: Most are, as long as sugar stays low.
Q2: How much protein do they contain?
A2: Usually between 10 and 20 grams.
---END---";

/// The article after a "make it punchier" refinement.
pub fn refined_article(tag: &str) -> String {
    ARTICLE_RESPONSE.replace(
        "A good bar balances",
        &format!("[{tag}] Great bars balance"),
    )
}
