//! Offline backend for tests and `--mock` runs.
//!
//! Answers are deterministic and no key or network is needed. Every batch received
//! is recorded so tests can check what the bridge actually sent.
//!
//! ```ignore
//! use texlate_mt::{MachineTranslator, MockTranslator, MockMode};
//!
//! let backend = MockMode::Suffix;
//! let answer = MockTranslator::new(backend).translate("Results", "en", "nl").await?;
//! assert_eq!(answer, "Results_nl");
//! ```

use crate::error::{MtError, MtResult};
use crate::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockMode {
    /// `"Results"` becomes `"Results_nl"`
    Suffix,

    /// Fixed answers keyed by text and target, otherwise as `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// As `Suffix` with stray whitespace around the answer
    Padded,

    /// Every call fails with this message
    Error(String),

    /// Echo the input
    NoOp,

    /// As `Suffix`, one answer short per batch
    Truncate,
}

#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    /// Latency added to every call, in milliseconds
    delay_ms: u64,
    ordered: bool,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            ordered: true,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Claim that batch results may come back out of order.
    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }

    /// Number of `translate`/`translate_batch` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every batch received so far, in call order. Single translations count as a
    /// batch of one.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    async fn record(&self, texts: &[String]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(texts.to_vec());
        }
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn answer(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix | MockMode::Truncate => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => {
                let fixed = map.get(&(text.to_string(), target.to_string()));
                Ok(fixed.map_or_else(|| format!("{}_{}", text, target), String::clone))
            }
            MockMode::Padded => Ok(format!("  {}_{} \n", text, target)),
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.record(&[text.to_string()]).await;
        self.answer(text, target_locale)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.record(texts).await;

        let mut results = texts
            .iter()
            .map(|text| self.answer(text, target_locale))
            .collect::<MtResult<Vec<_>>>()?;
        if matches!(self.mode, MockMode::Truncate) {
            results.pop();
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }

    fn preserves_order(&self) -> bool {
        self.ordered
    }
}
