//! A conversation thread: history plus the analyzer that reads it.

use tracing::debug;

use crate::analysis::{AnalysisResult, DeceptionAnalyzer};
use crate::conversation::ConversationHistory;
use crate::error::Result;

/// One conversation with the analyzer.
///
/// `send` takes `&mut self`, so a thread has at most one analysis in flight
/// and turns are appended in the order exchanges complete.
pub struct Conversation<'a> {
    analyzer: &'a DeceptionAnalyzer,
    history: ConversationHistory,
}

impl<'a> Conversation<'a> {
    pub fn new(analyzer: &'a DeceptionAnalyzer) -> Self {
        Self::with_history(analyzer, ConversationHistory::new())
    }

    /// Resume from an existing history.
    pub fn with_history(analyzer: &'a DeceptionAnalyzer, history: ConversationHistory) -> Self {
        Self { analyzer, history }
    }

    /// Analyze `text` against the history so far.
    ///
    /// On success the user text and the result summary are appended. On
    /// failure the history is left untouched.
    pub async fn send(&mut self, text: &str) -> Result<AnalysisResult> {
        let result = self.analyzer.analyze(text, Some(&self.history)).await?;
        self.history.record_exchange(text, result.summary());
        debug!(turns = self.history.len(), "Exchange recorded");
        Ok(result)
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Give up the analyzer borrow and keep the history.
    pub fn into_history(self) -> ConversationHistory {
        self.history
    }
}
