//! Session wrap-up content
//!
//! When a dialog session ends with at least one turn, the transcript is
//! persisted. A summary is requested from the response client first; if that
//! fails the transcript is still written, never discarded.

use crate::clients::ResponseClient;
use crate::session::turn::{Turn, format_transcript};

const SUMMARY_PROMPT: &str = "Summarize the following conversation in a few \
sentences. Capture decisions, open questions, and anything the user asked \
to remember. Reply with the summary only.";

/// Builds the markdown document persisted for a finished session
pub struct SessionSummaryBuilder {
    prompt: String,
}

impl Default for SessionSummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSummaryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prompt: SUMMARY_PROMPT.to_string(),
        }
    }

    /// Override the summarization prompt
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Produce the session document for `turns`
    ///
    /// Summarization failure degrades to a transcript-only document; the
    /// caller still persists whatever comes back.
    pub async fn finalize(&self, turns: &[Turn], responder: &dyn ResponseClient) -> String {
        let transcript = format_transcript(turns);

        let summary = match responder
            .generate(&format!("{}\n\n{transcript}", self.prompt))
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "session summary failed, persisting transcript only");
                None
            }
        };

        match summary {
            Some(summary) => format!("## Summary\n\n{summary}\n\n## Transcript\n\n{transcript}"),
            None => format!("## Transcript\n\n{transcript}"),
        }
    }
}
