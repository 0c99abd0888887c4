//! Completed conversation turns

use chrono::{DateTime, Utc};

/// One completed exchange: what the user said and what the assistant replied
///
/// A turn only exists once both recognition and response generation have
/// succeeded; failed attempts never produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Record a completed exchange, stamped now
    #[must_use]
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Render turns as a markdown transcript
#[must_use]
pub fn format_transcript(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(&format!(
            "**User** ({}):\n{}\n\n**Assistant**:\n{}\n\n",
            turn.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            turn.user_text,
            turn.assistant_text
        ));
    }
    out
}
