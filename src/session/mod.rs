//! Session state machines
//!
//! The dialog and dictation sessions own the interaction flow; everything
//! they touch (audio devices, network clients, the host UI) comes in
//! through traits so the machines stay testable without hardware.

mod dialog;
mod dictation;
mod summary;
mod turn;

pub use dialog::{
    DialogConfig, DialogDeps, DialogOutcome, DialogSession, DialogState, TriggerPhrase,
};
pub use dictation::{DictationConfig, DictationOutcome, DictationSession};
pub use summary::SessionSummaryBuilder;
pub use turn::{Turn, format_transcript};
