//! Session state-machine integration tests
//!
//! Drives dialog, dictation, and wake sessions against scripted devices and
//! clients under a paused clock, so no hardware, network, or wall time is
//! involved.

mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{
    EchoResponder, MemoryStore, MockRecognizer, MockSynthesizer, ScriptedCapture,
    ScriptedMonitor, ScriptedOutput, ScriptedTap, SilentReporter, speech_segment,
};
use parley::{
    BufferEditor, DialogConfig, DialogDeps, DialogSession, DialogState, DictationConfig,
    DictationSession, PreSpeechTap, WakeConfig, WakeListener,
};

fn dialog_config() -> DialogConfig {
    DialogConfig {
        capture_duration: Duration::from_secs(1),
        ..DialogConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_turn_persisted_after_silence_window() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("what time is it".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.turns, 1);
    assert_eq!(session.state(), DialogState::Ended);

    let writes = store.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].0.starts_with("dialog-"));
    assert!(writes[0].0.ends_with(".md"));
    // Summary section present (responder succeeded) and transcript intact
    assert!(writes[0].1.contains("## Summary"));
    assert!(writes[0].1.contains("what time is it"));
    assert_eq!(
        outcome.persisted_to.unwrap(),
        std::path::PathBuf::from(&writes[0].0)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_recognition_records_no_turn() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Err("network down".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.turns, 0);
    assert!(outcome.persisted_to.is_none());
    assert!(store.writes.lock().unwrap().is_empty());
    // The responder was never consulted, not even for a summary
    assert!(responder.prompts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_transcript_records_no_turn() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("   ".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    // Whitespace-only recognition is treated like a failed turn
    assert_eq!(outcome.turns, 0);
    assert!(outcome.persisted_to.is_none());
    assert!(store.writes.lock().unwrap().is_empty());
    assert!(responder.prompts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_still_persists_and_releases() {
    // One good turn, then waiting-phase speech forces a second capture,
    // which fails like a lost device
    let mut capture =
        ScriptedCapture::failing_after(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![speech_segment(Duration::from_millis(200))]);
    let recognizer = MockRecognizer::new(vec![Ok("note this down".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let result = session.run(&CancellationToken::new()).await;

    // The error surfaces, but only after teardown and persistence
    assert!(result.is_err());
    assert_eq!(session.state(), DialogState::Ended);

    let writes = store.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].1.contains("note this down"));
    drop(writes);

    drop(session);
    assert!(!prebuffer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_failed_response_records_no_turn() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("hello".to_string())]);
    let responder = EchoResponder::failing();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.turns, 0);
    assert!(store.writes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_interruption_stops_playback_and_starts_new_turn() {
    let onset = speech_segment(Duration::from_millis(200));
    let mut capture = ScriptedCapture::new(vec![
        speech_segment(Duration::from_secs(1)),
        speech_segment(Duration::from_secs(1)),
    ]);
    // First utterance plays until stopped, second finishes on its own
    let mut output = ScriptedOutput::new(vec![u32::MAX, 3]);
    let mut monitor = ScriptedMonitor::new(Some(2));
    let mut prebuffer = ScriptedTap::new(vec![onset]);
    let recognizer = MockRecognizer::new(vec![
        Ok("tell me a story".to_string()),
        Ok("actually make it short".to_string()),
    ]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let mut session = DialogSession::new(
        dialog_config(),
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let outcome = session.run(&CancellationToken::new()).await.unwrap();

    // The barge-in became a second completed turn without a waiting phase
    assert_eq!(outcome.turns, 2);
    assert_eq!(capture.calls, 2);
    assert_eq!(output.begun.len(), 2);
    assert_eq!(output.stops_while_active, 1);
    assert_eq!(recognizer.call_count(), 2);

    let writes = store.writes.lock().unwrap();
    assert!(writes[0].1.contains("tell me a story"));
    assert!(writes[0].1.contains("actually make it short"));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_phrase_rewrites_prompt() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("please Translate This for me".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        trigger_phrases: vec![parley::TriggerPhrase {
            phrase: "translate this".to_string(),
            instruction: "Translate the following to French.".to_string(),
        }],
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    session.run(&CancellationToken::new()).await.unwrap();

    let prompts = responder.prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Translate the following to French."));
    assert!(prompts[0].contains("please Translate This for me"));
}

#[tokio::test(start_paused = true)]
async fn test_manual_cancel_still_persists_turns() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("remember the milk".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    // Cancel mid-waiting-phase, well before the 20s silence window expires
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let outcome = session.run(&cancel).await.unwrap();

    assert_eq!(outcome.turns, 1);
    assert_eq!(session.state(), DialogState::Ended);
    assert_eq!(store.writes.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wake_triggered_session_uses_given_identity() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("hi".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    )
    .wake_triggered("abc-123".to_string(), "dialog-test.md".to_string());

    assert_eq!(session.session_id(), Some("abc-123"));
    session.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(store.writes.lock().unwrap()[0].0, "dialog-test.md");
    // Identity is cleared once the session ends
    assert_eq!(session.session_id(), None);
}

#[tokio::test(start_paused = true)]
async fn test_single_turn_inserts_into_editor() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(1))]);
    let mut output = ScriptedOutput::new(vec![]);
    let mut monitor = ScriptedMonitor::new(None);
    let mut prebuffer = ScriptedTap::new(vec![]);
    let recognizer = MockRecognizer::new(vec![Ok("what is rust".to_string())]);
    let responder = EchoResponder::new();
    let synthesizer = MockSynthesizer::new();
    let store = MemoryStore::new();

    let config = DialogConfig {
        synthesis_enabled: false,
        ..dialog_config()
    };
    let mut session = DialogSession::new(
        config,
        DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &SilentReporter,
            persistence: &store,
        },
    );

    let mut editor = BufferEditor::new();
    let turn = session
        .run_single_turn(&mut editor, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(turn.user_text, "what is rust");
    assert!(editor.text().contains("**Q:** what is rust"));
    assert!(editor.text().contains("**A:** re:"));
    assert_eq!(session.state(), DialogState::Idle);
    // Single turns never hit persistence
    assert!(store.writes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dictation_flushes_after_pause_and_times_out() {
    let mut capture = ScriptedCapture::new(vec![
        speech_segment(Duration::from_millis(500)),
        speech_segment(Duration::from_millis(500)),
    ]);
    let recognizer = MockRecognizer::new(vec![Ok("hello world".to_string())]);
    let mut editor = BufferEditor::new();

    let mut session = DictationSession::new(
        DictationConfig::default(),
        &mut capture,
        &recognizer,
        &SilentReporter,
    );
    let outcome = session
        .run(&mut editor, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(editor.text(), "hello world ");
    assert_eq!(outcome.text, "hello world ");
    assert!(outcome.ended_by_timeout);
    // Both speech segments went through recognition as one flush
    assert_eq!(recognizer.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dictation_manual_stop_discards_unflushed() {
    let mut capture = ScriptedCapture::new(vec![
        speech_segment(Duration::from_millis(500)),
        speech_segment(Duration::from_millis(500)),
    ]);
    let recognizer = MockRecognizer::new(vec![Ok("should never appear".to_string())]);
    let mut editor = BufferEditor::new();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // Stop while speech is accumulated but before any flush
        tokio::time::sleep(Duration::from_millis(1200)).await;
        trigger.cancel();
    });

    let mut session = DictationSession::new(
        DictationConfig::default(),
        &mut capture,
        &recognizer,
        &SilentReporter,
    );
    let outcome = session.run(&mut editor, &cancel).await.unwrap();

    assert!(editor.text().is_empty());
    assert!(outcome.text.is_empty());
    assert!(!outcome.ended_by_timeout);
    assert_eq!(recognizer.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dictation_failed_flush_drops_audio() {
    let mut capture = ScriptedCapture::new(vec![
        speech_segment(Duration::from_millis(500)),
        speech_segment(Duration::from_millis(500)),
    ]);
    let recognizer = MockRecognizer::new(vec![Err("transient".to_string())]);
    let mut editor = BufferEditor::new();

    let mut session = DictationSession::new(
        DictationConfig::default(),
        &mut capture,
        &recognizer,
        &SilentReporter,
    );
    session
        .run(&mut editor, &CancellationToken::new())
        .await
        .unwrap();

    // The failed flush's audio never replays; nothing from it was inserted
    assert_eq!(recognizer.call_count(), 1);
    assert!(editor.text().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wake_listener_matches_and_acknowledges() {
    let mut capture = ScriptedCapture::new(vec![speech_segment(Duration::from_secs(2))]);
    let mut output = ScriptedOutput::new(vec![2]);
    let recognizer = MockRecognizer::new(vec![Ok("okay hey assistant what's up".to_string())]);
    let synthesizer = MockSynthesizer::new();

    let mut listener = WakeListener::new(
        WakeConfig::default(),
        &mut capture,
        &recognizer,
        &synthesizer,
        &mut output,
        &SilentReporter,
    );
    let trigger = listener
        .listen(&CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(trigger.phrase, "hey assistant");
    assert!(trigger.file_name.starts_with("dialog-"));
    assert!(trigger.file_name.ends_with(".md"));
    assert_eq!(trigger.session_id.len(), 36);
    // The acknowledgment was played
    assert_eq!(output.begun.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wake_listener_skips_non_matching_speech() {
    let mut capture = ScriptedCapture::new(vec![
        speech_segment(Duration::from_secs(2)),
        speech_segment(Duration::from_secs(2)),
    ]);
    let mut output = ScriptedOutput::new(vec![1]);
    let recognizer = MockRecognizer::new(vec![
        Ok("just talking to myself".to_string()),
        Ok("hey assistant".to_string()),
    ]);
    let synthesizer = MockSynthesizer::new();

    let mut listener = WakeListener::new(
        WakeConfig::default(),
        &mut capture,
        &recognizer,
        &synthesizer,
        &mut output,
        &SilentReporter,
    );
    let trigger = listener.listen(&CancellationToken::new()).await.unwrap();

    assert!(trigger.is_some());
    assert_eq!(recognizer.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_wake_listener_cancelled_returns_none() {
    let mut capture = ScriptedCapture::new(vec![]);
    let mut output = ScriptedOutput::new(vec![]);
    let recognizer = MockRecognizer::new(vec![]);
    let synthesizer = MockSynthesizer::new();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut listener = WakeListener::new(
        WakeConfig::default(),
        &mut capture,
        &recognizer,
        &synthesizer,
        &mut output,
        &SilentReporter,
    );
    assert!(listener.listen(&cancel).await.unwrap().is_none());
}
