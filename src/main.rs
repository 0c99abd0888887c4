use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use parley::{
    AudioCapture, AudioPlayback, BackgroundInterruptMonitor, BufferEditor, ChatClient, Config,
    DeviceOutput, DialogDeps, DialogSession, DictationSession, FileStore, LogReporter, MicSource,
    PreRecordingBuffer, SpeechOutput, SpeechToText, TextToSpeech, WakeListener,
};

/// Parley - voice interaction session engine
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for the wake phrase and run dialog sessions (default)
    Run,
    /// Start a dialog session immediately, skipping wake detection
    Dialog,
    /// Start a dictation session, printing recognized text on exit
    Dictate,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Dialog) => run_dialog().await,
        Some(Command::Dictate) => run_dictate().await,
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::TestSpeaker) => test_speaker().await,
        Some(Command::TestTts { text }) => test_tts(&text).await,
        Some(Command::Run) | None => run_wake_loop().await,
    }
}

/// Cancellation token triggered by ctrl-c
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            trigger.cancel();
        }
    });
    cancel
}

/// Wake listening interleaved with wake-triggered dialog sessions
#[allow(clippy::future_not_send)]
async fn run_wake_loop() -> anyhow::Result<()> {
    let config = Config::load();
    let cancel = shutdown_token();

    let recognizer = build_recognizer(&config)?;
    let responder = build_responder(&config)?;
    let synthesizer = build_synthesizer(&config)?;
    let store = FileStore::new(&config.notes_dir)?;
    let reporter = LogReporter;

    let mut capture = MicSource::new()?;
    let mut output = DeviceOutput::new()?;
    let mut monitor = BackgroundInterruptMonitor::new(config.interrupt_config())?;
    let mut prebuffer = PreRecordingBuffer::new(config.detection.prebuffer_capacity)?;

    tracing::info!(
        phrases = ?config.wake.phrases,
        "parley ready, listening for wake phrase"
    );

    while !cancel.is_cancelled() {
        let trigger = {
            let mut listener = WakeListener::new(
                config.wake_config(),
                &mut capture,
                &recognizer,
                &synthesizer,
                &mut output,
                &reporter,
            );
            listener.listen(&cancel).await?
        };
        let Some(trigger) = trigger else { break };

        if !config.wake.auto_dialog {
            tracing::info!(
                phrase = %trigger.phrase,
                transcript = %trigger.transcript,
                "wake phrase detected, auto dialog disabled"
            );
            continue;
        }

        let deps = DialogDeps {
            capture: &mut capture,
            output: &mut output,
            monitor: &mut monitor,
            prebuffer: &mut prebuffer,
            recognizer: &recognizer,
            responder: &responder,
            synthesizer: &synthesizer,
            reporter: &reporter,
            persistence: &store,
        };
        let mut session = DialogSession::new(config.dialog_config(), deps)
            .wake_triggered(trigger.session_id, trigger.file_name);
        let outcome = session.run(&cancel).await?;
        tracing::info!(turns = outcome.turns, "wake-triggered dialog finished");
    }

    Ok(())
}

/// One dialog session, started manually
#[allow(clippy::future_not_send)]
async fn run_dialog() -> anyhow::Result<()> {
    let config = Config::load();
    let cancel = shutdown_token();

    let recognizer = build_recognizer(&config)?;
    let responder = build_responder(&config)?;
    let synthesizer = build_synthesizer(&config)?;
    let store = FileStore::new(&config.notes_dir)?;
    let reporter = LogReporter;

    let mut capture = MicSource::new()?;
    let mut output = DeviceOutput::new()?;
    let mut monitor = BackgroundInterruptMonitor::new(config.interrupt_config())?;
    let mut prebuffer = PreRecordingBuffer::new(config.detection.prebuffer_capacity)?;

    let deps = DialogDeps {
        capture: &mut capture,
        output: &mut output,
        monitor: &mut monitor,
        prebuffer: &mut prebuffer,
        recognizer: &recognizer,
        responder: &responder,
        synthesizer: &synthesizer,
        reporter: &reporter,
        persistence: &store,
    };
    let mut session = DialogSession::new(config.dialog_config(), deps);
    let outcome = session.run(&cancel).await?;

    match outcome.persisted_to {
        Some(path) => println!("Session saved to {}", path.display()),
        None => println!("Session ended with no completed turns"),
    }
    Ok(())
}

/// One dictation session, text printed on exit
#[allow(clippy::future_not_send)]
async fn run_dictate() -> anyhow::Result<()> {
    let config = Config::load();
    let cancel = shutdown_token();

    let recognizer = build_recognizer(&config)?;
    let reporter = LogReporter;
    let mut capture = MicSource::new()?;
    let mut editor = BufferEditor::new();

    let mut session =
        DictationSession::new(config.dictation_config(), &mut capture, &recognizer, &reporter);
    let outcome = session.run(&mut editor, &cancel).await?;

    if editor.text().is_empty() {
        println!("No text recognized");
    } else {
        println!("{}", editor.text());
        if outcome.ended_by_timeout {
            tracing::debug!("dictation ended by silence timeout");
        }
    }
    Ok(())
}

/// STT client from config (whisper or deepgram)
fn build_recognizer(config: &Config) -> anyhow::Result<SpeechToText> {
    let stt = match config.voice.stt_provider.as_str() {
        "deepgram" => SpeechToText::new_deepgram(
            config.api_keys.deepgram.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
        )?,
        _ => SpeechToText::new_whisper(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
        )?,
    };
    Ok(stt)
}

/// Chat client from config
fn build_responder(config: &Config) -> anyhow::Result<ChatClient> {
    let mut client = ChatClient::new(
        config.llm.base_url.clone(),
        config.api_keys.openai.clone().unwrap_or_default(),
        config.llm.model.clone(),
    )?;
    if let Some(prompt) = &config.llm.system_prompt {
        client = client.with_system_prompt(prompt.clone());
    }
    Ok(client)
}

/// TTS client from config (openai or elevenlabs)
fn build_synthesizer(config: &Config) -> anyhow::Result<TextToSpeech> {
    let tts = match config.voice.tts_provider.as_str() {
        "elevenlabs" => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
        )?,
        _ => TextToSpeech::new_openai(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?,
    };
    Ok(tts)
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz sine at 24kHz, 30% volume
    let sample_rate = 24000_f32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples...", samples.len());

    let handle = playback.start(samples)?;
    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS synthesis and playback
async fn test_tts(text: &str) -> anyhow::Result<()> {
    use parley::SynthesisClient;

    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load();
    let synthesizer = build_synthesizer(&config)?;

    println!("Synthesizing speech...");
    let mp3_data = synthesizer.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let mut output = DeviceOutput::new()?;
    output.begin(&mp3_data)?;
    while output.is_active() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
