use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tokio::sync::mpsc;

use vadgate_session::{
    AmiVoice, Dispatch, EngineProvider, EventKind, GoogleSpeechToText, Recognizer, SessionEvent,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Amivoice,
    Google,
}

/// Stream microphone audio to a speech recognition proxy, gated by voice
/// activity, and print transcripts as they arrive.
#[derive(Parser, Debug)]
#[command(name = "vadgate", version)]
struct Cli {
    /// Recognition proxy endpoint (ws:// or wss://)
    #[arg(long, env = "VADGATE_ENDPOINT", default_value = "ws://127.0.0.1:8765/asr")]
    endpoint: String,

    /// Input device name; defaults to the host default input
    #[arg(long)]
    device: Option<String>,

    /// Language tag sent to the recognition engine
    #[arg(long, default_value = "en-US")]
    lang: String,

    /// Recognition engine behind the proxy
    #[arg(long, value_enum, default_value_t = Provider::Amivoice)]
    provider: Provider,

    /// Keep recognizing across utterances instead of stopping after the first
    #[arg(long)]
    continuous: bool,

    /// Print interim hypotheses as well as final ones
    #[arg(long)]
    interim: bool,

    /// Maximum hypotheses per result
    #[arg(long, default_value_t = 1)]
    max_alternatives: u32,

    /// VAD probability needed to open the gate (0..1)
    #[arg(long, default_value_t = vadgate_gate::ATTACK_THRESHOLD)]
    attack_threshold: f32,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let provider: Arc<dyn EngineProvider> = match cli.provider {
        Provider::Amivoice => Arc::new(AmiVoice),
        Provider::Google => Arc::new(GoogleSpeechToText::default()),
    };

    let mut recognizer = Recognizer::live(provider);
    recognizer.options.endpoint = cli.endpoint;
    recognizer.options.device_name = cli.device;
    recognizer.options.lang = cli.lang;
    recognizer.options.continuous = cli.continuous;
    recognizer.options.interim_results = cli.interim;
    recognizer.options.max_alternatives = cli.max_alternatives;
    recognizer.options.gate.attack_threshold = cli.attack_threshold;
    recognizer.options.gate.release_threshold = cli.attack_threshold;

    let bus = recognizer.bus();

    bus.subscribe(EventKind::SpeechStart, |_| {
        tracing::info!("Speech detected");
        Dispatch::Continue
    });
    bus.subscribe(EventKind::SpeechEnd, |_| {
        tracing::info!("Speech ended");
        Dispatch::Continue
    });
    bus.subscribe(EventKind::Result, |event| {
        if let SessionEvent::Result(batch) = event {
            for result in batch {
                for alt in &result.alternatives {
                    let marker = if result.is_final { "final" } else { "interim" };
                    println!("[{marker}] {} ({:.2})", alt.transcript, alt.confidence);
                }
            }
        }
        Dispatch::Continue
    });
    bus.subscribe(EventKind::Error, |event| {
        if let SessionEvent::Error(message) = event {
            tracing::error!("Session error: {}", message);
        }
        Dispatch::Continue
    });

    let (end_tx, mut end_rx) = mpsc::unbounded_channel();
    bus.subscribe(EventKind::End, move |_| {
        let _ = end_tx.send(());
        Dispatch::Continue
    });

    let session = recognizer.start()?;
    tracing::info!("Session started; speak into the microphone (Ctrl-C to stop)");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping");
            session.stop();
            let _ = end_rx.recv().await;
        }
        _ = end_rx.recv() => {}
    }

    Ok(())
}
