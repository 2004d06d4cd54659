use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iris_gateway::attachments::ImageAnalyzer;
use iris_gateway::config::VoiceOutput;
use iris_gateway::voice::{
    AudioPlayback, ConsoleSession, ConversationHistory, SpeakerSession, VoiceSession,
};
use iris_gateway::{Config, Daemon};

/// Iris - speaks descriptions of uploaded images
#[derive(Parser)]
#[command(name = "iris", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "IRIS_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the assistant's lines instead of speaking them
    #[arg(long, env = "IRIS_CONSOLE")]
    console: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Persist an API key through the configured backend
    SetKey {
        /// The API key
        key: String,
    },
    /// Describe an image once and print the result
    Describe {
        /// Path to a png, jpg, jpeg or gif image
        image: PathBuf,
    },
    /// Test voice output
    Say {
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
        0 => "info,iris_gateway=info",
        1 => "info,iris_gateway=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.console)?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::SetKey { key } => set_key(&config, &key).await,
            Command::Describe { image } => describe(&config, &image).await,
            Command::Say { text } => say(&config, &text).await,
        };
    }

    tracing::info!(
        port = config.api_server.port,
        upload_dir = %config.api_server.upload_dir.display(),
        "starting iris gateway"
    );

    // Run until interrupted
    Daemon::new(config).run().await?;

    Ok(())
}

/// Store a key without starting the gateway
async fn set_key(config: &Config, key: &str) -> anyhow::Result<()> {
    let key = key.trim();
    anyhow::ensure!(!key.is_empty(), "API key is required");

    let resolver = config.credential_resolver()?;
    resolver.store_credential(key).await?;

    println!(
        "API key stored via {}",
        resolver.backend_name().unwrap_or("environment")
    );
    Ok(())
}

/// One-shot vision call
async fn describe(config: &Config, image: &Path) -> anyhow::Result<()> {
    let credentials = Arc::new(config.credential_resolver()?);
    let vision = Daemon::vision_client(config, credentials)?;

    let description = vision.describe(image).await?;
    println!("{description}");
    Ok(())
}

/// Speak a line through the configured voice output
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let history = ConversationHistory::with_system_prompt(&config.voice.system_prompt);

    match config.voice.output {
        VoiceOutput::Console => ConsoleSession::new(history).say(text, false).await?,
        VoiceOutput::Speaker => {
            let credentials = Arc::new(config.credential_resolver()?);
            let tts = Daemon::text_to_speech(config, credentials)?;
            let playback = AudioPlayback::new(&config.voice.player)?;
            SpeakerSession::new(history, tts, playback)
                .say(text, false)
                .await?;
        }
    }

    Ok(())
}
