use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use explainer_video::api::GeminiClient;
use explainer_video::error::Result;
use explainer_video::playback::narrator::ProcessNarrator;
use explainer_video::playback::{PlaybackState, Sequencer};
use explainer_video::scene::materialize::Materializer;
use explainer_video::scene::Script;
use explainer_video::session::{Session, GREETING};
use explainer_video::video::engine::FfmpegEngineProvider;
use explainer_video::video::exporter::{ExportConfig, ExportPhase, Exporter};
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "explainer-video")]
#[command(about = "Chat assistant that turns topics into narrated slideshow videos", long_about = None)]
struct Args {
    /// Output video file path
    #[arg(short, long, default_value = "explanation_video.mp4")]
    output: String,

    /// Fixed display duration per scene, in seconds
    #[arg(long, default_value_t = 5)]
    scene_duration: u64,

    /// Local text-to-speech command used for narration
    #[arg(long, default_value = "espeak-ng")]
    tts_command: String,

    /// Encoding engine command
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_command: String,

    /// Skip narrated on-screen playback
    #[arg(long)]
    no_playback: bool,

    /// Skip video file export
    #[arg(long)]
    no_export: bool,

    /// Gemini API key
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let api_key = if let Some(key) = args.api_key.clone() {
        key
    } else if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        key
    } else {
        eprintln!("Error: GEMINI_API_KEY not found. Please set it via --api-key or the GEMINI_API_KEY environment variable");
        std::process::exit(1);
    };

    let client = GeminiClient::new(api_key);
    let mut session = Session::new(&client);

    println!("{}", GREETING);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        match session.send(message).await {
            Ok(reply) => {
                println!("{}", reply.text);
                if let Some(script) = reply.script {
                    if let Err(e) = run_video(&script, &client, &args).await {
                        error!("Video pipeline failed: {}", e);
                    }
                }
            }
            Err(e) => {
                eprintln!("Sorry, I encountered an error: {}", e);
            }
        }
    }

    Ok(())
}

async fn run_video(script: &Script, client: &GeminiClient, args: &Args) -> Result<()> {
    info!("Generating {} images...", script.len());
    let outcome = Materializer::new(client)
        .materialize(script, |current, total| {
            println!("Generating image for scene {}/{}...", current, total);
        })
        .await;
    for warning in &outcome.warnings {
        eprintln!("{}", warning);
    }

    if !args.no_playback {
        let narrator = Arc::new(ProcessNarrator::new(args.tts_command.clone()));
        let mut sequencer = Sequencer::new(outcome.scenes.clone(), narrator);
        let total = outcome.scenes.len();
        let terminal = sequencer
            .play(|index, effect, scene| {
                println!(
                    "Playing scene {}/{} [{:?}]: {}",
                    index + 1,
                    total,
                    effect,
                    scene.narration
                );
            })
            .await?;
        match terminal {
            PlaybackState::Failed(message) => eprintln!("{}", message),
            state => info!("Playback ended: {:?}", state),
        }
    }

    if !args.no_export {
        let provider = FfmpegEngineProvider::new(args.ffmpeg_command.clone());
        let config = ExportConfig {
            scene_duration_secs: args.scene_duration,
            ..ExportConfig::default()
        };
        let mut exporter = Exporter::with_config(&provider, config);
        let result = exporter
            .export(&outcome.scenes, Path::new(&args.output), |status| {
                if status.phase == ExportPhase::Encoding {
                    println!("{} ({}%)", status.phase.label(), status.progress);
                } else {
                    println!("{}", status.phase.label());
                }
            })
            .await;
        match result {
            Ok(()) => println!("Saved video to {}", args.output),
            Err(e) => {
                if let Some(message) = &exporter.status().error {
                    eprintln!("{}", message);
                }
                return Err(e);
            }
        }
    }

    Ok(())
}
