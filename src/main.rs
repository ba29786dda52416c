//! mmagent CLI entry point

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use multimodal_agent::agent::{AgentLoop, Context, GeminiClient};
use multimodal_agent::config::{self, Config};
use multimodal_agent::media::{mime_type_for, safe_upload_as, GeminiFiles, MediaKind, PollPolicy};
use multimodal_agent::query::{self, MediaRequest, DEFAULT_QUERY};
use multimodal_agent::{logging, ui, Error};

#[derive(Parser)]
#[command(name = "mmagent")]
#[command(about = "Ask Gemini about an image, a video and an audio clip, with web search")]
#[command(version)]
struct Cli {
    /// Gemini API key (overrides GOOGLE_API_KEY and the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the media and ask the multimodal question
    Ask {
        /// Image file
        #[arg(long)]
        image: Option<PathBuf>,

        /// Video file
        #[arg(long)]
        video: Option<PathBuf>,

        /// Audio file
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Question to ask instead of the default one
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,

        /// Read the question from a file
        #[arg(long)]
        query_file: Option<PathBuf>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Print the answer only once it is complete
        #[arg(long)]
        no_stream: bool,

        /// Do not give the model web search tools
        #[arg(long)]
        no_search: bool,

        /// Delete uploaded files after answering
        #[arg(long)]
        cleanup: bool,
    },

    /// Upload one file and wait until it is ready
    Upload {
        /// File to upload
        path: PathBuf,
    },

    /// Show effective configuration
    Status,

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let filter = logging::build_filter(std::env::var("RUST_LOG").ok().as_deref(), cli.verbose)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            let path = config::init()?;
            ui::print_success(&format!("Wrote default config to {:?}", path));
            ui::print_step(&format!("Set {} or add gemini_api_key to it", config::API_KEY_ENV));
        }

        Commands::Status => {
            let mut config = config::load()?;
            config.apply_env_key(cli.api_key);
            print_status(&config);
        }

        Commands::Upload { path } => {
            let config = load_config(cli.api_key)?;
            let files = GeminiFiles::new(&config.gemini_api_key);
            let label = MediaKind::for_path(&path).map_or("File", |kind| kind.label());
            let mime_type = mime_type_for(&path);
            let file = safe_upload_as(&files, &path, label, mime_type, &PollPolicy::from(&config.poll)).await?;

            ui::print_step(&format!("name: {}", file.name));
            ui::print_step(&format!("uri: {}", file.uri));
            ui::print_step(&format!("mime: {}", file.mime_type));
            if let Some(size) = file.size() {
                ui::print_step(&format!("size: {} bytes", size));
            }
            if let Some(expires) = file.expiration_time {
                ui::print_step(&format!("expires: {}", expires.to_rfc3339()));
            }
        }

        Commands::Ask {
            image,
            video,
            audio,
            query,
            query_file,
            model,
            no_stream,
            no_search,
            cleanup,
        } => {
            let mut config = load_config(cli.api_key)?;
            if let Some(model) = model {
                config.model = model;
            }
            if no_stream {
                config.stream = false;
            }
            if no_search {
                config.search.enabled = false;
            }

            let query = match (query, query_file) {
                (Some(q), _) => q,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading query from {:?}", path))?,
                (None, None) => DEFAULT_QUERY.to_string(),
            };

            let request = MediaRequest {
                image: image.unwrap_or_else(|| config.media.image.clone()),
                video: video.unwrap_or_else(|| config.media.video.clone()),
                audio: audio.unwrap_or_else(|| config.media.audio.clone()),
                inline_audio_limit: config.inline_audio_limit,
            };

            tokio::select! {
                result = run_ask(&config, &request, &query, cleanup) => result?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    return Err(Error::Interrupted.into());
                }
            }
        }
    }

    Ok(())
}

fn load_config(api_key: Option<String>) -> Result<Config> {
    let mut config = config::load()?;
    config.apply_env_key(api_key);
    config.validate()?;
    Ok(config)
}

async fn run_ask(config: &Config, request: &MediaRequest, question: &str, cleanup: bool) -> Result<()> {
    let files = GeminiFiles::new(&config.gemini_api_key);
    let policy = PollPolicy::from(&config.poll);

    let ctx = Context::new(config);
    ui::print_header(&config.model, &ctx.tool_runner.tool_names());

    let media = query::prepare_media(&files, request, &policy).await?;
    let message = query::build_user_message(question, &media);

    let client = GeminiClient::new(&config.gemini_api_key, &config.model);
    let agent = AgentLoop::new(client, config.max_iterations).with_stream(config.stream);

    println!();
    let mut stdout = std::io::stdout();
    let outcome = agent.run(message, &ctx, &mut stdout).await;

    if cleanup {
        let uploaded = media.remote_files().len();
        let deleted = query::cleanup(&files, &media).await;
        if deleted < uploaded {
            ui::print_warning(&format!("Deleted {} of {} uploaded file(s)", deleted, uploaded));
        } else {
            ui::print_step(&format!("Deleted {} uploaded file(s)", deleted));
        }
    }

    let response = outcome?;
    if !response.usage.is_empty() {
        tracing::info!(
            "Tokens: {} prompt, {} completion, {} total",
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.usage.total_tokens
        );
    }
    Ok(())
}

fn print_status(config: &Config) {
    println!("multimodal-agent status\n");
    println!("Config: {:?}", config::config_path());
    println!("Model: {}", config.model);
    println!("Gemini API: {}", config.masked_api_key());
    println!("Streaming: {}", if config.stream { "on" } else { "off" });
    println!(
        "Web search: {}",
        if config.search.enabled {
            format!("on ({} results)", config.search.max_results)
        } else {
            "off".to_string()
        }
    );
    println!(
        "Polling: {} retries every {}s",
        config.poll.max_retries, config.poll.interval_secs
    );
    println!("Image: {:?}", config.media.image);
    println!("Video: {:?}", config.media.video);
    println!("Audio: {:?}", config.media.audio);
}
