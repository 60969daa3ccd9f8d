//! `nexus` command-line tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nexus_models::{Privacy, RunId};
use nexus_pipeline::{load_script, Pipeline, PipelineConfig, RenderRequest};
use nexus_publish::{UploadConfig, UploadTransport, YouTubeClient, YouTubeConfig};

#[derive(Parser)]
#[command(name = "nexus", version, about = "Render and publish narrated videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the video and thumbnail, then upload them
    Run {
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        audio: PathBuf,
        #[arg(long)]
        footage: PathBuf,
        /// Overrides NEXUS_UPLOAD_PRIVACY
        #[arg(long)]
        privacy: Option<Privacy>,
        #[arg(long)]
        skip_upload: bool,
    },
    /// Render the video and thumbnail only
    Render {
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        audio: PathBuf,
        #[arg(long)]
        footage: PathBuf,
    },
    /// Composite the title thumbnail
    Thumbnail {
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload an already rendered video
    Upload {
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        video: PathBuf,
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        #[arg(long)]
        privacy: Option<Privacy>,
    },
    /// Verify tools, directories and credentials
    Check,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexus=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn build_transport(privacy: Option<Privacy>) -> anyhow::Result<UploadTransport> {
    let mut upload = UploadConfig::from_env()?;
    if let Some(privacy) = privacy {
        upload = upload.with_privacy(privacy);
    }
    let client = YouTubeClient::new(YouTubeConfig::from_env()?)?;
    Ok(UploadTransport::new(
        Arc::new(client),
        Arc::new(nexus_publish::TokioSleeper),
        upload,
    ))
}

async fn execute(command: Command, config: PipelineConfig) -> anyhow::Result<()> {
    match command {
        Command::Run {
            script,
            audio,
            footage,
            privacy,
            skip_upload,
        } => {
            let request = RenderRequest::load(&script, &audio, &footage)?;
            let transport = if skip_upload {
                None
            } else {
                Some(build_transport(privacy)?)
            };

            let report = Pipeline::from_config(config)
                .run(&request, transport.as_ref())
                .await?;

            println!("video:     {}", report.render.video.path.display());
            println!("thumbnail: {}", report.render.thumbnail.path.display());
            if let Some(upload) = report.upload {
                println!("video id:  {}", upload.video_id);
                println!("url:       {}", upload.watch_url);
            }
        }
        Command::Render {
            script,
            audio,
            footage,
        } => {
            let request = RenderRequest::load(&script, &audio, &footage)?;
            let output = Pipeline::from_config(config).render(&request).await?;
            println!("video:     {}", output.video.path.display());
            println!("thumbnail: {}", output.thumbnail.path.display());
        }
        Command::Thumbnail { script, output } => {
            let parsed = load_script(&script)?;
            let output = output.unwrap_or_else(|| config.output_dir.join("thumbnail.jpg"));
            let thumbnail = Pipeline::from_config(config).thumbnail(&parsed, &output)?;
            println!("thumbnail: {}", thumbnail.path.display());
        }
        Command::Upload {
            script,
            video,
            thumbnail,
            privacy,
        } => {
            let parsed = load_script(&script)?;
            let transport = build_transport(privacy)?;
            let outcome = Pipeline::from_config(config)
                .publish(&RunId::new(), &transport, &parsed, &video, thumbnail.as_deref())
                .await?;
            println!("video id:  {}", outcome.video_id);
            println!("url:       {}", outcome.watch_url);
        }
        Command::Check => self_check(&config).await?,
    }
    Ok(())
}

async fn self_check(config: &PipelineConfig) -> anyhow::Result<()> {
    let ffmpeg = nexus_media::check_ffmpeg().context("ffmpeg not available")?;
    println!("ffmpeg:      {}", ffmpeg.display());
    let ffprobe = nexus_media::check_ffprobe().context("ffprobe not available")?;
    println!("ffprobe:     {}", ffprobe.display());

    ensure_writable(&config.work_dir).await?;
    println!("work dir:    {}", config.work_dir.display());

    let youtube = YouTubeConfig::from_env()?;
    if !youtube.credentials_path.is_file() {
        bail!(
            "YouTube credentials not found at {}",
            youtube.credentials_path.display()
        );
    }
    println!("credentials: {}", youtube.credentials_path.display());

    println!("nexus check: ok");
    Ok(())
}

async fn ensure_writable(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let probe = dir.join(format!(".nexus-check-{}", std::process::id()));
    tokio::fs::write(&probe, b"ok")
        .await
        .with_context(|| format!("{} is not writable", dir.display()))?;
    tokio::fs::remove_file(&probe).await.ok();
    Ok(())
}

fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    // Render and upload failures are already logged with their run id.
    if let Err(e) = runtime.block_on(execute(cli.command, config)) {
        eprintln!("nexus: {:#}", e);
        std::process::exit(1);
    }
}
