use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use s3_thumbnailer::api::{ApiResponse, DownloadUrlRequest, UploadUrlRequest, UrlIssuer};
use s3_thumbnailer::config::Config;
use s3_thumbnailer::event::NotificationBatch;
use s3_thumbnailer::pipeline::Pipeline;
use s3_thumbnailer::storage::S3Store;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a storage change-notification batch
    Process {
        /// Path to the batch JSON document; reads stdin when omitted
        #[arg(short, long)]
        event: Option<PathBuf>,
    },
    /// Issue a presigned upload URL for an original image
    UploadUrl {
        #[arg(long)]
        filename: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Issue a presigned download URL for a derived thumbnail
    DownloadUrl {
        #[arg(long)]
        filename: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    // Initialize tracing with EnvFilter; override with RUST_LOG.
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match Config::load_from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            info!(
                "Failed to load config from {:?}: {}. Using defaults.",
                args.config, e
            );
            Config::default()
        }
    };
    config.apply_env_overrides();
    // Fail a malformed thumbnail size here, not per record.
    config.thumbnail_box()?;

    let store = Arc::new(S3Store::new(&config.s3)?);

    match args.command {
        Command::Process { event } => {
            let raw = read_event_document(event.as_deref())?;
            let batch: NotificationBatch = match serde_json::from_str(&raw) {
                Ok(batch) => batch,
                Err(e) => {
                    // Malformed batch structure aborts the whole invocation.
                    error!("Invocation error: {}", e);
                    let outcome = json!({
                        "error": "Internal server error",
                        "message": e.to_string(),
                    });
                    println!("{}", outcome);
                    std::process::exit(1);
                }
            };

            let pipeline = Pipeline::new(store, &config)?;
            let report = pipeline.process_batch(batch).await;
            println!("{}", serde_json::to_string(&report.outcome())?);
        }
        Command::UploadUrl { filename, content_type } => {
            let issuer = issuer(store, &config);
            let response = issuer
                .upload_url(UploadUrlRequest { filename, content_type })
                .await;
            finish_with(response);
        }
        Command::DownloadUrl { filename } => {
            let issuer = issuer(store, &config);
            let response = issuer.download_url(DownloadUrlRequest { filename }).await;
            finish_with(response);
        }
    }

    Ok(())
}

fn issuer(store: Arc<S3Store>, config: &Config) -> UrlIssuer<S3Store> {
    UrlIssuer::new(
        store,
        config.s3.source_bucket.clone(),
        config.s3.dest_bucket.clone(),
        config.pipeline.url_expiry_secs,
    )
}

fn read_event_document(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event document {:?}", path)),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read event document from stdin")?;
            Ok(raw)
        }
    }
}

fn finish_with(response: ApiResponse) -> ! {
    println!("{}", response.body);
    std::process::exit(if response.status < 400 { 0 } else { 1 });
}
