use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image_handler::app::App;
use image_handler::models::{SizeMap, UploadRequest, VariantSpec};
use image_handler::paths::ImageLocation;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-handler")]
#[command(about = "Store images with resized variants, or delete them again")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store an image and print the resulting record as JSON.
    Upload {
        /// Image file to upload.
        file: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        /// Generate resized variants.
        #[arg(long)]
        thumbnails: bool,
        /// Comma separated widths overriding the configured ones.
        #[arg(long, value_parser = parse_widths)]
        widths: Option<VariantSpec>,
    },
    /// Delete images together with their variants.
    Delete {
        /// Generated image names.
        #[arg(required = true)]
        names: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
        /// Size map recorded at upload, e.g. '{"800":600,"400":300}'.
        #[arg(long, value_parser = parse_sizes)]
        sizes: Option<SizeMap>,
    },
}

#[derive(Debug, clap::Args)]
struct TargetArgs {
    /// Owning store or tenant id.
    #[arg(long)]
    scope: String,
    /// Content tag, e.g. "product".
    #[arg(long)]
    content: String,
    /// Storage disk; defaults to DEFAULT_DISK.
    #[arg(long)]
    disk: Option<String>,
}

impl TargetArgs {
    fn location(self, default_disk: &str) -> ImageLocation {
        let disk = self.disk.unwrap_or_else(|| default_disk.to_string());
        ImageLocation::new(self.scope, self.content, disk)
    }
}

fn parse_widths(input: &str) -> std::result::Result<VariantSpec, String> {
    VariantSpec::parse(input).map_err(|e| e.to_string())
}

fn parse_sizes(input: &str) -> std::result::Result<SizeMap, String> {
    serde_json::from_str(input).map_err(|e| format!("Invalid size map '{}': {}", input, e))
}

async fn run(app: &App, command: Command, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Upload {
            file,
            target,
            thumbnails,
            widths,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let mut request =
                UploadRequest::new(data, target.location(app.default_disk())).with_thumbnails(thumbnails);
            if let Some(widths) = widths {
                request = request.with_widths(widths);
            }

            let stored = app.upload_with_cancel(request, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Delete {
            names,
            target,
            sizes,
        } => {
            if sizes.is_none() {
                warn!("No --sizes given, deleting the currently configured widths");
            }
            let location = target.location(app.default_disk());
            app.delete_many(&names, &location, sizes.as_ref(), cancel)
                .await?;
            info!("Deleted {} image(s)", names.len());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_handler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing in-flight operations");
                cancel.cancel();
            }
        }
    });

    match App::new().await {
        Ok(app) => match run(&app, args.command, &cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Command failed: {:#}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
