use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coldlink::capability::DirectorySink;
use coldlink::clock::{Clock, SystemClock};
use coldlink::render::Color;
use coldlink::session::{DownloadStep, RenderApplied};
use coldlink::store::FileStore;
use coldlink::{Config, ContentType, ExportFormat, FormState, Resolution};

/// `coldlink` - build QR payloads and export them as images.
#[derive(Parser, Debug)]
#[command(name = "coldlink")]
#[command(version)]
#[command(about = "Build QR payloads and export them as PNG, JPEG or SVG.", long_about = None)]
struct Cli {
    /// Config file (default: ~/.coldlink/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Quota store file, overrides `storage.path`
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the payload for a content type without generating anything
    Encode {
        /// url, text, wifi, contact, email, phone, sms, location, event or crypto
        content_type: ContentType,

        /// Field assignment, e.g. `--set ssid=Home`
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },

    /// Generate a QR code and save it, subject to the local quotas
    Generate {
        content_type: ContentType,

        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        fields: Vec<(String, String)>,

        /// png, svg or jpeg
        #[arg(long)]
        format: Option<ExportFormat>,

        /// 256, 512, 1024 or 2048
        #[arg(long)]
        resolution: Option<u32>,

        /// Dark module color, #RGB or #RRGGBB
        #[arg(long)]
        foreground: Option<Color>,

        /// Light module color
        #[arg(long)]
        background: Option<Color>,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Show the remaining generation quota
    Quota,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(path) = cli.store {
        config.storage.path = Some(path);
    }

    match cli.command {
        Commands::Encode {
            content_type,
            fields,
        } => {
            let mut forms = FormState::default();
            for (field, value) in &fields {
                forms.set_field(content_type, field, value)?;
            }
            println!("{}", forms.draft(content_type));
            Ok(())
        }
        Commands::Generate {
            content_type,
            fields,
            format,
            resolution,
            foreground,
            background,
            out,
        } => {
            if let Some(format) = format {
                config.render.format = format;
            }
            if let Some(resolution) = resolution {
                config.render.resolution = Resolution::try_from(resolution)?.pixels();
            }
            if let Some(color) = foreground {
                config.render.foreground = color;
            }
            if let Some(color) = background {
                config.render.background = color;
            }
            generate(&config, content_type, &fields, out).await
        }
        Commands::Quota => {
            let store = FileStore::open(config.store_path()?);
            let quota = config.quota_tracker(store);
            println!(
                "{} of {} generations left in the current {}-minute window",
                quota.generations_remaining(SystemClock.now()),
                config.quota.max_generations,
                config.quota.window_minutes
            );
            Ok(())
        }
    }
}

async fn generate(
    config: &Config,
    content_type: ContentType,
    fields: &[(String, String)],
    out: PathBuf,
) -> Result<()> {
    let mut session = config.session(
        &config.store_path()?,
        Box::new(DirectorySink::new(out)),
        Arc::new(SystemClock),
    )?;
    session.select(content_type);
    for (field, value) in fields {
        session.set_field(field, value)?;
    }

    let job = session.generate()?;
    if let RenderApplied::Failed(message) = session.apply_render(job.run().await)? {
        bail!(message);
    }

    let format = session.options().format;
    let path = match session.download(format)? {
        DownloadStep::Saved(path) => path,
        DownloadStep::AwaitingRender(job) => match session.apply_render(job.run().await)? {
            RenderApplied::Saved(path) => path,
            RenderApplied::Failed(message) => bail!(message),
            other => bail!("download did not complete: {other:?}"),
        },
    };

    info!(
        generations_left = session.generations_remaining(),
        downloads_left = session.downloads_remaining().unwrap_or(0),
        "done"
    );
    println!("{}", path.display());
    Ok(())
}
