use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub media_root: String,
    pub database_url: String,
    pub max_upload_mb: usize,
}

/// One-shot maintenance modes selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    PromoteAdmin(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo gallery API")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where album files are stored (overrides GALLERY_MEDIA_ROOT)
    #[arg(long)]
    pub media_root: Option<String>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum request body size for uploads, in MiB (overrides GALLERY_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Grant admin rights to the user with this email and exit
    #[arg(long, value_name = "EMAIL", conflicts_with = "migrate")]
    pub promote_admin: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        let args = Args::parse();

        let env_host = env::var("GALLERY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("GALLERY_PORT", 8000u16)?;
        let env_media = env::var("GALLERY_MEDIA_ROOT").unwrap_or_else(|_| "./data/media".into());
        let env_db = env::var("GALLERY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/gallery.db".into());
        let env_upload = parse_env("GALLERY_MAX_UPLOAD_MB", 64usize)?;

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            media_root: args.media_root.unwrap_or(env_media),
            database_url: args.database_url.unwrap_or(env_db),
            max_upload_mb: args.max_upload_mb.unwrap_or(env_upload),
        };

        let mode = match (args.migrate, args.promote_admin) {
            (true, _) => RunMode::Migrate,
            (false, Some(email)) => RunMode::PromoteAdmin(email),
            (false, None) => RunMode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
