use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub sweep_interval_secs: u64,
    pub max_upload_bytes: usize,
    pub public_url: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Ephemeral file-sharing server")]
pub struct Args {
    /// Host to bind to (overrides FILESHARE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILESHARE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are stored (overrides FILESHARE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Seconds between expiration sweeps (overrides FILESHARE_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Maximum accepted upload size in bytes (overrides FILESHARE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Public base URL used in share links (overrides FILESHARE_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILESHARE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parsed::<u16>("FILESHARE_PORT")?.unwrap_or(3000);
        let env_storage = env::var("FILESHARE_STORAGE_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_sweep = env_parsed::<u64>("FILESHARE_SWEEP_INTERVAL_SECS")?.unwrap_or(3600);
        let env_max =
            env_parsed::<usize>("FILESHARE_MAX_UPLOAD_BYTES")?.unwrap_or(50 * 1024 * 1024);
        let env_public = env::var("FILESHARE_PUBLIC_URL").ok();

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            sweep_interval_secs: args.sweep_interval_secs.unwrap_or(env_sweep),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
            public_url: args.public_url.or(env_public),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an environment variable. Absent is `None`; present
/// but unparsable is an error.
fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", key, value))?;
            Ok(Some(parsed))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
