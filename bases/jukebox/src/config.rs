// bases/jukebox/src/config.rs
use clap::Parser;
use color_eyre::eyre::eyre;
use std::path::PathBuf;
use std::time::Duration;

/// Jukebox configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Root directory of the audio library
    pub download_dir: PathBuf,

    /// Directory holding the static web assets
    pub static_dir: PathBuf,

    /// Upper bound on concurrent downloads across all requests
    pub max_concurrent_downloads: usize,

    /// Per-track timeout, distinct from the tool's internal socket timeout
    pub job_timeout: Duration,

    /// Spotify API credentials
    pub credentials: SpotifyCredentials,
}

#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyCredentials {
    /// Read credentials from the environment. The process fails fast at
    /// startup when either variable is absent.
    pub fn from_env() -> color_eyre::Result<Self> {
        let client_id = std::env::var("SPOTIPY_CLIENT_ID")
            .map_err(|_| eyre!("SPOTIPY_CLIENT_ID is not set"))?;
        let client_secret = std::env::var("SPOTIPY_CLIENT_SECRET")
            .map_err(|_| eyre!("SPOTIPY_CLIENT_SECRET is not set"))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// Jukebox - personal download server for a streaming library
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Directory the audio library is stored in
    #[arg(long, default_value = "downloads")]
    pub download_dir: PathBuf,

    /// Directory with the static web assets
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Maximum number of downloads running at once, across all requests
    #[arg(long, default_value_t = 3)]
    pub max_concurrent_downloads: usize,

    /// Per-track download timeout in seconds
    #[arg(long, default_value_t = 600)]
    pub job_timeout_secs: u64,
}

impl Config {
    /// Create configuration from CLI arguments and environment credentials
    pub fn from_args(args: CliArgs) -> color_eyre::Result<Self> {
        let credentials = SpotifyCredentials::from_env()?;
        Ok(Self {
            port: args.port,
            download_dir: args.download_dir,
            static_dir: args.static_dir,
            max_concurrent_downloads: args.max_concurrent_downloads.max(1),
            job_timeout: Duration::from_secs(args.job_timeout_secs),
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> SpotifyCredentials {
        SpotifyCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    fn config_from(args: CliArgs) -> Config {
        Config {
            port: args.port,
            download_dir: args.download_dir,
            static_dir: args.static_dir,
            max_concurrent_downloads: args.max_concurrent_downloads.max(1),
            job_timeout: Duration::from_secs(args.job_timeout_secs),
            credentials: test_credentials(),
        }
    }

    #[test]
    fn defaults_are_sensible() {
        let args = CliArgs::parse_from(["jukebox"]);
        let config = config_from(args);
        assert_eq!(config.port, 8080);
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.job_timeout, Duration::from_secs(600));
    }

    #[test]
    fn concurrency_bound_is_clamped_to_at_least_one() {
        let args = CliArgs::parse_from(["jukebox", "--max-concurrent-downloads", "0"]);
        let config = config_from(args);
        assert_eq!(config.max_concurrent_downloads, 1);
    }

    #[test]
    fn custom_port_overrides_default() {
        let args = CliArgs::parse_from(["jukebox", "--port", "3000"]);
        let config = config_from(args);
        assert_eq!(config.port, 3000);
    }
}
