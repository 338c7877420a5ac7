//! Configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where segments are uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Dropbox, with the access token supplied per request.
    Dropbox,
    /// A local directory; the request token is still required but unused.
    Local,
}

impl FromStr for Backend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dropbox" => Ok(Backend::Dropbox),
            "local" => Ok(Backend::Local),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Parent of the per-job scratch directories
    pub scratch_dir: PathBuf,
    /// Hard ceiling on segments per job
    pub max_segments: usize,
    pub upload_pause: Duration,
    pub fetch_timeout: Duration,
    pub list_timeout: Duration,
    pub upload_timeout: Duration,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub backend: Backend,
    /// Root directory of the local backend
    pub local_store_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServiceConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from `lookup`. Missing or unparsable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            addr: text("ADDR", "0.0.0.0"),
            port: text("PORT", "5000"),
            scratch_dir: lookup("SCRATCH_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            max_segments: parsed("MAX_SEGMENTS")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(1000),
            upload_pause: Duration::from_millis(parsed("UPLOAD_PAUSE_MS").unwrap_or(100)),
            fetch_timeout: Duration::from_secs(parsed("FETCH_TIMEOUT_SECS").unwrap_or(900)),
            list_timeout: Duration::from_secs(parsed("LIST_TIMEOUT_SECS").unwrap_or(30)),
            upload_timeout: Duration::from_secs(parsed("UPLOAD_TIMEOUT_SECS").unwrap_or(120)),
            ffmpeg_bin: text("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: text("FFPROBE_BIN", "ffprobe"),
            backend: lookup("DESTINATION_BACKEND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(Backend::Dropbox),
            local_store_dir: PathBuf::from(text("LOCAL_STORE_DIR", "./store")),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}
