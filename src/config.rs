use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 15;
/// Largest `limit` the listing endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub export_dir: PathBuf,
}

impl Config {
    /// Reads settings from the process environment. `backend_url` overrides
    /// `CHURNGUARD_BACKEND_URL` when given.
    pub fn from_env(backend_url: Option<String>) -> anyhow::Result<Self> {
        Self::from_lookup(backend_url, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(backend_url: Option<String>, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = backend_url
            .or_else(|| lookup("CHURNGUARD_BACKEND_URL"))
            .context("CHURNGUARD_BACKEND_URL must be set to the analytics backend")?;
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let timeout_secs = match lookup("CHURNGUARD_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid CHURNGUARD_TIMEOUT_SECS: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let page_size = match lookup("CHURNGUARD_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("invalid CHURNGUARD_PAGE_SIZE: {raw}"))?,
            None => DEFAULT_PAGE_SIZE,
        };
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            bail!("CHURNGUARD_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}, got {page_size}");
        }

        let export_dir = lookup("CHURNGUARD_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            backend_url,
            timeout: Duration::from_secs(timeout_secs),
            page_size,
            export_dir,
        })
    }

    pub fn api_base(&self) -> String {
        format!("{}/api", self.backend_url)
    }
}
