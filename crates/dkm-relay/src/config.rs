//! Environment configuration for the relay process.
//!
//! Keys (all optional):
//! - `PORT`             listen port, default 3000
//! - `DKM_BIND_HOST`    listen address, default 0.0.0.0
//! - `DKM_STATIC_DIR`   directory served for unmatched GETs (storefront pages)
//! - `DKM_CORS_ORIGINS` comma-separated origins allowed in addition to localhost
//!
//! Blank values count as unset. Anything present but unparseable fails
//! startup with the offending key in the error.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: Option<PathBuf>,
    pub extra_cors_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(DEFAULT_HOST, DEFAULT_PORT),
            static_dir: None,
            extra_cors_origins: Vec::new(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {v:?}"))?,
            None => DEFAULT_PORT,
        };

        let host = match get("DKM_BIND_HOST") {
            Some(v) => v
                .trim()
                .parse::<IpAddr>()
                .with_context(|| format!("DKM_BIND_HOST must be an IP address, got {v:?}"))?,
            None => DEFAULT_HOST,
        };

        let static_dir = match get("DKM_STATIC_DIR") {
            Some(v) => {
                let dir = PathBuf::from(v.trim());
                if !dir.is_dir() {
                    bail!("DKM_STATIC_DIR is not a directory: {}", dir.display());
                }
                Some(dir)
            }
            None => None,
        };

        let extra_cors_origins = get("DKM_CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            static_dir,
            extra_cors_origins,
        })
    }

    /// Localhost origins for the configured port, then any extras.
    pub fn cors_origins(&self) -> Vec<String> {
        let port = self.bind_addr.port();
        let mut origins = vec![
            "http://localhost".to_string(),
            "http://127.0.0.1".to_string(),
            format!("http://localhost:{port}"),
            format!("http://127.0.0.1:{port}"),
        ];
        origins.extend(self.extra_cors_origins.iter().cloned());
        origins
    }
}
