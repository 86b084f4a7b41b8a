use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::warn;

use crate::genome::MissingGenePolicy;

const ENV_LISTEN_ADDR: &str = "LISTEN_ADDR";
const ENV_STATIC_DIR: &str = "STATIC_DIR";
const ENV_MISSING_GENE_POLICY: &str = "BREED_MISSING_GENE_POLICY";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub missing_gene_policy: MissingGenePolicy,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            listen_addr: resolve_listen_addr(lookup(ENV_LISTEN_ADDR)),
            static_dir: resolve_static_dir(lookup(ENV_STATIC_DIR)),
            missing_gene_policy: resolve_missing_gene_policy(lookup(ENV_MISSING_GENE_POLICY)),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn resolve_listen_addr(raw: Option<String>) -> SocketAddr {
    let Some(raw_value) = raw.filter(|value| !value.trim().is_empty()) else {
        return default_listen_addr();
    };
    match raw_value.trim().parse::<SocketAddr>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(
                "{ENV_LISTEN_ADDR} must be a socket address like 127.0.0.1:8000; got '{raw_value}'. Using default {DEFAULT_LISTEN_ADDR}"
            );
            default_listen_addr()
        }
    }
}

fn resolve_static_dir(raw: Option<String>) -> PathBuf {
    match raw {
        Some(raw_value) if !raw_value.trim().is_empty() => PathBuf::from(raw_value.trim()),
        _ => PathBuf::from(DEFAULT_STATIC_DIR),
    }
}

fn resolve_missing_gene_policy(raw: Option<String>) -> MissingGenePolicy {
    let Some(raw_value) = raw else {
        return MissingGenePolicy::default();
    };
    MissingGenePolicy::parse(&raw_value).unwrap_or_else(|| {
        warn!(
            "{ENV_MISSING_GENE_POLICY} has invalid value '{raw_value}'; expected 'zero_fill' or 'strict'"
        );
        MissingGenePolicy::default()
    })
}
