use anyhow::{Context, Result};
use probe::ProbeConfig;
use scanner::ScanConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "monitor.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScanSection {
    pub pool_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ProbeSection {
    pub resolve_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub port_check_timeout_ms: Option<u64>,
    pub tls_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub pool_max_idle_per_host: Option<usize>,
    pub retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WatchSection {
    pub interval_secs: Option<u64>,
    pub users: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub database: Option<PathBuf>,
    pub scan: Option<ScanSection>,
    pub probe: Option<ProbeSection>,
    pub watch: Option<WatchSection>,
}

/// Load an explicit config file, or `./monitor.yaml` when present.
/// A missing default file is not an error; a broken one is.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(cfg))
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

impl ScanSection {
    pub fn apply(&self, cfg: &mut ScanConfig) {
        if let Some(v) = self.pool_size { cfg.pool_size = v; }
        if let Some(v) = self.batch_size { cfg.batch_size = v; }
        if let Some(v) = self.flush_interval_ms { cfg.flush_interval = ms(v); }
    }
}

impl ProbeSection {
    pub fn apply(&self, cfg: &mut ProbeConfig) {
        if let Some(v) = self.resolve_timeout_ms { cfg.resolve_timeout = ms(v); }
        if let Some(v) = self.connect_timeout_ms { cfg.connect_timeout = ms(v); }
        if let Some(v) = self.read_timeout_ms { cfg.read_timeout = ms(v); }
        if let Some(v) = self.port_check_timeout_ms { cfg.port_check_timeout = ms(v); }
        if let Some(v) = self.tls_timeout_ms { cfg.tls_timeout = ms(v); }
        if let Some(v) = &self.user_agent { cfg.user_agent = v.clone(); }
        if let Some(v) = self.pool_max_idle_per_host { cfg.pool_max_idle_per_host = v; }
        if let Some(v) = self.retries { cfg.retries = v; }
    }
}

impl Config {
    pub fn scan_config(&self) -> ScanConfig {
        let mut cfg = ScanConfig::default();
        if let Some(s) = &self.scan { s.apply(&mut cfg); }
        cfg
    }

    pub fn probe_config(&self) -> ProbeConfig {
        let mut cfg = ProbeConfig::default();
        if let Some(p) = &self.probe { p.apply(&mut cfg); }
        cfg
    }
}
