use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::GdcEmError;

pub const DEFAULT_CONFIG_FILE: &str = "gdc-em.json";
pub const DEFAULT_OUTPUT_ROOT: &str = "tcga_csvs";
pub const DEFAULT_WORKERS: usize = 25;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub sites: Option<Vec<String>>,
    #[serde(default)]
    pub output_root: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub site_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub sites: Vec<String>,
    pub output_root: Utf8PathBuf,
    pub workers: usize,
    pub site_timeout: Option<Duration>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    // Without an explicit path, a missing gdc-em.json falls back to the
    // built-in defaults; an explicit --config path must exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GdcEmError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(GdcEmError::MissingConfig(config_path));
            }
            return Ok(Self::resolve_config(Config::default()));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GdcEmError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GdcEmError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        ResolvedConfig {
            sites: config.sites.unwrap_or_else(default_sites),
            output_root: Utf8PathBuf::from(
                config
                    .output_root
                    .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string()),
            ),
            workers: config.workers.unwrap_or(DEFAULT_WORKERS).max(1),
            site_timeout: config.site_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn write_starter(path: &str) -> Result<(), GdcEmError> {
        let config_path = PathBuf::from(path);
        if config_path.exists() {
            return Err(GdcEmError::Filesystem(format!(
                "refusing to overwrite existing config at {}",
                config_path.display()
            )));
        }
        let starter = Config {
            sites: Some(default_sites()),
            output_root: Some(DEFAULT_OUTPUT_ROOT.to_string()),
            workers: Some(DEFAULT_WORKERS),
            site_timeout_secs: None,
        };
        let content = serde_json::to_string_pretty(&starter)
            .map_err(|err| GdcEmError::Filesystem(err.to_string()))?;
        fs::write(&config_path, content).map_err(|err| GdcEmError::Filesystem(err.to_string()))
    }
}

// Primary sites as named in the GDC controlled vocabulary.
pub fn default_sites() -> Vec<String> {
    [
        "Adrenal Gland",
        "Bladder",
        "Bone Marrow and Blood",
        "Brain",
        "Breast",
        "Cervix",
        "Colorectal",
        "Esophagus",
        "Eye",
        "Head and Neck",
        "Kidney",
        "Liver",
        "Lung",
        "Lymph Nodes",
        "Ovary",
        "Pancreas",
        "Pleura",
        "Prostate",
        "Rectum",
        "Skin",
        "Soft Tissue",
        "Stomach",
        "Testis",
        "Thymus",
        "Thyroid",
        "Uterus",
    ]
    .iter()
    .map(|site| site.to_string())
    .collect()
}
