// src/config.rs

use anyhow::Result;
use parquet::{
    basic::{BrotliLevel, Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use serde::Deserialize;
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
};

use crate::error::EtlError;

/// Config file read when `I94ETL_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "dl.yaml";
pub const CONFIG_PATH_ENV: &str = "I94ETL_CONFIG";

pub const DEFAULT_INPUT_ROOT: &str = "./input_data/";
pub const DEFAULT_OUTPUT_ROOT: &str = "./output_data/";
pub const DEFAULT_BATCH_SIZE: usize = 64 * 1024;

/// Storage-backend credentials. Carried explicitly through the run instead of
/// being exported into the process environment.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Parquet codec for every table the run writes.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputCompression {
    #[default]
    Snappy,
    Brotli,
    Zstd,
    Uncompressed,
}

impl OutputCompression {
    fn codec(self) -> Result<Compression> {
        Ok(match self {
            OutputCompression::Snappy => Compression::SNAPPY,
            OutputCompression::Brotli => Compression::BROTLI(BrotliLevel::try_new(5)?),
            OutputCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            OutputCompression::Uncompressed => Compression::UNCOMPRESSED,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub aws: Credentials,
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default)]
    pub compression: OutputCompression,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_input_root() -> PathBuf {
    PathBuf::from(DEFAULT_INPUT_ROOT)
}

fn default_output_root() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_ROOT)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Config {
    /// Build a config for local roots with default tuning.
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        aws: Credentials,
    ) -> Self {
        Self {
            aws,
            input_root: input_root.into(),
            output_root: output_root.into(),
            compression: OutputCompression::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Path of the config file: `$I94ETL_CONFIG` or `dl.yaml`.
    pub fn default_path() -> PathBuf {
        env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Read and validate the YAML config at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| EtlError::config(path, format!("cannot read file: {e}")))?;
        Self::from_yaml_str(&text, path)
    }

    /// Parse config text; `origin` is only used in error messages.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)
            .map_err(|e| EtlError::config(origin, format!("invalid YAML: {e}")))?;
        cfg.validate(origin)?;
        Ok(cfg)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        if self.aws.access_key_id.trim().is_empty() {
            return Err(EtlError::config(origin, "aws.access_key_id is empty").into());
        }
        if self.aws.secret_access_key.trim().is_empty() {
            return Err(EtlError::config(origin, "aws.secret_access_key is empty").into());
        }
        if self.batch_size == 0 {
            return Err(EtlError::config(origin, "batch_size must be positive").into());
        }
        Ok(())
    }

    /// Writer properties shared by every output table.
    pub fn writer_properties(&self) -> Result<WriterProperties> {
        Ok(WriterProperties::builder()
            .set_compression(self.compression.codec()?)
            .set_dictionary_enabled(true)
            .build())
    }
}
