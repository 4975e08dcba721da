// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for beatlight.
//!
//! This module provides the pipeline configuration: directory layout,
//! generation tunables, LLM endpoint settings, logging and report options.
//! Files may be YAML or TOML, chosen by extension; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::generation::GenerationSettings;

/// Environment variable overriding the model name
pub const MODEL_ENV: &str = "MODEL_NAME";
/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Root pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl PipelineConfig {
    /// Load a configuration file (TOML for `.toml`, YAML otherwise)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Load from `path` when given, defaults otherwise, then apply env overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Apply `MODEL_NAME` and `OPENAI_BASE_URL` through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(model) = set(MODEL_ENV) {
            self.llm.model = model;
        }
        if let Some(url) = set(BASE_URL_ENV) {
            self.llm.base_url = url;
        }
    }

    /// Settings for the per-beat generation loop
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            context_window: self.generation.window_size,
            max_retries: self.generation.max_retries,
            allow_empty_beats: self.generation.allow_empty_beats,
            rapid_beat_threshold: self.generation.rapid_beat_threshold,
        }
    }
}

/// Directory layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Beat timelines (`TimeLine_<song>.json`)
    #[serde(default = "default_beats_dir")]
    pub beats_dir: PathBuf,
    /// Generated timelines
    #[serde(default = "default_effects_dir")]
    pub effects_dir: PathBuf,
    /// Audio features and lyric segments
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Reference timelines for comparison
    #[serde(default = "default_groundtruth_dir")]
    pub groundtruth_dir: PathBuf,
}

fn default_beats_dir() -> PathBuf {
    PathBuf::from("beats")
}
fn default_effects_dir() -> PathBuf {
    PathBuf::from("effects")
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}
fn default_groundtruth_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            beats_dir: default_beats_dir(),
            effects_dir: default_effects_dir(),
            cache_dir: default_cache_dir(),
            groundtruth_dir: default_groundtruth_dir(),
        }
    }
}

/// Generation tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Attempts per beat
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Beats generated at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Neighboring beats on each side used as context
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Accept empty effect sets as valid output
    #[serde(default = "default_allow_empty_beats")]
    pub allow_empty_beats: bool,
    /// Beats shorter than this many seconds count as rapid
    #[serde(default = "default_rapid_beat_threshold")]
    pub rapid_beat_threshold: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_max_concurrent() -> usize {
    5
}
fn default_window_size() -> usize {
    2
}
fn default_allow_empty_beats() -> bool {
    true
}
fn default_rapid_beat_threshold() -> f64 {
    0.5
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_concurrent: default_max_concurrent(),
            window_size: default_window_size(),
            allow_empty_beats: default_allow_empty_beats(),
            rapid_beat_threshold: default_rapid_beat_threshold(),
        }
    }
}

/// Chat completions endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Per-request timeout; none when unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Violations printed before truncating with "... and N more"
    #[serde(default = "default_max_listed_violations")]
    pub max_listed_violations: usize,
}

fn default_max_listed_violations() -> usize {
    10
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_listed_violations: default_max_listed_violations(),
        }
    }
}
