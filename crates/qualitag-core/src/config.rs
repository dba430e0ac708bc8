//! Configuration for the Qualitag core

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    MongoDB,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "mongodb" | "mongo" => Ok(StorageBackend::MongoDB),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Axis order of the nested list sent to the agreement service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixLayout {
    /// `matrix[rater][artifact]`
    #[default]
    RaterMajor,
    /// `matrix[artifact][rater]`
    ArtifactMajor,
}

impl FromStr for MatrixLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "rater_major" | "rater" => Ok(MatrixLayout::RaterMajor),
            "artifact_major" | "artifact" => Ok(MatrixLayout::ArtifactMajor),
            _ => Err(format!("Unknown matrix layout: {}", s)),
        }
    }
}

/// Limits, timeouts and endpoints used by validation and orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitagConfig {
    #[serde(default = "default_project_name_min")]
    pub project_name_min: usize,

    #[serde(default = "default_project_name_max")]
    pub project_name_max: usize,

    /// Shared by projects, teams and artifacts
    #[serde(default = "default_description_max")]
    pub description_max: usize,

    /// How far past creation a project deadline may be
    #[serde(default = "default_max_deadline_years")]
    pub max_deadline_years: u32,

    #[serde(default = "default_team_name_min")]
    pub team_name_min: usize,

    #[serde(default = "default_team_name_max")]
    pub team_name_max: usize,

    #[serde(default = "default_team_users_min")]
    pub team_users_min: usize,

    #[serde(default = "default_team_users_max")]
    pub team_users_max: usize,

    /// Name of the team created together with every project
    #[serde(default = "default_team_name")]
    pub default_team_name: String,

    #[serde(default = "default_tag_value_min")]
    pub tag_value_min: usize,

    #[serde(default = "default_tag_value_max")]
    pub tag_value_max: usize,

    /// Reject a tag whose (creator, value) pair already exists
    #[serde(default)]
    pub reject_duplicate_tags: bool,

    #[serde(default = "default_artifact_name_max")]
    pub artifact_name_max: usize,

    /// Bound on every single store call (milliseconds)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Bound on agreement service calls (milliseconds)
    #[serde(default = "default_agreement_timeout_ms")]
    pub agreement_timeout_ms: u64,

    #[serde(default = "default_agreement_service_url")]
    pub agreement_service_url: String,

    #[serde(default)]
    pub agreement_matrix_layout: MatrixLayout,

    #[serde(default)]
    pub storage_backend: StorageBackend,

    #[serde(default = "default_mongodb_url")]
    pub mongodb_url: String,

    #[serde(default = "default_mongodb_database")]
    pub mongodb_database: String,
}

fn default_project_name_min() -> usize {
    3
}

fn default_project_name_max() -> usize {
    50
}

fn default_description_max() -> usize {
    300
}

fn default_max_deadline_years() -> u32 {
    5
}

fn default_team_name_min() -> usize {
    3
}

fn default_team_name_max() -> usize {
    16
}

fn default_team_users_min() -> usize {
    2
}

fn default_team_users_max() -> usize {
    10
}

fn default_team_name() -> String {
    "DefaultTeam".to_string()
}

fn default_tag_value_min() -> usize {
    3
}

fn default_tag_value_max() -> usize {
    16
}

fn default_artifact_name_max() -> usize {
    100
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_agreement_timeout_ms() -> u64 {
    10_000
}

fn default_agreement_service_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_mongodb_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongodb_database() -> String {
    "qualitag".to_string()
}

impl Default for QualitagConfig {
    fn default() -> Self {
        Self {
            project_name_min: default_project_name_min(),
            project_name_max: default_project_name_max(),
            description_max: default_description_max(),
            max_deadline_years: default_max_deadline_years(),
            team_name_min: default_team_name_min(),
            team_name_max: default_team_name_max(),
            team_users_min: default_team_users_min(),
            team_users_max: default_team_users_max(),
            default_team_name: default_team_name(),
            tag_value_min: default_tag_value_min(),
            tag_value_max: default_tag_value_max(),
            reject_duplicate_tags: false,
            artifact_name_max: default_artifact_name_max(),
            store_timeout_ms: default_store_timeout_ms(),
            agreement_timeout_ms: default_agreement_timeout_ms(),
            agreement_service_url: default_agreement_service_url(),
            agreement_matrix_layout: MatrixLayout::default(),
            storage_backend: StorageBackend::default(),
            mongodb_url: default_mongodb_url(),
            mongodb_database: default_mongodb_database(),
        }
    }
}

impl QualitagConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `QUALITAG_*` environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from a TOML file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
            value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
        }

        let defaults = Self::default();
        let storage_backend = match lookup("QUALITAG_STORAGE_BACKEND") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => defaults.storage_backend,
        };
        let agreement_matrix_layout = match lookup("QUALITAG_AGREEMENT_MATRIX_LAYOUT") {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg)?,
            None => defaults.agreement_matrix_layout,
        };

        let config = Self {
            project_name_min: parsed(
                lookup("QUALITAG_PROJECT_NAME_MIN"),
                defaults.project_name_min,
            ),
            project_name_max: parsed(
                lookup("QUALITAG_PROJECT_NAME_MAX"),
                defaults.project_name_max,
            ),
            description_max: parsed(lookup("QUALITAG_DESCRIPTION_MAX"), defaults.description_max),
            max_deadline_years: parsed(
                lookup("QUALITAG_MAX_DEADLINE_YEARS"),
                defaults.max_deadline_years,
            ),
            team_name_min: parsed(lookup("QUALITAG_TEAM_NAME_MIN"), defaults.team_name_min),
            team_name_max: parsed(lookup("QUALITAG_TEAM_NAME_MAX"), defaults.team_name_max),
            team_users_min: parsed(lookup("QUALITAG_TEAM_USERS_MIN"), defaults.team_users_min),
            team_users_max: parsed(lookup("QUALITAG_TEAM_USERS_MAX"), defaults.team_users_max),
            default_team_name: lookup("QUALITAG_DEFAULT_TEAM_NAME")
                .unwrap_or(defaults.default_team_name),
            tag_value_min: parsed(lookup("QUALITAG_TAG_VALUE_MIN"), defaults.tag_value_min),
            tag_value_max: parsed(lookup("QUALITAG_TAG_VALUE_MAX"), defaults.tag_value_max),
            reject_duplicate_tags: lookup("QUALITAG_REJECT_DUPLICATE_TAGS")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.reject_duplicate_tags),
            artifact_name_max: parsed(
                lookup("QUALITAG_ARTIFACT_NAME_MAX"),
                defaults.artifact_name_max,
            ),
            store_timeout_ms: parsed(
                lookup("QUALITAG_STORE_TIMEOUT_MS"),
                defaults.store_timeout_ms,
            ),
            agreement_timeout_ms: parsed(
                lookup("QUALITAG_AGREEMENT_TIMEOUT_MS"),
                defaults.agreement_timeout_ms,
            ),
            agreement_service_url: lookup("QUALITAG_AGREEMENT_SERVICE_URL")
                .unwrap_or(defaults.agreement_service_url),
            agreement_matrix_layout,
            storage_backend,
            mongodb_url: lookup("QUALITAG_MONGODB_URL")
                .or_else(|| lookup("MONGODB_URL"))
                .unwrap_or(defaults.mongodb_url),
            mongodb_database: lookup("QUALITAG_MONGODB_DATABASE")
                .or_else(|| lookup("MONGODB_DATABASE"))
                .unwrap_or(defaults.mongodb_database),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that can never be satisfied
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("project name", self.project_name_min, self.project_name_max),
            ("team name", self.team_name_min, self.team_name_max),
            ("team users", self.team_users_min, self.team_users_max),
            ("tag value", self.tag_value_min, self.tag_value_max),
        ];
        for (label, min, max) in ranges {
            if min > max {
                anyhow::bail!("Invalid {} limits: minimum {} exceeds maximum {}", label, min, max);
            }
        }
        if self.store_timeout_ms == 0 || self.agreement_timeout_ms == 0 {
            anyhow::bail!("Timeouts must be greater than zero");
        }
        if self.default_team_name.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "Invalid default team name '{}': team names cannot contain whitespace",
                self.default_team_name
            );
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn agreement_timeout(&self) -> Duration {
        Duration::from_millis(self.agreement_timeout_ms)
    }
}
