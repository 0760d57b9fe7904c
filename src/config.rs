use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::{asset_path_with_base, DeployMode, DEFAULT_BASE_PATH};

pub const ENV_DEPLOY: &str = "PORTFOLIO_ENV";
pub const ENV_BASE_PATH: &str = "PORTFOLIO_BASE_PATH";
pub const ENV_ASSET_ROOT: &str = "PORTFOLIO_ASSET_ROOT";

const DEFAULT_ASSET_ROOT: &str = "public";

/// Site-wide settings resolved once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub deploy: DeployMode,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Directory holding `models/`, `projects/` etc. for native builds.
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            deploy: DeployMode::default(),
            base_path: default_base_path(),
            asset_root: default_asset_root(),
        }
    }
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_asset_root() -> PathBuf {
    PathBuf::from(DEFAULT_ASSET_ROOT)
}

impl SiteConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset or blank
    /// keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(flag) = value(ENV_DEPLOY) {
            config.deploy = DeployMode::from_flag(&flag);
        }
        if let Some(base) = value(ENV_BASE_PATH) {
            config.base_path = base.trim().to_string();
        }
        if let Some(root) = value(ENV_ASSET_ROOT) {
            config.asset_root = PathBuf::from(root);
        }
        config
    }

    /// Configuration baked in at compile time, used by the WebAssembly build
    /// where no process environment exists.
    pub fn compiled() -> Self {
        Self::from_lookup(|key| match key {
            ENV_DEPLOY => option_env!("PORTFOLIO_ENV").map(str::to_string),
            ENV_BASE_PATH => option_env!("PORTFOLIO_BASE_PATH").map(str::to_string),
            _ => None,
        })
    }

    pub fn with_deploy(mut self, deploy: DeployMode) -> Self {
        self.deploy = deploy;
        self
    }

    /// Resolves a root-relative path against this configuration.
    pub fn asset_path(&self, path: &str) -> String {
        asset_path_with_base(path, self.deploy, &self.base_path)
    }
}
