//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults,
//! 2. an optional file (TOML, YAML or JSON, picked by extension),
//! 3. `SWCACHE_`-prefixed environment variables, with `__` separating
//!    nested keys (`SWCACHE_SWEEP_CONCURRENCY=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use swcache_core::{PatternRule, RuleTable};
use tracing::debug;
use url::Url;

const ENV_PREFIX: &str = "SWCACHE_";
const DEFAULT_MANIFEST_PATH: &str = "/update.json";
const DEFAULT_SWEEP_CONCURRENCY: usize = 8;

/// One cacheability rule. `pattern` is a regular expression matched against
/// the URL path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default = "default_clean")]
    pub clean: bool,
    #[serde(default)]
    pub host: Option<String>,
    pub pattern: String,
}

fn default_clean() -> bool {
    true
}

/// Requests to `host` that are not cached are fetched from `mirror` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpareConfig {
    pub host: String,
    pub mirror: Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site origin; required.
    pub origin: Option<Url>,
    /// Path of the update manifest, relative to `origin`.
    pub manifest_path: String,
    pub cache_dir: PathBuf,
    /// Escape constant of this installation.
    pub escape: u32,
    pub sweep_concurrency: usize,
    /// Cacheability rules in match order. Without any rule nothing is cached.
    pub rules: Vec<RuleConfig>,
    pub spare: Vec<SpareConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = ProjectDirs::from("", "", "swcache")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("swcache"));
        Self {
            origin: None,
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            cache_dir,
            escape: 0,
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
            rules: Vec::new(),
            spare: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate the configuration from every source.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(file)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Defaults merged with `file`, without the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let Some(path) = file else {
            return Ok(figment);
        };
        debug!(path = %path.display(), "Loading configuration file");
        let figment = match path.extension().and_then(OsStr::to_str) {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        };
        Ok(figment)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let origin = self.origin()?;
        if !matches!(origin.scheme(), "http" | "https") {
            exn::bail!(ErrorKind::Invalid(format!("origin must be http(s): {origin}")));
        }
        if self.sweep_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("sweep_concurrency must be at least 1".to_string()));
        }
        let mut names = HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name.as_str()) {
                exn::bail!(ErrorKind::Invalid(format!("duplicate rule name: {}", rule.name)));
            }
        }
        self.rule_table()?;
        self.manifest_url()?;
        Ok(())
    }

    pub fn origin(&self) -> Result<&Url> {
        self.origin
            .as_ref()
            .ok_or_raise(|| ErrorKind::Invalid("origin is required".to_string()))
    }

    pub fn manifest_url(&self) -> Result<Url> {
        self.origin()?
            .join(&self.manifest_path)
            .or_raise(|| ErrorKind::Invalid(format!("invalid manifest path: {}", self.manifest_path)))
    }

    /// Compile the configured rules, in declaration order.
    pub fn rule_table(&self) -> Result<RuleTable> {
        self.rules.iter().try_fold(RuleTable::default(), |table, rule| {
            let mut compiled = PatternRule::new(&rule.name, &rule.pattern)
                .or_raise(|| ErrorKind::Invalid(format!("rule `{}` has an invalid pattern", rule.name)))?
                .with_clean(rule.clean);
            if let Some(host) = &rule.host {
                compiled = compiled.with_host(host);
            }
            Ok(table.with_rule(compiled))
        })
    }
}
