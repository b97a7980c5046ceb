//! Pipeline configuration.
//!
//! Every field has a default, so an empty JSON object (or TOML document with
//! the `toml` feature) is a valid configuration.
use crate::compute::classify::DEFAULT_MAX_CLASSES;
use crate::error::{ChoroplethError, Result};
use serde::de::Error;
use std::path::Path;

pub use crate::compute::aggregate::Reducer;
pub use crate::compute::join::JoinMode;

/// Which spatial pre-filter the join uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Uniform grid over region bounding boxes.
    #[default]
    Grid,
    /// R*-tree over region bounding boxes.
    RTree,
}

/// Spatial index settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    #[serde(default)]
    pub kind: IndexKind,

    /// Approximate number of region boxes a grid cell should overlap
    #[serde(default = "IndexConfig::default_target_per_cell")]
    pub target_per_cell: usize,

    /// Upper bound on grid cells; the grid coarsens to stay under it
    #[serde(default = "IndexConfig::default_max_cells")]
    pub max_cells: usize,
}

impl IndexConfig {
    const fn default_target_per_cell() -> usize {
        8
    }

    const fn default_max_cells() -> usize {
        1_000_000
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexKind::default(),
            target_per_cell: Self::default_target_per_cell(),
            max_cells: Self::default_max_cells(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub join_mode: JoinMode,

    #[serde(default)]
    pub reducer: Reducer,

    /// Number of natural-breaks classes
    #[serde(default = "Config::default_classes")]
    pub classes: usize,

    /// Largest class count accepted, bounding the classifier's tables
    #[serde(default = "Config::default_max_classes")]
    pub max_classes: usize,

    #[serde(default)]
    pub index: IndexConfig,

    /// Largest value count the classifier accepts
    #[serde(default = "Config::default_max_classify_values")]
    pub max_classify_values: usize,

    #[serde(default = "Config::default_parallel")]
    pub parallel: bool,

    /// Observations per aggregation shard. Shards are merged in order, so
    /// results do not depend on the thread count.
    #[serde(default = "Config::default_shard_size")]
    pub shard_size: usize,
}

impl Config {
    const fn default_classes() -> usize {
        5
    }

    const fn default_max_classes() -> usize {
        DEFAULT_MAX_CLASSES
    }

    const fn default_max_classify_values() -> usize {
        50_000
    }

    const fn default_parallel() -> bool {
        true
    }

    const fn default_shard_size() -> usize {
        4096
    }

    pub fn with_join_mode(mut self, mode: JoinMode) -> Self {
        self.join_mode = mode;
        self
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_classes(mut self, classes: usize) -> Self {
        assert!(classes > 0, "Class count must be greater than zero");
        self.classes = classes;
        self
    }

    pub fn with_max_classes(mut self, limit: usize) -> Self {
        assert!(limit > 0, "Class limit must be greater than zero");
        self.max_classes = limit;
        self
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_index_kind(mut self, kind: IndexKind) -> Self {
        self.index.kind = kind;
        self
    }

    pub fn with_max_classify_values(mut self, limit: usize) -> Self {
        assert!(limit > 0, "Classification limit must be greater than zero");
        self.max_classify_values = limit;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        assert!(shard_size > 0, "Shard size must be greater than zero");
        self.shard_size = shard_size;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.classes == 0 {
            return Err("Class count must be greater than zero".to_string());
        }
        if self.max_classes == 0 {
            return Err("max_classes must be greater than zero".to_string());
        }
        if self.classes > self.max_classes {
            return Err(format!(
                "Class count {} exceeds max_classes {}",
                self.classes, self.max_classes
            ));
        }
        if self.index.target_per_cell == 0 {
            return Err("Index target_per_cell must be greater than zero".to_string());
        }
        if self.index.max_cells == 0 {
            return Err("Index max_cells must be greater than zero".to_string());
        }
        if self.max_classify_values == 0 {
            return Err("max_classify_values must be greater than zero".to_string());
        }
        if self.shard_size == 0 {
            return Err("Shard size must be greater than zero".to_string());
        }
        if self.classes > self.max_classify_values {
            return Err(format!(
                "Class count {} exceeds max_classify_values {}",
                self.classes, self.max_classify_values
            ));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load a configuration file, choosing the format by extension.
    ///
    /// `.json` is always supported; `.toml` requires the `toml` feature.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChoroplethError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => {
                Self::from_json(&content).map_err(|e| ChoroplethError::Config(e.to_string()))
            }
            #[cfg(feature = "toml")]
            Some("toml") => {
                Self::from_toml(&content).map_err(|e| ChoroplethError::Config(e.to_string()))
            }
            other => Err(ChoroplethError::Config(format!(
                "unsupported configuration format: {:?}",
                other.unwrap_or("")
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join_mode: JoinMode::default(),
            reducer: Reducer::default(),
            classes: Self::default_classes(),
            max_classes: Self::default_max_classes(),
            index: IndexConfig::default(),
            max_classify_values: Self::default_max_classify_values(),
            parallel: Self::default_parallel(),
            shard_size: Self::default_shard_size(),
        }
    }
}
