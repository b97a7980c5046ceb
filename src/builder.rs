//! Pipeline builder
//!
//! Collects settings field by field and validates them once in
//! [`PipelineBuilder::build`], so a bad value surfaces as an error rather
//! than a panic.

use crate::config::{Config, IndexConfig, IndexKind, JoinMode, Reducer};
use crate::error::Result;
use crate::pipeline::Pipeline;
use std::path::Path;

/// Builder for [`Pipeline`] configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: Config,
}

impl PipelineBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a JSON (or, with the `toml` feature, TOML) file.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = Config::from_file(path)?;
        Ok(self)
    }

    pub fn join_mode(mut self, mode: JoinMode) -> Self {
        self.config.join_mode = mode;
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.config.reducer = reducer;
        self
    }

    pub fn classes(mut self, classes: usize) -> Self {
        self.config.classes = classes;
        self
    }

    pub fn max_classes(mut self, limit: usize) -> Self {
        self.config.max_classes = limit;
        self
    }

    pub fn index(mut self, index: IndexConfig) -> Self {
        self.config.index = index;
        self
    }

    pub fn index_kind(mut self, kind: IndexKind) -> Self {
        self.config.index.kind = kind;
        self
    }

    pub fn max_classify_values(mut self, limit: usize) -> Self {
        self.config.max_classify_values = limit;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn shard_size(mut self, shard_size: usize) -> Self {
        self.config.shard_size = shard_size;
        self
    }

    /// Validate the configuration and create the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        Pipeline::new(self.config)
    }
}
