//! Resolver configuration, loadable from TOML.

use crate::error::{ResolveError, ResolveResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolverConfig {
    /// Bound on base-class and template-specialization recursion.
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: u32,

    /// Module implicitly imported by every other module.
    #[serde(default = "default_object_module")]
    pub object_module: String,

    /// Name of the compile-time-evaluation pseudo-variable.
    #[serde(default = "default_ctfe_symbol")]
    pub ctfe_symbol: String,

    /// UFCS lookup settings
    #[serde(default)]
    pub ufcs: UfcsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UfcsConfig {
    /// Fan candidate checks out over the worker pool.
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Pool size; `None` uses the number of available CPUs.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Below this many candidates the lookup stays on the calling thread.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// How long the caller waits for workers before using partial results.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: default_max_recursion_depth(),
            object_module: default_object_module(),
            ctfe_symbol: default_ctfe_symbol(),
            ufcs: UfcsConfig::default(),
        }
    }
}

impl Default for UfcsConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            workers: None,
            parallel_threshold: default_parallel_threshold(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl UfcsConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl ResolverConfig {
    pub fn from_toml_str(source: &str) -> ResolveResult<Self> {
        toml::from_str(source).map_err(|e| ResolveError::Config { message: e.to_string() })
    }

    /// Single-threaded UFCS, as used by deterministic tests.
    pub fn sequential() -> Self {
        Self { ufcs: UfcsConfig { parallel: false, ..UfcsConfig::default() }, ..Self::default() }
    }
}

fn default_max_recursion_depth() -> u32 {
    8
}

fn default_object_module() -> String {
    "object".to_string()
}

fn default_ctfe_symbol() -> String {
    "__ctfe".to_string()
}

fn default_true() -> bool {
    true
}

fn default_parallel_threshold() -> usize {
    8
}

fn default_join_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ResolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.max_recursion_depth, 8);
        assert_eq!(config.ufcs.join_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = ResolverConfig::from_toml_str(
            r#"
            object_module = "core.object"

            [ufcs]
            workers = 3
            parallel = false
            "#,
        )
        .unwrap();
        assert_eq!(config.object_module, "core.object");
        assert_eq!(config.ufcs.worker_count(), 3);
        assert!(!config.ufcs.parallel);
        assert_eq!(config.ufcs.parallel_threshold, 8);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = ResolverConfig::from_toml_str("max_recursion_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ResolveError::Config { .. }));
    }
}
