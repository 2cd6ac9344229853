use dsema_resolve::{ResolutionSession, ResolveError, ResolverConfig};
use std::time::Duration;

#[test]
fn test_missing_keys_take_defaults() {
    let config = ResolverConfig::from_toml_str("[ufcs]\nparallel = false\n").unwrap();
    assert!(!config.ufcs.parallel);
    assert_eq!(config.max_recursion_depth, 8);
    assert_eq!(config.object_module, "object");
    assert_eq!(config.ctfe_symbol, "__ctfe");
    assert_eq!(config.ufcs.join_timeout(), Duration::from_secs(10));
    assert_eq!(ResolverConfig::from_toml_str("").unwrap(), ResolverConfig::default());
}

#[test]
fn test_worker_count_is_at_least_one() {
    let mut config = ResolverConfig::default();
    config.ufcs.workers = Some(0);
    assert_eq!(config.ufcs.worker_count(), 1);
    config.ufcs.workers = None;
    assert!(config.ufcs.worker_count() >= 1);
}

#[test]
fn test_malformed_configuration_is_an_error() {
    let err = ResolverConfig::from_toml_str("max_recursion_depth = \"deep\"").unwrap_err();
    assert!(matches!(err, ResolveError::Config { .. }));
    assert!(ResolutionSession::from_toml_str("[ufcs\n").is_err());
}

#[test]
fn test_session_from_toml_applies_settings() {
    let session = ResolutionSession::from_toml_str("ctfe_symbol = \"__inCompileTime\"\n[ufcs]\nparallel = false\n").unwrap();
    assert_eq!(session.config().ctfe_symbol, "__inCompileTime");

    let module = session.add_module(dsema_syntax::ModuleBuilder::new("app").finish());
    let resolver = session.resolver();
    let found = crate::common::identifier_at(&resolver, module, 0, "__inCompileTime");
    assert_eq!(found, vec!["bool"]);
    assert!(crate::common::identifier_at(&resolver, module, 0, "__ctfe").is_empty());
}
