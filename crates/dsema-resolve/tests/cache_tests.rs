use crate::common::{identifier_at, init_logging};
use dsema_resolve::{ResolutionSession, ResolverConfig, ResultCache};
use dsema_syntax::{Module, ModuleBuilder, TypeDecl};
use std::sync::Arc;
use std::thread;

fn module_with_global(name: &str, global: &str) -> Module {
    let mut m = ModuleBuilder::new(name);
    let root = m.root();
    m.variable(root, global, Some(TypeDecl::int()), None);
    m.finish()
}

#[test]
fn test_duplicate_names_are_kept_as_lists() {
    init_logging();
    let cache = ResultCache::new();
    cache.add(module_with_global("one", "shared"));
    cache.add(module_with_global("two", "shared"));
    cache.add(module_with_global("one", "other"));

    let index = cache.snapshot();
    assert_eq!(index.globals_named("shared").len(), 2);
    assert_eq!(index.modules_named("one").len(), 2);
    assert!(index.lookup_module_by_name("missing").is_none());
}

#[test]
fn test_packages_are_derived_from_module_names() {
    let cache = ResultCache::new();
    cache.add(module_with_global("std.container.array", "a"));
    cache.add(module_with_global("std.stdio", "b"));

    let index = cache.snapshot();
    let std = index.lookup_package("std").expect("std is a package");
    assert_eq!(std.modules.len(), 2);
    assert!(index.is_package("std.container"));
    assert!(!index.is_package("std.stdio"));
}

#[test]
fn test_clear_does_not_disturb_running_resolvers() {
    init_logging();
    let session = ResolutionSession::new(ResolverConfig::sequential());
    let id = session.add_module(module_with_global("app", "value"));
    let resolver = session.resolver();

    session.cache().clear();
    assert!(session.resolver().index().is_empty());
    assert_eq!(identifier_at(&resolver, id, 0, "value"), vec!["int"]);
}

#[test]
fn test_concurrent_readers_and_writer() {
    init_logging();
    let session = Arc::new(ResolutionSession::new(ResolverConfig::sequential()));
    let id = session.add_module(module_with_global("app", "value"));

    thread::scope(|scope| {
        let writer = Arc::clone(&session);
        scope.spawn(move || {
            for i in 0..20 {
                writer.add_module(module_with_global(&format!("extra{i}"), "value"));
            }
        });
        for _ in 0..4 {
            let reader = Arc::clone(&session);
            scope.spawn(move || {
                for _ in 0..20 {
                    let resolver = reader.resolver();
                    assert_eq!(identifier_at(&resolver, id, 0, "value"), vec!["int"]);
                }
            });
        }
    });
    assert_eq!(session.resolver().index().len(), 21);
}
