use crate::common::{render, session_with};
use dsema_resolve::{derives_from, ResolutionDiagnostic, ResolutionSession, ResolverConfig};
use dsema_syntax::{ModuleBuilder, TypeDecl};

/// Classes named `names`, each inheriting from the next listed in `bases`.
fn classes(names: &[&str], bases: &[(&str, &str)]) -> ModuleBuilder {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    for name in names {
        let class = m.class_decl(root, name);
        for (derived, base) in bases {
            if derived == name {
                m.base_class(class, TypeDecl::ident(base));
            }
        }
    }
    m
}

#[test]
fn test_derived_class_reaches_its_bases() {
    let m = classes(&["Animal", "Dog", "Puppy"], &[("Dog", "Animal"), ("Puppy", "Dog")]);
    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();

    let mut ctx = resolver.context_at(ids[0], 0);
    let puppy = resolver.resolve_type(&TypeDecl::ident("Puppy"), &mut ctx).unwrap();
    let animal = resolver.resolve_type(&TypeDecl::ident("Animal"), &mut ctx).unwrap();
    assert!(derives_from(&puppy[0], &animal[0]));
    assert!(!derives_from(&animal[0], &puppy[0]));
    assert_eq!(puppy[0].base_class().map(ToString::to_string).as_deref(), Some("Dog"));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_self_inheritance_is_reported_and_skipped() {
    let m = classes(&["Loop"], &[("Loop", "Loop")]);
    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::ident("Loop"), &mut ctx).unwrap();

    assert_eq!(render(&found), vec!["Loop"]);
    assert!(found[0].base_class().is_none());
    assert!(ctx.diagnostics().iter().any(|d| matches!(d, ResolutionDiagnostic::SelfInheritance { .. })));
}

#[test]
fn test_cyclic_inheritance_terminates() {
    let m = classes(&["A", "B"], &[("A", "B"), ("B", "A")]);
    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::ident("A"), &mut ctx).unwrap();

    assert_eq!(render(&found), vec!["A"]);
    assert!(ctx
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ResolutionDiagnostic::CyclicInheritance { name, .. } if name == "B")));
}

#[test]
fn test_deep_hierarchies_stop_at_the_depth_limit() {
    let m = classes(&["A", "B", "C", "D"], &[("A", "B"), ("B", "C"), ("C", "D")]);
    let config = ResolverConfig { max_recursion_depth: 2, ..ResolverConfig::sequential() };
    let session = ResolutionSession::new(config);
    let id = session.add_module(m.finish());
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(id, 0);
    let found = resolver.resolve_type(&TypeDecl::ident("A"), &mut ctx).unwrap();

    assert_eq!(render(&found), vec!["A"]);
    assert!(ctx
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ResolutionDiagnostic::RecursionLimit { what, depth: 2 } if what == "C")));
}

#[test]
fn test_invalid_base_lists_are_diagnosed() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.struct_decl(root, "Plain");
    m.class_decl(root, "First");
    m.class_decl(root, "Second");
    let shape = m.interface_decl(root, "Shape");
    m.base_class(shape, TypeDecl::ident("First"));
    let both = m.class_decl(root, "Both");
    m.base_class(both, TypeDecl::ident("First"));
    m.base_class(both, TypeDecl::ident("Second"));
    let odd = m.class_decl(root, "Odd");
    m.base_class(odd, TypeDecl::ident("Plain"));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let diagnostics_of = |name: &str| {
        let mut ctx = resolver.context_at(ids[0], 0);
        resolver.resolve_type(&TypeDecl::ident(name), &mut ctx).unwrap();
        ctx.take_diagnostics()
    };

    assert!(matches!(diagnostics_of("Shape").as_slice(), [ResolutionDiagnostic::InterfaceInheritsClass { .. }]));
    assert!(matches!(diagnostics_of("Both").as_slice(), [ResolutionDiagnostic::MultipleBaseClasses { .. }]));
    assert!(matches!(diagnostics_of("Odd").as_slice(), [ResolutionDiagnostic::InvalidBase { base, .. }] if base == "Plain"));
}
