use crate::common::{expression_at, identifier_at, session_with};
use dsema_resolve::ResolutionDiagnostic;
use dsema_syntax::{Expr, ImportDecl, Module, ModuleBuilder, TypeDecl};

fn stdio() -> Module {
    let mut m = ModuleBuilder::new("std.stdio");
    let root = m.root();
    m.function(root, "writeln", Some(TypeDecl::void()));
    m.variable(root, "stdout", Some(TypeDecl::int()), None);
    m.finish()
}

/// `app` with the given import and a `main` body; returns the query position.
fn app_importing(import: ImportDecl) -> (Module, usize) {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.import_with(root, import);
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());
    (m.finish(), position)
}

#[test]
fn test_renamed_import_only_exposes_its_alias() {
    let (app, position) = app_importing(ImportDecl::new("std.stdio").renamed("io"));
    let (session, ids) = session_with(vec![stdio(), app]);
    let resolver = session.resolver();

    let qualified = Expr::ident("io").dot("stdout");
    assert_eq!(expression_at(&resolver, ids[1], position, &qualified), vec!["int"]);
    assert!(identifier_at(&resolver, ids[1], position, "stdout").is_empty());
}

#[test]
fn test_selective_import_binds_only_listed_names() {
    let import = ImportDecl::new("std.stdio").bind("stdout", None).bind("writeln", Some("print"));
    let (app, position) = app_importing(import);
    let (session, ids) = session_with(vec![stdio(), app]);
    let resolver = session.resolver();

    assert_eq!(identifier_at(&resolver, ids[1], position, "stdout"), vec!["int"]);
    assert_eq!(identifier_at(&resolver, ids[1], position, "print"), vec!["void"]);
    assert!(identifier_at(&resolver, ids[1], position, "writeln").is_empty());
}

#[test]
fn test_static_import_requires_qualification() {
    let (app, position) = app_importing(ImportDecl::new("std.stdio").static_only());
    let (session, ids) = session_with(vec![stdio(), app]);
    let resolver = session.resolver();

    assert!(identifier_at(&resolver, ids[1], position, "stdout").is_empty());
    let qualified = Expr::ident("std").dot("stdio").dot("stdout");
    assert_eq!(expression_at(&resolver, ids[1], position, &qualified), vec!["int"]);
}

#[test]
fn test_public_imports_are_transitive() {
    let mut base = ModuleBuilder::new("base");
    let root = base.root();
    base.variable(root, "deep", Some(TypeDecl::bool()), None);

    let mut mid = ModuleBuilder::new("mid");
    let root = mid.root();
    mid.import_with(root, ImportDecl::new("base").public());

    let mut top = ModuleBuilder::new("top");
    let root = top.root();
    top.import_with(root, ImportDecl::new("mid").public());

    let (app, position) = app_importing(ImportDecl::new("top"));
    let (session, ids) = session_with(vec![base.finish(), mid.finish(), top.finish(), app]);
    assert_eq!(identifier_at(&session.resolver(), ids[3], position, "deep"), vec!["bool"]);
}

#[test]
fn test_private_imports_stop_at_the_importer() {
    let mut dep = ModuleBuilder::new("dep");
    let root = dep.root();
    dep.variable(root, "secret", Some(TypeDecl::int()), None);

    let mut wrapper = ModuleBuilder::new("wrapper");
    let root = wrapper.root();
    wrapper.import(root, "dep");
    wrapper.variable(root, "visible", Some(TypeDecl::int()), None);

    let (app, position) = app_importing(ImportDecl::new("wrapper"));
    let (session, ids) = session_with(vec![dep.finish(), wrapper.finish(), app]);
    let resolver = session.resolver();
    assert_eq!(identifier_at(&resolver, ids[2], position, "visible"), vec!["int"]);
    assert!(identifier_at(&resolver, ids[2], position, "secret").is_empty());
}

#[test]
fn test_local_imports_are_scoped_to_their_block() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let (mut inside, mut outside) = (0, 0);
    m.body(main, |b| {
        b.block(|inner| {
            inner.import("std.stdio");
            inside = inner.mark();
        });
        outside = b.mark();
    });

    let (session, ids) = session_with(vec![stdio(), m.finish()]);
    let resolver = session.resolver();
    assert_eq!(identifier_at(&resolver, ids[1], inside, "stdout"), vec!["int"]);
    assert!(identifier_at(&resolver, ids[1], outside, "stdout").is_empty());
}

#[test]
fn test_object_module_is_implicitly_visible() {
    let mut object = ModuleBuilder::new("object");
    let root = object.root();
    object.alias(root, "size_t", TypeDecl::primitive(dsema_syntax::PrimitiveKind::Ulong));

    let (app, position) = app_importing(ImportDecl::new("std.stdio"));
    let (session, ids) = session_with(vec![object.finish(), stdio(), app]);
    assert_eq!(identifier_at(&session.resolver(), ids[2], position, "size_t"), vec!["ulong"]);
}

#[test]
fn test_module_name_clash_is_reported() {
    let mut first = ModuleBuilder::new("dup");
    let root = first.root();
    first.variable(root, "value", Some(TypeDecl::int()), None);
    let mut second = ModuleBuilder::new("dup");
    let root = second.root();
    second.variable(root, "value", Some(TypeDecl::bool()), None);

    let (app, position) = app_importing(ImportDecl::new("dup"));
    let (session, ids) = session_with(vec![first.finish(), second.finish(), app]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[2], position);
    let found = resolver.resolve_identifier("value", &mut ctx, None).unwrap();

    assert_eq!(found.len(), 2);
    assert!(ctx
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ResolutionDiagnostic::AmbiguousModule { name, count: 2 } if name == "dup")));
}
