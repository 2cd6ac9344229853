use crate::common::{identifier_at, session_with};
use dsema_resolve::{MemberFilter, ResolutionSession, SymbolRef, SyntheticKind};
use dsema_syntax::{DeclRef, ModuleBuilder, PrimitiveKind, TypeDecl, Visibility};

fn symbol_name(session: &ResolutionSession, symbol: &SymbolRef) -> String {
    match symbol {
        SymbolRef::Decl(decl) => session.resolver().index().decl(*decl).map(|d| d.name.clone()).unwrap_or_default(),
        SymbolRef::Synthetic(synthetic) => synthetic.name.clone(),
    }
}

#[test]
fn test_innermost_declaration_shadows_outer_ones() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "x", Some(TypeDecl::bool()), None);
    let f = m.function(root, "f", Some(TypeDecl::void()));
    m.parameter(f, "x", TypeDecl::primitive(PrimitiveKind::Long));
    let (mut before, mut after) = (0, 0);
    m.body(f, |b| {
        before = b.mark();
        b.var("x", Some(TypeDecl::int()), None);
        after = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    assert_eq!(identifier_at(&resolver, ids[0], after, "x"), vec!["int"]);
    assert_eq!(identifier_at(&resolver, ids[0], before, "x"), vec!["long"]);
    assert_eq!(identifier_at(&resolver, ids[0], 0, "x"), vec!["bool"]);
}

#[test]
fn test_nested_block_locals_end_with_their_block() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let f = m.function(root, "f", Some(TypeDecl::void()));
    let (mut inside, mut outside) = (0, 0);
    m.body(f, |b| {
        b.block(|inner| {
            inner.var("scoped", Some(TypeDecl::int()), None);
            inside = inner.mark();
        });
        outside = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    assert_eq!(identifier_at(&resolver, ids[0], inside, "scoped"), vec!["int"]);
    assert!(identifier_at(&resolver, ids[0], outside, "scoped").is_empty());
}

#[test]
fn test_enumeration_lists_nearest_scope_first() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "global", Some(TypeDecl::int()), None);
    let f = m.function(root, "f", Some(TypeDecl::void()));
    m.parameter(f, "param", TypeDecl::int());
    let mut position = 0;
    m.body(f, |b| {
        b.var("local", Some(TypeDecl::int()), None);
        position = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], position);
    let symbols = resolver.enumerate_visible_symbols(&mut ctx, position, MemberFilter::ALL).unwrap();
    let names: Vec<String> = symbols.iter().map(|s| symbol_name(&session, s)).collect();
    assert_eq!(names, vec!["local", "param", "global", "f", "__ctfe"]);

    let mut ctx = resolver.context_at(ids[0], position);
    let variables = resolver.enumerate_visible_symbols(&mut ctx, position, MemberFilter::VARIABLES).unwrap();
    let names: Vec<String> = variables.iter().map(|s| symbol_name(&session, s)).collect();
    assert_eq!(names, vec!["local", "param", "global"]);
}

#[test]
fn test_out_contract_result_and_ctfe_flag() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let compute = m.function(root, "compute", Some(TypeDecl::int()));
    let mut position = 0;
    m.out_contract(compute, Some("r"), |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();

    let mut ctx = resolver.context_at(ids[0], position);
    let result = resolver.resolve_identifier("r", &mut ctx, None).unwrap();
    assert_eq!(result.len(), 1);
    let synthetic = result[0].symbol().and_then(SymbolRef::as_synthetic).expect("result variable");
    assert!(matches!(synthetic.kind, SyntheticKind::ResultVariable { .. }));
    assert_eq!(result[0].to_string(), "int");

    let mut ctx = resolver.context_at(ids[0], position);
    let ctfe = resolver.resolve_identifier("__ctfe", &mut ctx, None).unwrap();
    assert_eq!(crate::common::render(&ctfe), vec!["bool"]);

    // Outside the contract there is no result variable.
    assert!(identifier_at(&resolver, ids[0], 0, "r").is_empty());
}

#[test]
fn test_inherited_members_skip_private_ones() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let base = m.class_decl(root, "Base");
    m.variable(base, "inherited", Some(TypeDecl::int()), None);
    let hidden = m.variable(base, "hidden", Some(TypeDecl::int()), None);
    m.set_visibility(hidden, Visibility::Private);
    let shared = m.variable(base, "shared", Some(TypeDecl::bool()), None);
    m.set_visibility(shared, Visibility::Private);
    m.set_static(shared);

    let derived = m.class_decl(root, "Derived");
    m.base_class(derived, TypeDecl::ident("Base"));
    let method = m.function(derived, "method", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(method, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    assert_eq!(identifier_at(&resolver, ids[0], position, "inherited"), vec!["int"]);
    assert_eq!(identifier_at(&resolver, ids[0], position, "shared"), vec!["bool"]);
    assert!(identifier_at(&resolver, ids[0], position, "hidden").is_empty());
}

#[test]
fn test_overloads_at_one_level_are_all_returned() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let first = m.function(root, "put", Some(TypeDecl::int()));
    m.parameter(first, "value", TypeDecl::int());
    let second = m.function(root, "put", Some(TypeDecl::bool()));
    m.parameter(second, "value", TypeDecl::bool());

    let (session, ids) = session_with(vec![m.finish()]);
    let mut found = identifier_at(&session.resolver(), ids[0], 0, "put");
    found.sort();
    assert_eq!(found, vec!["bool", "int"]);
}

#[test]
fn test_lookup_starts_at_the_origin_declaration() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "x", Some(TypeDecl::bool()), None);
    let global = m.variable(root, "g", None, None);
    let f = m.function(root, "f", Some(TypeDecl::void()));
    m.parameter(f, "x", TypeDecl::primitive(PrimitiveKind::Long));
    let (mut local, mut later) = (None, None);
    m.body(f, |b| {
        local = Some(b.var("x", Some(TypeDecl::int()), None));
        later = Some(b.var("y", None, None));
    });
    let (local, later) = (local.expect("declared"), later.expect("declared"));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let from = |origin| {
        let mut ctx = resolver.context_at(ids[0], 0);
        let found = resolver.resolve_identifier("x", &mut ctx, Some(DeclRef::new(ids[0], origin))).unwrap();
        found.iter().map(ToString::to_string).collect::<Vec<_>>()
    };
    assert_eq!(from(later), vec!["int"]);
    // A declaration does not see itself.
    assert_eq!(from(local), vec!["long"]);
    assert_eq!(from(global), vec!["bool"]);
}
