use crate::common::{expression_at, identifier_at, session_with};
use dsema_resolve::{same_type, AbstractType, SymbolRef, SyntheticKind};
use dsema_syntax::{DeclRef, Expr, ModuleBuilder, PrimitiveKind, TypeDecl};

#[test]
fn test_imported_variable_resolves_to_its_declaration() {
    let mut a = ModuleBuilder::new("a");
    let root = a.root();
    let x = a.variable(root, "x", Some(TypeDecl::int()), None);

    let mut app = ModuleBuilder::new("app");
    let root = app.root();
    app.import(root, "a");
    let main = app.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    app.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![a.finish(), app.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[1], position);
    let found = resolver.resolve_identifier("x", &mut ctx, None).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].symbol(), Some(&SymbolRef::Decl(DeclRef::new(ids[0], x))));
    assert_eq!(found[0].strip().and_then(AbstractType::as_primitive), Some(PrimitiveKind::Int));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_struct_literal_call_yields_the_struct() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let s = m.struct_decl(root, "S");
    m.variable(s, "a", Some(TypeDecl::int()), None);
    m.variable(s, "b", Some(TypeDecl::bool()), None);
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let call = Expr::ident("S").call(vec![Expr::int(1), Expr::bool_lit(true)]);
    assert_eq!(expression_at(&session.resolver(), ids[0], position, &call), vec!["S"]);
}

#[test]
fn test_array_length_is_an_intrinsic_property() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| {
        b.var("arr", Some(TypeDecl::array(TypeDecl::int())), None);
        position = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], position);
    let found = resolver.resolve_expression(&Expr::ident("arr").dot("length"), &mut ctx).unwrap();

    assert_eq!(found.len(), 1);
    let synthetic = found[0].symbol().and_then(SymbolRef::as_synthetic).expect("synthetic property");
    assert_eq!(synthetic.name, "length");
    assert_eq!(synthetic.kind, SyntheticKind::StaticProperty);
    assert!(same_type(found[0].strip().expect("typed"), &AbstractType::size_t()));
}

#[test]
fn test_unknown_names_are_empty_not_errors() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "known", Some(TypeDecl::int()), None);

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    assert!(identifier_at(&resolver, ids[0], 0, "unknown").is_empty());
    assert!(expression_at(&resolver, ids[0], 0, &Expr::ident("known").dot("nothing")).is_empty());
}

#[test]
fn test_auto_function_infers_its_return_type() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let answer = m.function(root, "answer", None);
    m.body(answer, |b| b.ret(Some(Expr::float(4.2))));
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let call = Expr::ident("answer").call(vec![]);
    assert_eq!(expression_at(&session.resolver(), ids[0], position, &call), vec!["double"]);
}

#[test]
fn test_recursive_auto_function_terminates() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let f = m.function(root, "f", None);
    m.body(f, |b| b.ret(Some(Expr::ident("f").call(vec![]))));
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let found = expression_at(&session.resolver(), ids[0], position, &Expr::ident("f").call(vec![]));
    assert!(found.is_empty());
}

#[test]
fn test_static_array_length_is_folded() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "N", Some(TypeDecl::int()), Some(Expr::int(2)));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let length = Expr::binary(dsema_syntax::BinaryOp::Add, Expr::ident("N"), Expr::int(3));
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::static_array(TypeDecl::int(), length), &mut ctx).unwrap();
    assert_eq!(crate::common::render(&found), vec!["int[5]"]);
}
