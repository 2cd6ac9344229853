use crate::common::{expression_at, render, session_with};
use dsema_resolve::{same_type, AbstractKind, AbstractType, ResolutionDiagnostic};
use dsema_syntax::{DeclRef, Expr, ModuleBuilder, PrimitiveKind, TemplateArg, TemplateParamKind, TypeDecl};

fn type_arg(ty: TypeDecl) -> TemplateArg {
    TemplateArg::Type(ty)
}

#[test]
fn test_most_specialized_template_wins() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let general = m.struct_decl(root, "Foo");
    m.type_parameter(general, "T");
    let special = m.struct_decl(root, "Foo");
    m.specialized_type_parameter(special, "T", TypeDecl::int());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();

    let mut ctx = resolver.context_at(ids[0], 0);
    let ints = resolver.resolve_type(&TypeDecl::instance("Foo", vec![type_arg(TypeDecl::int())]), &mut ctx).unwrap();
    assert_eq!(ints.len(), 1);
    assert_eq!(ints[0].declaration(), Some(DeclRef::new(ids[0], special)));
    assert_eq!(ints[0].to_string(), "Foo!(int)");
    assert!(ctx.diagnostics().is_empty());

    let double = TypeDecl::primitive(PrimitiveKind::Double);
    let mut ctx = resolver.context_at(ids[0], 0);
    let doubles = resolver.resolve_type(&TypeDecl::instance("Foo", vec![type_arg(double)]), &mut ctx).unwrap();
    assert_eq!(doubles.len(), 1);
    assert_eq!(doubles[0].declaration(), Some(DeclRef::new(ids[0], general)));
    assert_eq!(doubles[0].to_string(), "Foo!(double)");
}

#[test]
fn test_equally_specialized_candidates_are_ambiguous() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    for _ in 0..2 {
        let bar = m.struct_decl(root, "Bar");
        m.type_parameter(bar, "T");
    }

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::instance("Bar", vec![type_arg(TypeDecl::int())]), &mut ctx).unwrap();

    assert_eq!(render(&found), vec!["Bar!(int)", "Bar!(int)"]);
    assert!(ctx
        .diagnostics()
        .iter()
        .any(|d| matches!(d, ResolutionDiagnostic::AmbiguousOverload { name, count: 2, .. } if name == "Bar")));
}

#[test]
fn test_specialization_pattern_binds_inner_parameters() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let elem = m.struct_decl(root, "Elem");
    m.specialized_type_parameter(elem, "T", TypeDecl::array(TypeDecl::ident("E")));
    m.type_parameter(elem, "E");
    m.alias(elem, "Element", TypeDecl::ident("E"));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();

    let int_array = TypeDecl::instance("Elem", vec![type_arg(TypeDecl::array(TypeDecl::int()))]);
    let mut ctx = resolver.context_at(ids[0], 0);
    let element = resolver.resolve_type(&TypeDecl::qualified(int_array, "Element"), &mut ctx).unwrap();
    assert_eq!(render(&element), vec!["int"]);

    // `int` does not match `E[]`.
    let mut ctx = resolver.context_at(ids[0], 0);
    let rejected = resolver.resolve_type(&TypeDecl::instance("Elem", vec![type_arg(TypeDecl::int())]), &mut ctx).unwrap();
    assert!(rejected.is_empty());
}

#[test]
fn test_function_template_deduces_from_call_arguments() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let identity = m.function(root, "identity", Some(TypeDecl::ident("T")));
    m.type_parameter(identity, "T");
    m.parameter(identity, "value", TypeDecl::ident("T"));
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let int_call = Expr::ident("identity").call(vec![Expr::int(1)]);
    assert_eq!(expression_at(&resolver, ids[0], position, &int_call), vec!["int"]);
    let bool_call = Expr::ident("identity").call(vec![Expr::bool_lit(true)]);
    assert_eq!(expression_at(&resolver, ids[0], position, &bool_call), vec!["bool"]);
}

#[test]
fn test_explicit_arguments_override_deduction() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let make = m.function(root, "make", Some(TypeDecl::array(TypeDecl::ident("T"))));
    m.type_parameter(make, "T");
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let call = Expr::template_instance("make", vec![type_arg(TypeDecl::bool())]).call(vec![]);
    assert_eq!(expression_at(&session.resolver(), ids[0], position, &call), vec!["bool[]"]);
}

#[test]
fn test_value_parameters_accept_constants() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let vector = m.struct_decl(root, "Vector");
    m.value_parameter(vector, "N", TypeDecl::int());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let sum = Expr::binary(dsema_syntax::BinaryOp::Add, Expr::int(1), Expr::int(2));
    let found = resolver.resolve_type(&TypeDecl::instance("Vector", vec![TemplateArg::Value(sum)]), &mut ctx).unwrap();
    assert_eq!(render(&found), vec!["Vector!(3)"]);
}

#[test]
fn test_eponymous_template_stands_for_its_member() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let wrap = m.template_decl(root, "ArrayOf");
    m.type_parameter(wrap, "T");
    m.alias(wrap, "ArrayOf", TypeDecl::array(TypeDecl::ident("T")));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::instance("ArrayOf", vec![type_arg(TypeDecl::int())]), &mut ctx).unwrap();
    assert_eq!(render(&found), vec!["int[]"]);
}

/// `template ArrayOf(T = int) { alias ArrayOf = T[]; }`
fn defaulted_array_of(m: &mut ModuleBuilder) {
    let root = m.root();
    let wrap = m.template_decl(root, "ArrayOf");
    let default = TemplateParamKind::Type { specialization: None, default: Some(TypeDecl::int()) };
    m.template_parameter(wrap, "T", default, None);
    m.alias(wrap, "ArrayOf", TypeDecl::array(TypeDecl::ident("T")));
}

#[test]
fn test_bare_eponymous_reference_uses_defaults() {
    let mut m = ModuleBuilder::new("app");
    defaulted_array_of(&mut m);
    let root = m.root();
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| {
        b.var("v", Some(TypeDecl::ident("ArrayOf")), None);
        position = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let bare = resolver.resolve_type(&TypeDecl::ident("ArrayOf"), &mut ctx).unwrap();
    assert_eq!(render(&bare), vec!["int[]"]);
    assert!(matches!(bare[0].strip().map(|t| &t.kind), Some(AbstractKind::Array { .. })));

    let length = Expr::ident("v").dot("length");
    let mut ctx = resolver.context_at(ids[0], position);
    let found = resolver.resolve_expression(&length, &mut ctx).unwrap();
    assert_eq!(found.len(), 1);
    assert!(same_type(found[0].strip().expect("typed"), &AbstractType::size_t()));
}

#[test]
fn test_bare_eponymous_reference_without_defaults_stays_a_template() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let wrap = m.template_decl(root, "ArrayOf");
    m.type_parameter(wrap, "T");
    m.alias(wrap, "ArrayOf", TypeDecl::array(TypeDecl::ident("T")));

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let bare = resolver.resolve_type(&TypeDecl::ident("ArrayOf"), &mut ctx).unwrap();
    assert_eq!(bare.len(), 1);
    assert!(matches!(bare[0].kind, AbstractKind::Template(_)));
}

#[test]
fn test_empty_instantiation_needs_every_parameter_bound() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let foo = m.struct_decl(root, "Foo");
    m.type_parameter(foo, "T");

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let found = resolver.resolve_type(&TypeDecl::instance("Foo", vec![]), &mut ctx).unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_default_type_argument_binds_when_omitted() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let boxed = m.struct_decl(root, "Box");
    let default = TemplateParamKind::Type { specialization: None, default: Some(TypeDecl::int()) };
    m.template_parameter(boxed, "T", default, None);

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let mut ctx = resolver.context_at(ids[0], 0);
    let defaulted = resolver.resolve_type(&TypeDecl::instance("Box", vec![]), &mut ctx).unwrap();
    assert_eq!(render(&defaulted), vec!["Box!(int)"]);

    let mut ctx = resolver.context_at(ids[0], 0);
    let explicit = resolver.resolve_type(&TypeDecl::instance("Box", vec![type_arg(TypeDecl::bool())]), &mut ctx).unwrap();
    assert_eq!(render(&explicit), vec!["Box!(bool)"]);
}

#[test]
fn test_tuple_parameter_takes_the_remaining_arguments() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let first = m.function(root, "first", Some(TypeDecl::ident("T")));
    m.type_parameter(first, "T");
    m.template_parameter(first, "Rest", TemplateParamKind::Tuple, None);
    m.parameter(first, "head", TypeDecl::ident("T"));
    m.parameter(first, "rest", TypeDecl::ident("Rest"));
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let call = Expr::ident("first").call(vec![Expr::bool_lit(true), Expr::int(1), Expr::float(2.0)]);
    assert_eq!(expression_at(&resolver, ids[0], position, &call), vec!["bool"]);
    let single = Expr::ident("first").call(vec![Expr::int(1)]);
    assert_eq!(expression_at(&resolver, ids[0], position, &single), vec!["int"]);
}

#[test]
fn test_this_parameter_binds_the_receiver() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let s = m.struct_decl(root, "S");
    let itself = m.function(s, "itself", Some(TypeDecl::ident("T")));
    m.template_parameter(itself, "T", TemplateParamKind::This, None);
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| {
        b.var("s", Some(TypeDecl::ident("S")), None);
        position = b.mark();
    });

    let (session, ids) = session_with(vec![m.finish()]);
    let call = Expr::ident("s").dot("itself").call(vec![]);
    assert_eq!(expression_at(&session.resolver(), ids[0], position, &call), vec!["S"]);
}

#[test]
fn test_alias_parameter_binds_symbols_not_primitives() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    m.variable(root, "counter", Some(TypeDecl::int()), None);
    let get = m.function(root, "get", Some(TypeDecl::typeof_expr(Expr::ident("value"))));
    let alias = TemplateParamKind::Alias { specialization: None, default: None };
    m.template_parameter(get, "value", alias, None);
    let main = m.function(root, "main", Some(TypeDecl::void()));
    let mut position = 0;
    m.body(main, |b| position = b.mark());

    let (session, ids) = session_with(vec![m.finish()]);
    let resolver = session.resolver();
    let symbol = Expr::template_instance("get", vec![type_arg(TypeDecl::ident("counter"))]).call(vec![]);
    assert_eq!(expression_at(&resolver, ids[0], position, &symbol), vec!["int"]);
    let primitive = Expr::template_instance("get", vec![type_arg(TypeDecl::int())]).call(vec![]);
    assert!(expression_at(&resolver, ids[0], position, &primitive).is_empty());
}
