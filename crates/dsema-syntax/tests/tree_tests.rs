use dsema_syntax::{DeclId, DeclKind, Expr, ExprKind, ModuleBuilder, TypeDecl};

#[test]
fn test_package_and_short_name() {
    let nested = ModuleBuilder::new("std.container.array").finish();
    assert_eq!(nested.package(), "std.container");
    assert_eq!(nested.short_name(), "array");

    let top = ModuleBuilder::new("app").finish();
    assert_eq!(top.package(), "");
    assert_eq!(top.short_name(), "app");
}

#[test]
fn test_innermost_scope_follows_nesting() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let outer = m.class_decl(root, "Outer");
    let method = m.function(outer, "method", Some(TypeDecl::void()));
    let mut inside = 0;
    m.body(method, |b| inside = b.mark());
    let after = m.mark(root);
    let module = m.finish();

    assert_eq!(module.innermost_scope_at(inside), method);
    assert_eq!(module.innermost_scope_at(after), DeclId::ROOT);
    assert_eq!(module.lookup_path("Outer.method"), Some(method));
    assert_eq!(module.lookup_path("Outer.missing"), None);
}

#[test]
fn test_ancestors_terminate_on_parent_cycles() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let a = m.struct_decl(root, "A");
    let b = m.struct_decl(a, "B");
    let mut module = m.finish();
    if let Some(decl) = module.decl_mut(a) {
        decl.parent = Some(b);
    }

    let visited: Vec<DeclId> = module.ancestors(b).collect();
    assert!(visited.len() <= module.len());
    assert_eq!(visited.first(), Some(&a));
}

#[test]
fn test_first_returned_expression_skips_null() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let f = m.function(root, "f", None);
    m.body(f, |b| {
        b.if_then(Expr::bool_lit(true), |then| then.ret(Some(Expr::null())));
        b.ret(Some(Expr::int(7)));
    });
    let module = m.finish();

    let Some(DeclKind::Function(function)) = module.decl(f).map(|d| &d.kind) else {
        panic!("`f` is a function");
    };
    let body = function.body.as_ref().expect("body was built");
    let returned = body.first_non_null_return().expect("a non-null return");
    assert!(matches!(returned.kind, ExprKind::Literal(_)));
    assert!(!returned.is_null_literal());
}

#[test]
fn test_statement_expressions_carry_their_position() {
    let mut m = ModuleBuilder::new("app");
    let root = m.root();
    let f = m.function(root, "f", Some(TypeDecl::void()));
    m.body(f, |b| b.expr(Expr::ident("target").dot("field").call(vec![Expr::int(1)])));
    let module = m.finish();

    let body = module.decl(f).and_then(|d| d.as_function()).and_then(|f| f.body.as_ref()).expect("body");
    let mut spans = Vec::new();
    body.walk_exprs(&mut |expr| spans.push(expr.span));
    assert_eq!(spans.len(), 4);
    assert!(spans.iter().all(|span| span.len() > 0));
}
