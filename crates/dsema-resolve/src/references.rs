//! Reverse lookup: where a declaration is used.

use dsema_syntax::{DeclKind, DeclRef, Declaration, Expr, ExprKind, ModuleId};
use miette::SourceSpan;

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::types::AbstractType;

impl Resolver {
    /// Spans of every expression that resolves to `definition`, starting
    /// with the definition's own span.
    ///
    /// Scans function bodies, contracts and initializers of every cached
    /// module. Only expressions spelled like the definition are resolved.
    pub fn find_references(&self, definition: DeclRef) -> Vec<SourceSpan> {
        let Some(target) = self.index.decl(definition) else { return Vec::new() };
        let name = target.name.as_str();
        let mut spans = vec![target.span];

        for module in self.index.modules() {
            for (_, decl) in module.decls() {
                for expr in spelled_like(decl, name) {
                    if self.resolves_to(module.id, expr, definition) && !spans.contains(&expr.span) {
                        spans.push(expr.span);
                    }
                }
            }
        }
        log::debug!("{} reference(s) to `{name}`", spans.len() - 1);
        spans
    }

    fn resolves_to(&self, module: ModuleId, expr: &Expr, definition: DeclRef) -> bool {
        let mut ctx = ResolutionContext::at(&self.index, module, expr.span.offset());
        self.expr(expr, &mut ctx).iter().any(|ty| denotes(ty, definition))
    }
}

/// Expressions under `decl` that name `name` directly or as a member.
fn spelled_like<'d>(decl: &'d Declaration, name: &str) -> Vec<&'d Expr> {
    let mut found = Vec::new();
    let mut visit = |expr: &'d Expr| {
        let spelled = match &expr.kind {
            ExprKind::Identifier(n) | ExprKind::TemplateInstance { name: n, .. } | ExprKind::Member { name: n, .. } => n,
            _ => return,
        };
        if spelled == name {
            found.push(expr);
        }
    };
    match &decl.kind {
        DeclKind::Function(function) => {
            for block in [&function.in_contract, &function.body, &function.out_contract].into_iter().flatten() {
                block.walk_exprs(&mut visit);
            }
        }
        DeclKind::Variable(variable) => {
            if let Some(initializer) = &variable.initializer {
                initializer.walk(&mut visit);
            }
            if let Some(source) = &variable.iteration {
                source.aggregate.walk(&mut visit);
            }
        }
        DeclKind::Parameter(parameter) => {
            if let Some(default) = &parameter.default {
                default.walk(&mut visit);
            }
        }
        _ => {}
    }
    found
}

fn denotes(ty: &AbstractType, definition: DeclRef) -> bool {
    ty.declaration() == Some(definition) || ty.strip_aliases().and_then(AbstractType::declaration) == Some(definition)
}
