//! Expression typing.

use dsema_syntax::{BinaryOp, DeclKind, DeclRef, Expr, ExprKind, IntSuffix, Literal, PrimitiveKind, Stmt, UnaryOp};

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::templates::TemplateEngine;
use crate::types::{AbstractKind, AbstractType, Origin};

impl Resolver {
    /// Resolves an expression to the type(s) of its value. Identifiers and
    /// member accesses keep their `Member` wrapper so callers can tell which
    /// symbol was hit; everything computed is a plain type.
    pub(crate) fn expr(&self, expr: &Expr, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        if ctx.is_cancelled() {
            return Vec::new();
        }
        let resolved = match &expr.kind {
            ExprKind::Identifier(name) => match PrimitiveKind::from_name(name) {
                Some(kind) => vec![AbstractType::primitive(kind)],
                None => {
                    let candidates = self.identifier(name, ctx);
                    TemplateEngine::new(self).resolve_bare(candidates, name, expr.span, ctx)
                }
            },
            ExprKind::TemplateInstance { name, args } => {
                let candidates = self.identifier(name, ctx);
                TemplateEngine::new(self).instantiate(candidates, name, args, expr.span, ctx)
            }
            ExprKind::Literal(literal) => vec![literal_type(literal)],
            ExprKind::ArrayLiteral(elements) => {
                // Typed after the first element only.
                let element = match elements.first() {
                    Some(first) => self.value_types(first, ctx).into_iter().next(),
                    None => Some(AbstractType::void()),
                };
                element.map(AbstractType::array).into_iter().collect()
            }
            ExprKind::AssocArrayLiteral(pairs) => {
                let Some((key, value)) = pairs.first() else { return Vec::new() };
                let key = self.value_types(key, ctx).into_iter().next();
                let value = self.value_types(value, ctx).into_iter().next();
                match (key, value) {
                    (Some(key), Some(value)) => vec![AbstractType::new(AbstractKind::AssocArray {
                        key: Box::new(key),
                        value: Box::new(value),
                    })],
                    _ => Vec::new(),
                }
            }
            ExprKind::Member { base, name, template_args } => {
                let bases = self.expr(base, ctx);
                let members = self.member_lookup(&bases, name, ctx, true);
                let engine = TemplateEngine::new(self);
                match template_args {
                    Some(args) => engine.instantiate(members, name, args, expr.span, ctx),
                    None => engine.resolve_bare(members, name, expr.span, ctx),
                }
            }
            ExprKind::Call { callee, args } => self.call(callee, args, expr.span, ctx),
            ExprKind::Index { base, args } => self.index_expr(base, args, expr.span, ctx),
            ExprKind::Slice { base, .. } => self
                .value_types(base, ctx)
                .into_iter()
                .map(|ty| match ty.kind {
                    AbstractKind::Array { element, .. } => AbstractType::new(AbstractKind::Array { element, length: None }),
                    AbstractKind::Pointer(pointee) => AbstractType::array(*pointee),
                    _ => ty,
                })
                .collect(),
            ExprKind::Unary { op, operand } => self.unary(*op, operand, ctx),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, ctx),
            // The true branch decides; the other is not unified.
            ExprKind::Conditional { then_branch, .. } => self.value_types(then_branch, ctx),
            ExprKind::New { ty, .. } => self.type_decl(ty, ctx),
            ExprKind::Cast { ty: Some(ty), .. } => self.type_decl(ty, ctx),
            ExprKind::Cast { ty: None, operand } => self.value_types(operand, ctx),
            ExprKind::Type(ty) => self.type_decl(ty, ctx),
            ExprKind::This => self.this_type(ctx).into_iter().collect(),
            ExprKind::Super => self
                .this_type(ctx)
                .and_then(|this| this.base_class().cloned())
                .into_iter()
                .collect(),
            ExprKind::Lambda { params, body } => self.lambda_type(params, body, ctx).into_iter().collect(),
        };
        resolved
            .into_iter()
            .map(|ty| match ty.origin {
                Some(_) => ty,
                None => ty.with_origin(Origin::Span(expr.span)),
            })
            .collect()
    }

    /// Like [`Self::expr`] with symbol and alias wrappers stripped.
    pub(crate) fn value_types(&self, expr: &Expr, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        self.expr(expr, ctx).iter().filter_map(|ty| ty.strip().cloned()).collect()
    }

    fn unary(&self, op: UnaryOp, operand: &Expr, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let operands = self.value_types(operand, ctx);
        match op {
            UnaryOp::Not => vec![AbstractType::bool()],
            UnaryOp::AddressOf => operands.into_iter().map(AbstractType::pointer).collect(),
            UnaryOp::Deref => operands
                .into_iter()
                .filter_map(|ty| match ty.kind {
                    AbstractKind::Pointer(pointee) => Some(*pointee),
                    AbstractKind::Array { element, .. } => Some(*element),
                    _ => None,
                })
                .collect(),
            UnaryOp::Negate
            | UnaryOp::Plus
            | UnaryOp::Complement
            | UnaryOp::PreIncrement
            | UnaryOp::PreDecrement
            | UnaryOp::PostIncrement
            | UnaryOp::PostDecrement => operands,
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        if op.yields_bool() {
            return vec![AbstractType::bool()];
        }
        if op == BinaryOp::In {
            return self
                .value_types(rhs, ctx)
                .into_iter()
                .filter_map(|ty| match ty.kind {
                    AbstractKind::AssocArray { value, .. } => Some(*value),
                    AbstractKind::Array { element, .. } => Some(*element),
                    _ => None,
                })
                .collect();
        }
        // Assignments, arithmetic and concatenation take the left operand's type.
        self.value_types(lhs, ctx)
    }

    fn index_expr(
        &self,
        base: &Expr,
        args: &[Expr],
        span: miette::SourceSpan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        let mut results = Vec::new();
        for ty in self.value_types(base, ctx) {
            match &ty.kind {
                AbstractKind::Array { element, .. } => results.push((**element).clone()),
                AbstractKind::AssocArray { value, .. } => results.push((**value).clone()),
                AbstractKind::Pointer(pointee) => results.push((**pointee).clone()),
                _ if ty.is_aggregate() => results.extend(self.call_operator(&ty, "opIndex", args, span, ctx)),
                _ => {}
            }
        }
        results
    }

    /// The aggregate the current scope is nested in, if any.
    fn this_type(&self, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        let scope = ctx.scope();
        let module = self.index.module(scope.module)?;
        let aggregate = std::iter::once(scope.decl)
            .chain(module.ancestors(scope.decl))
            .find(|id| module.decl(*id).is_some_and(|d| matches!(d.kind, DeclKind::Aggregate(_))))?;
        self.aggregate_type(DeclRef::new(scope.module, aggregate), ctx)
    }

    fn lambda_type(&self, params: &[dsema_syntax::TypeDecl], body: &Stmt, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        let params = params.iter().filter_map(|p| self.type_decl(p, ctx).into_iter().next()).collect();
        let return_type = match body.first_non_null_return() {
            Some(expr) => self.value_types(expr, ctx).into_iter().next()?,
            None => AbstractType::void(),
        };
        Some(AbstractType::new(AbstractKind::Delegate {
            return_type: Box::new(return_type),
            params,
            is_literal: true,
            is_function: false,
        }))
    }
}

/// The type a literal has on its own.
pub(crate) fn literal_type(literal: &Literal) -> AbstractType {
    let kind = match literal {
        Literal::Int { suffix: IntSuffix::None, .. } => PrimitiveKind::Int,
        Literal::Int { suffix: IntSuffix::Long, .. } => PrimitiveKind::Long,
        Literal::Int { suffix: IntSuffix::Unsigned, .. } => PrimitiveKind::Uint,
        Literal::Int { suffix: IntSuffix::UnsignedLong, .. } => PrimitiveKind::Ulong,
        Literal::Float { is_single: true, .. } => PrimitiveKind::Float,
        Literal::Float { is_single: false, .. } => PrimitiveKind::Double,
        Literal::Char(_) => PrimitiveKind::Char,
        Literal::Bool(_) => PrimitiveKind::Bool,
        Literal::String(_) => return AbstractType::string(),
        Literal::Null => return AbstractType::pointer(AbstractType::void()),
    };
    AbstractType::primitive(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn literal_suffixes_pick_the_type() {
        let rendered: Vec<String> = [
            Literal::Int { value: 1, suffix: IntSuffix::None },
            Literal::Int { value: 1, suffix: IntSuffix::Long },
            Literal::Int { value: 1, suffix: IntSuffix::Unsigned },
            Literal::Int { value: 1, suffix: IntSuffix::UnsignedLong },
            Literal::Float { value: 1.0, is_single: true },
            Literal::Float { value: 1.0, is_single: false },
            Literal::String("s".into()),
            Literal::Null,
        ]
        .iter()
        .map(|l| literal_type(l).to_string())
        .collect();
        expect!["int long uint ulong float double char[] void*"].assert_eq(&rendered.join(" "));
    }
}
