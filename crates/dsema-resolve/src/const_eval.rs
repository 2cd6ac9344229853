//! Folding of the constant expressions that appear as template arguments,
//! value-parameter specializations, static array lengths and enum members.

use dsema_syntax::{BinaryOp, DeclKind, DeclRef, Expr, ExprKind, Literal, UnaryOp};

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::types::{AbstractKind, AbstractType, ConstValue, SymbolRef, TemplateValue};

impl Resolver {
    /// Evaluates `expr` at compile time, or `None` if it is not a constant
    /// the engine can fold.
    pub fn evaluate_constant(&self, expr: &Expr, ctx: &mut ResolutionContext) -> Option<ConstValue> {
        self.evaluate_at_depth(expr, ctx, 0)
    }

    fn evaluate_at_depth(&self, expr: &Expr, ctx: &mut ResolutionContext, depth: u32) -> Option<ConstValue> {
        // Enum members may refer to each other; this bounds malformed chains.
        if depth > self.config.max_recursion_depth * 4 || ctx.is_cancelled() {
            return None;
        }
        match &expr.kind {
            ExprKind::Literal(literal) => Some(literal_value(literal)),
            ExprKind::Unary { op, operand } => {
                let value = self.evaluate_at_depth(operand, ctx, depth + 1)?;
                unary_value(*op, value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate_at_depth(lhs, ctx, depth + 1)?;
                let rhs = self.evaluate_at_depth(rhs, ctx, depth + 1)?;
                binary_value(*op, lhs, rhs)
            }
            ExprKind::Conditional { condition, then_branch, else_branch } => {
                match self.evaluate_at_depth(condition, ctx, depth + 1)? {
                    ConstValue::Bool(true) => self.evaluate_at_depth(then_branch, ctx, depth + 1),
                    ConstValue::Bool(false) => self.evaluate_at_depth(else_branch, ctx, depth + 1),
                    _ => None,
                }
            }
            ExprKind::Cast { operand, .. } => self.evaluate_at_depth(operand, ctx, depth + 1),
            ExprKind::Identifier(_) | ExprKind::Member { .. } => {
                let resolved = self.expr(expr, ctx);
                resolved.iter().find_map(|ty| self.constant_of(ty, ctx, depth + 1))
            }
            _ => None,
        }
    }

    /// The constant a resolved symbol stands for: a bound value parameter,
    /// an enum member, or a variable with a foldable initializer.
    pub(crate) fn constant_of(&self, ty: &AbstractType, ctx: &mut ResolutionContext, depth: u32) -> Option<ConstValue> {
        match &ty.kind {
            AbstractKind::TemplateParameter { value: Some(value), .. } => match value.as_ref() {
                TemplateValue::Value(constant, _) => Some(constant.clone()),
                TemplateValue::Symbol(symbol) => self.constant_of(symbol, ctx, depth + 1),
                _ => None,
            },
            AbstractKind::Aliased { base: Some(base), .. } => self.constant_of(base, ctx, depth + 1),
            AbstractKind::Member { symbol: SymbolRef::Decl(decl_ref), .. } => {
                let decl = self.index.decl(*decl_ref)?;
                match &decl.kind {
                    DeclKind::EnumMember(_) => self.enum_member_value(*decl_ref, ctx, depth),
                    DeclKind::Variable(variable) => {
                        let initializer = variable.initializer.as_ref()?;
                        let scope = self.enclosing_scope(*decl_ref);
                        let mut ctx = ctx.push_scope(scope, decl.span.offset());
                        self.evaluate_at_depth(initializer, &mut ctx, depth + 1)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Explicit initializer, or one past the previous member (zero for the
    /// first).
    fn enum_member_value(&self, member: DeclRef, ctx: &mut ResolutionContext, depth: u32) -> Option<ConstValue> {
        let enum_ref = self.index.parent(member)?;
        let enum_decl = self.index.decl(enum_ref)?;
        let scope = self.enclosing_scope(enum_ref);
        let mut ctx = ctx.push_scope(scope, enum_decl.span.offset());

        let mut next = ConstValue::Int(0);
        for &child in &enum_decl.children {
            let child_ref = DeclRef::new(member.module, child);
            let Some(child_decl) = self.index.decl(child_ref) else { continue };
            let DeclKind::EnumMember(initializer) = &child_decl.kind else { continue };
            let value = match initializer {
                Some(init) => self.evaluate_at_depth(init, &mut ctx, depth + 1)?,
                None => next.clone(),
            };
            if child_ref == member {
                return Some(value);
            }
            next = match &value {
                ConstValue::Int(v) => ConstValue::Int(v.checked_add(1)?),
                ConstValue::Char(c) => char::from_u32(*c as u32 + 1).map(ConstValue::Char)?,
                _ => return None,
            };
        }
        None
    }
}

fn literal_value(literal: &Literal) -> ConstValue {
    match literal {
        Literal::Int { value, .. } => ConstValue::Int(*value),
        Literal::Float { value, .. } => ConstValue::Float(*value),
        Literal::String(s) => ConstValue::Str(s.clone()),
        Literal::Char(c) => ConstValue::Char(*c),
        Literal::Bool(b) => ConstValue::Bool(*b),
        Literal::Null => ConstValue::Null,
    }
}

fn unary_value(op: UnaryOp, value: ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (UnaryOp::Plus, value) => Some(value),
        (UnaryOp::Negate, ConstValue::Int(v)) => v.checked_neg().map(ConstValue::Int),
        (UnaryOp::Negate, ConstValue::Float(v)) => Some(ConstValue::Float(-v)),
        (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (UnaryOp::Not, ConstValue::Int(v)) => Some(ConstValue::Bool(v == 0)),
        (UnaryOp::Complement, ConstValue::Int(v)) => Some(ConstValue::Int(!v)),
        _ => None,
    }
}

fn binary_value(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    let value = match (lhs, rhs) {
        (Int(a), Int(b)) => match op {
            BinaryOp::Add => Int(a.checked_add(b)?),
            BinaryOp::Sub => Int(a.checked_sub(b)?),
            BinaryOp::Mul => Int(a.checked_mul(b)?),
            BinaryOp::Div => Int(a.checked_div(b)?),
            BinaryOp::Mod => Int(a.checked_rem(b)?),
            BinaryOp::Pow => Int(a.checked_pow(u32::try_from(b).ok()?)?),
            BinaryOp::BitAnd => Int(a & b),
            BinaryOp::BitOr => Int(a | b),
            BinaryOp::BitXor => Int(a ^ b),
            BinaryOp::Shl => Int(a.checked_shl(u32::try_from(b).ok()?)?),
            BinaryOp::Shr => Int(a.checked_shr(u32::try_from(b).ok()?)?),
            _ => return compare(op, a.partial_cmp(&b)?),
        },
        (Float(a), Float(b)) => float_value(op, a, b)?,
        (Int(a), Float(b)) => float_value(op, a as f64, b)?,
        (Float(a), Int(b)) => float_value(op, a, b as f64)?,
        (Bool(a), Bool(b)) => match op {
            BinaryOp::LogicalAnd => Bool(a && b),
            BinaryOp::LogicalOr => Bool(a || b),
            BinaryOp::Equal | BinaryOp::Identity => Bool(a == b),
            BinaryOp::NotEqual | BinaryOp::NotIdentity => Bool(a != b),
            _ => return None,
        },
        (Str(a), Str(b)) => match op {
            BinaryOp::Concat => Str(a + &b),
            _ => return compare(op, a.cmp(&b)),
        },
        (Char(a), Char(b)) => compare(op, a.cmp(&b))?,
        _ => return None,
    };
    Some(value)
}

fn float_value(op: BinaryOp, a: f64, b: f64) -> Option<ConstValue> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => return compare(op, a.partial_cmp(&b)?),
    };
    Some(ConstValue::Float(value))
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> Option<ConstValue> {
    use std::cmp::Ordering::*;
    let result = match op {
        BinaryOp::Equal | BinaryOp::Identity => ordering == Equal,
        BinaryOp::NotEqual | BinaryOp::NotIdentity => ordering != Equal,
        BinaryOp::Less => ordering == Less,
        BinaryOp::LessEqual => ordering != Greater,
        BinaryOp::Greater => ordering == Greater,
        BinaryOp::GreaterEqual => ordering != Less,
        _ => return None,
    };
    Some(ConstValue::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_folding_is_checked() {
        assert_eq!(binary_value(BinaryOp::Mul, ConstValue::Int(6), ConstValue::Int(7)), Some(ConstValue::Int(42)));
        assert_eq!(binary_value(BinaryOp::Div, ConstValue::Int(1), ConstValue::Int(0)), None);
        assert_eq!(binary_value(BinaryOp::Less, ConstValue::Int(1), ConstValue::Int(2)), Some(ConstValue::Bool(true)));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(
            binary_value(BinaryOp::Add, ConstValue::Int(1), ConstValue::Float(0.5)),
            Some(ConstValue::Float(1.5))
        );
    }

    #[test]
    fn strings_concatenate() {
        assert_eq!(
            binary_value(BinaryOp::Concat, ConstValue::Str("ab".into()), ConstValue::Str("c".into())),
            Some(ConstValue::Str("abc".into()))
        );
    }

    #[test]
    fn unary_operators_fold() {
        assert_eq!(unary_value(UnaryOp::Negate, ConstValue::Int(3)), Some(ConstValue::Int(-3)));
        assert_eq!(unary_value(UnaryOp::Not, ConstValue::Bool(false)), Some(ConstValue::Bool(true)));
        assert_eq!(unary_value(UnaryOp::Complement, ConstValue::Str("x".into())), None);
    }
}
