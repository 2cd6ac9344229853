use super::common::dummy_span;
use super::stmt::Stmt;
use super::types::{TemplateArg, TypeDecl};
use miette::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntSuffix {
    #[default]
    None,
    Long,
    Unsigned,
    UnsignedLong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: i128, suffix: IntSuffix },
    Float { value: f64, is_single: bool },
    String(String),
    Char(char),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    AddressOf,
    Deref,
    Negate,
    Plus,
    Not,
    Complement,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ConcatAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    Identity,
    NotIdentity,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::ModAssign
                | BinaryOp::ConcatAssign
                | BinaryOp::AndAssign
                | BinaryOp::OrAssign
                | BinaryOp::XorAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
        )
    }

    /// Operators whose result is always `bool`.
    pub fn yields_bool(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
                | BinaryOp::Identity
                | BinaryOp::NotIdentity
                | BinaryOp::NotIn
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),
    /// `name!(args)`
    TemplateInstance {
        name: String,
        args: Vec<TemplateArg>,
    },
    Literal(Literal),
    ArrayLiteral(Vec<Expr>),
    AssocArrayLiteral(Vec<(Expr, Expr)>),
    /// `base.name` or `base.name!(args)`
    Member {
        base: Box<Expr>,
        name: String,
        template_args: Option<Vec<TemplateArg>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        args: Vec<Expr>,
    },
    Slice {
        base: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    New {
        ty: TypeDecl,
        args: Vec<Expr>,
    },
    Cast {
        ty: Option<TypeDecl>,
        operand: Box<Expr>,
    },
    /// A type in expression position, e.g. `int.sizeof`.
    Type(TypeDecl),
    This,
    Super,
    /// Function literal; only parameter types are kept.
    Lambda {
        params: Vec<TypeDecl>,
        body: Box<Stmt>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    fn bare(kind: ExprKind) -> Self {
        Self::new(kind, dummy_span())
    }

    pub fn ident(name: &str) -> Self {
        Self::bare(ExprKind::Identifier(name.to_string()))
    }

    pub fn template_instance(name: &str, args: Vec<TemplateArg>) -> Self {
        Self::bare(ExprKind::TemplateInstance { name: name.to_string(), args })
    }

    pub fn int(value: i128) -> Self {
        Self::bare(ExprKind::Literal(Literal::Int { value, suffix: IntSuffix::None }))
    }

    pub fn int_with_suffix(value: i128, suffix: IntSuffix) -> Self {
        Self::bare(ExprKind::Literal(Literal::Int { value, suffix }))
    }

    pub fn float(value: f64) -> Self {
        Self::bare(ExprKind::Literal(Literal::Float { value, is_single: false }))
    }

    pub fn string(value: &str) -> Self {
        Self::bare(ExprKind::Literal(Literal::String(value.to_string())))
    }

    pub fn char_lit(value: char) -> Self {
        Self::bare(ExprKind::Literal(Literal::Char(value)))
    }

    pub fn bool_lit(value: bool) -> Self {
        Self::bare(ExprKind::Literal(Literal::Bool(value)))
    }

    pub fn null() -> Self {
        Self::bare(ExprKind::Literal(Literal::Null))
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Self::bare(ExprKind::ArrayLiteral(elements))
    }

    pub fn assoc_array(pairs: Vec<(Expr, Expr)>) -> Self {
        Self::bare(ExprKind::AssocArrayLiteral(pairs))
    }

    pub fn this() -> Self {
        Self::bare(ExprKind::This)
    }

    pub fn super_() -> Self {
        Self::bare(ExprKind::Super)
    }

    pub fn ty(ty: TypeDecl) -> Self {
        Self::bare(ExprKind::Type(ty))
    }

    pub fn new_object(ty: TypeDecl, args: Vec<Expr>) -> Self {
        Self::bare(ExprKind::New { ty, args })
    }

    pub fn cast(ty: Option<TypeDecl>, operand: Expr) -> Self {
        Self::bare(ExprKind::Cast { ty, operand: Box::new(operand) })
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::bare(ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::bare(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn conditional(condition: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Self::bare(ExprKind::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn lambda(params: Vec<TypeDecl>, body: Stmt) -> Self {
        Self::bare(ExprKind::Lambda { params, body: Box::new(body) })
    }

    /// `self.name`
    pub fn dot(self, name: &str) -> Self {
        Self::bare(ExprKind::Member { base: Box::new(self), name: name.to_string(), template_args: None })
    }

    /// `self.name!(args)`
    pub fn dot_instance(self, name: &str, args: Vec<TemplateArg>) -> Self {
        Self::bare(ExprKind::Member { base: Box::new(self), name: name.to_string(), template_args: Some(args) })
    }

    /// `self(args)`
    pub fn call(self, args: Vec<Expr>) -> Self {
        Self::bare(ExprKind::Call { callee: Box::new(self), args })
    }

    /// `self[args]`
    pub fn index(self, args: Vec<Expr>) -> Self {
        Self::bare(ExprKind::Index { base: Box::new(self), args })
    }

    /// `self[lower .. upper]`
    pub fn slice(self, lower: Option<Expr>, upper: Option<Expr>) -> Self {
        Self::bare(ExprKind::Slice { base: Box::new(self), lower: lower.map(Box::new), upper: upper.map(Box::new) })
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Literal::Null))
    }

    /// Visits this expression and every nested sub-expression, parents first.
    /// Lambda bodies are not entered.
    pub fn walk<'e>(&'e self, visit: &mut dyn FnMut(&'e Expr)) {
        visit(self);
        match &self.kind {
            ExprKind::Identifier(_)
            | ExprKind::TemplateInstance { .. }
            | ExprKind::Literal(_)
            | ExprKind::Type(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::Lambda { .. } => {}
            ExprKind::ArrayLiteral(elements) => elements.iter().for_each(|e| e.walk(visit)),
            ExprKind::AssocArrayLiteral(pairs) => {
                for (key, value) in pairs {
                    key.walk(visit);
                    value.walk(visit);
                }
            }
            ExprKind::Member { base, .. } => base.walk(visit),
            ExprKind::Call { callee, args } => {
                callee.walk(visit);
                args.iter().for_each(|a| a.walk(visit));
            }
            ExprKind::Index { base, args } => {
                base.walk(visit);
                args.iter().for_each(|a| a.walk(visit));
            }
            ExprKind::Slice { base, lower, upper } => {
                base.walk(visit);
                if let Some(lower) = lower {
                    lower.walk(visit);
                }
                if let Some(upper) = upper {
                    upper.walk(visit);
                }
            }
            ExprKind::Unary { operand, .. } => operand.walk(visit),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            ExprKind::Conditional { condition, then_branch, else_branch } => {
                condition.walk(visit);
                then_branch.walk(visit);
                else_branch.walk(visit);
            }
            ExprKind::New { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            ExprKind::Cast { operand, .. } => operand.walk(visit),
        }
    }

    /// Gives every span-less node in the tree the span `span`.
    pub fn stamp(&mut self, span: SourceSpan) {
        if self.span.len() == 0 {
            self.span = span;
        }
        match &mut self.kind {
            ExprKind::Identifier(_)
            | ExprKind::TemplateInstance { .. }
            | ExprKind::Literal(_)
            | ExprKind::Type(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::Lambda { .. } => {}
            ExprKind::ArrayLiteral(elements) => elements.iter_mut().for_each(|e| e.stamp(span)),
            ExprKind::AssocArrayLiteral(pairs) => {
                for (key, value) in pairs {
                    key.stamp(span);
                    value.stamp(span);
                }
            }
            ExprKind::Member { base, .. } => base.stamp(span),
            ExprKind::Call { callee, args } => {
                callee.stamp(span);
                args.iter_mut().for_each(|a| a.stamp(span));
            }
            ExprKind::Index { base, args } => {
                base.stamp(span);
                args.iter_mut().for_each(|a| a.stamp(span));
            }
            ExprKind::Slice { base, lower, upper } => {
                base.stamp(span);
                if let Some(lower) = lower {
                    lower.stamp(span);
                }
                if let Some(upper) = upper {
                    upper.stamp(span);
                }
            }
            ExprKind::Unary { operand, .. } => operand.stamp(span),
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.stamp(span);
                rhs.stamp(span);
            }
            ExprKind::Conditional { condition, then_branch, else_branch } => {
                condition.stamp(span);
                then_branch.stamp(span);
                else_branch.stamp(span);
            }
            ExprKind::New { args, .. } => args.iter_mut().for_each(|a| a.stamp(span)),
            ExprKind::Cast { operand, .. } => operand.stamp(span),
        }
    }
}
