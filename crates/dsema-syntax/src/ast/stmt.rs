use super::common::{span_contains, DeclId};
use super::expr::Expr;
use miette::SourceSpan;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    /// Declares the listed locals (variables, imports, nested functions and types).
    Declaration(Vec<DeclId>),
    Expression(Expr),
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        variables: Vec<DeclId>,
        aggregate: Expr,
        upper: Option<Expr>,
        reverse: bool,
        body: Box<Stmt>,
    },
}

impl Block {
    pub fn contains(&self, offset: usize) -> bool {
        span_contains(self.span, offset)
    }

    /// First `return` statement in source order whose value is not the
    /// `null` literal, searched through nested statements.
    pub fn first_non_null_return(&self) -> Option<&Expr> {
        self.stmts.iter().find_map(Stmt::first_non_null_return)
    }

    /// Visits every expression in the block, in source order.
    pub fn walk_exprs<'b>(&'b self, visit: &mut dyn FnMut(&'b Expr)) {
        for stmt in &self.stmts {
            stmt.walk_exprs(visit);
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn first_non_null_return(&self) -> Option<&Expr> {
        match &self.kind {
            StmtKind::Return(Some(expr)) if !expr.is_null_literal() => Some(expr),
            StmtKind::Return(_) | StmtKind::Declaration(_) | StmtKind::Expression(_) => None,
            StmtKind::Block(block) => block.first_non_null_return(),
            StmtKind::If { then_branch, else_branch, .. } => then_branch
                .first_non_null_return()
                .or_else(|| else_branch.as_ref().and_then(|e| e.first_non_null_return())),
            StmtKind::While { body, .. } | StmtKind::For { body, .. } | StmtKind::Foreach { body, .. } => {
                body.first_non_null_return()
            }
        }
    }

    pub fn walk_exprs<'s>(&'s self, visit: &mut dyn FnMut(&'s Expr)) {
        match &self.kind {
            StmtKind::Block(block) => block.walk_exprs(visit),
            StmtKind::Declaration(_) => {}
            StmtKind::Expression(expr) => expr.walk(visit),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    expr.walk(visit);
                }
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                condition.walk(visit);
                then_branch.walk_exprs(visit);
                if let Some(else_branch) = else_branch {
                    else_branch.walk_exprs(visit);
                }
            }
            StmtKind::While { condition, body } => {
                condition.walk(visit);
                body.walk_exprs(visit);
            }
            StmtKind::For { init, condition, step, body } => {
                if let Some(init) = init {
                    init.walk_exprs(visit);
                }
                if let Some(condition) = condition {
                    condition.walk(visit);
                }
                if let Some(step) = step {
                    step.walk(visit);
                }
                body.walk_exprs(visit);
            }
            StmtKind::Foreach { aggregate, upper, body, .. } => {
                aggregate.walk(visit);
                if let Some(upper) = upper {
                    upper.walk(visit);
                }
                body.walk_exprs(visit);
            }
        }
    }
}
