//! Programmatic module construction.
//!
//! The builder hands out monotonically increasing source offsets, one per
//! node, and widens every enclosing declaration so that containers always
//! cover their contents. Positions for resolution queries are obtained with
//! [`BlockBuilder::mark`] / [`ModuleBuilder::mark`].

use crate::ast::*;
use crate::module::Module;
use miette::SourceSpan;

pub struct ModuleBuilder {
    module: Module,
    cursor: usize,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self { module: Module::new(name), cursor: 1 }
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.module.file = Some(file.to_string());
        self
    }

    pub fn root(&self) -> DeclId {
        DeclId::ROOT
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Reserves a fresh offset inside `owner`, widening it and its ancestors.
    fn slot(&mut self, owner: DeclId) -> SourceSpan {
        let span = SourceSpan::from((self.cursor, 1usize));
        self.cursor += 1;
        self.widen(owner, self.cursor);
        span
    }

    fn widen(&mut self, from: DeclId, end: usize) {
        let mut current = Some(from);
        let mut budget = self.module.len();
        while let Some(id) = current {
            if budget == 0 || id == DeclId::ROOT {
                break;
            }
            budget -= 1;
            let Some(decl) = self.module.decl_mut(id) else { break };
            let start = decl.span.offset();
            if span_end(decl.span) < end {
                decl.span = SourceSpan::from((start, end - start));
            }
            current = decl.parent;
        }
    }

    /// A query position inside `owner`, after everything declared so far.
    pub fn mark(&mut self, owner: DeclId) -> usize {
        self.slot(owner).offset()
    }

    /// Allocates a declaration of any kind under `parent`.
    pub fn declare(&mut self, parent: DeclId, name: &str, kind: DeclKind, ty: Option<TypeDecl>) -> DeclId {
        let span = self.slot(parent);
        let mut decl = Declaration::new(name, kind, span);
        decl.parent = Some(parent);
        decl.ty = ty;
        self.module.alloc(decl)
    }

    pub fn variable(&mut self, parent: DeclId, name: &str, ty: Option<TypeDecl>, initializer: Option<Expr>) -> DeclId {
        self.declare(parent, name, DeclKind::Variable(VariableDecl { initializer, iteration: None }), ty)
    }

    pub fn alias(&mut self, parent: DeclId, name: &str, target: TypeDecl) -> DeclId {
        self.declare(parent, name, DeclKind::Alias, Some(target))
    }

    pub fn import(&mut self, parent: DeclId, module_name: &str) -> DeclId {
        self.import_with(parent, ImportDecl::new(module_name))
    }

    pub fn import_with(&mut self, parent: DeclId, import: ImportDecl) -> DeclId {
        let name = import.alias.clone().unwrap_or_default();
        self.declare(parent, &name, DeclKind::Import(import), None)
    }

    pub fn aggregate(&mut self, parent: DeclId, kind: AggregateKind, name: &str) -> DeclId {
        let aggregate = AggregateDecl { kind, base_classes: Vec::new(), template_params: Vec::new() };
        self.declare(parent, name, DeclKind::Aggregate(aggregate), None)
    }

    pub fn struct_decl(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.aggregate(parent, AggregateKind::Struct, name)
    }

    pub fn class_decl(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.aggregate(parent, AggregateKind::Class, name)
    }

    pub fn interface_decl(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.aggregate(parent, AggregateKind::Interface, name)
    }

    pub fn template_decl(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.aggregate(parent, AggregateKind::Template, name)
    }

    pub fn base_class(&mut self, aggregate: DeclId, base: TypeDecl) {
        if let Some(Declaration { kind: DeclKind::Aggregate(agg), .. }) = self.module.decl_mut(aggregate) {
            agg.base_classes.push(base);
        }
    }

    /// Declares a function; a missing return type makes it `auto`.
    pub fn function(&mut self, parent: DeclId, name: &str, return_type: Option<TypeDecl>) -> DeclId {
        let function = FunctionDecl { is_auto: return_type.is_none(), ..FunctionDecl::default() };
        self.declare(parent, name, DeclKind::Function(function), return_type)
    }

    pub fn parameter(&mut self, function: DeclId, name: &str, ty: TypeDecl) -> DeclId {
        self.parameter_with(function, name, ty, ParameterDecl::default())
    }

    pub fn parameter_with(&mut self, function: DeclId, name: &str, ty: TypeDecl, param: ParameterDecl) -> DeclId {
        let id = self.declare(function, name, DeclKind::Parameter(param), Some(ty));
        if let Some(Declaration { kind: DeclKind::Function(f), .. }) = self.module.decl_mut(function) {
            f.params.push(id);
        }
        id
    }

    /// Adds a template parameter to a function or aggregate. `value_type` is
    /// only meaningful for value parameters.
    pub fn template_parameter(
        &mut self,
        owner: DeclId,
        name: &str,
        kind: TemplateParamKind,
        value_type: Option<TypeDecl>,
    ) -> DeclId {
        let id = self.declare(owner, name, DeclKind::TemplateParameter(kind), value_type);
        match self.module.decl_mut(owner).map(|d| &mut d.kind) {
            Some(DeclKind::Function(f)) => f.template_params.push(id),
            Some(DeclKind::Aggregate(a)) => a.template_params.push(id),
            _ => {}
        }
        id
    }

    /// Unconstrained type parameter `T`.
    pub fn type_parameter(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.template_parameter(owner, name, TemplateParamKind::Type { specialization: None, default: None }, None)
    }

    /// Specialized type parameter `T : Pattern`.
    pub fn specialized_type_parameter(&mut self, owner: DeclId, name: &str, specialization: TypeDecl) -> DeclId {
        self.template_parameter(
            owner,
            name,
            TemplateParamKind::Type { specialization: Some(specialization), default: None },
            None,
        )
    }

    pub fn value_parameter(&mut self, owner: DeclId, name: &str, ty: TypeDecl) -> DeclId {
        self.template_parameter(owner, name, TemplateParamKind::Value { specialization: None, default: None }, Some(ty))
    }

    pub fn enumeration(&mut self, parent: DeclId, name: &str, base: Option<TypeDecl>) -> DeclId {
        self.declare(parent, name, DeclKind::Enum, base)
    }

    pub fn enum_member(&mut self, enumeration: DeclId, name: &str, initializer: Option<Expr>) -> DeclId {
        self.declare(enumeration, name, DeclKind::EnumMember(initializer), None)
    }

    pub fn set_visibility(&mut self, decl: DeclId, visibility: Visibility) {
        if let Some(decl) = self.module.decl_mut(decl) {
            decl.attributes.visibility = visibility;
        }
    }

    pub fn set_static(&mut self, decl: DeclId) {
        if let Some(decl) = self.module.decl_mut(decl) {
            decl.attributes.is_static = true;
        }
    }

    pub fn body(&mut self, function: DeclId, build: impl FnOnce(&mut BlockBuilder<'_>)) {
        let block = self.build_block(function, build);
        if let Some(Declaration { kind: DeclKind::Function(f), .. }) = self.module.decl_mut(function) {
            f.body = Some(block);
        }
    }

    pub fn in_contract(&mut self, function: DeclId, build: impl FnOnce(&mut BlockBuilder<'_>)) {
        let block = self.build_block(function, build);
        if let Some(Declaration { kind: DeclKind::Function(f), .. }) = self.module.decl_mut(function) {
            f.in_contract = Some(block);
        }
    }

    /// `out (result) { ... }`
    pub fn out_contract(&mut self, function: DeclId, result: Option<&str>, build: impl FnOnce(&mut BlockBuilder<'_>)) {
        let block = self.build_block(function, build);
        if let Some(Declaration { kind: DeclKind::Function(f), .. }) = self.module.decl_mut(function) {
            f.out_contract = Some(block);
            f.out_result = result.map(str::to_string);
        }
    }

    fn build_block(&mut self, owner: DeclId, build: impl FnOnce(&mut BlockBuilder<'_>)) -> Block {
        let mut block_builder = BlockBuilder::open(self, owner);
        build(&mut block_builder);
        block_builder.close()
    }

    pub fn finish(mut self) -> Module {
        let end = self.cursor + 1;
        if let Some(root) = self.module.decl_mut(DeclId::ROOT) {
            root.span = SourceSpan::from((0usize, end));
        }
        self.module
    }
}

/// Builds the statements of one block inside a function.
pub struct BlockBuilder<'b> {
    builder: &'b mut ModuleBuilder,
    owner: DeclId,
    stmts: Vec<Stmt>,
    start: usize,
}

impl<'b> BlockBuilder<'b> {
    fn open(builder: &'b mut ModuleBuilder, owner: DeclId) -> Self {
        let start = builder.slot(owner).offset();
        Self { builder, owner, stmts: Vec::new(), start }
    }

    fn close(self) -> Block {
        let end = span_end(self.builder.slot(self.owner));
        Block { stmts: self.stmts, span: SourceSpan::from((self.start, end - self.start)) }
    }

    /// The enclosing module builder, for declaring parameters or bodies of
    /// nested functions.
    pub fn module(&mut self) -> &mut ModuleBuilder {
        self.builder
    }

    pub fn owner(&self) -> DeclId {
        self.owner
    }

    /// A query position after every statement added so far.
    pub fn mark(&mut self) -> usize {
        self.builder.slot(self.owner).offset()
    }

    pub fn declare(&mut self, name: &str, kind: DeclKind, ty: Option<TypeDecl>) -> DeclId {
        let id = self.builder.declare(self.owner, name, kind, ty);
        let span = self.builder.module.decl(id).map(|d| d.span).unwrap_or_else(dummy_span);
        self.stmts.push(Stmt::new(StmtKind::Declaration(vec![id]), span));
        id
    }

    pub fn var(&mut self, name: &str, ty: Option<TypeDecl>, initializer: Option<Expr>) -> DeclId {
        self.declare(name, DeclKind::Variable(VariableDecl { initializer, iteration: None }), ty)
    }

    pub fn import(&mut self, module_name: &str) -> DeclId {
        self.import_with(ImportDecl::new(module_name))
    }

    pub fn import_with(&mut self, import: ImportDecl) -> DeclId {
        let name = import.alias.clone().unwrap_or_default();
        self.declare(&name, DeclKind::Import(import), None)
    }

    /// Declares a nested function; build its body through [`Self::module`].
    pub fn function(&mut self, name: &str, return_type: Option<TypeDecl>) -> DeclId {
        let function = FunctionDecl { is_auto: return_type.is_none(), ..FunctionDecl::default() };
        self.declare(name, DeclKind::Function(function), return_type)
    }

    pub fn expr(&mut self, mut expr: Expr) {
        let span = self.builder.slot(self.owner);
        expr.stamp(span);
        self.stmts.push(Stmt::new(StmtKind::Expression(expr), span));
    }

    pub fn ret(&mut self, expr: Option<Expr>) {
        let span = self.builder.slot(self.owner);
        let expr = expr.map(|mut e| {
            e.stamp(span);
            e
        });
        self.stmts.push(Stmt::new(StmtKind::Return(expr), span));
    }

    pub fn block(&mut self, build: impl FnOnce(&mut BlockBuilder<'_>)) {
        let mut inner = BlockBuilder::open(&mut *self.builder, self.owner);
        build(&mut inner);
        let block = inner.close();
        let span = block.span;
        self.stmts.push(Stmt::new(StmtKind::Block(block), span));
    }

    pub fn if_then(&mut self, condition: Expr, build: impl FnOnce(&mut BlockBuilder<'_>)) {
        let start = self.builder.slot(self.owner).offset();
        let mut inner = BlockBuilder::open(&mut *self.builder, self.owner);
        build(&mut inner);
        let block = inner.close();
        let end = span_end(block.span);
        let body_span = block.span;
        self.stmts.push(Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(Stmt::new(StmtKind::Block(block), body_span)),
                else_branch: None,
            },
            SourceSpan::from((start, end - start)),
        ));
    }

    /// `foreach (vars; aggregate) { ... }`, or `foreach (var; aggregate .. upper)`
    /// when `upper` is given. Returns the loop variables.
    pub fn foreach(
        &mut self,
        variables: &[(&str, Option<TypeDecl>)],
        aggregate: Expr,
        upper: Option<Expr>,
        build: impl FnOnce(&mut BlockBuilder<'_>),
    ) -> Vec<DeclId> {
        let start = self.builder.slot(self.owner).offset();
        let count = variables.len();
        let mut ids = Vec::with_capacity(count);
        for (index, (name, ty)) in variables.iter().enumerate() {
            let iteration = IterationSource {
                aggregate: aggregate.clone(),
                upper: upper.clone(),
                index,
                count,
                reverse: false,
            };
            let kind = DeclKind::Variable(VariableDecl { initializer: None, iteration: Some(iteration) });
            ids.push(self.builder.declare(self.owner, name, kind, ty.clone()));
        }
        let mut inner = BlockBuilder::open(&mut *self.builder, self.owner);
        build(&mut inner);
        let body = inner.close();
        let end = span_end(body.span);
        let body_span = body.span;
        self.stmts.push(Stmt::new(
            StmtKind::Foreach {
                variables: ids.clone(),
                aggregate,
                upper,
                reverse: false,
                body: Box::new(Stmt::new(StmtKind::Block(body), body_span)),
            },
            SourceSpan::from((start, end - start)),
        ));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_cover_their_contents() {
        let mut m = ModuleBuilder::new("m");
        let root = m.root();
        let f = m.function(root, "f", Some(TypeDecl::void()));
        let mut inside = 0;
        m.body(f, |b| {
            b.var("x", Some(TypeDecl::int()), None);
            inside = b.mark();
        });
        let module = m.finish();
        let f_decl = module.decl(f).unwrap();
        assert!(span_contains(f_decl.span, inside));
        assert_eq!(module.innermost_scope_at(inside), f);
    }

    #[test]
    fn foreach_variables_carry_their_source() {
        let mut m = ModuleBuilder::new("m");
        let root = m.root();
        let f = m.function(root, "f", Some(TypeDecl::void()));
        let mut vars = Vec::new();
        m.body(f, |b| {
            vars = b.foreach(&[("k", None), ("v", None)], Expr::ident("aa"), None, |_| {});
        });
        let module = m.finish();
        let Some(DeclKind::Variable(var)) = module.decl(vars[1]).map(|d| &d.kind) else {
            panic!("expected a variable");
        };
        let source = var.iteration.as_ref().unwrap();
        assert_eq!((source.index, source.count), (1, 2));
    }
}
