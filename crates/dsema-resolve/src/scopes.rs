//! The Scope Walker: enumerates the symbols visible at a source position in
//! lexical precedence order.
//!
//! Levels, nearest first:
//!
//! 1. locals of the enclosing blocks declared before the position, innermost
//!    block first (foreach variables only inside the loop body);
//! 2. parameters and template parameters of the enclosing function, then for
//!    nested functions the parent function's locals, and so on outward;
//! 3. members and template parameters of an enclosing aggregate, then the
//!    static or non-private members of each base class;
//! 4. the module's own symbols, then everything its imports bring in (a
//!    single level), with the object module appended;
//! 5. pseudo-symbols: the compile-time-evaluation flag and, inside an `out`
//!    contract, the named result.
//!
//! Name lookups and full enumeration share one traversal driven by a
//! [`ControlFlow`] callback.

use dsema_syntax::{span_contains, DeclId, DeclKind, DeclRef, Declaration, ImportDecl, ModuleId, Stmt, StmtKind};
use fxhash::FxHashSet;
use std::collections::VecDeque;
use std::ops::{BitOr, ControlFlow};

use crate::context::{ResolutionContext, ResolutionOptions};
use crate::core::Resolver;
use crate::error::ResolutionDiagnostic;
use crate::types::{AbstractKind, AbstractType, SymbolRef, SyntheticKind};

/// Which kinds of symbols a walk reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberFilter(u16);

impl MemberFilter {
    pub const VARIABLES: MemberFilter = MemberFilter(1 << 0);
    pub const FUNCTIONS: MemberFilter = MemberFilter(1 << 1);
    pub const TYPES: MemberFilter = MemberFilter(1 << 2);
    pub const TEMPLATES: MemberFilter = MemberFilter(1 << 3);
    pub const ENUM_MEMBERS: MemberFilter = MemberFilter(1 << 4);
    pub const IMPORTS: MemberFilter = MemberFilter(1 << 5);
    pub const TEMPLATE_PARAMETERS: MemberFilter = MemberFilter(1 << 6);
    /// Compiler-provided pseudo-symbols.
    pub const KEYWORD_SYMBOLS: MemberFilter = MemberFilter(1 << 7);
    pub const ALL: MemberFilter = MemberFilter(0xff);

    pub fn contains(self, other: MemberFilter) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: MemberFilter) -> bool {
        self.0 & other.0 != 0
    }

    /// The category a declaration falls into.
    pub fn of(decl: &Declaration) -> MemberFilter {
        match &decl.kind {
            DeclKind::Variable(_) | DeclKind::Parameter(_) => Self::VARIABLES,
            DeclKind::Function(_) => Self::FUNCTIONS,
            DeclKind::Aggregate(aggregate) if aggregate.kind == dsema_syntax::AggregateKind::Template => Self::TEMPLATES,
            DeclKind::Aggregate(_) | DeclKind::Enum | DeclKind::Alias => Self::TYPES,
            DeclKind::EnumMember(_) => Self::ENUM_MEMBERS,
            DeclKind::Import(_) | DeclKind::Module => Self::IMPORTS,
            DeclKind::TemplateParameter(_) => Self::TEMPLATE_PARAMETERS,
        }
    }
}

impl BitOr for MemberFilter {
    type Output = MemberFilter;

    fn bitor(self, rhs: MemberFilter) -> MemberFilter {
        MemberFilter(self.0 | rhs.0)
    }
}

/// Traversal state shared by every level of one walk.
struct Walk<'a, 'v> {
    name: Option<&'a str>,
    filter: MemberFilter,
    options: ResolutionOptions,
    visitor: &'v mut dyn FnMut(&SymbolRef) -> ControlFlow<()>,
    stopped: bool,
    level_hits: usize,
    /// Scope frames already walked.
    scopes: FxHashSet<DeclRef>,
    /// Modules whose symbols were already offered through imports.
    modules: FxHashSet<ModuleId>,
    emitted: FxHashSet<SymbolRef>,
}

impl<'a, 'v> Walk<'a, 'v> {
    fn new(
        name: Option<&'a str>,
        filter: MemberFilter,
        options: ResolutionOptions,
        visitor: &'v mut dyn FnMut(&SymbolRef) -> ControlFlow<()>,
    ) -> Self {
        Self {
            name,
            filter,
            options,
            visitor,
            stopped: false,
            level_hits: 0,
            scopes: FxHashSet::default(),
            modules: FxHashSet::default(),
            emitted: FxHashSet::default(),
        }
    }

    fn offer(&mut self, symbol: SymbolRef, visible_name: &str, category: MemberFilter) {
        if self.stopped || visible_name.is_empty() || !self.filter.intersects(category) {
            return;
        }
        if self.name.is_some_and(|name| name != visible_name) {
            return;
        }
        if !self.emitted.insert(symbol.clone()) {
            return;
        }
        self.level_hits += 1;
        if (self.visitor)(&symbol).is_break() || self.options.stop_after_first_match && self.name.is_some() {
            self.stopped = true;
        }
    }

    /// Closes a level. Returns `false` once the walk should stop.
    fn end_level(&mut self) -> bool {
        if self.options.stop_after_first_overload_set && self.level_hits > 0 {
            self.stopped = true;
        }
        self.level_hits = 0;
        !self.stopped
    }
}

pub struct ScopeWalker<'r> {
    resolver: &'r Resolver,
}

impl<'r> ScopeWalker<'r> {
    pub fn new(resolver: &'r Resolver) -> Self {
        Self { resolver }
    }

    /// Every symbol visible at `position` that passes `filter`, nearest first.
    pub fn enumerate(&self, ctx: &mut ResolutionContext, position: usize, filter: MemberFilter) -> Vec<SymbolRef> {
        let mut symbols = Vec::new();
        self.walk(ctx, position, filter, None, &mut |symbol| {
            symbols.push(symbol.clone());
            ControlFlow::Continue(())
        });
        symbols
    }

    /// Symbols named `name` visible at `position`, honouring the early-exit
    /// options of the current frame.
    pub fn find_by_name(&self, ctx: &mut ResolutionContext, position: usize, name: &str) -> Vec<SymbolRef> {
        let mut symbols = Vec::new();
        self.walk(ctx, position, MemberFilter::ALL, Some(name), &mut |symbol| {
            symbols.push(symbol.clone());
            ControlFlow::Continue(())
        });
        symbols
    }

    /// Walks outward from the current frame's scope, calling `visitor` for
    /// every symbol that matches `filter` and `name`. The visitor stops the
    /// walk by returning [`ControlFlow::Break`].
    pub fn walk(
        &self,
        ctx: &mut ResolutionContext,
        position: usize,
        filter: MemberFilter,
        name: Option<&str>,
        visitor: &mut dyn FnMut(&SymbolRef) -> ControlFlow<()>,
    ) {
        let index = &self.resolver.index;
        let start = ctx.scope();
        let mut walk = Walk::new(name, filter, ctx.options(), visitor);

        let mut current = Some(start);
        let mut position = position;
        let mut out_contract_of = None;
        let mut module_walked = false;
        let mut budget = index.module(start.module).map_or(0, |m| m.len());

        while let Some(scope) = current {
            if walk.stopped || budget == 0 {
                break;
            }
            budget -= 1;
            if ctx.is_cancelled() {
                log::debug!("scope walk from {start} cancelled");
                return;
            }
            if !walk.scopes.insert(scope) {
                break;
            }
            let Some(decl) = index.decl(scope) else { break };
            match &decl.kind {
                DeclKind::Function(function) => {
                    let in_out_contract = function.out_contract.as_ref().is_some_and(|c| c.contains(position));
                    if out_contract_of.is_none() && in_out_contract {
                        out_contract_of = Some((scope, function.out_result.clone()));
                    }
                    self.walk_function(ctx, &mut walk, scope, function, position);
                }
                DeclKind::Aggregate(_) => self.walk_aggregate(ctx, &mut walk, scope, decl),
                DeclKind::Module => {
                    self.walk_module(ctx, &mut walk, scope.module);
                    module_walked = true;
                }
                _ => {}
            }
            position = decl.span.offset();
            current = decl.parent.map(|parent| DeclRef::new(scope.module, parent));
        }

        if !module_walked && !walk.stopped && !ctx.is_cancelled() {
            self.walk_module(ctx, &mut walk, start.module);
        }
        if walk.stopped || ctx.is_cancelled() {
            return;
        }

        if let Some((function, Some(result))) = out_contract_of {
            let symbol = SymbolRef::synthetic(&result, SyntheticKind::ResultVariable { function });
            walk.offer(symbol, &result, MemberFilter::VARIABLES);
        }
        let ctfe = &self.resolver.config.ctfe_symbol;
        walk.offer(SymbolRef::synthetic(ctfe, SyntheticKind::CtfeFlag), ctfe, MemberFilter::KEYWORD_SYMBOLS);
        walk.end_level();
    }

    /// Members of an aggregate, enum or module type, as seen through member
    /// access. With a name, lookup stops at the nearest level that has it.
    pub fn type_members(
        &self,
        ctx: &mut ResolutionContext,
        ty: &AbstractType,
        name: Option<&str>,
        filter: MemberFilter,
    ) -> Vec<SymbolRef> {
        let index = &self.resolver.index;
        let mut symbols = Vec::new();
        let mut visitor = |symbol: &SymbolRef| {
            symbols.push(symbol.clone());
            ControlFlow::Continue(())
        };
        let options = ResolutionOptions { stop_after_first_overload_set: name.is_some(), ..ctx.options() };
        let mut walk = Walk::new(name, filter, options, &mut visitor);

        match &ty.kind {
            AbstractKind::Struct(_)
            | AbstractKind::Union(_)
            | AbstractKind::Class { .. }
            | AbstractKind::Interface { .. }
            | AbstractKind::Template(_) => {
                let Some(decl_ref) = ty.declaration() else { return Vec::new() };
                let Some(decl) = index.decl(decl_ref) else { return Vec::new() };
                walk.scopes.insert(decl_ref);
                for &child in &decl.children {
                    let child_ref = DeclRef::new(decl_ref.module, child);
                    if let Some(child_decl) = index.decl(child_ref) {
                        if !matches!(child_decl.kind, DeclKind::TemplateParameter(_) | DeclKind::Import(_)) {
                            self.offer_decl(&mut walk, child_ref, child_decl);
                        }
                    }
                }
                if walk.end_level() {
                    self.walk_bases(ctx, &mut walk, ty);
                }
            }
            AbstractKind::Enum { .. } => {
                let Some(decl_ref) = ty.declaration() else { return Vec::new() };
                if let Some(decl) = index.decl(decl_ref) {
                    for &child in &decl.children {
                        let child_ref = DeclRef::new(decl_ref.module, child);
                        if let Some(child_decl) = index.decl(child_ref) {
                            self.offer_decl(&mut walk, child_ref, child_decl);
                        }
                    }
                }
                walk.end_level();
            }
            AbstractKind::Module { module, .. } => {
                walk.modules.insert(*module);
                self.offer_module_members(ctx, &mut walk, *module);
                walk.end_level();
            }
            _ => {}
        }
        symbols
    }

    fn walk_function(
        &self,
        ctx: &mut ResolutionContext,
        walk: &mut Walk<'_, '_>,
        function_ref: DeclRef,
        function: &dsema_syntax::FunctionDecl,
        position: usize,
    ) {
        let blocks = [&function.body, &function.in_contract, &function.out_contract];
        for block in blocks.into_iter().flatten() {
            if !block.contains(position) {
                continue;
            }
            let mut levels = Vec::new();
            collect_block_levels(&block.stmts, position, &mut levels);
            for level in levels.iter().rev() {
                for &local in level {
                    self.offer_local(ctx, walk, DeclRef::new(function_ref.module, local));
                }
                if !walk.end_level() {
                    return;
                }
            }
        }

        let index = &self.resolver.index;
        for &param in function.params.iter().chain(&function.template_params) {
            let param_ref = DeclRef::new(function_ref.module, param);
            if let Some(decl) = index.decl(param_ref) {
                self.offer_decl(walk, param_ref, decl);
            }
        }
        walk.end_level();
    }

    fn walk_aggregate(&self, ctx: &mut ResolutionContext, walk: &mut Walk<'_, '_>, aggregate: DeclRef, decl: &Declaration) {
        let index = &self.resolver.index;
        for &child in &decl.children {
            let child_ref = DeclRef::new(aggregate.module, child);
            let Some(child_decl) = index.decl(child_ref) else { continue };
            match &child_decl.kind {
                DeclKind::TemplateParameter(_) => {}
                DeclKind::Import(import) => self.expand_import(ctx, walk, child_ref, child_decl, import),
                _ => self.offer_decl(walk, child_ref, child_decl),
            }
        }
        for &param in decl.template_params() {
            let param_ref = DeclRef::new(aggregate.module, param);
            if let Some(param_decl) = index.decl(param_ref) {
                self.offer_decl(walk, param_ref, param_decl);
            }
        }
        if !walk.end_level() || walk.options.dont_resolve_base_classes {
            return;
        }
        if let Some(ty) = self.resolver.aggregate_type(aggregate, ctx) {
            self.walk_bases(ctx, walk, &ty);
        }
    }

    /// Base classes and interfaces outward, one level each. Only static or
    /// non-private members are inherited into lookup.
    fn walk_bases(&self, ctx: &mut ResolutionContext, walk: &mut Walk<'_, '_>, ty: &AbstractType) {
        let index = &self.resolver.index;
        let mut pending: VecDeque<&AbstractType> = direct_bases(ty).collect();
        while let Some(base) = pending.pop_front() {
            if walk.stopped || ctx.is_cancelled() {
                return;
            }
            let Some(base_ref) = base.declaration() else { return };
            if !walk.scopes.insert(base_ref) {
                continue;
            }
            let Some(base_decl) = index.decl(base_ref) else { return };
            for &child in &base_decl.children {
                let child_ref = DeclRef::new(base_ref.module, child);
                let Some(child_decl) = index.decl(child_ref) else { continue };
                if matches!(child_decl.kind, DeclKind::TemplateParameter(_) | DeclKind::Import(_)) {
                    continue;
                }
                if child_decl.is_static() || !child_decl.is_private() {
                    self.offer_decl(walk, child_ref, child_decl);
                }
            }
            if !walk.end_level() {
                return;
            }
            pending.extend(direct_bases(base));
        }
    }

    /// The module's own symbols as one level, then every imported symbol
    /// (and the object module) as the next.
    fn walk_module(&self, ctx: &mut ResolutionContext, walk: &mut Walk<'_, '_>, module_id: ModuleId) {
        let index = &self.resolver.index;
        let Some(module) = index.module(module_id) else { return };
        let root = module.root();
        for &child in &root.children {
            let child_ref = DeclRef::new(module_id, child);
            if let Some(decl) = module.decl(child) {
                if !matches!(decl.kind, DeclKind::Import(_)) {
                    self.offer_decl(walk, child_ref, decl);
                }
            }
        }
        if !walk.end_level() || ctx.is_cancelled() {
            return;
        }

        walk.modules.insert(module_id);
        for &child in &root.children {
            let child_ref = DeclRef::new(module_id, child);
            if let Some(decl) = module.decl(child) {
                if let DeclKind::Import(import) = &decl.kind {
                    self.expand_import(ctx, walk, child_ref, decl, import);
                }
            }
        }
        for &object in index.modules_named(&self.resolver.config.object_module) {
            if walk.modules.insert(object) {
                self.offer_module_members(ctx, walk, object);
            }
        }
        walk.end_level();
    }

    /// Offers what one import statement makes visible without qualification.
    fn expand_import(
        &self,
        ctx: &mut ResolutionContext,
        walk: &mut Walk<'_, '_>,
        import_ref: DeclRef,
        import_decl: &Declaration,
        import: &ImportDecl,
    ) {
        if import.is_static || walk.stopped {
            return;
        }
        if import.alias.is_some() {
            self.offer_decl(walk, import_ref, import_decl);
            return;
        }
        let index = &self.resolver.index;
        let targets = index.modules_named(&import.module_name);
        if targets.len() > 1 {
            log::warn!("import of `{}` matches {} modules", import.module_name, targets.len());
            ctx.record(ResolutionDiagnostic::AmbiguousModule { name: import.module_name.clone(), count: targets.len() });
        }
        for &target in targets {
            if import.is_selective() {
                self.offer_bindings(walk, target, import);
                continue;
            }
            if walk.modules.insert(target) {
                self.offer_module_members(ctx, walk, target);
            }
        }
    }

    fn offer_bindings(&self, walk: &mut Walk<'_, '_>, target: ModuleId, import: &ImportDecl) {
        let Some(module) = self.resolver.index.module(target) else { return };
        for binding in &import.bindings {
            for &child in &module.root().children {
                let Some(decl) = module.decl(child) else { continue };
                if decl.name == binding.name && !decl.is_private() && !matches!(decl.kind, DeclKind::Import(_)) {
                    walk.offer(SymbolRef::Decl(DeclRef::new(target, child)), binding.visible_name(), MemberFilter::of(decl));
                }
            }
        }
    }

    /// Non-private symbols of `target`, then whatever its public imports
    /// bring in.
    fn offer_module_members(&self, ctx: &mut ResolutionContext, walk: &mut Walk<'_, '_>, target: ModuleId) {
        let Some(module) = self.resolver.index.module(target) else { return };
        let root = module.root();
        for &child in &root.children {
            let Some(decl) = module.decl(child) else { continue };
            if !decl.is_private() && !matches!(decl.kind, DeclKind::Import(_)) {
                self.offer_decl(walk, DeclRef::new(target, child), decl);
            }
        }
        for &child in &root.children {
            let Some(decl) = module.decl(child) else { continue };
            if let DeclKind::Import(import) = &decl.kind {
                if import.is_public {
                    self.expand_import(ctx, walk, DeclRef::new(target, child), decl, import);
                }
            }
        }
    }

    fn offer_local(&self, ctx: &mut ResolutionContext, walk: &mut Walk<'_, '_>, local: DeclRef) {
        let Some(decl) = self.resolver.index.decl(local) else { return };
        match &decl.kind {
            DeclKind::Import(import) => self.expand_import(ctx, walk, local, decl, import),
            _ => self.offer_decl(walk, local, decl),
        }
    }

    /// Offers one declaration; anonymous enums contribute their members.
    fn offer_decl(&self, walk: &mut Walk<'_, '_>, decl_ref: DeclRef, decl: &Declaration) {
        if decl.is_anonymous_enum() {
            for &member in &decl.children {
                let member_ref = DeclRef::new(decl_ref.module, member);
                if let Some(member_decl) = self.resolver.index.decl(member_ref) {
                    walk.offer(SymbolRef::Decl(member_ref), &member_decl.name, MemberFilter::ENUM_MEMBERS);
                }
            }
            return;
        }
        walk.offer(SymbolRef::Decl(decl_ref), &decl.name, MemberFilter::of(decl));
    }
}

fn direct_bases(ty: &AbstractType) -> impl Iterator<Item = &AbstractType> {
    let (base, interfaces): (Option<&AbstractType>, &[AbstractType]) = match &ty.kind {
        AbstractKind::Class { base, interfaces, .. } => (base.as_deref(), interfaces),
        AbstractKind::Interface { bases, .. } => (None, bases),
        _ => (None, &[]),
    };
    base.into_iter().chain(interfaces.iter())
}

/// Declarations of each block on the path to `position`, outermost block
/// first. Only declarations that start before `position` are included.
fn collect_block_levels(stmts: &[Stmt], position: usize, levels: &mut Vec<Vec<DeclId>>) {
    let mut level = Vec::new();
    let mut enclosing = None;
    for stmt in stmts {
        if stmt.span.offset() >= position {
            break;
        }
        match &stmt.kind {
            StmtKind::Declaration(ids) => level.extend(ids.iter().copied()),
            _ if span_contains(stmt.span, position) => enclosing = Some(stmt),
            _ => {}
        }
    }
    levels.push(level);
    if let Some(stmt) = enclosing {
        descend_statement(stmt, position, levels);
    }
}

fn descend_statement(stmt: &Stmt, position: usize, levels: &mut Vec<Vec<DeclId>>) {
    match &stmt.kind {
        StmtKind::Block(block) => collect_block_levels(&block.stmts, position, levels),
        StmtKind::If { then_branch, else_branch, .. } => {
            let mut branches = std::iter::once(then_branch).chain(else_branch.iter());
            if let Some(branch) = branches.find(|b| span_contains(b.span, position)) {
                descend_statement(branch, position, levels);
            }
        }
        StmtKind::While { body, .. } => {
            if span_contains(body.span, position) {
                descend_statement(body, position, levels);
            }
        }
        StmtKind::For { init, body, .. } => {
            let mut level = Vec::new();
            if let Some(init) = init {
                if let StmtKind::Declaration(ids) = &init.kind {
                    if init.span.offset() < position {
                        level.extend(ids.iter().copied());
                    }
                }
            }
            levels.push(level);
            if span_contains(body.span, position) {
                descend_statement(body, position, levels);
            }
        }
        StmtKind::Foreach { variables, body, .. } => {
            if span_contains(body.span, position) {
                levels.push(variables.clone());
                descend_statement(body, position, levels);
            }
        }
        StmtKind::Declaration(_) | StmtKind::Expression(_) | StmtKind::Return(_) => {}
    }
}
