//! Resolution of type declarations and of the declarations symbols point at.

use dsema_syntax::{
    AggregateKind, DeclKind, DeclRef, Declaration, PrimitiveKind, TypeDecl, TypeDeclKind,
};

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::error::ResolutionDiagnostic;
use crate::scopes::{MemberFilter, ScopeWalker};
use crate::static_props;
use crate::templates::TemplateEngine;
use crate::types::{
    AbstractKind, AbstractType, ConstValue, DeducedParams, Origin, SymbolRef, SyntheticKind,
};

impl Resolver {
    /// Resolves a syntactic type. Several results mean the type is ambiguous;
    /// none means it could not be resolved.
    pub(crate) fn type_decl(&self, decl: &TypeDecl, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        if ctx.is_cancelled() {
            return Vec::new();
        }
        let resolved = match &decl.kind {
            TypeDeclKind::Primitive(kind) => vec![AbstractType::primitive(*kind)],
            TypeDeclKind::Identifier { name, template_args } => match (PrimitiveKind::from_name(name), template_args) {
                (Some(kind), None) => vec![AbstractType::primitive(kind)],
                (_, None) => {
                    let candidates = self.identifier(name, ctx);
                    TemplateEngine::new(self).resolve_bare(candidates, name, decl.span, ctx)
                }
                (_, Some(args)) => {
                    let candidates = self.identifier(name, ctx);
                    TemplateEngine::new(self).instantiate(candidates, name, args, decl.span, ctx)
                }
            },
            TypeDeclKind::Qualified { base, name, template_args } => {
                let bases = self.type_decl(base, ctx);
                let members = self.member_lookup(&bases, name, ctx, false);
                let engine = TemplateEngine::new(self);
                match template_args {
                    None => engine.resolve_bare(members, name, decl.span, ctx),
                    Some(args) => engine.instantiate(members, name, args, decl.span, ctx),
                }
            }
            TypeDeclKind::Pointer(inner) => self.type_decl(inner, ctx).into_iter().map(AbstractType::pointer).collect(),
            TypeDeclKind::Array { element, length } => {
                let length = match length {
                    Some(expr) => match self.evaluate_constant(expr, ctx) {
                        Some(ConstValue::Int(n)) => u64::try_from(n).ok(),
                        _ => None,
                    },
                    None => None,
                };
                self.type_decl(element, ctx)
                    .into_iter()
                    .map(|element| AbstractType::new(AbstractKind::Array { element: Box::new(element), length }))
                    .collect()
            }
            TypeDeclKind::AssocArray { key, value } => {
                let keys = self.type_decl(key, ctx);
                let values = self.type_decl(value, ctx);
                keys.iter()
                    .flat_map(|key| {
                        values.iter().map(move |value| {
                            AbstractType::new(AbstractKind::AssocArray {
                                key: Box::new(key.clone()),
                                value: Box::new(value.clone()),
                            })
                        })
                    })
                    .collect()
            }
            TypeDeclKind::Delegate { return_type, params, is_function } => {
                let Some(return_type) = self.type_decl(return_type, ctx).into_iter().next() else {
                    return Vec::new();
                };
                let params = params.iter().filter_map(|p| self.type_decl(p, ctx).into_iter().next()).collect();
                vec![AbstractType::new(AbstractKind::Delegate {
                    return_type: Box::new(return_type),
                    params,
                    is_literal: false,
                    is_function: *is_function,
                })]
            }
            TypeDeclKind::Typeof(expr) => self.expr(expr, ctx).iter().filter_map(|t| t.strip().cloned()).collect(),
            TypeDeclKind::Modified { inner, .. } => self.type_decl(inner, ctx),
        };
        resolved
            .into_iter()
            .map(|ty| match ty.origin {
                Some(_) => ty,
                None => ty.with_origin(Origin::Span(decl.span)),
            })
            .collect()
    }

    /// Looks `name` up from the current frame, stopping at the nearest
    /// overload set. A name without declaration falls back to a module,
    /// then a package, of that name.
    pub(crate) fn identifier(&self, name: &str, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let position = ctx.position();
        let symbols = {
            let mut ctx = ctx.push_options(|o| o.stop_after_first_overload_set = true);
            ScopeWalker::new(self).find_by_name(&mut ctx, position, name)
        };
        if !symbols.is_empty() {
            return symbols.iter().flat_map(|symbol| self.symbol_type(symbol, ctx)).collect();
        }
        self.module_or_package(name)
    }

    fn module_or_package(&self, path: &str) -> Vec<AbstractType> {
        let modules: Vec<AbstractType> = self
            .index
            .modules_named(path)
            .iter()
            .filter_map(|id| self.index.module(*id))
            .map(|module| {
                AbstractType::new(AbstractKind::Module { module: module.id, name: module.name.as_str().into() })
                    .with_origin(Origin::Decl(DeclRef::root(module.id)))
            })
            .collect();
        if !modules.is_empty() {
            return modules;
        }
        match self.index.lookup_package(path) {
            Some(package) => vec![AbstractType::new(AbstractKind::Package(package.path.as_str().into()))],
            None => Vec::new(),
        }
    }

    /// Looks `name` up as a member of each of `bases`: aggregate members and
    /// inherited ones, enum members, module symbols or sub-packages, then
    /// intrinsic properties, then (when allowed) free functions through UFCS.
    pub(crate) fn member_lookup(
        &self,
        bases: &[AbstractType],
        name: &str,
        ctx: &mut ResolutionContext,
        allow_ufcs: bool,
    ) -> Vec<AbstractType> {
        let mut results = Vec::new();
        for base in bases {
            if ctx.is_cancelled() {
                break;
            }
            let Some(target) = base.strip() else { continue };
            let found = match &target.kind {
                AbstractKind::Package(path) => self.module_or_package(&format!("{path}.{name}")),
                AbstractKind::Module { .. }
                | AbstractKind::Struct(_)
                | AbstractKind::Union(_)
                | AbstractKind::Class { .. }
                | AbstractKind::Interface { .. }
                | AbstractKind::Template(_)
                | AbstractKind::Enum { .. } => {
                    let mut ctx = ctx.push_deduced(&target.deduced);
                    let symbols = ScopeWalker::new(self).type_members(&mut ctx, target, Some(name), MemberFilter::ALL);
                    symbols.iter().flat_map(|symbol| self.symbol_type(symbol, &mut ctx)).collect()
                }
                _ => Vec::new(),
            };
            if !found.is_empty() {
                results.extend(found);
                continue;
            }
            if let Some(property) = static_props::resolve(self, target, name, ctx) {
                results.push(property);
                continue;
            }
            if allow_ufcs && !ctx.options().no_ufcs && accepts_ufcs(base, target) {
                results.extend(self.ufcs_members(target, name, ctx));
            }
        }
        results
    }

    /// Every resolved type a symbol stands for.
    pub(crate) fn symbol_type(&self, symbol: &SymbolRef, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        match symbol {
            SymbolRef::Decl(decl) => self.decl_type(*decl, ctx),
            SymbolRef::Synthetic(synthetic) => {
                let base = match &synthetic.kind {
                    SyntheticKind::CtfeFlag => Some(AbstractType::bool()),
                    SyntheticKind::ResultVariable { function } => self.return_type(*function, ctx),
                    SyntheticKind::StaticProperty => None,
                };
                vec![AbstractType::member(symbol.clone(), &synthetic.name, base)]
            }
        }
    }

    fn decl_type(&self, decl_ref: DeclRef, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let Some(decl) = self.index.decl(decl_ref) else { return Vec::new() };
        let origin = Origin::Decl(decl_ref);
        let symbol = SymbolRef::Decl(decl_ref);
        let resolved = match &decl.kind {
            DeclKind::Module => {
                let name = self.index.module(decl_ref.module).map(|m| m.name.as_str()).unwrap_or(&decl.name);
                vec![AbstractType::new(AbstractKind::Module { module: decl_ref.module, name: name.into() })]
            }
            DeclKind::Import(import) => {
                let found = self.module_or_package(&import.module_name);
                let modules = found.iter().filter(|t| matches!(t.kind, AbstractKind::Module { .. })).count();
                if modules > 1 {
                    ctx.record(ResolutionDiagnostic::AmbiguousModule { name: import.module_name.clone(), count: modules });
                }
                return found;
            }
            DeclKind::Variable(_) | DeclKind::Parameter(_) => {
                let base = self.value_type(decl_ref, decl, ctx);
                vec![AbstractType::member(symbol, &decl.name, base)]
            }
            DeclKind::Alias => self.alias_type(decl_ref, decl, ctx),
            DeclKind::Function(_) => {
                let base = self.return_type(decl_ref, ctx);
                // Methods of an instance keep the bindings they were found under.
                let deduced = ctx.deduced().merged(&self.bindings_for(decl, decl_ref, ctx));
                vec![AbstractType::member(symbol, &decl.name, base).with_deduced(deduced)]
            }
            DeclKind::Aggregate(_) => self.aggregate_type(decl_ref, ctx).into_iter().collect(),
            DeclKind::Enum => vec![self.enum_type(decl_ref, decl, ctx)],
            DeclKind::EnumMember(_) => {
                let base = self.index.parent(decl_ref).and_then(|parent| {
                    let parent_decl = self.index.decl(parent)?;
                    if parent_decl.is_anonymous_enum() {
                        self.enum_type(parent, parent_decl, ctx).base_type()
                    } else {
                        Some(self.enum_type(parent, parent_decl, ctx))
                    }
                });
                vec![AbstractType::member(symbol, &decl.name, base)]
            }
            DeclKind::TemplateParameter(_) => {
                let value = ctx.lookup_deduced(decl_ref).cloned().map(Box::new);
                vec![AbstractType::new(AbstractKind::TemplateParameter { param: self.index.handle(decl_ref), value })]
            }
        };
        resolved.into_iter().map(|ty| ty.with_origin(origin)).collect()
    }

    fn alias_type(&self, decl_ref: DeclRef, decl: &Declaration, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let handle = self.index.handle(decl_ref);
        let targets = match (&decl.ty, ctx.options().dont_resolve_aliases) {
            (Some(target), false) => {
                let scope = self.enclosing_scope(decl_ref);
                let mut ctx = ctx.push_scope(scope, decl.span.offset());
                self.type_decl(target, &mut ctx)
            }
            _ => Vec::new(),
        };
        if targets.is_empty() {
            return vec![AbstractType::new(AbstractKind::Aliased { decl: handle, base: None })];
        }
        targets
            .into_iter()
            .map(|target| AbstractType::new(AbstractKind::Aliased { decl: handle.clone(), base: Some(Box::new(target)) }))
            .collect()
    }

    fn enum_type(&self, decl_ref: DeclRef, decl: &Declaration, ctx: &mut ResolutionContext) -> AbstractType {
        let base = decl.ty.as_ref().and_then(|ty| {
            let scope = self.enclosing_scope(decl_ref);
            let mut ctx = ctx.push_scope(scope, decl.span.offset());
            self.type_decl(ty, &mut ctx).into_iter().next()
        });
        let base = base.unwrap_or_else(|| AbstractType::primitive(PrimitiveKind::Int));
        AbstractType::new(AbstractKind::Enum { decl: self.index.handle(decl_ref), base: Some(Box::new(base)) })
            .with_origin(Origin::Decl(decl_ref))
    }

    /// Type of a variable or parameter: declared, inferred from the
    /// initializer, or derived from the `foreach` it belongs to.
    fn value_type(&self, decl_ref: DeclRef, decl: &Declaration, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        if let DeclKind::Variable(variable) = &decl.kind {
            if let Some(source) = &variable.iteration {
                return self.iteration_type(decl_ref, decl, source, ctx);
            }
        }
        let scope = self.enclosing_scope(decl_ref);
        let mut ctx = ctx.push_scope(scope, decl.span.offset());
        if let Some(ty) = &decl.ty {
            return self.type_decl(ty, &mut ctx).into_iter().next();
        }
        let initializer = match &decl.kind {
            DeclKind::Variable(variable) => variable.initializer.as_ref(),
            _ => None,
        }?;
        self.expr(initializer, &mut ctx).into_iter().find_map(|t| t.strip().cloned())
    }

    /// A function's return type; `auto` functions are inferred from their
    /// first non-`null` return statement. Inference that reaches itself
    /// yields `None`.
    pub(crate) fn return_type(&self, function_ref: DeclRef, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        let decl = self.index.decl(function_ref)?;
        let function = decl.as_function()?;
        let mut ctx = ctx.push_scope(function_ref, decl.span.offset());
        if let Some(ty) = &decl.ty {
            return self.type_decl(ty, &mut ctx).into_iter().next();
        }
        if !ctx.begin_inference(function_ref) {
            log::trace!("return type of `{}` depends on itself", decl.name);
            return None;
        }
        let inferred = match function.body.as_ref().and_then(|body| body.first_non_null_return()) {
            Some(expr) => {
                let mut ctx = ctx.push_scope(function_ref, expr.span.offset());
                self.expr(expr, &mut ctx).into_iter().find_map(|t| t.strip().cloned())
            }
            None => Some(AbstractType::void()),
        };
        ctx.end_inference(function_ref);
        inferred
    }

    /// Resolves an aggregate declaration, including its base classes.
    pub(crate) fn aggregate_type(&self, decl_ref: DeclRef, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        self.aggregate_type_in_chain(decl_ref, ctx, &mut Vec::new())
    }

    /// `chain` holds the classes whose bases are being resolved, innermost
    /// last; its length is the recursion depth.
    fn aggregate_type_in_chain(
        &self,
        decl_ref: DeclRef,
        ctx: &mut ResolutionContext,
        chain: &mut Vec<DeclRef>,
    ) -> Option<AbstractType> {
        let decl = self.index.decl(decl_ref)?;
        let aggregate = decl.as_aggregate()?;
        let handle = self.index.handle(decl_ref);
        let kind = match aggregate.kind {
            AggregateKind::Struct => AbstractKind::Struct(handle),
            AggregateKind::Union => AbstractKind::Union(handle),
            AggregateKind::Template => AbstractKind::Template(handle),
            AggregateKind::Class | AggregateKind::Interface => {
                let (base, interfaces) =
                    if ctx.options().dont_resolve_base_classes || aggregate.base_classes.is_empty() {
                        (None, Vec::new())
                    } else {
                        self.resolve_bases(decl_ref, decl, aggregate.kind, &aggregate.base_classes, ctx, chain)
                    };
                match aggregate.kind {
                    AggregateKind::Class => AbstractKind::Class { decl: handle, base: base.map(Box::new), interfaces },
                    _ => AbstractKind::Interface { decl: handle, bases: interfaces },
                }
            }
        };
        let deduced = self.bindings_for(decl, decl_ref, ctx);
        Some(AbstractType::new(kind).with_origin(Origin::Decl(decl_ref)).with_deduced(deduced))
    }

    /// Bindings the current frame holds for `decl`'s own template parameters.
    fn bindings_for(&self, decl: &Declaration, decl_ref: DeclRef, ctx: &ResolutionContext) -> DeducedParams {
        let mut deduced = DeducedParams::new();
        for &param in decl.template_params() {
            let param_ref = DeclRef::new(decl_ref.module, param);
            match ctx.lookup_deduced(param_ref) {
                Some(value) => deduced.bind(param_ref, value.clone()),
                None => deduced.declare(param_ref),
            }
        }
        deduced
    }

    /// Resolves a class or interface base list, recording structural errors
    /// and skipping the offending entries.
    fn resolve_bases(
        &self,
        decl_ref: DeclRef,
        decl: &Declaration,
        kind: AggregateKind,
        base_classes: &[TypeDecl],
        ctx: &mut ResolutionContext,
        chain: &mut Vec<DeclRef>,
    ) -> (Option<AbstractType>, Vec<AbstractType>) {
        let max_depth = self.config.max_recursion_depth;
        if chain.len() as u32 >= max_depth {
            log::debug!("base classes of `{}` not resolved: depth {} reached", decl.name, chain.len());
            ctx.record(ResolutionDiagnostic::RecursionLimit { what: decl.name.clone(), depth: max_depth });
            return (None, Vec::new());
        }
        chain.push(decl_ref);

        let mut base = None;
        let mut interfaces = Vec::new();
        for base_decl in base_classes {
            let resolved = {
                let mut ctx = ctx.push_scope(decl_ref, decl.span.offset());
                let mut ctx = ctx.push_options(|o| o.dont_resolve_base_classes = true);
                self.type_decl(base_decl, &mut ctx)
            };
            let Some(candidate) = resolved.iter().find_map(|t| t.strip().cloned()) else {
                log::debug!("base class of `{}` could not be resolved", decl.name);
                continue;
            };
            let base_ref = match (&candidate.kind, candidate.declaration()) {
                (AbstractKind::Class { .. } | AbstractKind::Interface { .. }, Some(base_ref)) => base_ref,
                _ => {
                    ctx.record(ResolutionDiagnostic::InvalidBase {
                        name: decl.name.clone(),
                        base: candidate.to_string(),
                        span: decl.span,
                    });
                    continue;
                }
            };
            if base_ref == decl_ref {
                ctx.record(ResolutionDiagnostic::SelfInheritance { name: decl.name.clone(), span: decl.span });
                continue;
            }
            if chain.contains(&base_ref) {
                log::warn!("cyclic inheritance through `{}`", decl.name);
                ctx.record(ResolutionDiagnostic::CyclicInheritance { name: decl.name.clone(), span: decl.span });
                continue;
            }
            let full = {
                let mut ctx = ctx.push_deduced(&candidate.deduced);
                self.aggregate_type_in_chain(base_ref, &mut ctx, chain)
            };
            let full = match full {
                Some(full) => full.with_deduced(candidate.deduced.clone()),
                None => candidate,
            };
            match (&full.kind, kind) {
                (AbstractKind::Class { .. }, AggregateKind::Interface) => {
                    ctx.record(ResolutionDiagnostic::InterfaceInheritsClass {
                        name: decl.name.clone(),
                        base: full.to_string(),
                        span: decl.span,
                    });
                }
                (AbstractKind::Class { .. }, _) if base.is_some() => {
                    ctx.record(ResolutionDiagnostic::MultipleBaseClasses { name: decl.name.clone(), span: decl.span });
                }
                (AbstractKind::Class { .. }, _) => base = Some(full),
                _ => interfaces.push(full),
            }
        }

        chain.pop();
        (base, interfaces)
    }

    /// The innermost function, aggregate or module root around `decl_ref`:
    /// the scope its declared type is resolved in.
    pub(crate) fn enclosing_scope(&self, decl_ref: DeclRef) -> DeclRef {
        let Some(module) = self.index.module(decl_ref.module) else { return decl_ref };
        module
            .ancestors(decl_ref.decl)
            .find(|id| {
                module
                    .decl(*id)
                    .is_some_and(|d| matches!(d.kind, DeclKind::Function(_) | DeclKind::Aggregate(_) | DeclKind::Module))
            })
            .map(|id| DeclRef::new(decl_ref.module, id))
            .unwrap_or_else(|| DeclRef::root(decl_ref.module))
    }
}

impl AbstractType {
    /// The base type of an enum.
    fn base_type(&self) -> Option<AbstractType> {
        match &self.kind {
            AbstractKind::Enum { base, .. } => base.as_deref().cloned(),
            _ => None,
        }
    }
}

/// UFCS applies to values, not to types or namespaces named directly.
pub(crate) fn accepts_ufcs(base: &AbstractType, target: &AbstractType) -> bool {
    if matches!(base.kind, AbstractKind::Member { .. }) {
        return true;
    }
    matches!(
        target.kind,
        AbstractKind::Primitive(_)
            | AbstractKind::Pointer(_)
            | AbstractKind::Array { .. }
            | AbstractKind::AssocArray { .. }
            | AbstractKind::Delegate { .. }
    )
}
