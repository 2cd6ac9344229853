//! Typing of `foreach` variables.

use dsema_syntax::{DeclRef, Declaration, IterationSource, PrimitiveKind};

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::error::ResolutionDiagnostic;
use crate::scopes::{MemberFilter, ScopeWalker};
use crate::types::{AbstractKind, AbstractType};

impl Resolver {
    /// The type of one `foreach` variable. Protocols are tried in order and
    /// the first that applies wins: integer range, array or associative
    /// array, range primitives, `opApply`.
    pub(crate) fn iteration_type(
        &self,
        variable: DeclRef,
        decl: &Declaration,
        source: &IterationSource,
        ctx: &mut ResolutionContext,
    ) -> Option<AbstractType> {
        let scope = self.enclosing_scope(variable);
        let mut ctx = ctx.push_scope(scope, decl.span.offset());

        if source.upper.is_some() {
            // `foreach (i; lower .. upper)` is always `int`, whatever is declared
            // and whatever the bounds are.
            return Some(AbstractType::primitive(PrimitiveKind::Int));
        }
        if let Some(declared) = &decl.ty {
            return self.type_decl(declared, &mut ctx).into_iter().next();
        }

        let aggregate = self.value_types(&source.aggregate, &mut ctx).into_iter().next()?;
        let is_key = source.count == 2 && source.index == 0;
        match &aggregate.kind {
            AbstractKind::Array { element, .. } => {
                return Some(if is_key { AbstractType::size_t() } else { (**element).clone() });
            }
            AbstractKind::AssocArray { key, value } => {
                return Some(if is_key { (**key).clone() } else { (**value).clone() });
            }
            AbstractKind::Primitive(_) | AbstractKind::Pointer(_) => return None,
            _ => {}
        }

        if let Some(front) = self.range_element(&aggregate, source.reverse, &mut ctx) {
            return Some(if is_key { AbstractType::size_t() } else { front });
        }
        self.op_apply_parameter(variable, decl, &aggregate, source, &mut ctx)
    }

    /// The element type of an input range: `front` (or `back` when
    /// reversed), provided the popping and emptiness primitives exist too.
    fn range_element(&self, range: &AbstractType, reverse: bool, ctx: &mut ResolutionContext) -> Option<AbstractType> {
        let (access, pop) = if reverse { ("back", "popBack") } else { ("front", "popFront") };
        let mut ctx = ctx.push_deduced(&range.deduced);
        let walker = ScopeWalker::new(self);
        let has = |ctx: &mut ResolutionContext, name: &str| !walker.type_members(ctx, range, Some(name), MemberFilter::ALL).is_empty();
        if !has(&mut *ctx, pop) || !has(&mut *ctx, "empty") {
            return None;
        }
        let accessors = walker.type_members(&mut ctx, range, Some(access), MemberFilter::ALL);
        accessors.iter().flat_map(|symbol| self.symbol_type(symbol, &mut ctx)).find_map(|ty| ty.strip().cloned())
    }

    /// The matching delegate parameter of `opApply` (`opApplyReverse`).
    /// Several overloads with the right arity are an ambiguity; the first
    /// one is used.
    fn op_apply_parameter(
        &self,
        variable: DeclRef,
        decl: &Declaration,
        aggregate: &AbstractType,
        source: &IterationSource,
        ctx: &mut ResolutionContext,
    ) -> Option<AbstractType> {
        let name = if source.reverse { "opApplyReverse" } else { "opApply" };
        let mut ctx = ctx.push_deduced(&aggregate.deduced);
        let overloads = ScopeWalker::new(self).type_members(&mut ctx, aggregate, Some(name), MemberFilter::FUNCTIONS);

        let mut candidates = Vec::new();
        for overload in overloads.iter().filter_map(|s| s.decl()) {
            let Some(function) = self.index.decl(overload).and_then(Declaration::as_function) else { continue };
            let Some(&first) = function.params.first() else { continue };
            let param_ref = DeclRef::new(overload.module, first);
            let Some(param_type) = self.index.decl(param_ref).and_then(|p| p.ty.as_ref()) else { continue };
            let resolved = {
                let position = self.index.decl(overload).map_or(0, |d| d.span.offset());
                let mut ctx = ctx.push_scope(overload, position);
                self.type_decl(param_type, &mut ctx)
            };
            let Some(delegate) = resolved.iter().find_map(|t| t.strip()) else { continue };
            if let AbstractKind::Delegate { params, .. } = &delegate.kind {
                if params.len() == source.count {
                    if let Some(param) = params.get(source.index) {
                        candidates.push(param.clone());
                    }
                }
            }
        }

        if candidates.len() > 1 {
            log::warn!("`{}` matches {} `{name}` overloads; using the first", decl.name, candidates.len());
            ctx.record(ResolutionDiagnostic::AmbiguousIteration {
                variable: decl.name.clone(),
                count: candidates.len(),
                span: decl.span,
            });
        }
        log::trace!("iteration variable {variable} typed through `{name}`");
        candidates.into_iter().next()
    }
}
