//! The Template Engine: binds template parameters from explicit and call
//! arguments, discards candidates that cannot be fully bound, and ranks the
//! survivors by specialization.

mod deduction;
mod specialization;

use dsema_syntax::{DeclKind, DeclRef, TemplateArg};
use miette::SourceSpan;

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::types::{AbstractKind, AbstractType, DeducedParams, SymbolRef, TemplateValue};

pub(crate) use specialization::Rank;

/// The arguments one instantiation or call supplies.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeductionRequest<'a> {
    /// Explicit template arguments, already resolved.
    pub explicit: &'a [TemplateValue],
    /// Call argument types; `None` entries could not be resolved and match
    /// anything. Absent when the candidates are not being called.
    pub call_args: Option<&'a [Option<AbstractType>]>,
    /// The value a method is called on; binds `this` parameters.
    pub receiver: Option<&'a AbstractType>,
    pub name: &'a str,
    pub span: Option<SourceSpan>,
}

/// One overload under consideration.
#[derive(Debug, Clone)]
struct Candidate {
    ty: AbstractType,
    /// Declaration that owns `params`.
    owner: Option<DeclRef>,
    params: Vec<DeclRef>,
    /// Function whose parameters receive the call arguments: the candidate
    /// itself, or the inner function of an eponymous template.
    function: Option<DeclRef>,
}

pub struct TemplateEngine<'r> {
    resolver: &'r Resolver,
}

impl<'r> TemplateEngine<'r> {
    pub fn new(resolver: &'r Resolver) -> Self {
        Self { resolver }
    }

    /// `name!(args)`: instantiates every candidate that accepts `args`, then
    /// substitutes eponymous members.
    pub(crate) fn instantiate(
        &self,
        candidates: Vec<AbstractType>,
        name: &str,
        args: &[TemplateArg],
        span: SourceSpan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        if candidates.is_empty() {
            return candidates;
        }
        let Some(explicit) = self.resolve_template_args(args, ctx) else {
            log::trace!("template arguments of `{name}` could not be resolved");
            return Vec::new();
        };
        let request = DeductionRequest { explicit: &explicit, call_args: None, receiver: None, name, span: Some(span) };
        let instances = self.deduce_and_filter(candidates, &request, ctx);
        instances.into_iter().flat_map(|instance| self.substitute_eponymous(instance, ctx)).collect()
    }

    /// A bare reference to an eponymous template stands for its inner
    /// member, instantiated from the parameter defaults. Templates whose
    /// parameters cannot all be bound that way are left as they are.
    pub(crate) fn resolve_bare(
        &self,
        candidates: Vec<AbstractType>,
        name: &str,
        span: SourceSpan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        if ctx.options().no_eponymous_substitution {
            return candidates;
        }
        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let template = match candidate.strip_aliases().map(|t| &t.kind) {
                Some(AbstractKind::Template(handle)) => handle.decl,
                _ => {
                    resolved.push(candidate);
                    continue;
                }
            };
            if self.eponymous_members(template).is_empty() {
                resolved.push(candidate);
                continue;
            }
            let request = DeductionRequest { explicit: &[], call_args: None, receiver: None, name, span: Some(span) };
            let instances = self.deduce_and_filter(vec![candidate.clone()], &request, ctx);
            if instances.is_empty() {
                log::trace!("`{name}` needs explicit template arguments");
                resolved.push(candidate);
                continue;
            }
            resolved.extend(instances.into_iter().flat_map(|instance| self.substitute_eponymous(instance, ctx)));
        }
        resolved
    }

    /// Resolves explicit template arguments. Types stay types, foldable
    /// expressions become constants and anything else becomes a symbol.
    /// `None` if any argument does not resolve.
    pub(crate) fn resolve_template_args(
        &self,
        args: &[TemplateArg],
        ctx: &mut ResolutionContext,
    ) -> Option<Vec<TemplateValue>> {
        args.iter()
            .map(|arg| match arg {
                TemplateArg::Type(decl) => {
                    let resolved = self.resolver.type_decl(decl, ctx).into_iter().next()?;
                    let wrapper = resolved.strip_aliases()?;
                    match &wrapper.kind {
                        AbstractKind::Member { .. } => Some(TemplateValue::Symbol(wrapper.clone())),
                        _ => resolved.strip().cloned().map(TemplateValue::Type),
                    }
                }
                TemplateArg::Value(expr) => match self.resolver.evaluate_constant(expr, ctx) {
                    Some(value) => {
                        let ty = value.natural_type();
                        Some(TemplateValue::Value(value, ty))
                    }
                    None => self.resolver.expr(expr, ctx).into_iter().next().map(TemplateValue::Symbol),
                },
            })
            .collect()
    }

    /// Binds each candidate's template parameters from `request`, drops
    /// those that do not fit, and keeps the most specialized survivors.
    pub(crate) fn deduce_and_filter(
        &self,
        candidates: Vec<AbstractType>,
        request: &DeductionRequest<'_>,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        let mut survivors = Vec::new();
        for ty in candidates {
            if ctx.is_cancelled() {
                return Vec::new();
            }
            let candidate = self.candidate(ty);
            if let Some(survivor) = self.try_candidate(&candidate, request, ctx) {
                survivors.push(survivor);
            }
        }
        self.select(survivors, request, ctx)
    }

    fn candidate(&self, ty: AbstractType) -> Candidate {
        let index = &self.resolver.index;
        let owner = ty.strip_aliases().and_then(|t| match &t.kind {
            AbstractKind::Member { symbol: SymbolRef::Decl(decl), .. } => Some(*decl),
            AbstractKind::Struct(_)
            | AbstractKind::Union(_)
            | AbstractKind::Class { .. }
            | AbstractKind::Interface { .. }
            | AbstractKind::Template(_) => t.declaration(),
            _ => None,
        });
        let Some((owner, decl)) = owner.and_then(|o| Some((o, index.decl(o)?))) else {
            return Candidate { ty, owner: None, params: Vec::new(), function: None };
        };
        let params = decl.template_params().iter().map(|&p| DeclRef::new(owner.module, p)).collect();
        let function = match &decl.kind {
            DeclKind::Function(_) => Some(owner),
            DeclKind::Aggregate(_) => self.eponymous_members(owner).into_iter().find(|member| {
                index.decl(*member).is_some_and(|d| d.is_function())
            }),
            _ => None,
        };
        Candidate { ty, owner: Some(owner), params, function }
    }

    /// Runs deduction for one candidate; the instance and its rank when it
    /// survives.
    fn try_candidate(
        &self,
        candidate: &Candidate,
        request: &DeductionRequest<'_>,
        ctx: &mut ResolutionContext,
    ) -> Option<(AbstractType, Rank)> {
        let Some(owner) = candidate.owner.filter(|_| !candidate.params.is_empty()) else {
            // Plain overloads take no template arguments.
            if !request.explicit.is_empty() {
                return None;
            }
            let exactness = match (request.call_args, candidate.function) {
                (Some(args), Some(function)) => {
                    let mut ctx = ctx.push_deduced(&candidate.ty.deduced);
                    self.arguments_fit(function, args, &mut ctx)?
                }
                _ => 0,
            };
            return Some((candidate.ty.clone(), Rank::NonTemplate { exactness }));
        };

        let mut bindings = DeducedParams::unbound(candidate.params.iter().copied());
        let mut ctx = ctx.push_deduced(&candidate.ty.deduced);
        if !self.consume_explicit(owner, &candidate.params, request.explicit, request.receiver, &mut bindings, &mut ctx) {
            return None;
        }
        if let (Some(args), Some(function)) = (request.call_args, candidate.function) {
            if !self.deduce_from_call(owner, &candidate.params, function, args, &mut bindings, &mut ctx) {
                return None;
            }
        }
        if !self.apply_defaults(owner, &candidate.params, request.receiver, &mut bindings, &mut ctx) {
            return None;
        }
        let mut ctx = ctx.push_deduced(&bindings);
        if let (Some(args), Some(function)) = (request.call_args, candidate.function) {
            self.arguments_fit(function, args, &mut ctx)?;
        }

        // Re-resolve under the bindings so member types and return types
        // see the arguments.
        let target = match candidate.function {
            Some(function) if function != owner => function,
            _ => owner,
        };
        let instance = self.resolver.symbol_type(&SymbolRef::Decl(target), &mut ctx).into_iter().next()?;
        let rank = self.rank(owner, &candidate.params);
        Some((instance, rank))
    }

    /// Members of a template aggregate that all share its name; empty when
    /// the template is not eponymous.
    fn eponymous_members(&self, template: DeclRef) -> Vec<DeclRef> {
        let index = &self.resolver.index;
        let Some(decl) = index.decl(template) else { return Vec::new() };
        match decl.as_aggregate() {
            Some(aggregate) if aggregate.kind == dsema_syntax::AggregateKind::Template => {}
            _ => return Vec::new(),
        }
        let members: Vec<DeclRef> = decl
            .children
            .iter()
            .map(|&child| DeclRef::new(template.module, child))
            .filter(|child| index.decl(*child).is_some_and(|d| !matches!(d.kind, DeclKind::TemplateParameter(_))))
            .collect();
        let all_eponymous = members.iter().all(|m| index.decl(*m).is_some_and(|d| d.name == decl.name));
        if all_eponymous {
            members
        } else {
            Vec::new()
        }
    }

    /// An instance of an eponymous template stands for its inner member(s).
    pub(crate) fn substitute_eponymous(&self, instance: AbstractType, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        if ctx.options().no_eponymous_substitution {
            return vec![instance];
        }
        let template = match &instance.kind {
            AbstractKind::Template(handle) => handle.decl,
            _ => return vec![instance],
        };
        let members = self.eponymous_members(template);
        if members.is_empty() {
            return vec![instance];
        }
        let mut ctx = ctx.push_deduced(&instance.deduced);
        let substituted: Vec<AbstractType> = members
            .iter()
            .flat_map(|member| self.resolver.symbol_type(&SymbolRef::Decl(*member), &mut ctx))
            .map(|inner| match inner.kind {
                AbstractKind::Member { .. } => inner,
                _ if inner.deduced.is_empty() => inner.with_deduced(instance.deduced.clone()),
                _ => inner,
            })
            .collect();
        if substituted.is_empty() {
            vec![instance]
        } else {
            substituted
        }
    }
}
