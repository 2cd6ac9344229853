//! The call pipeline: callee candidates, argument types, deduction and
//! overload selection, return types.

use dsema_syntax::{DeclKind, DeclRef, Expr, ExprKind, PrimitiveKind, TemplateArg};
use miette::SourceSpan;

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::resolve_types::accepts_ufcs;
use crate::scopes::{MemberFilter, ScopeWalker};
use crate::templates::{DeductionRequest, TemplateEngine};
use crate::types::{AbstractKind, AbstractType, SymbolRef, TemplateValue};

/// What one call expression supplies besides its callee.
struct CallSite<'a> {
    name: &'a str,
    explicit: Option<&'a [TemplateArg]>,
    receiver: Option<AbstractType>,
    args: Vec<Option<AbstractType>>,
    span: SourceSpan,
}

impl Resolver {
    /// Resolves `callee(args)` to the type(s) it evaluates to.
    pub(crate) fn call(
        &self,
        callee: &Expr,
        args: &[Expr],
        span: SourceSpan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        let arg_types: Vec<Option<AbstractType>> =
            args.iter().map(|arg| self.value_types(arg, ctx).into_iter().next()).collect();
        let mut site = CallSite { name: "", explicit: None, receiver: None, args: arg_types, span };

        let callees = match &callee.kind {
            ExprKind::Identifier(name) => {
                site.name = name.as_str();
                match PrimitiveKind::from_name(name) {
                    // `int(x)` constructs the primitive.
                    Some(kind) => return vec![AbstractType::primitive(kind)],
                    None => self.identifier(name, ctx),
                }
            }
            ExprKind::TemplateInstance { name, args } => {
                site.name = name.as_str();
                site.explicit = Some(args.as_slice());
                self.identifier(name, ctx)
            }
            ExprKind::Member { base, name, template_args } => {
                site.name = name.as_str();
                site.explicit = template_args.as_deref();
                let bases = self.expr(base, ctx);
                let members = self.member_lookup(&bases, name, ctx, false);
                let receiver = bases.iter().find_map(|b| b.strip().cloned());
                if members.is_empty() && !ctx.options().no_ufcs {
                    // `value.f(args)` as `f(value, args)`.
                    let targets: Vec<AbstractType> = bases
                        .iter()
                        .filter_map(|base| base.strip().filter(|target| accepts_ufcs(base, target)).cloned())
                        .collect();
                    let free: Vec<AbstractType> =
                        targets.iter().flat_map(|target| self.ufcs_members(target, name, ctx)).collect();
                    if !free.is_empty() {
                        site.args.insert(0, targets.into_iter().next());
                        return self.invoke(free, &site, ctx);
                    }
                }
                site.receiver = receiver;
                members
            }
            _ => self.expr(callee, ctx),
        };
        self.invoke(callees, &site, ctx)
    }

    /// Calls a member operator such as `opIndex` or `opCall` on `target`.
    pub(crate) fn call_operator(
        &self,
        target: &AbstractType,
        operator: &str,
        args: &[Expr],
        span: SourceSpan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        let arg_types = args.iter().map(|arg| self.value_types(arg, ctx).into_iter().next()).collect();
        let methods = self.operator_methods(target, operator, ctx);
        let site = CallSite { name: operator, explicit: None, receiver: Some(target.clone()), args: arg_types, span };
        self.invoke(methods, &site, ctx)
    }

    fn operator_methods(&self, target: &AbstractType, operator: &str, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let mut ctx = ctx.push_deduced(&target.deduced);
        let symbols = ScopeWalker::new(self).type_members(&mut ctx, target, Some(operator), MemberFilter::FUNCTIONS);
        symbols.iter().flat_map(|symbol| self.symbol_type(symbol, &mut ctx)).collect()
    }

    /// Sorts callees into functions (handed to the Template Engine) and
    /// other callables, then collects what each selected call returns.
    fn invoke(&self, callees: Vec<AbstractType>, site: &CallSite<'_>, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let engine = TemplateEngine::new(self);
        let explicit = match site.explicit {
            Some(args) => match engine.resolve_template_args(args, ctx) {
                Some(values) => values,
                None => return Vec::new(),
            },
            None => Vec::new(),
        };

        let mut functions = Vec::new();
        let mut results = Vec::new();
        for callee in callees {
            let Some(unaliased) = callee.strip_aliases() else { continue };
            match &unaliased.kind {
                AbstractKind::Member { symbol: SymbolRef::Decl(decl), .. }
                    if self.index.decl(*decl).is_some_and(|d| d.is_function()) =>
                {
                    functions.push(unaliased.clone());
                }
                AbstractKind::Template(_) => functions.push(unaliased.clone()),
                _ => {
                    // Naming a type constructs it; a variable of that type does not.
                    let constructs = !matches!(unaliased.kind, AbstractKind::Member { .. });
                    let Some(value) = unaliased.strip() else { continue };
                    results.extend(self.call_value(value, constructs, &explicit, site, ctx));
                }
            }
        }

        if !functions.is_empty() {
            let request = DeductionRequest {
                explicit: &explicit,
                call_args: Some(&site.args),
                receiver: site.receiver.as_ref(),
                name: site.name,
                span: Some(site.span),
            };
            let chosen = engine.deduce_and_filter(functions, &request, ctx);
            for function in chosen {
                match function.strip() {
                    Some(returned) => results.push(returned.clone()),
                    None => log::trace!("return type of `{}` unknown", site.name),
                }
            }
        }
        results
    }

    /// Calls something that is not a function declaration: a delegate, a
    /// type's `opCall`, struct construction, or a value with `opCall`.
    fn call_value(
        &self,
        value: &AbstractType,
        constructs: bool,
        explicit: &[TemplateValue],
        site: &CallSite<'_>,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        match &value.kind {
            AbstractKind::Delegate { return_type, params, .. } => {
                if site.args.len() == params.len() {
                    vec![(**return_type).clone()]
                } else {
                    Vec::new()
                }
            }
            AbstractKind::Primitive(_) if constructs => vec![value.clone()],
            AbstractKind::Struct(_) | AbstractKind::Union(_) | AbstractKind::Class { .. } => {
                let engine = TemplateEngine::new(self);
                let instance = if explicit.is_empty() {
                    value.clone()
                } else {
                    let request =
                        DeductionRequest { explicit, call_args: None, receiver: None, name: site.name, span: Some(site.span) };
                    match engine.deduce_and_filter(vec![value.clone()], &request, ctx).into_iter().next() {
                        Some(instance) => instance,
                        None => return Vec::new(),
                    }
                };
                let op_call = self.operator_methods(&instance, "opCall", ctx);
                if !op_call.is_empty() {
                    let site = CallSite {
                        name: "opCall",
                        explicit: None,
                        receiver: Some(instance.clone()),
                        args: site.args.clone(),
                        span: site.span,
                    };
                    return self.invoke(op_call, &site, ctx);
                }
                if !constructs || matches!(instance.kind, AbstractKind::Class { .. }) {
                    return Vec::new();
                }
                // Field-wise construction: at most one argument per field.
                let fields = self.field_count(&instance);
                if site.args.len() <= fields {
                    vec![instance]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// Non-static data members of a struct or union.
    fn field_count(&self, aggregate: &AbstractType) -> usize {
        let Some(decl_ref) = aggregate.declaration() else { return 0 };
        let Some(decl) = self.index.decl(decl_ref) else { return 0 };
        decl.children
            .iter()
            .filter_map(|&child| self.index.decl(DeclRef::new(decl_ref.module, child)))
            .filter(|child| matches!(child.kind, DeclKind::Variable(_)) && !child.is_static())
            .count()
    }
}
