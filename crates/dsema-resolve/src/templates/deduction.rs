//! Binding template parameters: explicit arguments, specialization
//! patterns, call arguments (IFTI) and defaults.

use dsema_syntax::{DeclKind, DeclRef, Declaration, Expr, ExprKind, TemplateArg, TemplateParamKind, TypeDecl, TypeDeclKind};

use super::TemplateEngine;
use crate::context::ResolutionContext;
use crate::conversions::{derives_from, is_implicitly_convertible, same_type, same_value, value_converts};
use crate::error::ResolutionDiagnostic;
use crate::types::{AbstractKind, AbstractType, ConstValue, DeducedParams, TemplateValue};

impl TemplateEngine<'_> {
    /// Matches explicit arguments to parameters left to right. A tuple
    /// parameter takes every remaining argument; `this` parameters take the
    /// receiver and no explicit argument. Leftover arguments reject the
    /// candidate.
    pub(super) fn consume_explicit(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        explicit: &[TemplateValue],
        receiver: Option<&AbstractType>,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        let mut args = explicit.iter();
        for &param in params {
            let Some(kind) = self.param_kind(param) else { return false };
            match kind {
                TemplateParamKind::This => {
                    if let Some(receiver) = receiver {
                        bindings.bind(param, TemplateValue::Type(receiver.clone()));
                    }
                }
                TemplateParamKind::Tuple => {
                    let rest: Vec<TemplateValue> = args.by_ref().cloned().collect();
                    if !rest.is_empty() {
                        bindings.bind(param, TemplateValue::Tuple(rest));
                    }
                }
                _ => {
                    let Some(arg) = args.next() else { break };
                    if !self.unify(owner, params, param, arg, bindings, ctx) {
                        return false;
                    }
                }
            }
        }
        args.next().is_none()
    }

    /// Binds `param` to `arg` according to the parameter's kind.
    fn unify(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        param: DeclRef,
        arg: &TemplateValue,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        let Some(decl) = self.resolver.index.decl(param) else { return false };
        let Some(kind) = decl.as_template_parameter() else { return false };
        match (kind, arg) {
            (TemplateParamKind::Type { specialization, .. }, TemplateValue::Type(ty)) => {
                if let Some(pattern) = specialization {
                    if !self.match_pattern(owner, params, pattern, ty, bindings, ctx, 0) {
                        return false;
                    }
                }
                bind_or_check(bindings, param, TemplateValue::Type(ty.clone()))
            }
            (TemplateParamKind::Value { specialization, .. }, TemplateValue::Value(value, _)) => {
                self.unify_value(owner, param, decl, specialization.as_ref(), value.clone(), bindings, ctx)
            }
            (TemplateParamKind::Value { specialization, .. }, TemplateValue::Symbol(symbol)) => {
                match self.resolver.constant_of(symbol, ctx, 0) {
                    Some(value) => self.unify_value(owner, param, decl, specialization.as_ref(), value, bindings, ctx),
                    None => false,
                }
            }
            (TemplateParamKind::Alias { specialization, .. }, TemplateValue::Type(ty) | TemplateValue::Symbol(ty)) => {
                if matches!(arg, TemplateValue::Type(_)) && ty.strip().is_some_and(AbstractType::is_primitive) {
                    return false;
                }
                if let Some(pattern) = specialization {
                    let expected = self.resolve_in(owner, bindings, ctx, |engine, ctx| {
                        engine.resolver.type_decl(pattern, ctx).into_iter().next()
                    });
                    if !expected.is_some_and(|expected| same_type(&expected, ty)) {
                        return false;
                    }
                }
                bind_or_check(bindings, param, TemplateValue::Symbol(ty.clone()))
            }
            _ => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn unify_value(
        &self,
        owner: DeclRef,
        param: DeclRef,
        decl: &Declaration,
        specialization: Option<&Expr>,
        value: ConstValue,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        let declared = decl.ty.as_ref().and_then(|ty| {
            self.resolve_in(owner, bindings, ctx, |engine, ctx| {
                engine.resolver.type_decl(ty, ctx).into_iter().find_map(|t| t.strip().cloned())
            })
        });
        let declared = declared.unwrap_or_else(|| value.natural_type());
        if !value_converts(&value, &declared) {
            return false;
        }
        if let Some(specialization) = specialization {
            let expected = self.resolve_in(owner, bindings, ctx, |engine, ctx| {
                engine.resolver.evaluate_constant(specialization, ctx)
            });
            if !expected.is_some_and(|expected| constants_equal(&expected, &value)) {
                return false;
            }
        }
        bind_or_check(bindings, param, TemplateValue::Value(value, declared))
    }

    /// Structurally matches `arg` against a specialization or parameter
    /// type pattern, binding the parameters the pattern names.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn match_pattern(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        pattern: &TypeDecl,
        arg: &AbstractType,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
        depth: u32,
    ) -> bool {
        let max_depth = self.resolver.config.max_recursion_depth;
        if depth > max_depth {
            let what = self.resolver.index.decl(owner).map(|d| d.name.clone()).unwrap_or_default();
            log::debug!("specialization pattern of `{what}` too deep");
            ctx.record(ResolutionDiagnostic::RecursionLimit { what, depth: max_depth });
            return false;
        }
        if ctx.is_cancelled() {
            return false;
        }
        let Some(arg) = arg.strip() else { return false };

        match &pattern.kind {
            TypeDeclKind::Modified { inner, .. } => self.match_pattern(owner, params, inner, arg, bindings, ctx, depth),
            TypeDeclKind::Identifier { name, template_args: None } if self.param_named(params, name).is_some() => {
                let Some(param) = self.param_named(params, name) else { return false };
                let value = match self.param_kind(param) {
                    Some(TemplateParamKind::Alias { .. }) => TemplateValue::Symbol(arg.clone()),
                    _ => TemplateValue::Type(arg.clone()),
                };
                bind_or_check(bindings, param, value)
            }
            TypeDeclKind::Identifier { name, template_args: Some(pattern_args) } if mentions_params(self, pattern, params) => {
                if arg.name() != Some(name.as_str()) || !arg.is_aggregate() {
                    return false;
                }
                let bound: Vec<TemplateValue> = arg.deduced.iter().filter_map(|(_, v)| v.cloned()).collect();
                if bound.len() != pattern_args.len() {
                    return false;
                }
                pattern_args
                    .iter()
                    .zip(&bound)
                    .all(|(pattern_arg, value)| self.match_argument(owner, params, pattern_arg, value, bindings, ctx, depth + 1))
            }
            TypeDeclKind::Pointer(inner) => match &arg.kind {
                AbstractKind::Pointer(pointee) => self.match_pattern(owner, params, inner, pointee, bindings, ctx, depth + 1),
                _ => false,
            },
            TypeDeclKind::Array { element, length } => {
                let AbstractKind::Array { element: arg_element, length: arg_length } = &arg.kind else {
                    return false;
                };
                let length_matches = match (length, arg_length) {
                    (None, None) => true,
                    (Some(expr), Some(n)) => self.match_length(owner, params, expr, *n, bindings, ctx),
                    _ => false,
                };
                length_matches && self.match_pattern(owner, params, element, arg_element, bindings, ctx, depth + 1)
            }
            TypeDeclKind::AssocArray { key, value } => match &arg.kind {
                AbstractKind::AssocArray { key: arg_key, value: arg_value } => {
                    self.match_pattern(owner, params, key, arg_key, bindings, ctx, depth + 1)
                        && self.match_pattern(owner, params, value, arg_value, bindings, ctx, depth + 1)
                }
                _ => false,
            },
            TypeDeclKind::Delegate { return_type, params: pattern_params, is_function } => match &arg.kind {
                AbstractKind::Delegate { return_type: arg_return, params: arg_params, is_function: arg_is_function, is_literal } => {
                    (*is_literal || is_function == arg_is_function)
                        && pattern_params.len() == arg_params.len()
                        && self.match_pattern(owner, params, return_type, arg_return, bindings, ctx, depth + 1)
                        && pattern_params
                            .iter()
                            .zip(arg_params)
                            .all(|(p, a)| self.match_pattern(owner, params, p, a, bindings, ctx, depth + 1))
                }
                _ => false,
            },
            _ => {
                // A concrete type: the argument must be it or derive from it.
                let resolved = self.resolve_in(owner, bindings, ctx, |engine, ctx| engine.resolver.type_decl(pattern, ctx));
                resolved.iter().any(|expected| {
                    same_type(expected, arg)
                        || matches!(arg.kind, AbstractKind::Class { .. } | AbstractKind::Interface { .. }) && derives_from(arg, expected)
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_argument(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        pattern: &TemplateArg,
        value: &TemplateValue,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
        depth: u32,
    ) -> bool {
        match (pattern, value) {
            (TemplateArg::Type(pattern), TemplateValue::Type(ty) | TemplateValue::Symbol(ty)) => {
                self.match_pattern(owner, params, pattern, ty, bindings, ctx, depth)
            }
            (TemplateArg::Type(pattern), TemplateValue::Value(..)) => match pattern.simple_name() {
                Some(name) => match self.param_named(params, name) {
                    Some(param) => bind_or_check(bindings, param, value.clone()),
                    None => false,
                },
                None => false,
            },
            (TemplateArg::Value(expr), _) => {
                if let ExprKind::Identifier(name) = &expr.kind {
                    if let Some(param) = self.param_named(params, name) {
                        return bind_or_check(bindings, param, value.clone());
                    }
                }
                let expected = self.resolve_in(owner, bindings, ctx, |engine, ctx| engine.resolver.evaluate_constant(expr, ctx));
                matches!((expected, value), (Some(expected), TemplateValue::Value(actual, _)) if constants_equal(&expected, actual))
            }
            (TemplateArg::Type(_), TemplateValue::Tuple(_)) => false,
        }
    }

    fn match_length(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        expr: &Expr,
        length: u64,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        let actual = ConstValue::Int(i128::from(length));
        if let ExprKind::Identifier(name) = &expr.kind {
            if let Some(param) = self.param_named(params, name) {
                return bind_or_check(bindings, param, TemplateValue::Value(actual, AbstractType::size_t()));
            }
        }
        let expected = self.resolve_in(owner, bindings, ctx, |engine, ctx| engine.resolver.evaluate_constant(expr, ctx));
        expected.is_some_and(|expected| constants_equal(&expected, &actual))
    }

    /// Implicit function template instantiation: binds parameters that
    /// appear in the function's parameter types from the argument types.
    pub(super) fn deduce_from_call(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        function: DeclRef,
        args: &[Option<AbstractType>],
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        let index = &self.resolver.index;
        let Some(function_decl) = index.decl(function).and_then(Declaration::as_function) else { return false };
        for (position, &param) in function_decl.params.iter().enumerate() {
            let Some(param_decl) = index.decl(DeclRef::new(function.module, param)) else { continue };
            let Some(ty) = &param_decl.ty else { continue };

            // `Args args` with `Args...` swallows the remaining arguments.
            let tuple = ty.unqualified().simple_name().and_then(|name| self.param_named(params, name)).filter(|p| {
                matches!(self.param_kind(*p), Some(TemplateParamKind::Tuple))
            });
            if let Some(tuple) = tuple {
                let rest: Option<Vec<TemplateValue>> =
                    args.iter().skip(position).map(|a| a.clone().map(TemplateValue::Type)).collect();
                match rest {
                    Some(rest) => {
                        if !bind_or_check(bindings, tuple, TemplateValue::Tuple(rest)) {
                            return false;
                        }
                    }
                    None => log::trace!("tuple parameter of `{}` left to its default", param_decl.name),
                }
                break;
            }

            let Some(Some(arg)) = args.get(position) else { continue };
            if !mentions_params(self, ty, params) {
                continue;
            }
            if !self.match_pattern(owner, params, ty, arg, bindings, ctx, 0) {
                log::trace!("argument {position} does not fit parameter `{}`", param_decl.name);
                return false;
            }
        }
        true
    }

    /// Arity and implicit-conversion check of `args` against `function`'s
    /// parameters, under the current bindings. Returns how many arguments
    /// match their parameter exactly, or `None` if the call does not fit.
    pub(crate) fn arguments_fit(
        &self,
        function: DeclRef,
        args: &[Option<AbstractType>],
        ctx: &mut ResolutionContext,
    ) -> Option<usize> {
        let index = &self.resolver.index;
        let decl = index.decl(function)?;
        let function_decl = decl.as_function()?;
        let mut ctx = ctx.push_scope(function, decl.span.offset());

        let mut expected: Vec<(Option<AbstractType>, bool)> = Vec::new();
        let mut variadic = false;
        for &param in &function_decl.params {
            let Some(param_decl) = index.decl(DeclRef::new(function.module, param)) else { continue };
            let (has_default, is_variadic) = match &param_decl.kind {
                DeclKind::Parameter(p) => (p.default.is_some(), p.is_variadic),
                _ => (false, false),
            };
            variadic |= is_variadic;
            let resolved = param_decl.ty.as_ref().and_then(|ty| self.resolver.type_decl(ty, &mut ctx).into_iter().next());
            // A bound tuple parameter expands into one parameter per element.
            let expanded: Option<Vec<Option<AbstractType>>> = match resolved.as_ref().map(|r| &r.kind) {
                Some(AbstractKind::TemplateParameter { value: Some(value), .. }) => match value.as_ref() {
                    TemplateValue::Tuple(items) => Some(items.iter().map(|item| item.as_type().cloned()).collect()),
                    _ => None,
                },
                _ => None,
            };
            match expanded {
                Some(items) => expected.extend(items.into_iter().map(|item| (item, true))),
                None => expected.push((resolved, !has_default && !is_variadic)),
            }
        }

        let required = expected.iter().filter(|(_, required)| *required).count();
        if args.len() < required || args.len() > expected.len() && !variadic {
            return None;
        }
        let mut exact = 0;
        for ((param, _), arg) in expected.iter().zip(args) {
            let (Some(param), Some(arg)) = (param, arg) else { continue };
            if !is_implicitly_convertible(arg, param) {
                return None;
            }
            if same_type(arg, param) {
                exact += 1;
            }
        }
        Some(exact)
    }

    /// Whether `receiver` can be passed as the first argument of
    /// `function`. Generic first parameters are matched as patterns,
    /// concrete ones by implicit conversion.
    pub(crate) fn accepts_receiver(&self, function: DeclRef, receiver: &AbstractType, ctx: &mut ResolutionContext) -> bool {
        let index = &self.resolver.index;
        let Some(decl) = index.decl(function) else { return false };
        let Some(&first) = decl.as_function().and_then(|f| f.params.first()) else { return false };
        let Some(param_decl) = index.decl(DeclRef::new(function.module, first)) else { return false };
        let Some(pattern) = &param_decl.ty else { return false };

        let params: Vec<DeclRef> = decl.template_params().iter().map(|&p| DeclRef::new(function.module, p)).collect();
        if mentions_params(self, pattern, &params) {
            if let TypeDeclKind::Identifier { name, template_args: None } = &pattern.kind {
                let tuple = self.param_named(&params, name).and_then(|p| self.param_kind(p));
                if matches!(tuple, Some(TemplateParamKind::Tuple)) {
                    return true;
                }
            }
            let mut bindings = DeducedParams::unbound(params.iter().copied());
            return self.match_pattern(function, &params, pattern, receiver, &mut bindings, ctx, 0);
        }
        let mut ctx = ctx.push_scope(function, decl.span.offset());
        let expected = self.resolver.type_decl(pattern, &mut ctx);
        expected.iter().filter_map(AbstractType::strip).any(|param| is_implicitly_convertible(receiver, param))
    }

    /// Binds every still-unbound parameter from its default. A required
    /// parameter without a default rejects the candidate.
    pub(super) fn apply_defaults(
        &self,
        owner: DeclRef,
        params: &[DeclRef],
        receiver: Option<&AbstractType>,
        bindings: &mut DeducedParams,
        ctx: &mut ResolutionContext,
    ) -> bool {
        for &param in params {
            if bindings.is_bound(param) {
                continue;
            }
            let Some(kind) = self.param_kind(param) else { return false };
            let value = match kind {
                TemplateParamKind::Tuple => Some(TemplateValue::Tuple(Vec::new())),
                TemplateParamKind::This => receiver.cloned().map(TemplateValue::Type),
                TemplateParamKind::Type { default: Some(default), .. } => self.resolve_in(owner, bindings, ctx, |engine, ctx| {
                    engine.resolver.type_decl(default, ctx).into_iter().find_map(|t| t.strip().cloned())
                })
                .map(TemplateValue::Type),
                TemplateParamKind::Value { default: Some(default), .. } => {
                    let declared = self.resolver.index.decl(param).and_then(|d| d.ty.as_ref());
                    self.resolve_in(owner, bindings, ctx, |engine, ctx| {
                        let value = engine.resolver.evaluate_constant(default, ctx)?;
                        let ty = declared
                            .and_then(|ty| engine.resolver.type_decl(ty, ctx).into_iter().find_map(|t| t.strip().cloned()))
                            .unwrap_or_else(|| value.natural_type());
                        Some(TemplateValue::Value(value, ty))
                    })
                }
                TemplateParamKind::Alias { default: Some(default), .. } => self
                    .resolve_in(owner, bindings, ctx, |engine, ctx| engine.resolve_template_args(std::slice::from_ref(default), ctx))
                    .and_then(|values| values.into_iter().next()),
                _ => None,
            };
            match value {
                Some(value) => bindings.bind(param, value),
                None => {
                    log::trace!("template parameter {param} left unbound");
                    return false;
                }
            }
        }
        true
    }

    /// Runs `resolve` inside the template's own scope with the bindings made
    /// so far.
    fn resolve_in<T>(
        &self,
        owner: DeclRef,
        bindings: &DeducedParams,
        ctx: &mut ResolutionContext,
        resolve: impl FnOnce(&Self, &mut ResolutionContext) -> T,
    ) -> T {
        let position = self.resolver.index.decl(owner).map_or(0, |d| d.span.offset());
        let mut ctx = ctx.push_scope(owner, position);
        let mut ctx = ctx.push_deduced(bindings);
        resolve(self, &mut *ctx)
    }

    pub(super) fn param_kind(&self, param: DeclRef) -> Option<&TemplateParamKind> {
        self.resolver.index.decl(param)?.as_template_parameter()
    }

    fn param_named(&self, params: &[DeclRef], name: &str) -> Option<DeclRef> {
        params.iter().copied().find(|p| self.resolver.index.decl(*p).is_some_and(|d| d.name == name))
    }
}

/// Whether `ty` names any of `params`, at any depth.
pub(super) fn mentions_params(engine: &TemplateEngine<'_>, ty: &TypeDecl, params: &[DeclRef]) -> bool {
    match &ty.kind {
        TypeDeclKind::Primitive(_) | TypeDeclKind::Typeof(_) => false,
        TypeDeclKind::Identifier { name, template_args } => {
            engine.param_named(params, name).is_some()
                || template_args.iter().flatten().any(|arg| match arg {
                    TemplateArg::Type(ty) => mentions_params(engine, ty, params),
                    TemplateArg::Value(expr) => {
                        matches!(&expr.kind, ExprKind::Identifier(name) if engine.param_named(params, name).is_some())
                    }
                })
        }
        TypeDeclKind::Qualified { base, .. } => mentions_params(engine, base, params),
        TypeDeclKind::Pointer(inner) | TypeDeclKind::Modified { inner, .. } => mentions_params(engine, inner, params),
        TypeDeclKind::Array { element, length } => {
            mentions_params(engine, element, params)
                || length.as_ref().is_some_and(|expr| {
                    matches!(&expr.kind, ExprKind::Identifier(name) if engine.param_named(params, name).is_some())
                })
        }
        TypeDeclKind::AssocArray { key, value } => {
            mentions_params(engine, key, params) || mentions_params(engine, value, params)
        }
        TypeDeclKind::Delegate { return_type, params: delegate_params, .. } => {
            mentions_params(engine, return_type, params) || delegate_params.iter().any(|p| mentions_params(engine, p, params))
        }
    }
}

/// Binds `param`, or checks an existing binding agrees.
fn bind_or_check(bindings: &mut DeducedParams, param: DeclRef, value: TemplateValue) -> bool {
    match bindings.get(param) {
        Some(existing) => same_value(existing, &value),
        None => {
            bindings.bind(param, value);
            true
        }
    }
}

fn constants_equal(a: &ConstValue, b: &ConstValue) -> bool {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
