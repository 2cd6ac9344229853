//! Partial ordering of surviving candidates by how specialized they are.

use dsema_syntax::{DeclRef, TemplateParamKind, TypeDecl, TypeDeclKind};
use std::cmp::Ordering;

use super::deduction::mentions_params;
use super::{DeductionRequest, TemplateEngine};
use crate::context::ResolutionContext;
use crate::error::ResolutionDiagnostic;
use crate::types::AbstractType;

/// Specialization of a parameter whose pattern names no other parameter.
const CONCRETE: u32 = 64;

/// How specialized a surviving candidate is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rank {
    /// An ordinary function or type; `exactness` counts arguments that
    /// match their parameter type exactly.
    NonTemplate { exactness: usize },
    /// One entry per template parameter.
    Template(Vec<u32>),
}

impl Rank {
    /// `Greater` when `self` is strictly more specialized than `other`,
    /// `None` when neither is at least as specialized as the other.
    pub(crate) fn compare(&self, other: &Rank) -> Option<Ordering> {
        match (self, other) {
            (Rank::NonTemplate { .. }, Rank::Template(_)) => Some(Ordering::Greater),
            (Rank::Template(_), Rank::NonTemplate { .. }) => Some(Ordering::Less),
            (Rank::NonTemplate { exactness: a }, Rank::NonTemplate { exactness: b }) => Some(a.cmp(b)),
            (Rank::Template(a), Rank::Template(b)) => {
                if a.len() != b.len() {
                    return None;
                }
                let at_least = a.iter().zip(b).all(|(x, y)| x >= y);
                let at_most = a.iter().zip(b).all(|(x, y)| x <= y);
                match (at_least, at_most) {
                    (true, true) => Some(Ordering::Equal),
                    (true, false) => Some(Ordering::Greater),
                    (false, true) => Some(Ordering::Less),
                    (false, false) => None,
                }
            }
        }
    }
}

impl TemplateEngine<'_> {
    /// Per-parameter specialization of a template: tuples rank lowest,
    /// then unconstrained parameters, then patterns by nesting depth, then
    /// concrete specializations.
    pub(super) fn rank(&self, owner: DeclRef, params: &[DeclRef]) -> Rank {
        let ranks = params
            .iter()
            .map(|&param| match self.param_kind(param) {
                Some(TemplateParamKind::Tuple) => 0,
                Some(TemplateParamKind::Type { specialization: Some(pattern), .. })
                | Some(TemplateParamKind::Alias { specialization: Some(pattern), .. }) => {
                    if mentions_params(self, pattern, params) {
                        2 + pattern_depth(pattern)
                    } else {
                        CONCRETE
                    }
                }
                Some(TemplateParamKind::Value { specialization: Some(_), .. }) => CONCRETE,
                _ => 1,
            })
            .collect();
        log::trace!("rank of {owner}: {ranks:?}");
        Rank::Template(ranks)
    }

    /// Keeps the candidates no other candidate is strictly more specialized
    /// than. A tie between several records an ambiguity; all of them are
    /// returned.
    pub(super) fn select(
        &self,
        survivors: Vec<(AbstractType, Rank)>,
        request: &DeductionRequest<'_>,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        if survivors.len() <= 1 {
            return survivors.into_iter().map(|(ty, _)| ty).collect();
        }
        let maximal: Vec<AbstractType> = survivors
            .iter()
            .filter(|(_, rank)| {
                !survivors.iter().any(|(_, other)| other.compare(rank) == Some(Ordering::Greater))
            })
            .map(|(ty, _)| ty.clone())
            .collect();
        if maximal.len() > 1 {
            log::debug!("`{}` has {} equally specialized candidates", request.name, maximal.len());
            ctx.record(ResolutionDiagnostic::AmbiguousOverload {
                name: request.name.to_string(),
                count: maximal.len(),
                span: request.span,
            });
        }
        maximal
    }
}

/// Nesting depth of a pattern; a bare parameter name is 0.
fn pattern_depth(pattern: &TypeDecl) -> u32 {
    match &pattern.kind {
        TypeDeclKind::Primitive(_) | TypeDeclKind::Typeof(_) | TypeDeclKind::Qualified { .. } => 0,
        TypeDeclKind::Identifier { template_args: None, .. } => 0,
        TypeDeclKind::Identifier { template_args: Some(args), .. } => {
            1 + args
                .iter()
                .map(|arg| match arg {
                    dsema_syntax::TemplateArg::Type(ty) => pattern_depth(ty),
                    dsema_syntax::TemplateArg::Value(_) => 0,
                })
                .max()
                .unwrap_or(0)
        }
        TypeDeclKind::Modified { inner, .. } => pattern_depth(inner),
        TypeDeclKind::Pointer(inner) => 1 + pattern_depth(inner),
        TypeDeclKind::Array { element, .. } => 1 + pattern_depth(element),
        TypeDeclKind::AssocArray { key, value } => 1 + pattern_depth(key).max(pattern_depth(value)),
        TypeDeclKind::Delegate { return_type, params, .. } => {
            1 + params.iter().map(pattern_depth).fold(pattern_depth(return_type), u32::max)
        }
    }
}
