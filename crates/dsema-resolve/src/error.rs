use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Result type for top-level resolution requests.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Failures that abort a request. Absence of a symbol is never one of these:
/// it is an empty result.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The request's cancellation token was triggered before it finished.
    #[error("Resolution cancelled")]
    #[diagnostic(code(dsema_resolve::cancelled))]
    Cancelled,

    /// The resolver configuration could not be loaded.
    #[error("Invalid resolver configuration: {message}")]
    #[diagnostic(code(dsema_resolve::config))]
    Config {
        /// What the configuration parser reported.
        message: String,
    },
}

/// Non-fatal findings recorded on a [`crate::ResolutionContext`] while
/// resolution continues best-effort.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum ResolutionDiagnostic {
    /// Several overloads or template specializations are equally good.
    #[error("Ambiguous overload: `{name}` matches {count} equally specialized candidates")]
    #[diagnostic(code(dsema_resolve::ambiguous_overload))]
    AmbiguousOverload {
        /// The overloaded name.
        name: String,
        /// Number of tied candidates.
        count: usize,
        #[label("referenced here")]
        span: Option<SourceSpan>,
    },

    /// More than one module is registered under the same name.
    #[error("Ambiguous module: {count} modules are named `{name}`")]
    #[diagnostic(code(dsema_resolve::ambiguous_module))]
    AmbiguousModule {
        name: String,
        count: usize,
    },

    /// A `foreach` variable could be typed through several `opApply` overloads.
    #[error("Ambiguous iteration: {count} `opApply` overloads fit the loop variables of `{variable}`")]
    #[diagnostic(code(dsema_resolve::ambiguous_iteration), help("the first overload is used"))]
    AmbiguousIteration {
        variable: String,
        count: usize,
        #[label("loop variable")]
        span: SourceSpan,
    },

    /// A class names itself as a base class.
    #[error("Class `{name}` inherits from itself")]
    #[diagnostic(code(dsema_resolve::self_inheritance))]
    SelfInheritance {
        name: String,
        #[label("declared here")]
        span: SourceSpan,
    },

    /// A class reaches itself through its base classes.
    #[error("Cyclic inheritance: `{name}` is its own indirect base")]
    #[diagnostic(code(dsema_resolve::cyclic_inheritance))]
    CyclicInheritance {
        name: String,
        #[label("declared here")]
        span: SourceSpan,
    },

    /// A class lists more than one non-interface base.
    #[error("Class `{name}` has more than one base class")]
    #[diagnostic(code(dsema_resolve::multiple_base_classes), help("only one base may be a class, the rest must be interfaces"))]
    MultipleBaseClasses {
        name: String,
        #[label("declared here")]
        span: SourceSpan,
    },

    /// A base list entry is not a class or interface.
    #[error("`{name}` cannot inherit from `{base}`: only classes and interfaces can be inherited")]
    #[diagnostic(code(dsema_resolve::invalid_base))]
    InvalidBase {
        name: String,
        base: String,
        #[label("declared here")]
        span: SourceSpan,
    },

    /// An interface lists a class as its base.
    #[error("Interface `{name}` can only inherit from interfaces, not `{base}`")]
    #[diagnostic(code(dsema_resolve::interface_base))]
    InterfaceInheritsClass {
        name: String,
        base: String,
        #[label("declared here")]
        span: SourceSpan,
    },

    /// A recursion depth guard stopped a resolution chain.
    #[error("Resolution of `{what}` stopped at recursion depth {depth}")]
    #[diagnostic(code(dsema_resolve::recursion_limit))]
    RecursionLimit {
        what: String,
        depth: u32,
    },

    /// A UFCS worker panicked; its share of the candidates is missing.
    #[error("UFCS worker {worker} failed: {message}")]
    #[diagnostic(code(dsema_resolve::ufcs_worker_fault))]
    UfcsWorkerFault {
        worker: usize,
        message: String,
    },

    /// UFCS workers did not finish in time; results are partial.
    #[error("UFCS lookup for `{name}` timed out after {timeout_ms} ms with {finished}/{total} workers done")]
    #[diagnostic(code(dsema_resolve::ufcs_timeout))]
    UfcsTimeout {
        name: String,
        timeout_ms: u64,
        finished: usize,
        total: usize,
    },
}

impl ResolutionDiagnostic {
    /// Structural errors are problems with the declarations themselves, as
    /// opposed to ambiguity or guard truncation.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ResolutionDiagnostic::SelfInheritance { .. }
                | ResolutionDiagnostic::CyclicInheritance { .. }
                | ResolutionDiagnostic::MultipleBaseClasses { .. }
                | ResolutionDiagnostic::InvalidBase { .. }
                | ResolutionDiagnostic::InterfaceInheritsClass { .. }
        )
    }

    pub fn is_ambiguity(&self) -> bool {
        matches!(
            self,
            ResolutionDiagnostic::AmbiguousOverload { .. }
                | ResolutionDiagnostic::AmbiguousModule { .. }
                | ResolutionDiagnostic::AmbiguousIteration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_and_ambiguity_classes_are_disjoint() {
        let structural = ResolutionDiagnostic::SelfInheritance { name: "C".into(), span: SourceSpan::from((0usize, 1usize)) };
        let ambiguous = ResolutionDiagnostic::AmbiguousOverload { name: "f".into(), count: 2, span: None };
        assert!(structural.is_structural() && !structural.is_ambiguity());
        assert!(ambiguous.is_ambiguity() && !ambiguous.is_structural());
    }

    #[test]
    fn messages_name_the_symbol() {
        let diag = ResolutionDiagnostic::InvalidBase {
            name: "C".into(),
            base: "int".into(),
            span: SourceSpan::from((3usize, 1usize)),
        };
        assert_eq!(diag.to_string(), "`C` cannot inherit from `int`: only classes and interfaces can be inherited");
    }
}
