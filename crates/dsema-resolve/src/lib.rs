#![doc = include_str!("../README.md")]

pub mod cache;
pub mod config;
mod const_eval;
pub mod context;
mod conversions;
pub mod core;
pub mod error;
mod invocation;
mod iteration;
pub mod pool;
mod references;
mod resolve_expr;
mod resolve_types;
pub mod scopes;
pub mod static_props;
pub mod templates;
pub mod types;
pub mod ufcs;

pub use cache::{ModuleIndex, Package, ResultCache};
pub use config::{ResolverConfig, UfcsConfig};
pub use context::{CancellationToken, ContextFrame, FrameGuard, ResolutionContext, ResolutionOptions};
pub use conversions::{derives_from, is_implicitly_convertible, same_type};
pub use crate::core::{ResolutionSession, Resolver};
pub use error::{ResolutionDiagnostic, ResolveError, ResolveResult};
pub use pool::WorkerPool;
pub use scopes::{MemberFilter, ScopeWalker};
pub use templates::TemplateEngine;
pub use types::{
    AbstractKind, AbstractType, ConstValue, DeclHandle, DeducedParams, Origin, SymbolRef, SyntheticKind, SyntheticSymbol,
    TemplateValue,
};
pub use ufcs::UfcsResolver;
