// Entry points: the resolver handle and the session that owns shared state.

use dsema_syntax::{DeclRef, Expr, Module, ModuleId, TypeDecl};
use std::sync::Arc;

use crate::cache::{ModuleIndex, ResultCache};
use crate::config::ResolverConfig;
use crate::context::ResolutionContext;
use crate::error::{ResolveError, ResolveResult};
use crate::pool::WorkerPool;
use crate::scopes::{MemberFilter, ScopeWalker};
use crate::templates::TemplateEngine;
use crate::types::{AbstractType, SymbolRef};

/// Resolves identifiers, types and expressions against one snapshot of the
/// module index.
///
/// A `Resolver` is cheap to clone and never observes modules added to the
/// cache after it was created. Each request brings its own
/// [`ResolutionContext`]; the resolver itself holds no per-request state,
/// so one instance can serve several threads.
#[derive(Clone, Debug)]
pub struct Resolver {
    pub(crate) index: Arc<ModuleIndex>,
    pub(crate) config: Arc<ResolverConfig>,
    pub(crate) pool: Option<Arc<WorkerPool>>,
}

impl Resolver {
    /// Creates a resolver over `index`. Without a pool UFCS lookups always
    /// run on the calling thread.
    pub fn new(index: Arc<ModuleIndex>, config: Arc<ResolverConfig>, pool: Option<Arc<WorkerPool>>) -> Self {
        Self { index, config, pool }
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// A fresh context at `position` in `module`.
    pub fn context_at(&self, module: ModuleId, position: usize) -> ResolutionContext {
        ResolutionContext::at(&self.index, module, position)
    }

    /// Every symbol `name` can denote, resolved to its type. Lookup starts
    /// at `origin` when given (the declaration the name appears in), else
    /// at the context's position.
    pub fn resolve_identifier(
        &self,
        name: &str,
        ctx: &mut ResolutionContext,
        origin: Option<DeclRef>,
    ) -> ResolveResult<Vec<AbstractType>> {
        let resolved = match origin.and_then(|o| Some((o, self.index.decl(o)?))) {
            Some((origin, decl)) => {
                let position = decl.span.offset();
                let mut ctx = ctx.push_scope(self.enclosing_scope(origin), position);
                self.bare_identifier(name, position, &mut ctx)
            }
            None => self.bare_identifier(name, ctx.position(), ctx),
        };
        self.finish("identifier", resolved, ctx)
    }

    fn bare_identifier(&self, name: &str, position: usize, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let candidates = self.identifier(name, ctx);
        TemplateEngine::new(self).resolve_bare(candidates, name, (position, 0).into(), ctx)
    }

    /// Resolves a written type.
    pub fn resolve_type(&self, ty: &TypeDecl, ctx: &mut ResolutionContext) -> ResolveResult<Vec<AbstractType>> {
        let resolved = self.type_decl(ty, ctx);
        self.finish("type", resolved, ctx)
    }

    /// The type(s) `expr` evaluates to.
    pub fn resolve_expression(&self, expr: &Expr, ctx: &mut ResolutionContext) -> ResolveResult<Vec<AbstractType>> {
        let resolved = self.expr(expr, ctx);
        self.finish("expression", resolved, ctx)
    }

    /// Symbols visible at `position` that pass `filter`, nearest scope
    /// first. Used for completion lists.
    pub fn enumerate_visible_symbols(
        &self,
        ctx: &mut ResolutionContext,
        position: usize,
        filter: MemberFilter,
    ) -> ResolveResult<Vec<SymbolRef>> {
        let symbols = ScopeWalker::new(self).enumerate(ctx, position, filter);
        self.finish("enumeration", symbols, ctx)
    }

    /// A request whose token fired returns `Cancelled` even when it
    /// produced partial results.
    fn finish<T>(&self, what: &str, result: T, ctx: &ResolutionContext) -> ResolveResult<T> {
        if ctx.is_cancelled() {
            log::debug!("{what} request cancelled");
            return Err(ResolveError::Cancelled);
        }
        Ok(result)
    }
}

/// Owns what resolution requests share: the result cache, the
/// configuration and the UFCS worker pool.
#[derive(Debug)]
pub struct ResolutionSession {
    cache: Arc<ResultCache>,
    config: Arc<ResolverConfig>,
    pool: Option<Arc<WorkerPool>>,
}

impl ResolutionSession {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_cache(Arc::new(ResultCache::new()), config)
    }

    /// A session over an existing cache, e.g. one shared with an indexer.
    pub fn with_cache(cache: Arc<ResultCache>, config: ResolverConfig) -> Self {
        let pool = config.ufcs.parallel.then(|| Arc::new(WorkerPool::new(config.ufcs.worker_count())));
        Self { cache, config: Arc::new(config), pool }
    }

    /// Loads the configuration from TOML; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> ResolveResult<Self> {
        Ok(Self::new(ResolverConfig::from_toml_str(source)?))
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn add_module(&self, module: Module) -> ModuleId {
        self.cache.add(module)
    }

    pub fn add_modules(&self, modules: impl IntoIterator<Item = Module>) -> Vec<ModuleId> {
        self.cache.add_all(modules)
    }

    /// A resolver over the cache as it is now.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.cache.snapshot(), Arc::clone(&self.config), self.pool.clone())
    }

    /// Shorthand for a context on the current snapshot.
    pub fn context_at(&self, module: ModuleId, position: usize) -> ResolutionContext {
        ResolutionContext::at(&self.cache.snapshot(), module, position)
    }
}

impl Default for ResolutionSession {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use dsema_syntax::ModuleBuilder;

    #[test]
    fn sequential_sessions_start_no_workers() {
        let session = ResolutionSession::new(ResolverConfig::sequential());
        assert!(session.resolver().pool.is_none());
    }

    #[test]
    fn resolvers_keep_their_snapshot() {
        let session = ResolutionSession::new(ResolverConfig::sequential());
        let first = session.resolver();
        session.add_module(ModuleBuilder::new("late").finish());
        assert!(first.index().lookup_module_by_name("late").is_none());
        assert!(session.resolver().index().lookup_module_by_name("late").is_some());
    }

    #[test]
    fn cancelled_requests_fail() {
        let session = ResolutionSession::new(ResolverConfig::sequential());
        let module = session.add_module(ModuleBuilder::new("app").finish());
        let token = CancellationToken::new();
        let mut ctx = session.context_at(module, 0).with_cancellation(token.clone());
        token.cancel();
        let result = session.resolver().resolve_identifier("anything", &mut ctx, None);
        assert_eq!(result, Err(ResolveError::Cancelled));
    }
}
