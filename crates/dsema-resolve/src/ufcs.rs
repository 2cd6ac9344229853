//! Uniform function call syntax: free functions usable as methods of a
//! value whose first parameter accepts it.
//!
//! Large candidate sets are split across the session's [`WorkerPool`].
//! Every worker scans its share with a forked context, and the caller
//! waits for all of them up to the configured deadline.

use crossbeam::channel::bounded;
use dsema_syntax::{AggregateKind, DeclRef};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::context::ResolutionContext;
use crate::core::Resolver;
use crate::error::ResolutionDiagnostic;
use crate::pool::WorkerPool;
use crate::scopes::ScopeWalker;
use crate::templates::TemplateEngine;
use crate::types::{AbstractType, SymbolRef};

/// Scans one share of the candidates.
type Scan = fn(&Resolver, &[DeclRef], &AbstractType, &mut ResolutionContext) -> Vec<AbstractType>;

pub struct UfcsResolver<'r> {
    resolver: &'r Resolver,
}

impl<'r> UfcsResolver<'r> {
    pub fn new(resolver: &'r Resolver) -> Self {
        Self { resolver }
    }

    /// Free functions named `name`, visible from the current frame, that
    /// accept `value_type` as their first argument. Each is returned as the
    /// function's `Member` type, in a canonical order.
    pub fn resolve(&self, value_type: &AbstractType, name: &str, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        let candidates = self.candidates(name, ctx);
        if candidates.is_empty() {
            return Vec::new();
        }
        let config = &self.resolver.config.ufcs;
        let mut found = match &self.resolver.pool {
            Some(pool) if config.parallel && candidates.len() >= config.parallel_threshold => {
                log::debug!("scanning {} UFCS candidates for `{name}` on {} workers", candidates.len(), pool.size());
                self.resolve_parallel(pool, candidates, value_type, name, scan, ctx)
            }
            _ => scan(self.resolver, &candidates, value_type, ctx),
        };
        sort_canonically(&mut found);
        found
    }

    /// Free functions, including function templates, named `name`. Methods
    /// of aggregates are not UFCS candidates.
    fn candidates(&self, name: &str, ctx: &mut ResolutionContext) -> Vec<DeclRef> {
        let index = &self.resolver.index;
        let position = ctx.position();
        let symbols = ScopeWalker::new(self.resolver).find_by_name(ctx, position, name);
        let mut candidates: Vec<DeclRef> = symbols
            .iter()
            .filter_map(SymbolRef::decl)
            .filter(|&decl| index.decl(decl).is_some_and(|d| d.is_function()))
            .filter(|&decl| {
                let parent = index.parent(decl).and_then(|p| index.decl(p)).and_then(|p| p.as_aggregate());
                !parent.is_some_and(|aggregate| aggregate.kind != AggregateKind::Template)
            })
            .collect();
        candidates.dedup();
        candidates
    }

    /// Splits `candidates` into one chunk per worker. Each chunk is scanned
    /// under `catch_unwind`; a panicking chunk is reported and the others
    /// still contribute. Gives up waiting once the join deadline passes.
    fn resolve_parallel(
        &self,
        pool: &WorkerPool,
        candidates: Vec<DeclRef>,
        value_type: &AbstractType,
        name: &str,
        scan: Scan,
        ctx: &mut ResolutionContext,
    ) -> Vec<AbstractType> {
        let workers = pool.size().min(candidates.len()).max(1);
        let chunk_size = candidates.len().div_ceil(workers);
        let chunks: Vec<Vec<DeclRef>> = candidates.chunks(chunk_size).map(<[DeclRef]>::to_vec).collect();
        let total = chunks.len();

        let results = Arc::new(Mutex::new(Vec::new()));
        let faults = Arc::new(Mutex::new(Vec::new()));
        let (done, finished_rx) = bounded::<usize>(total);

        for (worker, chunk) in chunks.into_iter().enumerate() {
            let resolver = self.resolver.clone();
            let target = value_type.clone();
            let results = Arc::clone(&results);
            let faults = Arc::clone(&faults);
            let done = done.clone();
            let mut forked = ctx.fork();
            pool.execute(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    // Nested UFCS from inside a worker would wait on its own pool.
                    let mut ctx = forked.push_options(|options| options.no_ufcs = true);
                    let found = scan(&resolver, &chunk, &target, &mut ctx);
                    let diagnostics = ctx.take_diagnostics();
                    (found, diagnostics)
                }));
                match outcome {
                    Ok((found, diagnostics)) => {
                        results.lock().extend(found);
                        faults.lock().extend(diagnostics);
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        log::error!("UFCS worker {worker} panicked: {message}");
                        faults.lock().push(ResolutionDiagnostic::UfcsWorkerFault { worker, message });
                    }
                }
                done.send(worker).ok();
            });
        }
        drop(done);

        let timeout = self.resolver.config.ufcs.join_timeout();
        let deadline = Instant::now() + timeout;
        let mut finished = 0;
        while finished < total {
            match finished_rx.recv_deadline(deadline) {
                Ok(_) => finished += 1,
                Err(_) => {
                    log::warn!("UFCS lookup for `{name}` timed out with {finished}/{total} workers done");
                    ctx.record(ResolutionDiagnostic::UfcsTimeout {
                        name: name.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                        finished,
                        total,
                    });
                    break;
                }
            }
        }

        for diagnostic in faults.lock().drain(..) {
            ctx.record(diagnostic);
        }
        let collected = results.lock().clone();
        collected
    }
}

/// Keeps the functions in `chunk` whose first parameter accepts `target`.
fn scan(resolver: &Resolver, chunk: &[DeclRef], target: &AbstractType, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
    let engine = TemplateEngine::new(resolver);
    let mut found = Vec::new();
    for &function in chunk {
        if ctx.is_cancelled() {
            break;
        }
        if engine.accepts_receiver(function, target, ctx) {
            found.extend(resolver.symbol_type(&SymbolRef::Decl(function), ctx));
        }
    }
    found
}

fn sort_canonically(found: &mut Vec<AbstractType>) {
    found.sort_by_cached_key(|ty| (ty.symbol().and_then(SymbolRef::decl), ty.to_string()));
    found.dedup();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Resolver {
    /// UFCS members of `target` named `name`.
    pub(crate) fn ufcs_members(&self, target: &AbstractType, name: &str, ctx: &mut ResolutionContext) -> Vec<AbstractType> {
        UfcsResolver::new(self).resolve(target, name, ctx)
    }
}
