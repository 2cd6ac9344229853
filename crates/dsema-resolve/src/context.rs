//! Per-request resolution state.

use dsema_syntax::{DeclRef, ModuleId};
use fxhash::FxHashSet;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::ModuleIndex;
use crate::error::ResolutionDiagnostic;
use crate::types::{DeducedParams, TemplateValue};

/// Flags that change how lookups behave inside one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResolutionOptions {
    /// Do not walk into base classes (used while resolving base lists).
    pub dont_resolve_base_classes: bool,
    pub stop_after_first_match: bool,
    /// Stop at the nearest scope level that produced any match.
    pub stop_after_first_overload_set: bool,
    /// Yield aliases without resolving their targets.
    pub dont_resolve_aliases: bool,
    pub no_eponymous_substitution: bool,
    pub no_ufcs: bool,
}

/// One entry of the context stack.
#[derive(Debug, Clone)]
pub struct ContextFrame {
    /// Innermost enclosing function, aggregate or module root.
    pub scope: DeclRef,
    /// Source offset lookups are made from.
    pub position: usize,
    /// Template parameter bindings visible in this frame.
    pub deduced: DeducedParams,
    pub options: ResolutionOptions,
}

/// Cooperative cancellation flag shared between a caller and the request
/// it started.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The state one resolution request carries: a stack of frames, the
/// diagnostics sink, the cancellation token and the set of functions whose
/// `auto` return type is being inferred.
///
/// The stack is never empty; the bottom frame is the request's entry point.
#[derive(Debug)]
pub struct ResolutionContext {
    frames: Vec<ContextFrame>,
    diagnostics: Vec<ResolutionDiagnostic>,
    cancellation: CancellationToken,
    inferring: FxHashSet<DeclRef>,
}

impl ResolutionContext {
    /// A context positioned at `position` inside `scope`.
    pub fn new(scope: DeclRef, position: usize) -> Self {
        Self {
            frames: vec![ContextFrame {
                scope,
                position,
                deduced: DeducedParams::default(),
                options: ResolutionOptions::default(),
            }],
            diagnostics: Vec::new(),
            cancellation: CancellationToken::default(),
            inferring: FxHashSet::default(),
        }
    }

    /// A context at `position` in `module`, scoped to the innermost function
    /// or aggregate containing that offset.
    pub fn at(index: &ModuleIndex, module: ModuleId, position: usize) -> Self {
        let scope = index
            .module(module)
            .map(|m| m.innermost_scope_at(position))
            .unwrap_or(dsema_syntax::DeclId::ROOT);
        Self::new(DeclRef::new(module, scope), position)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn current(&self) -> &ContextFrame {
        // The bottom frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn scope(&self) -> DeclRef {
        self.current().scope
    }

    pub fn position(&self) -> usize {
        self.current().position
    }

    pub fn options(&self) -> ResolutionOptions {
        self.current().options
    }

    pub fn deduced(&self) -> &DeducedParams {
        &self.current().deduced
    }

    /// Binding of a template parameter in the current frame.
    pub fn lookup_deduced(&self, param: DeclRef) -> Option<&TemplateValue> {
        self.current().deduced.get(param)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes `frame`; it is popped when the guard drops.
    pub fn push(&mut self, frame: ContextFrame) -> FrameGuard<'_> {
        let depth = self.frames.len();
        self.frames.push(frame);
        FrameGuard { ctx: self, depth }
    }

    /// Enters `scope` at `position`, keeping bindings and options.
    pub fn push_scope(&mut self, scope: DeclRef, position: usize) -> FrameGuard<'_> {
        let frame = ContextFrame { scope, position, ..self.current().clone() };
        self.push(frame)
    }

    /// Adds `deduced` on top of the current bindings.
    pub fn push_deduced(&mut self, deduced: &DeducedParams) -> FrameGuard<'_> {
        let current = self.current();
        let frame = ContextFrame { deduced: current.deduced.merged(deduced), ..current.clone() };
        self.push(frame)
    }

    pub fn push_options(&mut self, update: impl FnOnce(&mut ResolutionOptions)) -> FrameGuard<'_> {
        let mut frame = self.current().clone();
        update(&mut frame.options);
        self.push(frame)
    }

    /// Records a non-fatal finding. Repeats of the same finding are dropped.
    pub fn record(&mut self, diagnostic: ResolutionDiagnostic) {
        if self.diagnostics.contains(&diagnostic) {
            return;
        }
        log::debug!("resolution diagnostic: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[ResolutionDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<ResolutionDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// A context for a worker thread: same frames and token, its own
    /// diagnostics and inference set.
    pub fn fork(&self) -> ResolutionContext {
        Self {
            frames: self.frames.clone(),
            diagnostics: Vec::new(),
            cancellation: self.cancellation.clone(),
            inferring: FxHashSet::default(),
        }
    }

    /// Marks `function` as having its return type inferred. `false` if it
    /// already is, i.e. the inference is recursive.
    pub(crate) fn begin_inference(&mut self, function: DeclRef) -> bool {
        self.inferring.insert(function)
    }

    pub(crate) fn end_inference(&mut self, function: DeclRef) {
        self.inferring.remove(&function);
    }
}

/// Restores the context stack to its entry depth when dropped.
pub struct FrameGuard<'c> {
    ctx: &'c mut ResolutionContext,
    depth: usize,
}

impl Deref for FrameGuard<'_> {
    type Target = ResolutionContext;

    fn deref(&self) -> &ResolutionContext {
        self.ctx
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut ResolutionContext {
        self.ctx
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.ctx.frames.truncate(self.depth.max(1));
    }
}
