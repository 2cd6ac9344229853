use dsema_resolve::{AbstractType, ResolutionSession, Resolver, ResolverConfig};
use dsema_syntax::{Expr, Module, ModuleId};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A single-threaded session holding `modules`, in order.
pub fn session_with(modules: Vec<Module>) -> (ResolutionSession, Vec<ModuleId>) {
    init_logging();
    let session = ResolutionSession::new(ResolverConfig::sequential());
    let ids = session.add_modules(modules);
    (session, ids)
}

pub fn render(types: &[AbstractType]) -> Vec<String> {
    types.iter().map(ToString::to_string).collect()
}

/// Resolves `name` at `position` and renders what it denotes.
pub fn identifier_at(resolver: &Resolver, module: ModuleId, position: usize, name: &str) -> Vec<String> {
    let mut ctx = resolver.context_at(module, position);
    render(&resolver.resolve_identifier(name, &mut ctx, None).expect("not cancelled"))
}

pub fn expression_at(resolver: &Resolver, module: ModuleId, position: usize, expr: &Expr) -> Vec<String> {
    let mut ctx = resolver.context_at(module, position);
    render(&resolver.resolve_expression(expr, &mut ctx).expect("not cancelled"))
}
