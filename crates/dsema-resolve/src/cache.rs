//! The Result Cache: every parsed module the engine knows about, plus name
//! indexes over them.
//!
//! Readers work on an immutable [`ModuleIndex`] snapshot. Writers rebuild the
//! snapshot copy-on-write under a `parking_lot::RwLock`, so a traversal that
//! holds a snapshot never observes a half-applied update.

use dsema_syntax::{DeclId, DeclKind, DeclRef, Declaration, Module, ModuleId};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::DeclHandle;

/// A package prefix and the modules below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub path: String,
    pub modules: Vec<ModuleId>,
}

/// One cached module with the names it declares. Built once when the
/// module is added; later snapshots share it instead of copying it.
#[derive(Debug)]
struct ModuleShard {
    module: Arc<Module>,
    types: FxHashMap<String, Vec<DeclRef>>,
    globals: FxHashMap<String, Vec<DeclRef>>,
}

impl ModuleShard {
    /// Records every named type, recursing into nested aggregates, and every
    /// other module-level symbol.
    fn build(module: Module) -> Self {
        let id = module.id;
        let mut types: FxHashMap<String, Vec<DeclRef>> = FxHashMap::default();
        let mut globals: FxHashMap<String, Vec<DeclRef>> = FxHashMap::default();
        let mut stack = vec![DeclId::ROOT];
        let mut budget = module.len();
        while let Some(scope) = stack.pop() {
            if budget == 0 {
                break;
            }
            budget -= 1;
            let Some(scope_decl) = module.decl(scope) else { continue };
            for &child in &scope_decl.children {
                let Some(decl) = module.decl(child) else { continue };
                let decl_ref = DeclRef::new(id, child);
                if decl.is_type() {
                    if !decl.name.is_empty() {
                        types.entry(decl.name.clone()).or_default().push(decl_ref);
                    }
                    if matches!(decl.kind, DeclKind::Aggregate(_) | DeclKind::Enum) {
                        stack.push(child);
                    }
                } else if scope == DeclId::ROOT && !matches!(decl.kind, DeclKind::Import(_)) && !decl.name.is_empty() {
                    globals.entry(decl.name.clone()).or_default().push(decl_ref);
                }
                if scope == DeclId::ROOT && decl.is_anonymous_enum() {
                    for &member in &decl.children {
                        if let Some(member_decl) = module.decl(member) {
                            globals.entry(member_decl.name.clone()).or_default().push(DeclRef::new(id, member));
                        }
                    }
                }
            }
        }
        Self { module: Arc::new(module), types, globals }
    }
}

/// An immutable view of all cached modules.
///
/// Every index is list-valued: two modules may share a name and two modules
/// may declare types of the same name. Cloning copies one pointer per module;
/// declaration indexes live in the shared shards.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    shards: FxHashMap<ModuleId, Arc<ModuleShard>>,
    /// Insertion order, for deterministic iteration.
    order: Vec<ModuleId>,
    by_name: FxHashMap<Arc<str>, Vec<ModuleId>>,
    /// Every dotted prefix of every module's package.
    packages: FxHashMap<Arc<str>, Vec<ModuleId>>,
    next_id: u32,
}

impl ModuleIndex {
    /// Assigns `module` a fresh id and indexes it.
    fn insert(&mut self, mut module: Module) -> ModuleId {
        let id = ModuleId(self.next_id);
        self.next_id += 1;
        module.id = id;

        self.by_name.entry(Arc::from(module.name.as_str())).or_default().push(id);

        let mut prefix = String::new();
        for part in module.package().split('.').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(part);
            self.packages.entry(Arc::from(prefix.as_str())).or_default().push(id);
        }

        let shard = ModuleShard::build(module);
        log::debug!("cached module `{}` as {:?} ({} declarations)", shard.module.name, id, shard.module.len());

        self.order.push(id);
        self.shards.insert(id, Arc::new(shard));
        id
    }

    /// Shards in insertion order.
    fn shards(&self) -> impl Iterator<Item = &ModuleShard> {
        self.order.iter().filter_map(|id| self.shards.get(id)).map(Arc::as_ref)
    }

    /// An empty index that keeps handing out fresh ids, so references into
    /// modules dropped by a clear never alias new ones.
    fn cleared(&self) -> Self {
        Self { next_id: self.next_id, ..Self::default() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn module(&self, id: ModuleId) -> Option<&Arc<Module>> {
        self.shards.get(&id).map(|shard| &shard.module)
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.shards().map(|shard| &shard.module)
    }

    pub fn decl(&self, decl: DeclRef) -> Option<&Declaration> {
        self.shards.get(&decl.module)?.module.decl(decl.decl)
    }

    /// A display handle for `decl`; unknown references get an empty name.
    pub fn handle(&self, decl: DeclRef) -> DeclHandle {
        DeclHandle::new(decl, self.decl(decl).map(|d| d.name.as_str()).unwrap_or_default())
    }

    /// Parent of `decl` as a cross-module reference.
    pub fn parent(&self, decl: DeclRef) -> Option<DeclRef> {
        self.decl(decl)?.parent.map(|p| DeclRef::new(decl.module, p))
    }

    /// Every module registered under `name`.
    pub fn modules_named(&self, name: &str) -> &[ModuleId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// The first module registered under `name`.
    pub fn lookup_module_by_name(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules_named(name).first().and_then(|id| self.module(*id))
    }

    /// The package `path` if any cached module lives under it.
    pub fn lookup_package(&self, path: &str) -> Option<Package> {
        self.packages
            .get(path)
            .map(|modules| Package { path: path.to_string(), modules: modules.clone() })
    }

    pub fn is_package(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    /// Every type named `name`, across modules in insertion order.
    pub fn types_named(&self, name: &str) -> Vec<DeclRef> {
        self.shards().filter_map(|shard| shard.types.get(name)).flatten().copied().collect()
    }

    pub fn globals_named(&self, name: &str) -> Vec<DeclRef> {
        self.shards().filter_map(|shard| shard.globals.get(name)).flatten().copied().collect()
    }
}

/// Shared, thread-safe owner of the current [`ModuleIndex`] snapshot.
#[derive(Debug, Default)]
pub struct ResultCache {
    snapshot: RwLock<Arc<ModuleIndex>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parsed module and returns the id it was assigned.
    ///
    /// Snapshots handed out earlier are unaffected. If any of them is still
    /// alive the index is cloned, which shares every existing module shard.
    pub fn add(&self, module: Module) -> ModuleId {
        let mut guard = self.snapshot.write();
        Arc::make_mut(&mut guard).insert(module)
    }

    pub fn add_all(&self, modules: impl IntoIterator<Item = Module>) -> Vec<ModuleId> {
        let mut guard = self.snapshot.write();
        let index = Arc::make_mut(&mut guard);
        modules.into_iter().map(|module| index.insert(module)).collect()
    }

    /// Drops every cached module.
    pub fn clear(&self) {
        let mut guard = self.snapshot.write();
        let cleared = guard.cleared();
        *guard = Arc::new(cleared);
        log::debug!("result cache cleared");
    }

    /// The current index. Cheap; never blocks on other readers.
    pub fn snapshot(&self) -> Arc<ModuleIndex> {
        self.snapshot.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsema_syntax::{ModuleBuilder, TypeDecl};

    fn module_with_struct(name: &str, ty: &str) -> Module {
        let mut m = ModuleBuilder::new(name);
        let root = m.root();
        let s = m.struct_decl(root, ty);
        m.struct_decl(s, "Inner");
        m.variable(root, "counter", Some(TypeDecl::int()), None);
        m.finish()
    }

    #[test]
    fn package_prefixes_are_indexed() {
        let cache = ResultCache::new();
        cache.add(module_with_struct("std.range.primitives", "R"));
        let index = cache.snapshot();
        assert!(index.is_package("std"));
        assert!(index.is_package("std.range"));
        assert!(!index.is_package("std.range.primitives"));
        assert_eq!(index.lookup_package("std").map(|p| p.modules.len()), Some(1));
    }

    #[test]
    fn nested_types_and_globals_are_indexed() {
        let cache = ResultCache::new();
        let id = cache.add(module_with_struct("a", "S"));
        let index = cache.snapshot();
        assert_eq!(index.types_named("S").len(), 1);
        assert_eq!(index.types_named("Inner").len(), 1);
        assert_eq!(index.globals_named("counter"), vec![DeclRef::new(id, DeclId(3))]);
    }

    #[test]
    fn snapshots_survive_later_writes() {
        let cache = ResultCache::new();
        cache.add(module_with_struct("a", "S"));
        let before = cache.snapshot();
        cache.add(module_with_struct("b", "S"));
        assert_eq!(before.len(), 1);
        assert_eq!(cache.snapshot().types_named("S").len(), 2);
    }

    #[test]
    fn writes_share_existing_modules_with_live_snapshots() {
        let cache = ResultCache::new();
        let a = cache.add(module_with_struct("a", "S"));
        let before = cache.snapshot();
        cache.add(module_with_struct("b", "T"));
        let after = cache.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&before.shards[&a], &after.shards[&a]));
        assert!(before.types_named("T").is_empty());
        assert_eq!(after.types_named("T").len(), 1);
    }

    #[test]
    fn clear_keeps_ids_fresh() {
        let cache = ResultCache::new();
        let first = cache.add(module_with_struct("a", "S"));
        cache.clear();
        assert!(cache.snapshot().is_empty());
        let second = cache.add(module_with_struct("a", "S"));
        assert_ne!(first, second);
    }
}
