//! Parsed modules: one declaration arena per source file.

use crate::ast::{dummy_span, span_contains, DeclId, DeclKind, Declaration, ModuleId};

/// A parsed module. Declarations live in an arena addressed by [`DeclId`];
/// slot 0 is the module root.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: ModuleId,
    /// Fully qualified name, e.g. `std.range.primitives`.
    pub name: String,
    pub file: Option<String>,
    decls: Vec<Declaration>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        let short = name.rsplit('.').next().unwrap_or(name);
        Self {
            id: ModuleId(0),
            name: name.to_string(),
            file: None,
            decls: vec![Declaration::new(short, DeclKind::Module, dummy_span())],
        }
    }

    pub fn root(&self) -> &Declaration {
        &self.decls[0]
    }

    pub fn decl(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.index())
    }

    pub fn decl_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.decls.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.len() <= 1
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls.iter().enumerate().map(|(i, d)| (DeclId(i as u32), d))
    }

    /// Appends `decl` to the arena and registers it with its parent.
    /// A parent index that does not exist is dropped.
    pub fn alloc(&mut self, mut decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        if let Some(parent) = decl.parent {
            match self.decls.get_mut(parent.index()) {
                Some(parent_decl) => parent_decl.children.push(id),
                None => decl.parent = None,
            }
        }
        self.decls.push(decl);
        id
    }

    /// Dotted package prefix; empty for top-level modules.
    pub fn package(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) => &self.name[..pos],
            None => "",
        }
    }

    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// First direct child of `parent` called `name`.
    pub fn child_named(&self, parent: DeclId, name: &str) -> Option<DeclId> {
        self.decl(parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.decl(*child).is_some_and(|d| d.name == name))
    }

    /// Iterates over `id`'s ancestors, nearest first. Stops after visiting as
    /// many nodes as the arena holds, so a malformed parent cycle terminates.
    pub fn ancestors(&self, id: DeclId) -> Ancestors<'_> {
        Ancestors { module: self, next: self.decl(id).and_then(|d| d.parent), budget: self.decls.len() }
    }

    /// The innermost function, aggregate or root declaration whose span
    /// contains `offset`.
    pub fn innermost_scope_at(&self, offset: usize) -> DeclId {
        let mut current = DeclId::ROOT;
        for _ in 0..self.decls.len() {
            let Some(decl) = self.decl(current) else { break };
            let next = decl.children.iter().copied().find(|child| {
                self.decl(*child).is_some_and(|d| {
                    matches!(d.kind, DeclKind::Function(_) | DeclKind::Aggregate(_)) && span_contains(d.span, offset)
                })
            });
            match next {
                Some(child) if child != current => current = child,
                _ => break,
            }
        }
        current
    }

    /// Walks `path` (`Outer.Inner.member`) down from the root.
    pub fn lookup_path(&self, path: &str) -> Option<DeclId> {
        path.split('.').try_fold(DeclId::ROOT, |parent, part| self.child_named(parent, part))
    }
}

pub struct Ancestors<'m> {
    module: &'m Module,
    next: Option<DeclId>,
    budget: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = DeclId;

    fn next(&mut self) -> Option<DeclId> {
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        let current = self.next?;
        self.next = self.module.decl(current).and_then(|d| d.parent);
        Some(current)
    }
}
