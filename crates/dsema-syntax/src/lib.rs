//! Syntax tree consumed by the dsema resolution engine.
//!
//! The tree is produced by an external parser (or by [`builder::ModuleBuilder`])
//! and is never mutated by the engine. Declarations live in a per-module
//! arena; parent links are optional indices and every traversal helper is
//! bounded, so malformed trees cannot make a walk loop forever.

pub mod ast;
pub mod builder;
pub mod module;

pub use ast::*;
pub use builder::{BlockBuilder, ModuleBuilder};
pub use module::Module;
