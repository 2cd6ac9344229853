pub mod common;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use common::*;
pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use types::*;
