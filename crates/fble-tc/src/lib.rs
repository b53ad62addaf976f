//! Surface syntax, typed IR, scope/capture tracking, and the
//! bidirectional checker of spec §4.C/§6: turns a [`Parser`]/
//! [`ModuleLoader`]-produced [`ast::Program`] into a checked [`tc::Tc`],
//! erasing names and types down to integer variable indices along the
//! way.

pub mod ast;
mod checker;
mod link;
mod loader;
mod scope;
pub mod tc;

pub use checker::Checker;
pub use link::link_modules;
pub use loader::{toposort_modules, LoadError, ModuleLoader, Parser};
