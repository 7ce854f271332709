//! Parsers for structured symbol names.
//!
//! - [`bytecode`]: managed bytecode symbols carrying a source-map style
//!   location (`func:[url:entry|pkg|version|path:line:col]`)
//! - [`mangled`]: native multiplatform mangled names (`kfun:pkg.Class#member`)
//!
//! Both parsers are opportunistic: a symbol that does not follow the grammar
//! yields `None` and keeps its file classification unchanged.

pub mod bytecode;
pub mod mangled;

pub use bytecode::BytecodeSymbol;
pub use mangled::{MangledSymbol, MANGLE_PREFIX};
