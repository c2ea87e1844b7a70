pub mod ast;
mod cache;
mod capture;
pub mod compiler;
pub mod delta;
mod guard;
mod guards;
pub mod install;
pub mod naming;
pub mod parser;
pub mod quote;
mod timestamps;
mod touch;
pub mod validate;


pub use compiler::{Compilation, Compiler};
pub use install::{install, Database, Script};
pub use parser::parse_rules;
pub use quote::{PgQuoting, Quoting};
pub use validate::ConfigError;
