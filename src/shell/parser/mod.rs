pub mod ast;
mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use parser::{ParseError, Parser};
