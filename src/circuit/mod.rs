/// Parameterized circuits and the AQL text front-end.
///
/// Pipeline: source text → Lexer → Parser → `Circuit`
///
/// Circuits can also be built directly through the `Circuit` builder API.
/// Errors from the text front-end carry source line numbers.
pub mod ir;
pub mod lexer;
pub mod parameter;
pub mod parser;

pub use ir::{Circuit, Instruction, ParameterOccurrence};
pub use parameter::{Angle, ParamExpr, Parameter};
pub use parser::parse;

use crate::Result;

/// One-shot: lex + parse an AQL source string, return the validated Circuit.
pub fn parse_source(source: &str) -> Result<Circuit> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(tokens)
}

/// Read and parse an AQL file.
pub fn parse_file(path: impl AsRef<std::path::Path>) -> Result<Circuit> {
    let source = std::fs::read_to_string(path)?;
    parse_source(&source)
}
