//! Tree-walking interpreter for the Jazz scripting language.
//!
//! The pipeline is strictly linear per chunk (one file or one REPL line):
//! scanner → parser → resolver → evaluator.  [`run`] drives all four stages
//! against a caller-owned [`Interpreter`], so REPL definitions accumulate
//! across chunks while file runs get a fresh instance.

pub mod ast;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use log::{debug, info};

use crate::error::JazzError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Runs one chunk of source to completion.
///
/// On failure, returns every error the failing stage produced (the scanner
/// and parser can report several per chunk; the resolver and evaluator stop
/// at the first).  Any error aborts the chunk before the next stage runs.
pub fn run(interpreter: &mut Interpreter, source: &str) -> Result<(), Vec<JazzError>> {
    info!("Running chunk of {} byte(s)", source.len());

    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<JazzError> = Vec::new();

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),

            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        debug!("Chunk aborted with {} lexical error(s)", errors.len());
        return Err(errors);
    }

    let mut parser = Parser::new(tokens).with_base_id(interpreter.node_id_base());
    let parsed = parser.parse();
    interpreter.note_node_ids(parser.id_watermark());

    let statements = parsed?;

    Resolver::new(interpreter)
        .resolve(&statements)
        .map_err(|e| vec![e])?;

    interpreter.interpret(&statements).map_err(|e| vec![e])?;

    Ok(())
}
