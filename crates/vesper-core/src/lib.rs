//! Vesper Core - Language engine for the Vesper programming language
//!
//! This crate provides the core compilation pipeline:
//! - Source map: file contents and location lookup
//! - Diagnostics: structured error collection and rendering
//! - Lexer: tokenization of Vesper source code
//! - AST: abstract syntax tree definitions
//! - Parser: AST construction from the token stream
//! - Sema: name resolution and type checking
//! - CodeGen: lowering to Cranelift IR and native objects
//!
//! The pipeline is strictly sequential; every stage reports into the shared
//! [`diagnostics::DiagnosticEngine`], and code generation only runs when the
//! earlier stages produced no errors.

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source map - owns file contents, maps offsets to line/column
pub mod source;

/// Diagnostic engine - severity-tagged error collection and rendering
pub mod diagnostics;

/// Lexer module - tokenization of Vesper source code
pub mod lexer;

/// Abstract Syntax Tree - parsed representation of Vesper source code
pub mod ast;

/// Parser module - converts tokens into AST
pub mod parser;

/// Semantic analysis - name resolution and type checking
pub mod sema;

/// Code generation - Cranelift IR emission and object output
pub mod codegen;

/// Convenience re-export of the source map
pub use source::SourceMap;

/// Convenience re-export of the diagnostic engine
pub use diagnostics::DiagnosticEngine;

/// Convenience re-export of the lexer
pub use lexer::Lexer;

/// Convenience re-export of the parser
pub use parser::Parser;

/// Convenience re-export of the sema driver
pub use sema::Sema;

/// Convenience re-export of the code generator
pub use codegen::CodeGen;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
