//! Semantic analysis for the Vesper compiler
//!
//! Sema is two sequential passes over a parsed module: name resolution (build
//! the symbol table, bind every identifier) followed by type checking. Both
//! passes run to completion to surface as many problems as possible; the
//! driver gates code generation on the diagnostic engine's error count.

mod check;
mod error;
mod resolve;

pub use check::TypeChecker;
pub use error::SemaError;
pub use resolve::{Resolver, Scope, ScopeId, Symbol, SymbolKind, SymbolTable};

use crate::ast::Module;
use crate::diagnostics::DiagnosticEngine;
use crate::source::{FileId, SourceMap};

/// Semantic analysis driver: name resolution, then type checking
pub struct Sema<'d, 'm> {
    diag: &'d mut DiagnosticEngine,
    source_map: &'m SourceMap,
    file: FileId,
}

impl<'d, 'm> Sema<'d, 'm> {
    pub fn new(diag: &'d mut DiagnosticEngine, source_map: &'m SourceMap, file: FileId) -> Self {
        Self {
            diag,
            source_map,
            file,
        }
    }

    /// Analyze a module. Returns the populated symbol table; callers consult
    /// the diagnostic engine for success.
    pub fn analyze(self, module: &Module) -> SymbolTable {
        let table = Resolver::new(self.diag, self.source_map, self.file).resolve(module);
        TypeChecker::new(self.diag, &table, self.source_map, self.file).check(module);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn sema_runs_both_passes() {
        // One resolution error and one type error; both must surface
        let source = "func f() -> Void { let a: Int32 = missing; let b: Int32 = \"s\"; }";
        let mut diag = DiagnosticEngine::silent();
        let mut map = SourceMap::new();
        let file = map.load_from_string("test.vsp", source);
        let module = Parser::from_source(source, "test.vsp", &mut diag).parse_module();

        Sema::new(&mut diag, &map, file).analyze(&module);

        let messages: Vec<_> = diag.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("undeclared identifier 'missing'")));
        assert!(messages.iter().any(|m| m.contains("expected 'Int32', got 'String'")));
    }
}
