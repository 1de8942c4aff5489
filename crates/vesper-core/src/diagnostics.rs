//! Diagnostic engine for the Vesper compiler
//!
//! Collects structured errors and warnings with source locations, optional
//! notes, and suggested fixes. Emission never aborts compilation; every stage
//! records what it finds and the driver checks [`DiagnosticEngine::has_errors`]
//! between stages.
//!
//! Rendered output follows the compiler's error style:
//!
//! ```text
//! error: type mismatch: expected 'Int32', got 'String'
//!   --> src/main.vsp:12:9
//!    |
//!    |
//!   help: you might need to parse the string to an integer
//! ```

use crate::source::SourceLocation;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// The label used when rendering
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A related note attached to a diagnostic
#[derive(Debug, Clone)]
pub struct DiagnosticNote {
    pub location: SourceLocation,
    pub message: String,
}

/// A suggested fix attached to a diagnostic
#[derive(Debug, Clone)]
pub struct DiagnosticFix {
    /// Replacement text; empty when the fix is purely descriptive
    pub replacement: String,
    pub description: String,
}

/// A single diagnostic message with source location and optional hints
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
    pub notes: Vec<DiagnosticNote>,
    pub fixes: Vec<DiagnosticFix>,
}

impl Diagnostic {
    /// Create a new diagnostic
    #[must_use]
    pub fn new(severity: Severity, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            severity,
            location,
            message: message.into(),
            notes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Attach a related note
    #[must_use]
    pub fn with_note(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.notes.push(DiagnosticNote {
            location,
            message: message.into(),
        });
        self
    }

    /// Attach a suggested fix
    #[must_use]
    pub fn with_fix(mut self, replacement: impl Into<String>, description: impl Into<String>) -> Self {
        self.fixes.push(DiagnosticFix {
            replacement: replacement.into(),
            description: description.into(),
        });
        self
    }

    /// Render this diagnostic in the compiler's error style
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}: {}\n", self.severity, self.message));

        if self.location.is_valid() {
            out.push_str(&format!("  --> {}\n", self.location));
            out.push_str("   |\n");
            out.push_str("   |\n");
        }

        for note in &self.notes {
            out.push_str(&format!("  note: {}\n", note.message));
            if note.location.is_valid() {
                out.push_str(&format!("    --> {}\n", note.location));
            }
        }

        for fix in &self.fixes {
            out.push_str(&format!("  help: {}\n", fix.description));
            if !fix.replacement.is_empty() {
                out.push_str(&format!("    suggested: {}\n", fix.replacement));
            }
        }

        out
    }
}

/// Handler invoked for each diagnostic as it is emitted
pub type DiagnosticHandler = Box<dyn FnMut(&Diagnostic)>;

/// Collects diagnostics for a compilation run
///
/// Append-only: diagnostics are never discarded silently, and rendering order
/// matches emission order.
pub struct DiagnosticEngine {
    handler: Option<DiagnosticHandler>,
    diagnostics: Vec<Diagnostic>,
    error_count: u32,
    warning_count: u32,
}

impl std::fmt::Debug for DiagnosticEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticEngine")
            .field("diagnostics", &self.diagnostics)
            .field("error_count", &self.error_count)
            .field("warning_count", &self.warning_count)
            .finish_non_exhaustive()
    }
}

impl Default for DiagnosticEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticEngine {
    /// Create an engine whose default handler renders to stderr
    #[must_use]
    pub fn new() -> Self {
        Self {
            handler: Some(Box::new(|diag| {
                eprint!("{}", diag.render());
            })),
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Create an engine that only collects (used by tests and tooling)
    #[must_use]
    pub fn silent() -> Self {
        Self {
            handler: None,
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Replace the emission handler
    pub fn set_handler(&mut self, handler: DiagnosticHandler) {
        self.handler = Some(handler);
    }

    /// Emit an error diagnostic
    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.emit(Diagnostic::new(Severity::Error, location, message));
    }

    /// Emit a warning diagnostic
    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.emit(Diagnostic::new(Severity::Warning, location, message));
    }

    /// Emit a note diagnostic
    pub fn note(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.emit(Diagnostic::new(Severity::Note, location, message));
    }

    /// Emit a fatal diagnostic (unrecoverable I/O and backend failures)
    pub fn fatal(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.emit(Diagnostic::new(Severity::Fatal, location, message));
    }

    /// Emit a diagnostic with full detail
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error | Severity::Fatal => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }

        if let Some(handler) = &mut self.handler {
            handler(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    /// Whether any Error or Fatal diagnostic has been emitted
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of Error and Fatal diagnostics emitted
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Number of Warning diagnostics emitted
    #[must_use]
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    /// All collected diagnostics, in emission order
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Reset all state
    pub fn reset(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> SourceLocation {
        SourceLocation {
            file: "test.vsp".to_string(),
            line,
            column,
            offset: 0,
        }
    }

    #[test]
    fn counters_track_severity() {
        let mut diag = DiagnosticEngine::silent();
        diag.note(loc(1, 1), "a note");
        diag.warning(loc(1, 2), "a warning");
        diag.error(loc(2, 1), "an error");
        diag.fatal(loc(3, 1), "a fatal error");

        assert_eq!(diag.error_count(), 2);
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.has_errors());
        assert_eq!(diag.diagnostics().len(), 4);
    }

    #[test]
    fn emission_never_discards() {
        let mut diag = DiagnosticEngine::silent();
        for i in 0..10 {
            diag.error(loc(i, 1), format!("error {i}"));
        }
        assert_eq!(diag.diagnostics().len(), 10);
        // Order matches emission order
        assert_eq!(diag.diagnostics()[3].message, "error 3");
    }

    #[test]
    fn handler_sees_each_diagnostic() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut diag = DiagnosticEngine::silent();
        diag.set_handler(Box::new(move |d| {
            sink.borrow_mut().push(d.message.clone());
        }));

        diag.error(loc(1, 1), "first");
        diag.warning(loc(2, 2), "second");

        assert_eq!(*seen.borrow(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn render_shape() {
        let d = Diagnostic::new(Severity::Error, loc(12, 9), "mismatched types")
            .with_note(loc(10, 5), "declared here")
            .with_fix("Int64", "change the annotation");

        let rendered = d.render();
        assert!(rendered.starts_with("error: mismatched types\n"));
        assert!(rendered.contains("--> test.vsp:12:9"));
        assert!(rendered.contains("note: declared here"));
        assert!(rendered.contains("help: change the annotation"));
        assert!(rendered.contains("suggested: Int64"));
    }

    #[test]
    fn invalid_location_skips_arrow_line() {
        let d = Diagnostic::new(Severity::Error, SourceLocation::unknown(), "boom");
        let rendered = d.render();
        assert!(!rendered.contains("-->"));
    }

    #[test]
    fn reset_clears_state() {
        let mut diag = DiagnosticEngine::silent();
        diag.error(loc(1, 1), "boom");
        diag.reset();
        assert!(!diag.has_errors());
        assert!(diag.diagnostics().is_empty());
    }
}
