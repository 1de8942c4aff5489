//! Pattern AST nodes for match expressions

use crate::lexer::Span;

use super::{Expr, Spanned};

/// A pattern with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

impl Pattern {
    #[must_use]
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl Spanned for Pattern {
    fn span(&self) -> Span {
        self.span
    }
}

/// The kind of pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `_`
    Wildcard,

    /// Binds the matched value to a name
    Ident { name: String, mutable: bool },

    /// Matches a specific literal value (int, string, bool)
    Literal(Box<Expr>),

    /// `(a, b, c)`
    Tuple(Vec<Pattern>),

    /// `Option::Some(value)` or `Message::Move { x, y }`
    ///
    /// Positional and named fields are mutually exclusive for a given variant.
    Constructor {
        path: Vec<String>,
        positional: Vec<Pattern>,
        named: Vec<NamedFieldPattern>,
    },

    /// `pattern1 | pattern2`
    Or(Vec<Pattern>),
}

/// A named field inside a constructor pattern. The shorthand `{ x }` expands
/// to `{ x: x }`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedFieldPattern {
    pub name: String,
    pub pattern: Pattern,
    pub span: Span,
}
