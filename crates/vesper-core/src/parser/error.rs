//! Parser error messages for the Vesper programming language

use thiserror::Error;

/// The kind of parse error. These render to the messages recorded in the
/// diagnostic engine; the parser itself never unwinds on them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, got '{found}'")]
    Expected { expected: String, found: String },

    #[error("expected expression, got '{found}'")]
    ExpectedExpression { found: String },

    #[error("expected pattern")]
    ExpectedPattern,

    #[error("expected declaration (func, struct, class, enum, trait, impl, type)")]
    ExpectedDeclaration,

    #[error("expected 'ref' after 'mut' in type")]
    ExpectedRefAfterMut,

    #[error("expected method declaration in trait")]
    ExpectedTraitMethod,

    #[error("expected method declaration in impl block")]
    ExpectedImplMethod,

    #[error("top-level let/const statements are not yet supported outside functions")]
    TopLevelBinding,
}
