//! Semantic error messages: name resolution and type checking

use thiserror::Error;

/// The kind of semantic error. Rendered into the diagnostic engine; semantic
/// analysis always runs to completion to surface as many problems as possible.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemaError {
    // ==================== Resolution errors ====================
    #[error("redefinition of '{0}'")]
    Redefinition(String),

    #[error("redefinition of variable '{0}'")]
    RedefinedVariable(String),

    #[error("redefinition of constant '{0}'")]
    RedefinedConstant(String),

    #[error("use of undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),

    // ==================== Type errors ====================
    #[error("unknown type '{0}' in let binding")]
    UnknownLetType(String),

    #[error("unknown type '{0}' in constant declaration")]
    UnknownConstType(String),

    #[error("unknown return type '{ty}' in function '{func}'")]
    UnknownReturnType { ty: String, func: String },

    #[error("unknown parameter type '{ty}' for parameter '{param}'")]
    UnknownParamType { ty: String, param: String },

    #[error("unknown field type '{ty}' for field '{field}' in struct '{owner}'")]
    UnknownStructFieldType {
        ty: String,
        field: String,
        owner: String,
    },

    #[error("unknown field type '{ty}' for field '{field}' in class '{owner}'")]
    UnknownClassFieldType {
        ty: String,
        field: String,
        owner: String,
    },

    #[error("unknown type '{ty}' in enum variant '{variant}'")]
    UnknownVariantType { ty: String, variant: String },

    #[error("unknown type '{ty}' in type alias '{name}'")]
    UnknownAliasType { ty: String, name: String },

    #[error("unknown type '{0}' in loop variable")]
    UnknownLoopVarType(String),

    #[error("parameter '{0}' must have an explicit type annotation")]
    ParamMissingAnnotation(String),

    #[error("variable '{0}' must have an explicit type annotation")]
    MissingAnnotation(String),

    #[error("type mismatch: expected '{expected}', got '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("return type mismatch: expected '{expected}', got '{found}'")]
    ReturnMismatch { expected: String, found: String },

    #[error("non-void function must return a value")]
    MissingReturnValue,

    #[error("condition must be of type 'Bool', got '{0}'")]
    ConditionNotBool(String),

    #[error("binary expression type mismatch: '{lhs}' vs '{rhs}'")]
    BinaryMismatch { lhs: String, rhs: String },
}
