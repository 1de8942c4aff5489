//! Type reference AST nodes for the Vesper programming language
//!
//! These represent the syntactic form of types as written in source. The type
//! checker reduces them to textual names; the code generator lowers them to
//! backend types.

use crate::lexer::Span;

use super::Spanned;

/// A type reference with source location
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub span: Span,
}

impl TypeNode {
    #[must_use]
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create a simple named type
    #[must_use]
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self::new(
            TypeKind::Named {
                path: vec![name.into()],
            },
            span,
        )
    }

    /// Reduce this type reference to the textual form the type checker
    /// operates on: `"Int32"`, `"HashMap"`, `"&T"`, `"[T]"`, ...
    #[must_use]
    pub fn name_string(&self) -> String {
        match &self.kind {
            TypeKind::Named { path } => path.join("::"),
            // Generics reduce to their base name; argument validation is a
            // monomorphization concern
            TypeKind::Generic { base, .. } => base.name_string(),
            TypeKind::Reference { inner, .. } => format!("&{}", inner.name_string()),
            TypeKind::MutReference { inner, .. } => format!("&mut {}", inner.name_string()),
            TypeKind::Array { element, .. } => format!("[{}]", element.name_string()),
            TypeKind::Tuple(_) => "(tuple)".to_string(),
            TypeKind::Function { .. } => "(func)".to_string(),
        }
    }
}

impl Spanned for TypeNode {
    fn span(&self) -> Span {
        self.span
    }
}

/// The kind of type reference
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// `Int32`, `String`, `std::collections::Map`
    Named { path: Vec<String> },

    /// `Vec<Int32>`, `Map<String, Int32>`; the base is always a named type
    Generic {
        base: Box<TypeNode>,
        args: Vec<TypeNode>,
    },

    /// `ref T` / `&T`
    Reference {
        inner: Box<TypeNode>,
        lifetime: Option<String>,
    },

    /// `mut ref T` / `&mut T`
    MutReference {
        inner: Box<TypeNode>,
        lifetime: Option<String>,
    },

    /// `(Int32, String)`
    Tuple(Vec<TypeNode>),

    /// `(Int32, Int32) -> Int32`
    Function {
        params: Vec<TypeNode>,
        ret: Box<TypeNode>,
    },

    /// `Array<T>` / `Array<T, 5>`, written as generic application over the
    /// `Array` base; the size is captured when present
    Array {
        element: Box<TypeNode>,
        size: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_strings() {
        let span = Span::dummy();
        assert_eq!(TypeNode::named("Int32", span).name_string(), "Int32");

        let path = TypeNode::new(
            TypeKind::Named {
                path: vec!["std".into(), "collections".into(), "Map".into()],
            },
            span,
        );
        assert_eq!(path.name_string(), "std::collections::Map");

        let generic = TypeNode::new(
            TypeKind::Generic {
                base: Box::new(TypeNode::named("Vec", span)),
                args: vec![TypeNode::named("Int32", span)],
            },
            span,
        );
        assert_eq!(generic.name_string(), "Vec");

        let reference = TypeNode::new(
            TypeKind::Reference {
                inner: Box::new(TypeNode::named("T", span)),
                lifetime: None,
            },
            span,
        );
        assert_eq!(reference.name_string(), "&T");

        let mut_ref = TypeNode::new(
            TypeKind::MutReference {
                inner: Box::new(TypeNode::named("T", span)),
                lifetime: None,
            },
            span,
        );
        assert_eq!(mut_ref.name_string(), "&mut T");
    }
}
