//! Type lowering from Vesper type references to Cranelift types
//!
//! Scalars map directly: signed and unsigned integers share widths, `Bool`
//! uses the backend's i8 boolean carrier, `Char` is a 32-bit scalar value,
//! and `Void` lowers to "no value". Everything without a scalar
//! representation (strings, references, user-declared types, tuples,
//! functions, arrays) lowers to the target's pointer type; generics lower by
//! substituting their base (monomorphization is a later concern).

use cranelift_codegen::ir::{types, Type as ClifType};

use crate::ast::{TypeKind, TypeNode};

/// Lowers Vesper types onto the target's Cranelift types
#[derive(Debug, Clone, Copy)]
pub struct TypeLowering {
    pointer_type: ClifType,
}

impl TypeLowering {
    #[must_use]
    pub fn new(pointer_type: ClifType) -> Self {
        Self { pointer_type }
    }

    /// The pointer type for the current target
    #[must_use]
    pub fn pointer_type(&self) -> ClifType {
        self.pointer_type
    }

    /// Lower a built-in type by name. `None` means `Void`; unknown names are
    /// not built-ins.
    #[must_use]
    pub fn lower_builtin(&self, name: &str) -> Option<Option<ClifType>> {
        let ty = match name {
            "Int8" | "UInt8" => types::I8,
            "Int16" | "UInt16" => types::I16,
            "Int32" | "UInt32" => types::I32,
            "Int64" | "UInt64" => types::I64,
            "Float32" => types::F32,
            "Float64" => types::F64,
            // Bool is the backend's boolean carrier
            "Bool" => types::I8,
            // Char is a Unicode scalar value
            "Char" => types::I32,
            "String" => self.pointer_type,
            "Void" => return Some(None),
            _ => return None,
        };
        Some(Some(ty))
    }

    /// Lower a type reference. `None` means the type has no value
    /// representation (`Void`).
    #[must_use]
    pub fn lower(&self, ty: &TypeNode) -> Option<ClifType> {
        match &ty.kind {
            TypeKind::Named { path } => {
                if path.len() == 1 {
                    if let Some(lowered) = self.lower_builtin(&path[0]) {
                        return lowered;
                    }
                }
                // User-declared and qualified types lower opaquely
                Some(self.pointer_type)
            }
            // Monomorphization is deferred; generics lower by their base
            TypeKind::Generic { base, .. } => self.lower(base),
            TypeKind::Reference { .. } | TypeKind::MutReference { .. } => Some(self.pointer_type),
            TypeKind::Tuple(_) | TypeKind::Function { .. } | TypeKind::Array { .. } => {
                Some(self.pointer_type)
            }
        }
    }

    /// Lower an optional return type annotation; a missing annotation is `Void`
    #[must_use]
    pub fn lower_return(&self, ty: Option<&TypeNode>) -> Option<ClifType> {
        ty.and_then(|t| self.lower(t))
    }
}
