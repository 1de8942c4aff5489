//! Declaration AST nodes for the Vesper programming language

use crate::lexer::Span;

use super::{Block, Spanned, TypeNode};

/// Visibility of a declaration, controlling linkage and cross-module access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// A top-level declaration with its visibility
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    pub vis: Visibility,
    pub span: Span,
}

impl Decl {
    #[must_use]
    pub fn new(kind: DeclKind, vis: Visibility, span: Span) -> Self {
        Self { kind, vis, span }
    }

    /// The declared name, when the declaration introduces one
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            DeclKind::Func(f) => Some(&f.name),
            DeclKind::Struct(s) => Some(&s.name),
            DeclKind::Class(c) => Some(&c.name),
            DeclKind::Enum(e) => Some(&e.name),
            DeclKind::Trait(t) => Some(&t.name),
            DeclKind::TypeAlias(t) => Some(&t.name),
            DeclKind::Impl(_) => None,
        }
    }
}

impl Spanned for Decl {
    fn span(&self) -> Span {
        self.span
    }
}

/// The kind of top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Func(FuncDecl),
    Struct(StructDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
    TypeAlias(TypeAliasDecl),
}

/// `import std::collections::Map;`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub path: Vec<String>,
    /// `import X as Y`
    pub alias: Option<String>,
    pub span: Span,
}

impl ImportDecl {
    /// The `::`-joined path text
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.join("::")
    }
}

/// A generic type or lifetime parameter: `T: Bound + Bound` or `'a`
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    /// Type parameter name; empty for pure lifetime parameters
    pub name: String,
    /// Trait bounds after `:`
    pub bounds: Vec<String>,
    /// Lifetime name when this is a lifetime parameter
    pub lifetime: Option<String>,
    pub span: Span,
}

/// A function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FuncParam {
    pub name: String,
    /// Always present in well-formed code; the language has no inference
    pub ty: Option<TypeNode>,
    /// `mut name`
    pub is_mutable: bool,
    /// `self` as the parameter name
    pub is_self: bool,
    /// `ref name`
    pub is_ref: bool,
    /// `mut ref name`
    pub is_mut_ref: bool,
    pub span: Span,
}

/// `func name<T: Bound>(params) -> ReturnType { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<FuncParam>,
    /// None means `Void`
    pub return_type: Option<TypeNode>,
    /// None for bodiless trait-method headers and external declarations
    pub body: Option<Block>,
    pub is_async: bool,
    pub span: Span,
}

/// A field in a struct, class, or struct-shaped enum variant
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub vis: Visibility,
    pub span: Span,
}

/// `struct Point { x: Float64, y: Float64 }`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// `class User { private id: Int32, public name: String }`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

/// How an enum variant carries its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantKind {
    #[default]
    Unit,
    Tuple,
    Struct,
}

/// A single enum variant
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub kind: VariantKind,
    /// Payload types for tuple variants: `Write(String)`
    pub tuple_fields: Vec<TypeNode>,
    /// Named fields for struct variants: `Move { x: Int32, y: Int32 }`
    pub struct_fields: Vec<FieldDecl>,
    pub span: Span,
}

/// `enum Message { Quit, Move { x: Int32, y: Int32 }, Write(String) }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

/// `trait Drawable: Base { func draw(self: Self) -> Void; }`
#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    /// Supertrait bounds after `:`
    pub super_traits: Vec<String>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

/// `impl Point { ... }` or `impl Drawable for Circle { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ImplDecl {
    pub target: TypeNode,
    /// Set for `impl Trait for Type` blocks
    pub trait_name: Option<String>,
    pub generics: Vec<GenericParam>,
    pub methods: Vec<FuncDecl>,
    pub span: Span,
}

/// `type UserId = Int32;`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub aliased: Option<TypeNode>,
    pub span: Span,
}
