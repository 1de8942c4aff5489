//! Name resolution for the Vesper compiler
//!
//! Builds the lexical symbol table and binds every identifier use to a
//! declaration. Resolution is a two-pass walk over each module:
//!
//! 1. **Hoisting**: every top-level declaration that names a type or
//!    function gets a stub symbol in the module scope, so bodies can refer to
//!    declarations that appear later in the file.
//! 2. **Body resolution**: each declaration is walked; entities push an
//!    inner scope, bind generic and value parameters, then resolve statements
//!    and sub-expressions.
//!
//! The symbol table owns its scope tree; AST nodes never point back into it.

use std::collections::HashMap;

use crate::ast::{
    Block, ClassDecl, Decl, DeclKind, EnumDecl, Expr, ExprKind, FuncDecl, ImplDecl, Module,
    Pattern, PatternKind, Span, Stmt, StmtKind, TraitDecl, Visibility,
};
use crate::diagnostics::DiagnosticEngine;
use crate::source::{FileId, SourceMap};

use super::error::SemaError;

/// The kind of named entity a symbol describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Struct,
    Class,
    Enum,
    Trait,
    TypeAlias,
    GenericParam,
    Module,
    EnumVariant,
}

/// A symbol in the symbol table
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    /// Fully qualified path, e.g. `Message::Quit` for enum variants
    pub qualified_name: String,
    pub span: Span,
    pub vis: Visibility,

    // For variables
    pub is_mutable: bool,
    pub is_const: bool,
    /// The declared type as text
    pub type_name: String,

    // For functions
    pub param_types: Vec<String>,
    pub return_type: String,
    pub is_async: bool,

    // For generic types
    pub generic_params: Vec<String>,
}

impl Symbol {
    #[must_use]
    pub fn new(kind: SymbolKind, name: impl Into<String>, span: Span) -> Self {
        let name = name.into();
        Self {
            kind,
            qualified_name: name.clone(),
            name,
            span,
            vis: Visibility::Public,
            is_mutable: false,
            is_const: false,
            type_name: String::new(),
            param_types: Vec::new(),
            return_type: String::new(),
            is_async: false,
            generic_params: Vec::new(),
        }
    }

    /// True for symbols that name a type
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Struct
                | SymbolKind::Class
                | SymbolKind::Enum
                | SymbolKind::Trait
                | SymbolKind::TypeAlias
        )
    }
}

/// Identifies a scope in the symbol table's scope tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// A node in the lexical scope tree
#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

impl Scope {
    fn new(name: impl Into<String>, parent: Option<ScopeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            symbols: HashMap::new(),
        }
    }

    /// The symbols declared directly in this scope
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// Owns the scope tree and provides name lookup
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table containing only the root scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new("global", None)],
        }
    }

    /// The root (module) scope
    #[must_use]
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Access a scope by id
    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Create a child scope under `parent`
    pub fn push_scope(&mut self, name: impl Into<String>, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(name, Some(parent)));
        self.scopes[parent.0].children.push(id);
        id
    }

    /// Insert a symbol into a scope. Fails (returning false) when the name
    /// already exists in that scope; shadowing is only allowed in a strictly
    /// inner scope.
    pub fn insert(&mut self, scope: ScopeId, symbol: Symbol) -> bool {
        let map = &mut self.scopes[scope.0].symbols;
        if map.contains_key(&symbol.name) {
            return false;
        }
        map.insert(symbol.name.clone(), symbol);
        true
    }

    /// Look up a name starting from `scope`, walking parent links to the root
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(sym) = s.symbols.get(name) {
                return Some(sym);
            }
            current = s.parent;
        }
        None
    }

    /// Look up a name in `scope` only, without walking parents
    #[must_use]
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope.0].symbols.get(name)
    }

    /// Number of scopes in the tree
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

/// Name resolution pass
pub struct Resolver<'d, 'm> {
    diag: &'d mut DiagnosticEngine,
    source_map: &'m SourceMap,
    file: FileId,
    table: SymbolTable,
    current: ScopeId,
    /// The enclosing module's qualified-name prefix
    module_prefix: String,
}

impl<'d, 'm> Resolver<'d, 'm> {
    pub fn new(diag: &'d mut DiagnosticEngine, source_map: &'m SourceMap, file: FileId) -> Self {
        let table = SymbolTable::new();
        let current = table.root();
        Self {
            diag,
            source_map,
            file,
            table,
            current,
            module_prefix: String::new(),
        }
    }

    /// Resolve names in a complete module, consuming the resolver and
    /// returning the populated symbol table
    pub fn resolve(mut self, module: &Module) -> SymbolTable {
        self.module_prefix = module.name.clone();

        // First pass: hoist all top-level declarations
        for decl in &module.decls {
            self.register_decl(decl);
        }

        // Second pass: resolve bodies
        for decl in &module.decls {
            self.resolve_decl(decl);
        }

        self.table
    }

    fn error(&mut self, span: Span, error: &SemaError) {
        let loc = self.source_map.location(self.file, span.start);
        self.diag.error(loc, error.to_string());
    }

    fn qualify(&self, name: &str) -> String {
        if self.module_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}::{name}", self.module_prefix)
        }
    }

    fn enter_scope(&mut self, name: &str) {
        self.current = self.table.push_scope(name, self.current);
    }

    fn exit_scope(&mut self) {
        self.current = self
            .table
            .scope(self.current)
            .parent
            .expect("cannot exit the global scope");
    }

    fn insert_or_report(&mut self, symbol: Symbol, error: SemaError) {
        let span = symbol.span;
        if !self.table.insert(self.current, symbol) {
            self.error(span, &error);
        }
    }

    // ==================== Pass 1: hoisting ====================

    fn register_decl(&mut self, decl: &Decl) {
        let mut symbol = match &decl.kind {
            DeclKind::Func(f) => {
                let mut sym = Symbol::new(SymbolKind::Function, &f.name, decl.span);
                sym.param_types = f
                    .params
                    .iter()
                    .map(|p| p.ty.as_ref().map(|t| t.name_string()).unwrap_or_default())
                    .collect();
                sym.return_type = f
                    .return_type
                    .as_ref()
                    .map_or_else(|| "Void".to_string(), |t| t.name_string());
                sym.is_async = f.is_async;
                sym.generic_params = f.generics.iter().map(|g| g.name.clone()).collect();
                sym
            }
            DeclKind::Struct(s) => {
                let mut sym = Symbol::new(SymbolKind::Struct, &s.name, decl.span);
                sym.generic_params = s.generics.iter().map(|g| g.name.clone()).collect();
                sym
            }
            DeclKind::Class(c) => {
                let mut sym = Symbol::new(SymbolKind::Class, &c.name, decl.span);
                sym.generic_params = c.generics.iter().map(|g| g.name.clone()).collect();
                sym
            }
            DeclKind::Enum(e) => {
                let mut sym = Symbol::new(SymbolKind::Enum, &e.name, decl.span);
                sym.generic_params = e.generics.iter().map(|g| g.name.clone()).collect();
                sym
            }
            DeclKind::Trait(t) => Symbol::new(SymbolKind::Trait, &t.name, decl.span),
            DeclKind::TypeAlias(t) => Symbol::new(SymbolKind::TypeAlias, &t.name, decl.span),
            // Imports and impls do not bind names at this level
            DeclKind::Impl(_) => return,
        };

        symbol.vis = decl.vis;
        symbol.qualified_name = self.qualify(&symbol.name);

        let name = symbol.name.clone();
        self.insert_or_report(symbol, SemaError::Redefinition(name));
    }

    // ==================== Pass 2: body resolution ====================

    fn resolve_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Func(f) => self.resolve_func(f),
            DeclKind::Struct(s) => self.resolve_struct(s),
            DeclKind::Class(c) => self.resolve_class(c),
            DeclKind::Enum(e) => self.resolve_enum(e),
            DeclKind::Trait(t) => self.resolve_trait(t),
            DeclKind::Impl(i) => self.resolve_impl(i),
            DeclKind::TypeAlias(_) => {
                // The aliased type is validated by the type checker
            }
        }
    }

    fn resolve_func(&mut self, decl: &FuncDecl) {
        self.enter_scope(&decl.name);

        for gp in &decl.generics {
            if gp.name.is_empty() {
                continue; // pure lifetime parameter
            }
            let sym = Symbol::new(SymbolKind::GenericParam, &gp.name, gp.span);
            self.table.insert(self.current, sym);
        }

        for param in &decl.params {
            let mut sym = Symbol::new(SymbolKind::Variable, &param.name, param.span);
            sym.is_mutable = param.is_mutable;
            sym.type_name = param
                .ty
                .as_ref()
                .map(|t| t.name_string())
                .unwrap_or_default();
            let name = sym.name.clone();
            self.insert_or_report(sym, SemaError::Redefinition(name));
        }

        if let Some(body) = &decl.body {
            for stmt in &body.stmts {
                self.resolve_stmt(stmt);
            }
        }

        self.exit_scope();
    }

    fn resolve_struct(&mut self, decl: &crate::ast::StructDecl) {
        self.enter_scope(&decl.name);
        for gp in &decl.generics {
            if gp.name.is_empty() {
                continue;
            }
            let sym = Symbol::new(SymbolKind::GenericParam, &gp.name, gp.span);
            self.table.insert(self.current, sym);
        }
        self.exit_scope();
    }

    fn resolve_class(&mut self, decl: &ClassDecl) {
        self.enter_scope(&decl.name);
        for gp in &decl.generics {
            if gp.name.is_empty() {
                continue;
            }
            let sym = Symbol::new(SymbolKind::GenericParam, &gp.name, gp.span);
            self.table.insert(self.current, sym);
        }
        for method in &decl.methods {
            self.resolve_func(method);
        }
        self.exit_scope();
    }

    /// Enum variants become symbols in the enum's enclosing scope, carrying
    /// their qualified `Enum::Variant` name
    fn resolve_enum(&mut self, decl: &EnumDecl) {
        for variant in &decl.variants {
            let mut sym = Symbol::new(SymbolKind::EnumVariant, &variant.name, variant.span);
            sym.qualified_name = format!("{}::{}", decl.name, variant.name);
            self.table.insert(self.current, sym);
        }
    }

    fn resolve_trait(&mut self, decl: &TraitDecl) {
        self.enter_scope(&decl.name);
        for method in &decl.methods {
            let mut sym = Symbol::new(SymbolKind::Function, &method.name, method.span);
            sym.return_type = method
                .return_type
                .as_ref()
                .map_or_else(|| "Void".to_string(), |t| t.name_string());
            let name = sym.name.clone();
            self.insert_or_report(sym, SemaError::Redefinition(name));
        }
        self.exit_scope();
    }

    fn resolve_impl(&mut self, decl: &ImplDecl) {
        self.enter_scope("impl");
        for method in &decl.methods {
            self.resolve_func(method);
        }
        self.exit_scope();
    }

    // ==================== Statements ====================

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let {
                name, ty, init, mutable,
            } => {
                // The initializer resolves before the binding is visible, so
                // `let x = x + 1;` refers to the outer x
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                let mut sym = Symbol::new(SymbolKind::Variable, name, stmt.span);
                sym.is_mutable = *mutable;
                sym.type_name = ty.as_ref().map(|t| t.name_string()).unwrap_or_default();
                self.insert_or_report(sym, SemaError::RedefinedVariable(name.clone()));
            }
            StmtKind::Const { name, ty, value } => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
                let mut sym = Symbol::new(SymbolKind::Variable, name, stmt.span);
                sym.is_const = true;
                sym.type_name = ty.as_ref().map(|t| t.name_string()).unwrap_or_default();
                self.insert_or_report(sym, SemaError::RedefinedConstant(name.clone()));
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            StmtKind::Match { scrutinee, arms } => {
                self.resolve_expr(scrutinee);
                for arm in arms {
                    self.enter_scope("match_arm");
                    self.bind_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.resolve_expr(guard);
                    }
                    self.resolve_expr(&arm.body);
                    self.exit_scope();
                }
            }
            StmtKind::For {
                var,
                var_ty,
                iterable,
                body,
            } => {
                self.resolve_expr(iterable);
                self.enter_scope("for");
                let mut sym = Symbol::new(SymbolKind::Variable, var, stmt.span);
                sym.type_name = var_ty.as_ref().map(|t| t.name_string()).unwrap_or_default();
                self.table.insert(self.current, sym);
                self.resolve_stmt(body);
                self.exit_scope();
            }
            StmtKind::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            StmtKind::Loop { body } => self.resolve_stmt(body),
            StmtKind::Block(block) => self.resolve_block(block),
            StmtKind::Expr(expr) => self.resolve_expr(expr),
            StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn resolve_block(&mut self, block: &Block) {
        self.enter_scope("block");
        for stmt in &block.stmts {
            self.resolve_stmt(stmt);
        }
        self.exit_scope();
    }

    // ==================== Expressions ====================

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if self.table.lookup(self.current, name).is_none() {
                    self.error(expr.span, &SemaError::UndeclaredIdentifier(name.clone()));
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Call { callee, args } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.resolve_expr(receiver);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Member { object, .. } => self.resolve_expr(object),
            ExprKind::Index { object, index } => {
                self.resolve_expr(object);
                self.resolve_expr(index);
            }
            ExprKind::Cast { expr, .. } => self.resolve_expr(expr),
            ExprKind::Block { stmts, tail } => {
                self.enter_scope("block_expr");
                for stmt in stmts {
                    self.resolve_stmt(stmt);
                }
                if let Some(tail) = tail {
                    self.resolve_expr(tail);
                }
                self.exit_scope();
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond);
                self.resolve_expr(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_expr(else_branch);
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                self.resolve_expr(scrutinee);
                for arm in arms {
                    self.enter_scope("match_arm");
                    self.bind_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.resolve_expr(guard);
                    }
                    self.resolve_expr(&arm.body);
                    self.exit_scope();
                }
            }
            ExprKind::Closure { params, body, .. } => {
                self.enter_scope("closure");
                for param in params {
                    let mut sym = Symbol::new(SymbolKind::Variable, &param.name, param.span);
                    sym.type_name = param.ty.as_ref().map(|t| t.name_string()).unwrap_or_default();
                    self.table.insert(self.current, sym);
                }
                self.resolve_expr(body);
                self.exit_scope();
            }
            ExprKind::Construct { fields, .. } => {
                // The path itself resolves in a later, cross-module phase
                for field in fields {
                    self.resolve_expr(&field.value);
                }
            }
            ExprKind::StructLiteral { fields, .. } => {
                for field in fields {
                    self.resolve_expr(&field.value);
                }
            }
            ExprKind::Tuple(elements) | ExprKind::Array(elements) => {
                for element in elements {
                    self.resolve_expr(element);
                }
            }
            ExprKind::Range { start, end, .. } => {
                if let Some(start) = start {
                    self.resolve_expr(start);
                }
                if let Some(end) = end {
                    self.resolve_expr(end);
                }
            }
            ExprKind::Ref(operand)
            | ExprKind::MutRef(operand)
            | ExprKind::Move(operand)
            | ExprKind::Await(operand)
            | ExprKind::Try(operand) => self.resolve_expr(operand),
            ExprKind::Assign { target, value }
            | ExprKind::CompoundAssign { target, value, .. } => {
                self.resolve_expr(target);
                self.resolve_expr(value);
            }
            // Literals and paths need no resolution here; path binding is a
            // cross-module concern
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Path(_) => {}
        }
    }

    /// Bind every identifier introduced by a pattern into the current scope
    fn bind_pattern(&mut self, pattern: &Pattern) {
        match &pattern.kind {
            PatternKind::Ident { name, mutable } => {
                let mut sym = Symbol::new(SymbolKind::Variable, name, pattern.span);
                sym.is_mutable = *mutable;
                self.table.insert(self.current, sym);
            }
            PatternKind::Tuple(elements) => {
                for element in elements {
                    self.bind_pattern(element);
                }
            }
            PatternKind::Constructor {
                positional, named, ..
            } => {
                for p in positional {
                    self.bind_pattern(p);
                }
                for field in named {
                    self.bind_pattern(&field.pattern);
                }
            }
            PatternKind::Or(alternatives) => {
                for alt in alternatives {
                    self.bind_pattern(alt);
                }
            }
            PatternKind::Wildcard | PatternKind::Literal(_) => {}
        }
    }
}
