//! Type checker for the Vesper programming language
//!
//! Vesper requires every binding to carry an explicit type annotation, so the
//! checker validates rather than infers: declared types must name known
//! types, initializers must be assignable to their declared types, return
//! values must agree with the function signature, and conditions must be
//! `Bool`.
//!
//! The checker operates on textual type names derived from the AST (see the
//! design notes); expression checking returns the canonical name of the
//! expression's type, or an empty string when the type is unknown; unknown
//! types suppress further checks on that expression to avoid cascades.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    Block, ClassDecl, Decl, DeclKind, EnumDecl, Expr, ExprKind, FuncDecl, ImplDecl, Module, Span,
    Stmt, StmtKind, StructDecl, TraitDecl, TypeKind, TypeNode, UnaryOp,
};
use crate::diagnostics::DiagnosticEngine;
use crate::source::{FileId, SourceMap};

use super::error::SemaError;
use super::resolve::{SymbolKind, SymbolTable};

/// The canonical type given to integer literals
const INT_DEFAULT: &str = "Int64";
/// The canonical type given to float literals
const FLOAT_DEFAULT: &str = "Float64";

/// Type checker; runs after name resolution succeeds
pub struct TypeChecker<'d, 't, 'm> {
    diag: &'d mut DiagnosticEngine,
    table: &'t SymbolTable,
    source_map: &'m SourceMap,
    file: FileId,

    /// Known type names: built-ins plus user-declared types
    known_types: HashSet<String>,

    /// Declared return type of the function being checked
    current_return_type: String,

    /// Generic parameter names in scope for the current declaration
    generics_in_scope: HashSet<String>,

    /// Stack of lexical scopes mapping variable names to declared type names
    locals: Vec<HashMap<String, String>>,
}

impl<'d, 't, 'm> TypeChecker<'d, 't, 'm> {
    pub fn new(
        diag: &'d mut DiagnosticEngine,
        table: &'t SymbolTable,
        source_map: &'m SourceMap,
        file: FileId,
    ) -> Self {
        let mut checker = Self {
            diag,
            table,
            source_map,
            file,
            known_types: HashSet::new(),
            current_return_type: String::new(),
            generics_in_scope: HashSet::new(),
            locals: Vec::new(),
        };
        checker.register_builtin_types();
        checker
    }

    fn register_builtin_types(&mut self) {
        for name in [
            // Primitive types
            "Int8", "Int16", "Int32", "Int64", "UInt8", "UInt16", "UInt32", "UInt64", "Float32",
            "Float64", "Bool", "Char", "String", "Void",
            // Standard library generics
            "Option", "Result", "Vec", "Map", "Set", "Box", "Rc", "Arc", "Mutex", "Channel",
            "Future", "Array",
        ] {
            self.known_types.insert(name.to_string());
        }
    }

    /// Check types for an entire module
    pub fn check(&mut self, module: &Module) {
        // User-declared types drawn from the symbol table
        for symbol in self.table.scope(self.table.root()).symbols() {
            if symbol.is_type() {
                self.known_types.insert(symbol.name.clone());
            }
        }

        for decl in &module.decls {
            self.check_decl(decl);
        }
    }

    fn error(&mut self, span: Span, error: &SemaError) {
        let loc = self.source_map.location(self.file, span.start);
        self.diag.error(loc, error.to_string());
    }

    // ==================== Declarations ====================

    fn check_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Func(f) => {
                self.generics_in_scope.clear();
                self.check_func_decl(f, decl.span);
            }
            DeclKind::Struct(s) => self.check_struct_decl(s, decl.span),
            DeclKind::Class(c) => self.check_class_decl(c, decl.span),
            DeclKind::Enum(e) => self.check_enum_decl(e, decl.span),
            DeclKind::Trait(t) => self.check_trait_decl(t),
            DeclKind::Impl(i) => self.check_impl_decl(i),
            DeclKind::TypeAlias(t) => {
                self.generics_in_scope = generic_names(&t.generics);
                if let Some(aliased) = &t.aliased {
                    if let Some((bad, span)) = self.find_unknown_type(aliased) {
                        self.error(
                            span,
                            &SemaError::UnknownAliasType {
                                ty: bad,
                                name: t.name.clone(),
                            },
                        );
                    }
                }
                self.generics_in_scope.clear();
            }
        }
    }

    fn check_func_decl(&mut self, decl: &FuncDecl, span: Span) {
        // The function's own generic parameters join the enclosing
        // declaration's for the duration of this check
        let saved_generics = self.generics_in_scope.clone();
        self.generics_in_scope.extend(generic_names(&decl.generics));

        // Return type
        if let Some(ret) = &decl.return_type {
            if let Some((bad, bad_span)) = self.find_unknown_type(ret) {
                self.error(
                    bad_span,
                    &SemaError::UnknownReturnType {
                        ty: bad,
                        func: decl.name.clone(),
                    },
                );
            }
            self.current_return_type = ret.name_string();
        } else {
            self.current_return_type = "Void".to_string();
        }

        // Parameters: the annotation is mandatory and must name a known type
        self.locals.push(HashMap::new());
        for param in &decl.params {
            match &param.ty {
                Some(ty) => {
                    if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                        self.error(
                            bad_span,
                            &SemaError::UnknownParamType {
                                ty: bad,
                                param: param.name.clone(),
                            },
                        );
                    }
                    self.define_local(&param.name, ty.name_string());
                }
                None => {
                    self.error(span, &SemaError::ParamMissingAnnotation(param.name.clone()));
                }
            }
        }

        if let Some(body) = &decl.body {
            for stmt in &body.stmts {
                self.check_stmt(stmt);
            }
        }

        self.locals.pop();
        self.current_return_type.clear();
        self.generics_in_scope = saved_generics;
    }

    fn check_struct_decl(&mut self, decl: &StructDecl, _span: Span) {
        self.generics_in_scope = generic_names(&decl.generics);
        for field in &decl.fields {
            if let Some(ty) = &field.ty {
                if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                    self.error(
                        bad_span,
                        &SemaError::UnknownStructFieldType {
                            ty: bad,
                            field: field.name.clone(),
                            owner: decl.name.clone(),
                        },
                    );
                }
            }
        }
        self.generics_in_scope.clear();
    }

    fn check_class_decl(&mut self, decl: &ClassDecl, _span: Span) {
        self.generics_in_scope = generic_names(&decl.generics);
        self.generics_in_scope.insert("Self".to_string());
        for field in &decl.fields {
            if let Some(ty) = &field.ty {
                if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                    self.error(
                        bad_span,
                        &SemaError::UnknownClassFieldType {
                            ty: bad,
                            field: field.name.clone(),
                            owner: decl.name.clone(),
                        },
                    );
                }
            }
        }
        for method in &decl.methods {
            let span = method.span;
            self.check_func_decl(method, span);
        }
        self.generics_in_scope.clear();
    }

    fn check_enum_decl(&mut self, decl: &EnumDecl, _span: Span) {
        self.generics_in_scope = generic_names(&decl.generics);
        for variant in &decl.variants {
            for ty in &variant.tuple_fields {
                if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                    self.error(
                        bad_span,
                        &SemaError::UnknownVariantType {
                            ty: bad,
                            variant: variant.name.clone(),
                        },
                    );
                }
            }
            for field in &variant.struct_fields {
                if let Some(ty) = &field.ty {
                    if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                        self.error(
                            bad_span,
                            &SemaError::UnknownVariantType {
                                ty: bad,
                                variant: variant.name.clone(),
                            },
                        );
                    }
                }
            }
        }
        self.generics_in_scope.clear();
    }

    fn check_trait_decl(&mut self, decl: &TraitDecl) {
        self.generics_in_scope = generic_names(&decl.generics);
        self.generics_in_scope.insert("Self".to_string());
        for method in &decl.methods {
            let span = method.span;
            self.check_func_decl(method, span);
        }
        self.generics_in_scope.clear();
    }

    fn check_impl_decl(&mut self, decl: &ImplDecl) {
        self.generics_in_scope = generic_names(&decl.generics);
        self.generics_in_scope.insert("Self".to_string());
        for method in &decl.methods {
            let span = method.span;
            self.check_func_decl(method, span);
        }
        self.generics_in_scope.clear();
    }

    // ==================== Statements ====================

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, ty, init, .. } => match ty {
                Some(ty) => {
                    if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                        self.error(bad_span, &SemaError::UnknownLetType(bad));
                    }
                    let decl_type = ty.name_string();
                    if let Some(init) = init {
                        let init_type = self.check_expr(init);
                        if !init_type.is_empty()
                            && !self.types_compatible(&decl_type, &init_type)
                        {
                            self.error(
                                stmt.span,
                                &SemaError::TypeMismatch {
                                    expected: decl_type.clone(),
                                    found: init_type,
                                },
                            );
                        }
                    }
                    self.define_local(name, decl_type);
                }
                None => {
                    self.error(stmt.span, &SemaError::MissingAnnotation(name.clone()));
                    if let Some(init) = init {
                        self.check_expr(init);
                    }
                }
            },
            StmtKind::Const { name, ty, value } => match ty {
                Some(ty) => {
                    if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                        self.error(bad_span, &SemaError::UnknownConstType(bad));
                    }
                    let decl_type = ty.name_string();
                    if let Some(value) = value {
                        let value_type = self.check_expr(value);
                        if !value_type.is_empty()
                            && !self.types_compatible(&decl_type, &value_type)
                        {
                            self.error(
                                stmt.span,
                                &SemaError::TypeMismatch {
                                    expected: decl_type.clone(),
                                    found: value_type,
                                },
                            );
                        }
                    }
                    self.define_local(name, decl_type);
                }
                None => {
                    self.error(stmt.span, &SemaError::MissingAnnotation(name.clone()));
                }
            },
            StmtKind::Return(value) => match value {
                Some(value) => {
                    let ret_type = self.check_expr(value);
                    if !self.current_return_type.is_empty()
                        && !ret_type.is_empty()
                        && !self.types_compatible(&self.current_return_type.clone(), &ret_type)
                    {
                        self.error(
                            stmt.span,
                            &SemaError::ReturnMismatch {
                                expected: self.current_return_type.clone(),
                                found: ret_type,
                            },
                        );
                    }
                }
                None => {
                    if !self.current_return_type.is_empty() && self.current_return_type != "Void" {
                        self.error(stmt.span, &SemaError::MissingReturnValue);
                    }
                }
            },
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cond);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.check_stmt(body);
            }
            StmtKind::For {
                var,
                var_ty,
                iterable,
                body,
            } => {
                self.check_expr(iterable);
                self.locals.push(HashMap::new());
                if let Some(ty) = var_ty {
                    if let Some((bad, bad_span)) = self.find_unknown_type(ty) {
                        self.error(bad_span, &SemaError::UnknownLoopVarType(bad));
                    }
                    self.define_local(var, ty.name_string());
                }
                self.check_stmt(body);
                self.locals.pop();
            }
            StmtKind::Loop { body } => self.check_stmt(body),
            StmtKind::Match { scrutinee, arms } => {
                self.check_expr(scrutinee);
                for arm in arms {
                    self.locals.push(HashMap::new());
                    if let Some(guard) = &arm.guard {
                        self.check_condition(guard);
                    }
                    self.check_expr(&arm.body);
                    self.locals.pop();
                }
            }
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
            StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.locals.push(HashMap::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.locals.pop();
    }

    fn check_condition(&mut self, cond: &Expr) {
        let cond_type = self.check_expr(cond);
        if !cond_type.is_empty() && cond_type != "Bool" {
            self.error(cond.span, &SemaError::ConditionNotBool(cond_type));
        }
    }

    // ==================== Expressions ====================

    /// Check an expression and return its canonical type name, or an empty
    /// string when unknown
    fn check_expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::IntLiteral(_) => INT_DEFAULT.to_string(),
            ExprKind::FloatLiteral(_) => FLOAT_DEFAULT.to_string(),
            ExprKind::StringLiteral(_) => "String".to_string(),
            ExprKind::CharLiteral(_) => "Char".to_string(),
            ExprKind::BoolLiteral(_) => "Bool".to_string(),

            ExprKind::Ident(name) => self.ident_type(name),

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_type = self.check_expr(lhs);
                let rhs_type = self.check_expr(rhs);

                if op.is_comparison() || op.is_logical() {
                    return "Bool".to_string();
                }

                // Arithmetic and bitwise operators need both sides compatible
                if !lhs_type.is_empty()
                    && !rhs_type.is_empty()
                    && !self.types_compatible(&lhs_type, &rhs_type)
                    && !self.types_compatible(&rhs_type, &lhs_type)
                {
                    self.error(
                        expr.span,
                        &SemaError::BinaryMismatch {
                            lhs: lhs_type.clone(),
                            rhs: rhs_type.clone(),
                        },
                    );
                }

                // Yield the common type
                if lhs_type.is_empty() {
                    rhs_type
                } else if rhs_type.is_empty() || self.types_compatible(&lhs_type, &rhs_type) {
                    lhs_type
                } else {
                    rhs_type
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand_type = self.check_expr(operand);
                match op {
                    UnaryOp::Not => "Bool".to_string(),
                    UnaryOp::Negate | UnaryOp::BitwiseNot => operand_type,
                }
            }

            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.check_expr(arg);
                }
                // Direct calls to known functions yield the declared return type
                if let ExprKind::Ident(name) = &callee.kind {
                    if let Some(sym) = self.table.lookup(self.table.root(), name) {
                        if sym.kind == SymbolKind::Function {
                            return sym.return_type.clone();
                        }
                    }
                    String::new()
                } else {
                    self.check_expr(callee);
                    String::new()
                }
            }

            ExprKind::MethodCall { receiver, args, .. } => {
                self.check_expr(receiver);
                for arg in args {
                    self.check_expr(arg);
                }
                String::new()
            }

            // Explicit casts bypass the assignability check
            ExprKind::Cast { expr, ty } => {
                self.check_expr(expr);
                ty.name_string()
            }

            ExprKind::Block { stmts, tail } => {
                self.locals.push(HashMap::new());
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
                let ty = tail.as_ref().map(|t| self.check_expr(t)).unwrap_or_default();
                self.locals.pop();
                ty
            }

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(cond);
                let then_type = self.check_expr(then_branch);
                if let Some(else_branch) = else_branch {
                    // Both branches produce the expression's value, so their
                    // types must agree
                    let else_type = self.check_expr(else_branch);
                    if !then_type.is_empty()
                        && !else_type.is_empty()
                        && !self.types_compatible(&then_type, &else_type)
                        && !self.types_compatible(&else_type, &then_type)
                    {
                        self.error(
                            expr.span,
                            &SemaError::TypeMismatch {
                                expected: then_type.clone(),
                                found: else_type,
                            },
                        );
                    }
                }
                then_type
            }

            ExprKind::Match { scrutinee, arms } => {
                self.check_expr(scrutinee);
                let mut result = String::new();
                for arm in arms {
                    self.locals.push(HashMap::new());
                    if let Some(guard) = &arm.guard {
                        self.check_condition(guard);
                    }
                    let arm_type = self.check_expr(&arm.body);
                    if result.is_empty() {
                        result = arm_type;
                    }
                    self.locals.pop();
                }
                result
            }

            ExprKind::StructLiteral { type_name, fields } => {
                for field in fields {
                    self.check_expr(&field.value);
                }
                type_name.clone()
            }

            ExprKind::Construct { path, fields } => {
                for field in fields {
                    self.check_expr(&field.value);
                }
                path.first().cloned().unwrap_or_default()
            }

            ExprKind::Assign { target, value } => {
                let target_type = self.check_expr(target);
                let value_type = self.check_expr(value);
                if !target_type.is_empty()
                    && !value_type.is_empty()
                    && !self.types_compatible(&target_type, &value_type)
                {
                    self.error(
                        expr.span,
                        &SemaError::TypeMismatch {
                            expected: target_type.clone(),
                            found: value_type,
                        },
                    );
                }
                target_type
            }

            ExprKind::CompoundAssign { target, value, .. } => {
                let target_type = self.check_expr(target);
                self.check_expr(value);
                target_type
            }

            ExprKind::Tuple(elements) | ExprKind::Array(elements) => {
                for element in elements {
                    self.check_expr(element);
                }
                String::new()
            }

            ExprKind::Range { start, end, .. } => {
                if let Some(start) = start {
                    self.check_expr(start);
                }
                if let Some(end) = end {
                    self.check_expr(end);
                }
                String::new()
            }

            ExprKind::Closure { body, .. } => {
                // Closure parameter environments are handled during
                // resolution; the closure's own type stays opaque here
                self.check_expr(body);
                String::new()
            }

            ExprKind::Ref(operand)
            | ExprKind::MutRef(operand)
            | ExprKind::Move(operand)
            | ExprKind::Await(operand)
            | ExprKind::Try(operand) => {
                self.check_expr(operand);
                String::new()
            }

            ExprKind::Member { object, .. } | ExprKind::Index { object, .. } => {
                self.check_expr(object);
                if let ExprKind::Index { index, .. } = &expr.kind {
                    self.check_expr(index);
                }
                String::new()
            }

            ExprKind::Path(_) => String::new(),
        }
    }

    // ==================== Type utilities ====================

    fn define_local(&mut self, name: &str, ty: String) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn ident_type(&self, name: &str) -> String {
        for scope in self.locals.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return ty.clone();
            }
        }
        self.table
            .lookup(self.table.root(), name)
            .map(|sym| sym.type_name.clone())
            .unwrap_or_default()
    }

    /// Walk a type reference looking for a named component that is not a
    /// known type, a generic parameter in scope, or a deferred cross-module
    /// path. Returns the offending name and its location.
    fn find_unknown_type(&self, ty: &TypeNode) -> Option<(String, Span)> {
        match &ty.kind {
            TypeKind::Named { path } => {
                if path.len() > 1 {
                    // Qualified names bind during cross-module resolution
                    return None;
                }
                let name = &path[0];
                if self.known_types.contains(name) || self.generics_in_scope.contains(name) {
                    None
                } else {
                    Some((name.clone(), ty.span))
                }
            }
            TypeKind::Generic { base, args } => {
                if let Some(bad) = self.find_unknown_type(base) {
                    return Some(bad);
                }
                args.iter().find_map(|arg| self.find_unknown_type(arg))
            }
            TypeKind::Reference { inner, .. } | TypeKind::MutReference { inner, .. } => {
                self.find_unknown_type(inner)
            }
            TypeKind::Tuple(elements) => {
                elements.iter().find_map(|e| self.find_unknown_type(e))
            }
            TypeKind::Function { params, ret } => params
                .iter()
                .find_map(|p| self.find_unknown_type(p))
                .or_else(|| self.find_unknown_type(ret)),
            TypeKind::Array { element, .. } => self.find_unknown_type(element),
        }
    }

    /// Assignability: a value of type `actual` may initialize or be returned
    /// as `expected` when the names are equal, when the integer-literal
    /// default meets any integer primitive, or when the float-literal default
    /// meets `Float32`.
    fn types_compatible(&self, expected: &str, actual: &str) -> bool {
        if expected == actual {
            return true;
        }

        if actual == INT_DEFAULT
            && matches!(
                expected,
                "Int8" | "Int16" | "Int32" | "UInt8" | "UInt16" | "UInt32" | "UInt64"
            )
        {
            return true;
        }

        if actual == FLOAT_DEFAULT && expected == "Float32" {
            return true;
        }

        false
    }
}

/// Collect the names of value-level generic parameters
fn generic_names(generics: &[crate::ast::GenericParam]) -> HashSet<String> {
    generics
        .iter()
        .filter(|g| !g.name.is_empty())
        .map(|g| g.name.clone())
        .collect()
}
