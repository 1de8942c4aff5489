//! Parser for the Vesper programming language
//!
//! Recursive descent for declarations and statements, precedence climbing for
//! expressions. The parser pulls tokens lazily from the lexer with a single
//! token of lookahead (`current`); bounded speculative parsing (struct literal
//! vs block, `mut ref` prefix) works through paired parser and lexer
//! save/restore.
//!
//! Errors are recorded in the shared [`DiagnosticEngine`] and never unwind.
//! Panic-mode recovery (`synchronize`) skips to the next statement or
//! declaration anchor so one malformed construct cannot poison the rest of
//! the file.

mod error;

pub use error::ParseError;

use crate::ast::{
    BinaryOp, Block, ClassDecl, ClosureParam, CompoundOp, Decl, DeclKind, EnumDecl, EnumVariant,
    Expr, ExprKind, FieldDecl, FieldInit, FuncDecl, FuncParam, GenericParam, ImplDecl, ImportDecl,
    MatchArm, Module, NamedFieldPattern, Pattern, PatternKind, Span, Stmt, StmtKind, StructDecl,
    TraitDecl, TypeAliasDecl, TypeKind, TypeNode, UnaryOp, VariantKind, Visibility,
};
use crate::diagnostics::DiagnosticEngine;
use crate::lexer::{Lexer, LexerState, Token, TokenKind};
use crate::source::SourceLocation;

/// Parser state snapshot; pairs with [`LexerState`] for speculative parsing
#[derive(Debug, Clone)]
pub struct ParserState {
    current: Token,
    previous: Token,
}

/// The Vesper parser
pub struct Parser<'src, 'd> {
    lexer: Lexer<'src>,
    diag: &'d mut DiagnosticEngine,
    current: Token,
    previous: Token,
}

impl<'src, 'd> Parser<'src, 'd> {
    /// Create a parser over a lexer, priming the one-token lookahead
    pub fn new(mut lexer: Lexer<'src>, diag: &'d mut DiagnosticEngine) -> Self {
        let current = lexer.next_token(diag);
        Self {
            lexer,
            diag,
            current,
            previous: Token::default(),
        }
    }

    /// Convenience constructor from source text
    pub fn from_source(source: &'src str, filename: &str, diag: &'d mut DiagnosticEngine) -> Self {
        Self::new(Lexer::new(source, filename), diag)
    }

    // ==================== Token management ====================

    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token(self.diag);
        self.previous.clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn is_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    /// Consume a token if it matches, returning it
    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Expect and consume a specific token. On mismatch, records a diagnostic
    /// and returns the current token without consuming it.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> Token {
        if self.check(kind) {
            return self.advance();
        }
        self.error_here(&ParseError::Expected {
            expected: expected.to_string(),
            found: self.current.text.clone(),
        });
        self.current.clone()
    }

    fn expect_semicolon(&mut self) -> Token {
        self.expect(TokenKind::Semicolon, "';'")
    }

    fn location(&self, token: &Token) -> SourceLocation {
        SourceLocation {
            file: self.lexer.filename().to_string(),
            line: token.line,
            column: token.column,
            offset: token.span.start,
        }
    }

    /// Record an error at the current token
    fn error_here(&mut self, error: &ParseError) {
        let loc = self.location(&self.current);
        self.diag.error(loc, error.to_string());
    }

    fn save_state(&self) -> (ParserState, LexerState) {
        (
            ParserState {
                current: self.current.clone(),
                previous: self.previous.clone(),
            },
            self.lexer.save_state(),
        )
    }

    fn restore_state(&mut self, state: &(ParserState, LexerState)) {
        self.current = state.0.current.clone();
        self.previous = state.0.previous.clone();
        self.lexer.restore_state(&state.1);
    }

    // ==================== Module parsing ====================

    /// Parse a complete module: optional `module PATH;`, imports, then
    /// top-level declarations until EOF
    pub fn parse_module(&mut self) -> Module {
        let start = self.current.span;
        let mut module = Module::default();

        if self.check(TokenKind::KwModule) {
            self.advance();
            let path = self.parse_path();
            self.expect_semicolon();
            module.name = path.join("::");
        }

        while self.check(TokenKind::KwImport) {
            let span = self.current.span;
            self.advance();
            let path = self.parse_path();
            self.expect_semicolon();
            module.imports.push(ImportDecl {
                path,
                alias: None,
                span: span.merge(self.previous.span),
            });
        }

        while !self.is_eof() {
            let before = self.current.span;
            match self.parse_declaration() {
                Some(decl) => module.decls.push(decl),
                None => {
                    // Ensure forward progress when recovery stopped on the
                    // same token
                    if !self.is_eof() && self.current.span == before {
                        self.advance();
                    }
                }
            }
        }

        module.span = start.merge(self.previous.span);
        module
    }

    fn parse_path(&mut self) -> Vec<String> {
        let mut segments = Vec::new();
        let tok = self.expect(TokenKind::Identifier, "identifier in path");
        segments.push(tok.text);
        while self.eat(TokenKind::ColonColon).is_some() {
            let tok = self.expect(TokenKind::Identifier, "identifier after '::'");
            segments.push(tok.text);
        }
        segments
    }

    // ==================== Declaration parsing ====================

    fn parse_declaration(&mut self) -> Option<Decl> {
        self.skip_annotations();

        let mut vis = Visibility::Private;
        while matches!(
            self.current.kind,
            TokenKind::KwPub | TokenKind::KwPublic | TokenKind::KwPrivate
        ) {
            if self.current.kind != TokenKind::KwPrivate {
                vis = Visibility::Public;
            }
            self.advance();
            self.skip_annotations();
        }

        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::KwFunc => DeclKind::Func(self.parse_func_decl(false)),
            TokenKind::KwAsync => {
                self.advance();
                DeclKind::Func(self.parse_func_decl(true))
            }
            TokenKind::KwStruct => DeclKind::Struct(self.parse_struct_decl()),
            TokenKind::KwClass => DeclKind::Class(self.parse_class_decl()),
            TokenKind::KwEnum => DeclKind::Enum(self.parse_enum_decl()),
            TokenKind::KwTrait => DeclKind::Trait(self.parse_trait_decl()),
            TokenKind::KwImpl => DeclKind::Impl(self.parse_impl_decl()),
            TokenKind::KwType => DeclKind::TypeAlias(self.parse_type_alias_decl()),
            TokenKind::KwLet | TokenKind::KwConst => {
                self.error_here(&ParseError::TopLevelBinding);
                self.synchronize();
                return None;
            }
            _ => {
                self.error_here(&ParseError::ExpectedDeclaration);
                self.synchronize();
                return None;
            }
        };

        Some(Decl::new(kind, vis, start.merge(self.previous.span)))
    }

    /// Skip leading annotations (`@doc`, `@x`, `#`, `#!`) with optional
    /// parenthesized arguments
    fn skip_annotations(&mut self) {
        while matches!(
            self.current.kind,
            TokenKind::At
                | TokenKind::KwDoc
                | TokenKind::KwDeprecated
                | TokenKind::KwTest
                | TokenKind::Hash
                | TokenKind::HashBang
        ) {
            self.advance();
            if self.check(TokenKind::LParen) {
                self.advance();
                let mut depth = 1u32;
                while depth > 0 && !self.is_eof() {
                    if self.check(TokenKind::LParen) {
                        depth += 1;
                    }
                    if self.check(TokenKind::RParen) {
                        depth -= 1;
                    }
                    self.advance();
                }
            }
        }
    }

    fn parse_func_decl(&mut self, is_async: bool) -> FuncDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwFunc, "'func'");

        let name = self.expect(TokenKind::Identifier, "function name").text;
        let generics = self.parse_generic_params();

        self.expect(TokenKind::LParen, "'(' in function declaration");
        let params = self.parse_func_params();
        self.expect(TokenKind::RParen, "')' after parameters");

        let return_type = if self.eat(TokenKind::Arrow).is_some() {
            self.parse_type()
        } else {
            None
        };

        let body = if self.check(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            // Bodiless header (trait method, external declaration)
            self.expect_semicolon();
            None
        };

        FuncDecl {
            name,
            generics,
            params,
            return_type,
            body,
            is_async,
            span: start.merge(self.previous.span),
        }
    }

    fn parse_generic_params(&mut self) -> Vec<GenericParam> {
        let mut params = Vec::new();
        if self.eat(TokenKind::Less).is_none() {
            return params;
        }

        while !self.check(TokenKind::Greater) && !self.is_eof() {
            let span = self.current.span;

            if self.check(TokenKind::Apostrophe) {
                let tok = self.advance();
                params.push(GenericParam {
                    name: String::new(),
                    bounds: Vec::new(),
                    lifetime: Some(tok.text.trim_start_matches('\'').to_string()),
                    span,
                });
            } else {
                let name = self.expect(TokenKind::Identifier, "type parameter name").text;
                let mut bounds = Vec::new();

                // Trait bounds: T: Comparable + Clone
                if self.eat(TokenKind::Colon).is_some() {
                    bounds.push(self.expect(TokenKind::Identifier, "trait bound").text);
                    while self.eat(TokenKind::Plus).is_some() {
                        bounds.push(self.expect(TokenKind::Identifier, "trait bound").text);
                    }
                }

                params.push(GenericParam {
                    name,
                    bounds,
                    lifetime: None,
                    span: span.merge(self.previous.span),
                });
            }

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.expect(TokenKind::Greater, "'>' after generic parameters");
        params
    }

    fn parse_func_params(&mut self) -> Vec<FuncParam> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return params;
        }

        params.push(self.parse_func_param());
        while self.eat(TokenKind::Comma).is_some() {
            if self.check(TokenKind::RParen) {
                break;
            }
            params.push(self.parse_func_param());
        }

        params
    }

    fn parse_func_param(&mut self) -> FuncParam {
        let span = self.current.span;
        let mut is_mutable = false;
        let mut is_ref = false;
        let mut is_mut_ref = false;

        if self.check(TokenKind::KwMut) {
            is_mutable = true;
            self.advance();
            if self.check(TokenKind::KwRef) {
                is_mut_ref = true;
                self.advance();
            }
        }

        if self.check(TokenKind::KwRef) && !is_mut_ref {
            is_ref = true;
            self.advance();
        }

        // `self` is accepted as a parameter name
        let (name, is_self) = if self.check(TokenKind::KwSelf) {
            (self.advance().text, true)
        } else {
            (self.expect(TokenKind::Identifier, "parameter name").text, false)
        };

        self.expect(TokenKind::Colon, "':' after parameter name");
        let ty = self.parse_type();

        FuncParam {
            name,
            ty,
            is_mutable,
            is_self,
            is_ref,
            is_mut_ref,
            span: span.merge(self.previous.span),
        }
    }

    fn parse_struct_decl(&mut self) -> StructDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwStruct, "'struct'");

        let name = self.expect(TokenKind::Identifier, "struct name").text;
        let generics = self.parse_generic_params();

        self.expect(TokenKind::LBrace, "'{' in struct declaration");
        let fields = self.parse_struct_fields(false);
        self.expect(TokenKind::RBrace, "'}' after struct fields");

        StructDecl {
            name,
            generics,
            fields,
            span: start.merge(self.previous.span),
        }
    }

    fn parse_class_decl(&mut self) -> ClassDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwClass, "'class'");

        let name = self.expect(TokenKind::Identifier, "class name").text;
        let generics = self.parse_generic_params();

        self.expect(TokenKind::LBrace, "'{' in class declaration");
        let fields = self.parse_struct_fields(true);
        self.expect(TokenKind::RBrace, "'}' after class fields");

        ClassDecl {
            name,
            generics,
            fields,
            methods: Vec::new(),
            span: start.merge(self.previous.span),
        }
    }

    /// Struct fields are `name: type`; class fields additionally accept a
    /// leading visibility modifier. Trailing commas are allowed.
    fn parse_struct_fields(&mut self, allow_visibility: bool) -> Vec<FieldDecl> {
        let mut fields = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let span = self.current.span;
            let mut vis = Visibility::default();

            if allow_visibility {
                if self.eat(TokenKind::KwPublic).is_some() || self.eat(TokenKind::KwPub).is_some() {
                    vis = Visibility::Public;
                } else if self.eat(TokenKind::KwPrivate).is_some() {
                    vis = Visibility::Private;
                }
            }

            let name = self.expect(TokenKind::Identifier, "field name").text;
            self.expect(TokenKind::Colon, "':' after field name");
            let ty = self.parse_type();

            fields.push(FieldDecl {
                name,
                ty,
                vis,
                span: span.merge(self.previous.span),
            });

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        fields
    }

    fn parse_enum_decl(&mut self) -> EnumDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwEnum, "'enum'");

        let name = self.expect(TokenKind::Identifier, "enum name").text;
        let generics = self.parse_generic_params();

        self.expect(TokenKind::LBrace, "'{' in enum declaration");
        let variants = self.parse_enum_variants();
        self.expect(TokenKind::RBrace, "'}' after enum variants");

        EnumDecl {
            name,
            generics,
            variants,
            span: start.merge(self.previous.span),
        }
    }

    fn parse_enum_variants(&mut self) -> Vec<EnumVariant> {
        let mut variants = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let span = self.current.span;
            let name = self.expect(TokenKind::Identifier, "variant name").text;

            let mut variant = EnumVariant {
                name,
                kind: VariantKind::Unit,
                tuple_fields: Vec::new(),
                struct_fields: Vec::new(),
                span,
            };

            if self.eat(TokenKind::LParen).is_some() {
                // Tuple variant: Write(String)
                variant.kind = VariantKind::Tuple;
                while !self.check(TokenKind::RParen) && !self.is_eof() {
                    if let Some(ty) = self.parse_type() {
                        variant.tuple_fields.push(ty);
                    }
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')' after tuple variant fields");
            } else if self.eat(TokenKind::LBrace).is_some() {
                // Struct variant: Move { x: Int32, y: Int32 }
                variant.kind = VariantKind::Struct;
                while !self.check(TokenKind::RBrace) && !self.is_eof() {
                    let field_span = self.current.span;
                    let field_name = self.expect(TokenKind::Identifier, "field name").text;
                    self.expect(TokenKind::Colon, "':' after field name");
                    let ty = self.parse_type();
                    variant.struct_fields.push(FieldDecl {
                        name: field_name,
                        ty,
                        vis: Visibility::default(),
                        span: field_span.merge(self.previous.span),
                    });
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}' after struct variant fields");
            }

            variant.span = span.merge(self.previous.span);
            variants.push(variant);

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        variants
    }

    fn parse_trait_decl(&mut self) -> TraitDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwTrait, "'trait'");

        let name = self.expect(TokenKind::Identifier, "trait name").text;
        let generics = self.parse_generic_params();

        let mut super_traits = Vec::new();
        if self.eat(TokenKind::Colon).is_some() {
            super_traits.push(self.expect(TokenKind::Identifier, "super trait name").text);
            while self.eat(TokenKind::Plus).is_some() {
                super_traits.push(self.expect(TokenKind::Identifier, "trait name").text);
            }
        }

        self.expect(TokenKind::LBrace, "'{' in trait declaration");
        let methods = self.parse_method_list(&ParseError::ExpectedTraitMethod);
        self.expect(TokenKind::RBrace, "'}' after trait methods");

        TraitDecl {
            name,
            generics,
            super_traits,
            methods,
            span: start.merge(self.previous.span),
        }
    }

    fn parse_impl_decl(&mut self) -> ImplDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwImpl, "'impl'");

        let generics = self.parse_generic_params();
        let first = self.parse_type();

        // `impl Trait for Type` vs inherent `impl Type`
        let (target, trait_name) = if self.eat(TokenKind::KwFor).is_some() {
            let trait_name = first.as_ref().and_then(|t| match &t.kind {
                TypeKind::Named { path } => path.last().cloned(),
                _ => None,
            });
            (self.parse_type(), trait_name)
        } else {
            (first, None)
        };

        self.expect(TokenKind::LBrace, "'{' in impl block");
        let methods = self.parse_method_list(&ParseError::ExpectedImplMethod);
        self.expect(TokenKind::RBrace, "'}' after impl block");

        ImplDecl {
            target: target.unwrap_or_else(|| TypeNode::named("<error>", start)),
            trait_name,
            generics,
            methods,
            span: start.merge(self.previous.span),
        }
    }

    fn parse_method_list(&mut self, error: &ParseError) -> Vec<FuncDecl> {
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let is_async = self.eat(TokenKind::KwAsync).is_some();
            if self.check(TokenKind::KwFunc) {
                methods.push(self.parse_func_decl(is_async));
            } else {
                self.error_here(error);
                self.advance();
            }
        }
        methods
    }

    fn parse_type_alias_decl(&mut self) -> TypeAliasDecl {
        let start = self.current.span;
        self.expect(TokenKind::KwType, "'type'");

        let name = self.expect(TokenKind::Identifier, "type alias name").text;
        let generics = self.parse_generic_params();

        self.expect(TokenKind::Equal, "'=' in type alias");
        let aliased = self.parse_type();
        self.expect_semicolon();

        TypeAliasDecl {
            name,
            generics,
            aliased,
            span: start.merge(self.previous.span),
        }
    }

    // ==================== Statement parsing ====================

    fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        match self.current.kind {
            TokenKind::KwLet => self.parse_let_stmt(),
            TokenKind::KwConst => self.parse_const_stmt(),
            TokenKind::KwReturn => self.parse_return_stmt(),
            TokenKind::KwIf => self.parse_if_stmt(),
            TokenKind::KwMatch => self.parse_match_stmt(),
            TokenKind::KwFor => self.parse_for_stmt(),
            TokenKind::KwWhile => self.parse_while_stmt(),
            TokenKind::KwLoop => self.parse_loop_stmt(),
            TokenKind::KwBreak => {
                self.advance();
                self.expect_semicolon();
                Some(Stmt::new(StmtKind::Break, start.merge(self.previous.span)))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect_semicolon();
                Some(Stmt::new(StmtKind::Continue, start.merge(self.previous.span)))
            }
            TokenKind::LBrace => {
                let block = self.parse_block();
                let span = block.span;
                Some(Stmt::new(StmtKind::Block(block), span))
            }
            _ => {
                let Some(expr) = self.parse_expression() else {
                    self.synchronize();
                    return None;
                };
                self.expect_semicolon();
                Some(Stmt::new(StmtKind::Expr(expr), start.merge(self.previous.span)))
            }
        }
    }

    fn parse_let_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwLet, "'let'");

        let mutable = self.eat(TokenKind::KwMut).is_some();
        let name = self.expect(TokenKind::Identifier, "variable name").text;

        self.expect(
            TokenKind::Colon,
            "':' after variable name (explicit type annotations are required)",
        );
        let ty = self.parse_type();

        let init = if self.eat(TokenKind::Equal).is_some() {
            self.parse_expression()
        } else {
            None
        };

        self.expect_semicolon();
        Some(Stmt::new(
            StmtKind::Let {
                name,
                ty,
                init,
                mutable,
            },
            start.merge(self.previous.span),
        ))
    }

    fn parse_const_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwConst, "'const'");

        let name = self.expect(TokenKind::Identifier, "constant name").text;
        self.expect(TokenKind::Colon, "':' after constant name");
        let ty = self.parse_type();

        self.expect(TokenKind::Equal, "'=' in constant declaration");
        let value = self.parse_expression();

        self.expect_semicolon();
        Some(Stmt::new(
            StmtKind::Const { name, ty, value },
            start.merge(self.previous.span),
        ))
    }

    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwReturn, "'return'");

        let value = if !self.check(TokenKind::Semicolon) && !self.check(TokenKind::RBrace) {
            self.parse_expression()
        } else {
            None
        };

        self.expect_semicolon();
        Some(Stmt::new(
            StmtKind::Return(value),
            start.merge(self.previous.span),
        ))
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwIf, "'if'");

        let Some(cond) = self.parse_expression() else {
            self.synchronize();
            return None;
        };
        let then_branch = Box::new(self.parse_block_stmt());

        let else_branch = if self.eat(TokenKind::KwElse).is_some() {
            if self.check(TokenKind::KwIf) {
                self.parse_if_stmt().map(Box::new)
            } else {
                Some(Box::new(self.parse_block_stmt()))
            }
        } else {
            None
        };

        Some(Stmt::new(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            start.merge(self.previous.span),
        ))
    }

    fn parse_match_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwMatch, "'match'");

        let Some(scrutinee) = self.parse_expression() else {
            self.synchronize();
            return None;
        };

        self.expect(TokenKind::LBrace, "'{' in match statement");
        let arms = self.parse_match_arms();
        self.expect(TokenKind::RBrace, "'}' after match arms");

        Some(Stmt::new(
            StmtKind::Match { scrutinee, arms },
            start.merge(self.previous.span),
        ))
    }

    fn parse_match_arms(&mut self) -> Vec<MatchArm> {
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let before = self.current.span;
            if let Some(arm) = self.parse_match_arm() {
                arms.push(arm);
            } else if self.current.span == before && !self.is_eof() {
                self.advance();
            }
            // Optional comma between arms
            let _ = self.eat(TokenKind::Comma);
        }
        arms
    }

    fn parse_match_arm(&mut self) -> Option<MatchArm> {
        let start = self.current.span;
        let pattern = self.parse_pattern()?;

        let guard = if self.eat(TokenKind::KwIf).is_some() {
            self.parse_expression()
        } else {
            None
        };

        self.expect(TokenKind::FatArrow, "'=>' in match arm");

        let body = if self.check(TokenKind::LBrace) {
            self.parse_block_expr()?
        } else {
            self.parse_expression()?
        };

        Some(MatchArm {
            pattern,
            guard,
            body,
            span: start.merge(self.previous.span),
        })
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwFor, "'for'");

        let var = self.expect(TokenKind::Identifier, "loop variable name").text;
        self.expect(TokenKind::Colon, "':' after loop variable name");
        let var_ty = self.parse_type();

        self.expect(TokenKind::KwIn, "'in' in for loop");
        let Some(iterable) = self.parse_expression() else {
            self.synchronize();
            return None;
        };

        let body = Box::new(self.parse_block_stmt());

        Some(Stmt::new(
            StmtKind::For {
                var,
                var_ty,
                iterable,
                body,
            },
            start.merge(self.previous.span),
        ))
    }

    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwWhile, "'while'");

        let Some(cond) = self.parse_expression() else {
            self.synchronize();
            return None;
        };
        let body = Box::new(self.parse_block_stmt());

        Some(Stmt::new(
            StmtKind::While { cond, body },
            start.merge(self.previous.span),
        ))
    }

    fn parse_loop_stmt(&mut self) -> Option<Stmt> {
        let start = self.current.span;
        self.expect(TokenKind::KwLoop, "'loop'");
        let body = Box::new(self.parse_block_stmt());
        Some(Stmt::new(
            StmtKind::Loop { body },
            start.merge(self.previous.span),
        ))
    }

    fn parse_block_stmt(&mut self) -> Stmt {
        let block = self.parse_block();
        let span = block.span;
        Stmt::new(StmtKind::Block(block), span)
    }

    fn parse_block(&mut self) -> Block {
        let start = self.current.span;
        self.expect(TokenKind::LBrace, "'{'");

        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let before = self.current.span;
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            } else {
                // Recovery landed on a declaration anchor: the block is
                // malformed, hand control back to the declaration level
                if self.at_declaration_anchor() {
                    break;
                }
                if self.current.span == before && !self.is_eof() && !self.check(TokenKind::RBrace) {
                    self.advance();
                }
            }
        }

        self.expect(TokenKind::RBrace, "'}'");
        Block::new(stmts, start.merge(self.previous.span))
    }

    fn at_declaration_anchor(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::KwFunc
                | TokenKind::KwStruct
                | TokenKind::KwClass
                | TokenKind::KwEnum
                | TokenKind::KwTrait
                | TokenKind::KwImpl
                | TokenKind::KwModule
                | TokenKind::KwImport
        )
    }

    // ==================== Expression parsing ====================

    /// Parse an expression at assignment precedence
    pub fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expr> {
        let expr = self.parse_range()?;

        if self.check(TokenKind::Equal) {
            self.advance();
            // Right-associative
            let value = self.parse_assignment()?;
            let span = expr.span.merge(value.span);
            return Some(Expr::new(
                ExprKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
                span,
            ));
        }

        let compound = match self.current.kind {
            TokenKind::PlusEqual => Some(CompoundOp::Add),
            TokenKind::MinusEqual => Some(CompoundOp::Sub),
            TokenKind::StarEqual => Some(CompoundOp::Mul),
            TokenKind::SlashEqual => Some(CompoundOp::Div),
            TokenKind::PercentEqual => Some(CompoundOp::Mod),
            TokenKind::AmpersandEqual => Some(CompoundOp::BitAnd),
            TokenKind::PipeEqual => Some(CompoundOp::BitOr),
            TokenKind::CaretEqual => Some(CompoundOp::BitXor),
            _ => None,
        };

        if let Some(op) = compound {
            self.advance();
            let value = self.parse_assignment()?;
            let span = expr.span.merge(value.span);
            return Some(Expr::new(
                ExprKind::CompoundAssign {
                    op,
                    target: Box::new(expr),
                    value: Box::new(value),
                },
                span,
            ));
        }

        Some(expr)
    }

    fn parse_range(&mut self) -> Option<Expr> {
        let start = self.parse_or()?;

        let inclusive = match self.current.kind {
            TokenKind::DotDot => false,
            TokenKind::DotDotDot => true,
            _ => return Some(start),
        };
        self.advance();
        let end = self.parse_or()?;

        let span = start.span.merge(end.span);
        Some(Expr::new(
            ExprKind::Range {
                start: Some(Box::new(start)),
                end: Some(Box::new(end)),
                inclusive,
            },
            span,
        ))
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::KwOr) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(TokenKind::KwAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::BangEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
        Some(left)
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitwise_or()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_bitwise_or()?;
            left = binary(op, left, right);
        }
        Some(left)
    }

    fn parse_bitwise_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitwise_xor()?;
        while self.check(TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bitwise_xor()?;
            left = binary(BinaryOp::BitOr, left, right);
        }
        Some(left)
    }

    fn parse_bitwise_xor(&mut self) -> Option<Expr> {
        let mut left = self.parse_bitwise_and()?;
        while self.check(TokenKind::Caret) {
            self.advance();
            let right = self.parse_bitwise_and()?;
            left = binary(BinaryOp::BitXor, left, right);
        }
        Some(left)
    }

    fn parse_bitwise_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_shift()?;
        while self.check(TokenKind::Ampersand) {
            self.advance();
            let right = self.parse_shift()?;
            left = binary(BinaryOp::BitAnd, left, right);
        }
        Some(left)
    }

    fn parse_shift(&mut self) -> Option<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::ShiftLeft => BinaryOp::ShiftLeft,
                TokenKind::ShiftRight => BinaryOp::ShiftRight,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Some(left)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current.span;

        let prefix = |p: &mut Self, make: fn(Box<Expr>) -> ExprKind| {
            p.advance();
            let operand = p.parse_unary()?;
            let span = start.merge(operand.span);
            Some(Expr::new(make(Box::new(operand)), span))
        };

        match self.current.kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                Some(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::KwNot => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                Some(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::Tilde => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                Some(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::BitwiseNot,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            TokenKind::KwRef => prefix(self, ExprKind::Ref),
            TokenKind::KwMut => {
                // `mut ref expr` needs one token of lexer lookahead
                if self.lexer.peek_token(self.diag).kind == TokenKind::KwRef {
                    self.advance(); // mut
                    self.advance(); // ref
                    let operand = self.parse_unary()?;
                    let span = start.merge(operand.span);
                    Some(Expr::new(ExprKind::MutRef(Box::new(operand)), span))
                } else {
                    self.error_here(&ParseError::ExpectedExpression {
                        found: self.current.text.clone(),
                    });
                    None
                }
            }
            TokenKind::KwMove => prefix(self, ExprKind::Move),
            TokenKind::KwAwait => prefix(self, ExprKind::Await),
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            let start = expr.span;
            match self.current.kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args();
                    self.expect(TokenKind::RParen, "')' after arguments");
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        start.merge(self.previous.span),
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'");
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        start.merge(self.previous.span),
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect(TokenKind::Identifier, "member name after '.'").text;

                    if self.eat(TokenKind::LParen).is_some() {
                        let args = self.parse_call_args();
                        self.expect(TokenKind::RParen, "')' after method arguments");
                        expr = Expr::new(
                            ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                method: member,
                                args,
                            },
                            start.merge(self.previous.span),
                        );
                    } else {
                        expr = Expr::new(
                            ExprKind::Member {
                                object: Box::new(expr),
                                member,
                            },
                            start.merge(self.previous.span),
                        );
                    }
                }
                TokenKind::ColonColon => {
                    // Fold the expression so far into a qualified path
                    self.advance();
                    let mut segments = match &expr.kind {
                        ExprKind::Ident(name) => vec![name.clone()],
                        ExprKind::Path(segments) => segments.clone(),
                        _ => Vec::new(),
                    };
                    segments.push(self.expect(TokenKind::Identifier, "identifier after '::'").text);
                    while self.eat(TokenKind::ColonColon).is_some() {
                        segments
                            .push(self.expect(TokenKind::Identifier, "identifier after '::'").text);
                    }

                    let span = start.merge(self.previous.span);
                    if self.check(TokenKind::LBrace) && self.brace_starts_literal() {
                        let fields = self.parse_field_inits();
                        expr = Expr::new(
                            ExprKind::Construct {
                                path: segments,
                                fields,
                            },
                            start.merge(self.previous.span),
                        );
                    } else {
                        expr = Expr::new(ExprKind::Path(segments), span);
                    }
                }
                TokenKind::Question => {
                    self.advance();
                    expr = Expr::new(
                        ExprKind::Try(Box::new(expr)),
                        start.merge(self.previous.span),
                    );
                }
                TokenKind::KwAs => {
                    self.advance();
                    let ty = self.parse_type()?;
                    expr = Expr::new(
                        ExprKind::Cast {
                            expr: Box::new(expr),
                            ty,
                        },
                        start.merge(self.previous.span),
                    );
                }
                _ => break,
            }
        }

        Some(expr)
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) && !self.is_eof() {
            match self.parse_expression() {
                Some(arg) => args.push(arg),
                None => break,
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        args
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.current.kind {
            TokenKind::IntLiteral => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::IntLiteral(tok.value.as_int()), tok.span))
            }
            TokenKind::FloatLiteral => {
                let tok = self.advance();
                Some(Expr::new(
                    ExprKind::FloatLiteral(tok.value.as_float()),
                    tok.span,
                ))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                Some(Expr::new(
                    ExprKind::StringLiteral(unescape_string(&tok.text)),
                    tok.span,
                ))
            }
            TokenKind::CharLiteral => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::CharLiteral(char_value(&tok.text)), tok.span))
            }
            TokenKind::KwTrue => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::BoolLiteral(true), tok.span))
            }
            TokenKind::KwFalse => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::BoolLiteral(false), tok.span))
            }
            TokenKind::Identifier => self.parse_ident_expr(),
            TokenKind::KwSelf => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Ident("self".to_string()), tok.span))
            }
            TokenKind::LParen => self.parse_paren_or_tuple(),
            TokenKind::LBrace => self.parse_block_expr(),
            TokenKind::KwIf => self.parse_if_expr(),
            TokenKind::KwMatch => self.parse_match_expr(),
            TokenKind::Pipe => self.parse_closure_expr(),
            TokenKind::Underscore => {
                let tok = self.advance();
                Some(Expr::new(ExprKind::Ident("_".to_string()), tok.span))
            }
            _ => {
                self.error_here(&ParseError::ExpectedExpression {
                    found: self.current.text.clone(),
                });
                None
            }
        }
    }

    fn parse_ident_expr(&mut self) -> Option<Expr> {
        let tok = self.advance();
        let name = tok.text;
        let start = tok.span;

        // Struct literal: `TypeName { field: value, ... }` or `TypeName {}`.
        // A `{` here may instead open a surrounding block, so decide with
        // bounded lookahead and restore on the discarded branch.
        if self.check(TokenKind::LBrace) && self.brace_starts_literal() {
            let fields = self.parse_field_inits();
            return Some(Expr::new(
                ExprKind::StructLiteral {
                    type_name: name,
                    fields,
                },
                start.merge(self.previous.span),
            ));
        }

        Some(Expr::new(ExprKind::Ident(name), start))
    }

    /// Decide whether a `{` after a name begins a struct literal: true when
    /// the tokens after it form `IDENT :` or the brace closes immediately.
    /// The scan is speculative; parser and lexer state are restored.
    fn brace_starts_literal(&mut self) -> bool {
        let saved = self.save_state();

        self.advance(); // consume '{'
        let mut is_literal = false;
        if self.check(TokenKind::Identifier) {
            self.advance();
            if self.check(TokenKind::Colon) {
                is_literal = true;
            }
        } else if self.check(TokenKind::RBrace) {
            is_literal = true;
        }

        self.restore_state(&saved);
        is_literal
    }

    fn parse_field_inits(&mut self) -> Vec<FieldInit> {
        self.expect(TokenKind::LBrace, "'{'");

        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let span = self.current.span;
            let name = self.expect(TokenKind::Identifier, "field name").text;
            self.expect(TokenKind::Colon, "':' after field name");
            let Some(value) = self.parse_expression() else {
                break;
            };
            fields.push(FieldInit {
                name,
                value,
                span: span.merge(self.previous.span),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.expect(TokenKind::RBrace, "'}' after struct literal");
        fields
    }

    fn parse_paren_or_tuple(&mut self) -> Option<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::LParen, "'('");

        if self.check(TokenKind::RParen) {
            self.advance();
            // Empty tuple / unit
            return Some(Expr::new(
                ExprKind::Tuple(Vec::new()),
                start.merge(self.previous.span),
            ));
        }

        let first = self.parse_expression()?;

        if self.check(TokenKind::Comma) {
            let mut elements = vec![first];
            while self.eat(TokenKind::Comma).is_some() {
                if self.check(TokenKind::RParen) {
                    break;
                }
                elements.push(self.parse_expression()?);
            }
            self.expect(TokenKind::RParen, "')' after tuple");
            return Some(Expr::new(
                ExprKind::Tuple(elements),
                start.merge(self.previous.span),
            ));
        }

        self.expect(TokenKind::RParen, "')'");
        Some(first)
    }

    fn parse_block_expr(&mut self) -> Option<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::LBrace, "'{'");

        let mut stmts = Vec::new();
        let mut tail = None;

        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let before = self.current.span;

            let is_stmt_head = matches!(
                self.current.kind,
                TokenKind::KwLet
                    | TokenKind::KwConst
                    | TokenKind::KwReturn
                    | TokenKind::KwIf
                    | TokenKind::KwMatch
                    | TokenKind::KwFor
                    | TokenKind::KwWhile
                    | TokenKind::KwLoop
                    | TokenKind::KwBreak
                    | TokenKind::KwContinue
                    | TokenKind::LBrace
            );

            if is_stmt_head {
                if let Some(stmt) = self.parse_statement() {
                    stmts.push(stmt);
                } else if self.current.span == before && !self.is_eof() {
                    self.advance();
                }
                continue;
            }

            // An expression: either a `;`-terminated statement or the
            // block's trailing value
            let stmt_start = self.current.span;
            let Some(expr) = self.parse_expression() else {
                self.synchronize();
                if self.at_declaration_anchor() {
                    break;
                }
                if self.current.span == before && !self.is_eof() && !self.check(TokenKind::RBrace) {
                    self.advance();
                }
                continue;
            };

            if self.check(TokenKind::RBrace) {
                tail = Some(Box::new(expr));
                break;
            }
            self.expect_semicolon();
            stmts.push(Stmt::new(
                StmtKind::Expr(expr),
                stmt_start.merge(self.previous.span),
            ));
        }

        self.expect(TokenKind::RBrace, "'}'");
        Some(Expr::new(
            ExprKind::Block { stmts, tail },
            start.merge(self.previous.span),
        ))
    }

    fn parse_if_expr(&mut self) -> Option<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::KwIf, "'if'");

        let cond = self.parse_expression()?;
        let then_branch = self.parse_block_expr()?;

        let else_branch = if self.eat(TokenKind::KwElse).is_some() {
            if self.check(TokenKind::KwIf) {
                self.parse_if_expr().map(Box::new)
            } else {
                self.parse_block_expr().map(Box::new)
            }
        } else {
            None
        };

        Some(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            start.merge(self.previous.span),
        ))
    }

    fn parse_match_expr(&mut self) -> Option<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::KwMatch, "'match'");

        let scrutinee = self.parse_expression()?;
        self.expect(TokenKind::LBrace, "'{' in match expression");
        let arms = self.parse_match_arms();
        self.expect(TokenKind::RBrace, "'}' after match arms");

        Some(Expr::new(
            ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            start.merge(self.previous.span),
        ))
    }

    fn parse_closure_expr(&mut self) -> Option<Expr> {
        let start = self.current.span;
        self.expect(TokenKind::Pipe, "'|' for closure");

        let mut params = Vec::new();
        while !self.check(TokenKind::Pipe) && !self.is_eof() {
            let span = self.current.span;
            let name = self.expect(TokenKind::Identifier, "parameter name").text;
            let ty = if self.eat(TokenKind::Colon).is_some() {
                self.parse_type()
            } else {
                None
            };
            params.push(ClosureParam {
                name,
                ty,
                span: span.merge(self.previous.span),
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Pipe, "'|' after closure parameters");

        let return_type = if self.eat(TokenKind::Arrow).is_some() {
            self.parse_type()
        } else {
            None
        };

        let body = self.parse_block_expr()?;

        Some(Expr::new(
            ExprKind::Closure {
                params,
                return_type,
                body: Box::new(body),
            },
            start.merge(self.previous.span),
        ))
    }

    // ==================== Pattern parsing ====================

    fn parse_pattern(&mut self) -> Option<Pattern> {
        let start = self.current.span;
        let first = self.parse_single_pattern()?;

        if !self.check(TokenKind::Pipe) {
            return Some(first);
        }

        let mut alternatives = vec![first];
        while self.eat(TokenKind::Pipe).is_some() {
            alternatives.push(self.parse_single_pattern()?);
        }

        Some(Pattern::new(
            PatternKind::Or(alternatives),
            start.merge(self.previous.span),
        ))
    }

    fn parse_single_pattern(&mut self) -> Option<Pattern> {
        let start = self.current.span;

        match self.current.kind {
            TokenKind::Underscore => {
                self.advance();
                Some(Pattern::new(PatternKind::Wildcard, start))
            }
            TokenKind::IntLiteral => {
                let tok = self.advance();
                let lit = Expr::new(ExprKind::IntLiteral(tok.value.as_int()), tok.span);
                Some(Pattern::new(PatternKind::Literal(Box::new(lit)), start))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                let lit = Expr::new(ExprKind::StringLiteral(unescape_string(&tok.text)), tok.span);
                Some(Pattern::new(PatternKind::Literal(Box::new(lit)), start))
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                let value = self.current.kind == TokenKind::KwTrue;
                let tok = self.advance();
                let lit = Expr::new(ExprKind::BoolLiteral(value), tok.span);
                Some(Pattern::new(PatternKind::Literal(Box::new(lit)), start))
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RParen) && !self.is_eof() {
                    elements.push(self.parse_pattern()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')' after tuple pattern");
                Some(Pattern::new(
                    PatternKind::Tuple(elements),
                    start.merge(self.previous.span),
                ))
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                let name = tok.text;

                let mut path = vec![name];
                while self.eat(TokenKind::ColonColon).is_some() {
                    path.push(self.expect(TokenKind::Identifier, "identifier after '::'").text);
                }

                // Constructor pattern when a payload follows (or the name was
                // qualified); a bare single-segment name binds
                if path.len() == 1
                    && !self.check(TokenKind::LParen)
                    && !self.check(TokenKind::LBrace)
                {
                    return Some(Pattern::new(
                        PatternKind::Ident {
                            name: path.pop().expect("single segment"),
                            mutable: false,
                        },
                        start,
                    ));
                }

                self.parse_constructor_pattern(path, start)
            }
            _ => {
                self.error_here(&ParseError::ExpectedPattern);
                None
            }
        }
    }

    fn parse_constructor_pattern(&mut self, path: Vec<String>, start: Span) -> Option<Pattern> {
        let mut positional = Vec::new();
        let mut named = Vec::new();

        if self.eat(TokenKind::LParen).is_some() {
            // Positional fields: Option::Some(value)
            while !self.check(TokenKind::RParen) && !self.is_eof() {
                positional.push(self.parse_pattern()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')' after constructor pattern");
        } else if self.eat(TokenKind::LBrace).is_some() {
            // Named fields: Message::Move { x, y }
            while !self.check(TokenKind::RBrace) && !self.is_eof() {
                let field_span = self.current.span;
                let field_tok = self.expect(TokenKind::Identifier, "field name");

                let pattern = if self.eat(TokenKind::Colon).is_some() {
                    self.parse_pattern()?
                } else {
                    // Shorthand: { x } means { x: x }
                    Pattern::new(
                        PatternKind::Ident {
                            name: field_tok.text.clone(),
                            mutable: false,
                        },
                        field_tok.span,
                    )
                };

                named.push(NamedFieldPattern {
                    name: field_tok.text,
                    pattern,
                    span: field_span.merge(self.previous.span),
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "'}' after struct pattern");
        }

        Some(Pattern::new(
            PatternKind::Constructor {
                path,
                positional,
                named,
            },
            start.merge(self.previous.span),
        ))
    }

    // ==================== Type parsing ====================

    fn parse_type(&mut self) -> Option<TypeNode> {
        let start = self.current.span;

        match self.current.kind {
            // `ref T`, with an optional lifetime: `ref 'a T`
            TokenKind::KwRef => {
                self.advance();
                let lifetime = self
                    .eat(TokenKind::Apostrophe)
                    .map(|tok| tok.text.trim_start_matches('\'').to_string());
                let inner = self.parse_type()?;
                Some(TypeNode::new(
                    TypeKind::Reference {
                        inner: Box::new(inner),
                        lifetime,
                    },
                    start.merge(self.previous.span),
                ))
            }
            // `&T` and `&mut T`
            TokenKind::Ampersand => {
                self.advance();
                if self.eat(TokenKind::KwMut).is_some() {
                    let inner = self.parse_type()?;
                    Some(TypeNode::new(
                        TypeKind::MutReference {
                            inner: Box::new(inner),
                            lifetime: None,
                        },
                        start.merge(self.previous.span),
                    ))
                } else {
                    let inner = self.parse_type()?;
                    Some(TypeNode::new(
                        TypeKind::Reference {
                            inner: Box::new(inner),
                            lifetime: None,
                        },
                        start.merge(self.previous.span),
                    ))
                }
            }
            // `mut ref T`
            TokenKind::KwMut => {
                self.advance();
                if self.eat(TokenKind::KwRef).is_none() {
                    self.error_here(&ParseError::ExpectedRefAfterMut);
                    return None;
                }
                let inner = self.parse_type()?;
                Some(TypeNode::new(
                    TypeKind::MutReference {
                        inner: Box::new(inner),
                        lifetime: None,
                    },
                    start.merge(self.previous.span),
                ))
            }
            TokenKind::LParen => self.parse_tuple_or_function_type(),
            _ => self.parse_named_or_generic_type(),
        }
    }

    fn parse_tuple_or_function_type(&mut self) -> Option<TypeNode> {
        let start = self.current.span;
        self.expect(TokenKind::LParen, "'('");

        let mut elements = Vec::new();
        while !self.check(TokenKind::RParen) && !self.is_eof() {
            elements.push(self.parse_type()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' after tuple type");

        // `(T, U) -> R` is a function type
        if self.eat(TokenKind::Arrow).is_some() {
            let ret = self.parse_type()?;
            return Some(TypeNode::new(
                TypeKind::Function {
                    params: elements,
                    ret: Box::new(ret),
                },
                start.merge(self.previous.span),
            ));
        }

        Some(TypeNode::new(
            TypeKind::Tuple(elements),
            start.merge(self.previous.span),
        ))
    }

    fn parse_named_or_generic_type(&mut self) -> Option<TypeNode> {
        let start = self.current.span;

        // `Void` and `Self` are type keywords
        if self.eat(TokenKind::KwVoid).is_some() {
            return Some(TypeNode::named("Void", start));
        }
        if self.eat(TokenKind::KwSelfType).is_some() {
            return Some(TypeNode::named("Self", start));
        }

        if !self.check(TokenKind::Identifier) {
            self.error_here(&ParseError::Expected {
                expected: "type name".to_string(),
                found: self.current.text.clone(),
            });
            return None;
        }

        let mut path = vec![self.advance().text];
        while self.eat(TokenKind::ColonColon).is_some() {
            path.push(self.expect(TokenKind::Identifier, "type name after '::'").text);
        }

        if self.eat(TokenKind::Less).is_none() {
            return Some(TypeNode::new(
                TypeKind::Named { path },
                start.merge(self.previous.span),
            ));
        }

        // Generic arguments; integer literals are captured as array sizes
        let mut args = Vec::new();
        let mut size = None;
        while !self.check(TokenKind::Greater) && !self.is_eof() {
            if self.check(TokenKind::IntLiteral) {
                let tok = self.advance();
                size = Some(tok.value.as_int().unsigned_abs());
            } else {
                args.push(self.parse_type()?);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Greater, "'>' after type arguments");

        let span = start.merge(self.previous.span);

        // Array types are written as generic application over `Array`
        if path.len() == 1 && path[0] == "Array" && !args.is_empty() {
            return Some(TypeNode::new(
                TypeKind::Array {
                    element: Box::new(args.remove(0)),
                    size,
                },
                span,
            ));
        }

        let base = TypeNode::new(TypeKind::Named { path }, start);
        Some(TypeNode::new(
            TypeKind::Generic {
                base: Box::new(base),
                args,
            },
            span,
        ))
    }

    // ==================== Error recovery ====================

    /// Panic-mode synchronization: skip tokens until just past a `;` or at a
    /// keyword that can begin a fresh declaration or statement
    fn synchronize(&mut self) {
        while !self.is_eof() {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }

            match self.current.kind {
                TokenKind::KwFunc
                | TokenKind::KwLet
                | TokenKind::KwConst
                | TokenKind::KwStruct
                | TokenKind::KwClass
                | TokenKind::KwEnum
                | TokenKind::KwTrait
                | TokenKind::KwImpl
                | TokenKind::KwReturn
                | TokenKind::KwIf
                | TokenKind::KwFor
                | TokenKind::KwWhile
                | TokenKind::KwLoop
                | TokenKind::KwModule
                | TokenKind::KwImport
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

/// Construct a binary expression spanning both operands
fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

/// Interpret the escape sequences the lexer left in place
fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Extract the character from a char-literal lexeme like `'a'` or `'\n'`
fn char_value(text: &str) -> char {
    let inner = text.trim_start_matches('\'').trim_end_matches('\'');
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(other) => other,
            None => '\\',
        },
        Some(c) => c,
        None => '\0',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticEngine;

    fn parse(source: &str) -> (Module, u32) {
        let mut diag = DiagnosticEngine::silent();
        let module = Parser::from_source(source, "test.vsp", &mut diag).parse_module();
        (module, diag.error_count())
    }

    fn parse_ok(source: &str) -> Module {
        let (module, errors) = parse(source);
        assert_eq!(errors, 0, "unexpected parse errors in {source:?}");
        module
    }

    fn parse_expr(source: &str) -> Expr {
        let mut diag = DiagnosticEngine::silent();
        let expr = Parser::from_source(source, "test.vsp", &mut diag)
            .parse_expression()
            .expect("expression should parse");
        assert_eq!(diag.error_count(), 0);
        expr
    }

    fn first_func(module: &Module) -> &FuncDecl {
        module
            .decls
            .iter()
            .find_map(|d| match &d.kind {
                DeclKind::Func(f) => Some(f),
                _ => None,
            })
            .expect("module should contain a function")
    }

    #[test]
    fn minimal_function() {
        let module = parse_ok("func main() -> Void {}");
        assert_eq!(module.decls.len(), 1);
        let func = first_func(&module);
        assert_eq!(func.name, "main");
        assert!(func.params.is_empty());
        assert_eq!(func.return_type.as_ref().unwrap().name_string(), "Void");
        assert!(func.body.as_ref().unwrap().stmts.is_empty());
    }

    #[test]
    fn module_header_and_imports() {
        let module = parse_ok(
            "module my_project::services;\nimport std::io;\nimport std::collections::Map;\nfunc f() -> Void {}",
        );
        assert_eq!(module.name, "my_project::services");
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[0].path_string(), "std::io");
        assert_eq!(module.imports[1].path_string(), "std::collections::Map");
    }

    #[test]
    fn function_parameters() {
        let module = parse_ok("func add(a: Int32, mut b: Int32, ref c: Int32, mut ref d: Int32) -> Int32 { return a; }");
        let func = first_func(&module);
        assert_eq!(func.params.len(), 4);
        assert!(!func.params[0].is_mutable);
        assert!(func.params[1].is_mutable);
        assert!(func.params[2].is_ref);
        assert!(func.params[3].is_mut_ref);
        assert_eq!(func.params[0].ty.as_ref().unwrap().name_string(), "Int32");
    }

    #[test]
    fn self_parameter() {
        let module = parse_ok("trait T { func area(self: Self) -> Float64; }");
        let DeclKind::Trait(t) = &module.decls[0].kind else {
            panic!("expected trait");
        };
        assert!(t.methods[0].params[0].is_self);
        assert!(t.methods[0].body.is_none());
    }

    #[test]
    fn generic_params_with_bounds() {
        let module = parse_ok("func max<T: Comparable + Clone>(a: T, b: T) -> T { return a; }");
        let func = first_func(&module);
        assert_eq!(func.generics.len(), 1);
        assert_eq!(func.generics[0].name, "T");
        assert_eq!(func.generics[0].bounds, vec!["Comparable", "Clone"]);
    }

    #[test]
    fn lifetime_generic_param() {
        let module = parse_ok("func get<'a>(x: ref 'a Int32) -> Int32 { return 0; }");
        let func = first_func(&module);
        assert_eq!(func.generics[0].lifetime.as_deref(), Some("a"));
    }

    #[test]
    fn async_function() {
        let module = parse_ok("async func fetch() -> Int32 { return 0; }");
        assert!(first_func(&module).is_async);
    }

    #[test]
    fn visibility_modifiers() {
        let (module, errors) = parse("pub func a() -> Void {}\nprivate func b() -> Void {}");
        assert_eq!(errors, 0);
        assert_eq!(module.decls[0].vis, Visibility::Public);
        assert_eq!(module.decls[1].vis, Visibility::Private);
    }

    #[test]
    fn annotations_are_skipped() {
        let module = parse_ok("@test\n@doc(\"adds two numbers\")\nfunc add() -> Void {}\n#!(feature)\nfunc b() -> Void {}");
        assert_eq!(module.decls.len(), 2);
    }

    #[test]
    fn struct_declaration() {
        let module = parse_ok("struct Point { x: Float64, y: Float64 }");
        let DeclKind::Struct(s) = &module.decls[0].kind else {
            panic!("expected struct");
        };
        assert_eq!(s.name, "Point");
        assert_eq!(s.fields.len(), 2);
        assert_eq!(s.fields[1].ty.as_ref().unwrap().name_string(), "Float64");
    }

    #[test]
    fn struct_trailing_comma() {
        let module = parse_ok("struct P { x: Int32, y: Int32, }");
        let DeclKind::Struct(s) = &module.decls[0].kind else {
            panic!("expected struct");
        };
        assert_eq!(s.fields.len(), 2);
    }

    #[test]
    fn class_field_visibility() {
        let module = parse_ok("class User { private id: Int32, public name: String }");
        let DeclKind::Class(c) = &module.decls[0].kind else {
            panic!("expected class");
        };
        assert_eq!(c.fields[0].vis, Visibility::Private);
        assert_eq!(c.fields[1].vis, Visibility::Public);
    }

    #[test]
    fn enum_with_mixed_variants() {
        let module = parse_ok(
            "enum Message {\n    Quit,\n    Move { x: Int32, y: Int32 },\n    Write(String),\n}",
        );
        let DeclKind::Enum(e) = &module.decls[0].kind else {
            panic!("expected enum");
        };
        assert_eq!(e.name, "Message");
        assert_eq!(e.variants.len(), 3);
        assert_eq!(e.variants[0].kind, VariantKind::Unit);
        assert_eq!(e.variants[1].kind, VariantKind::Struct);
        assert_eq!(e.variants[1].struct_fields.len(), 2);
        assert_eq!(e.variants[2].kind, VariantKind::Tuple);
        assert_eq!(e.variants[2].tuple_fields.len(), 1);
    }

    #[test]
    fn trait_with_supertraits() {
        let module = parse_ok("trait Shape: Drawable + Sized { func area(self: Self) -> Float64; }");
        let DeclKind::Trait(t) = &module.decls[0].kind else {
            panic!("expected trait");
        };
        assert_eq!(t.super_traits, vec!["Drawable", "Sized"]);
        assert_eq!(t.methods.len(), 1);
    }

    #[test]
    fn inherent_and_trait_impls() {
        let module = parse_ok(
            "impl Point { func norm(self: Self) -> Float64 { return 0.0; } }\nimpl Drawable for Circle { func draw(self: Self) -> Void {} }",
        );
        let DeclKind::Impl(a) = &module.decls[0].kind else {
            panic!("expected impl");
        };
        assert!(a.trait_name.is_none());
        assert_eq!(a.target.name_string(), "Point");

        let DeclKind::Impl(b) = &module.decls[1].kind else {
            panic!("expected impl");
        };
        assert_eq!(b.trait_name.as_deref(), Some("Drawable"));
        assert_eq!(b.target.name_string(), "Circle");
    }

    #[test]
    fn type_alias() {
        let module = parse_ok("type UserId = Int32;");
        let DeclKind::TypeAlias(t) = &module.decls[0].kind else {
            panic!("expected type alias");
        };
        assert_eq!(t.name, "UserId");
        assert_eq!(t.aliased.as_ref().unwrap().name_string(), "Int32");
    }

    #[test]
    fn precedence_add_mul() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expr("1 + 2 * 3");
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        let ExprKind::Binary { op: inner, .. } = &rhs.kind else {
            panic!("expected nested binary expression");
        };
        assert_eq!(*inner, BinaryOp::Mul);
    }

    #[test]
    fn precedence_comparison_and_logic() {
        // a < b and c < d parses as (a < b) and (c < d)
        let expr = parse_expr("a < b and c < d");
        let ExprKind::Binary { op, lhs, rhs } = &expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::And);
        assert!(matches!(
            lhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Less,
                ..
            }
        ));
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Less,
                ..
            }
        ));
    }

    #[test]
    fn precedence_shift_vs_additive() {
        // 1 << 2 + 3 parses as 1 << (2 + 3)
        let expr = parse_expr("1 << 2 + 3");
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::ShiftLeft);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expr("a = b = c");
        let ExprKind::Assign { value, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn compound_assignment() {
        let expr = parse_expr("x += 2");
        assert!(matches!(
            expr.kind,
            ExprKind::CompoundAssign {
                op: CompoundOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn unary_operators() {
        assert!(matches!(
            parse_expr("-x").kind,
            ExprKind::Unary {
                op: UnaryOp::Negate,
                ..
            }
        ));
        assert!(matches!(
            parse_expr("not flag").kind,
            ExprKind::Unary {
                op: UnaryOp::Not,
                ..
            }
        ));
        assert!(matches!(
            parse_expr("~bits").kind,
            ExprKind::Unary {
                op: UnaryOp::BitwiseNot,
                ..
            }
        ));
        assert!(matches!(parse_expr("ref x").kind, ExprKind::Ref(_)));
        assert!(matches!(parse_expr("mut ref x").kind, ExprKind::MutRef(_)));
        assert!(matches!(parse_expr("move x").kind, ExprKind::Move(_)));
        assert!(matches!(parse_expr("await fut").kind, ExprKind::Await(_)));
    }

    #[test]
    fn postfix_chain() {
        let expr = parse_expr("obj.field[0].method(1, 2)");
        let ExprKind::MethodCall { method, args, receiver } = &expr.kind else {
            panic!("expected method call");
        };
        assert_eq!(method, "method");
        assert_eq!(args.len(), 2);
        assert!(matches!(receiver.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn try_and_cast_postfix() {
        assert!(matches!(parse_expr("compute()?").kind, ExprKind::Try(_)));
        let expr = parse_expr("x as Int64");
        let ExprKind::Cast { ty, .. } = &expr.kind else {
            panic!("expected cast");
        };
        assert_eq!(ty.name_string(), "Int64");
    }

    #[test]
    fn path_expression_and_call() {
        let expr = parse_expr("std::io::println(\"hi\")");
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let ExprKind::Path(segments) = &callee.kind else {
            panic!("expected path callee");
        };
        assert_eq!(segments, &["std", "io", "println"]);
    }

    #[test]
    fn range_expressions() {
        let expr = parse_expr("0..10");
        assert!(matches!(
            expr.kind,
            ExprKind::Range {
                inclusive: false,
                ..
            }
        ));
        let expr = parse_expr("0...10");
        assert!(matches!(expr.kind, ExprKind::Range { inclusive: true, .. }));
    }

    #[test]
    fn tuple_and_paren() {
        assert!(matches!(parse_expr("(1, 2, 3)").kind, ExprKind::Tuple(ref v) if v.len() == 3));
        assert!(matches!(parse_expr("()").kind, ExprKind::Tuple(ref v) if v.is_empty()));
        // Parenthesized expression is not a tuple
        assert!(matches!(parse_expr("(1 + 2)").kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn closure_expression() {
        let expr = parse_expr("|a: Int32, b: Int32| -> Int32 { a + b }");
        let ExprKind::Closure {
            params,
            return_type,
            ..
        } = &expr.kind
        else {
            panic!("expected closure");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(return_type.as_ref().unwrap().name_string(), "Int32");
    }

    #[test]
    fn struct_literal_vs_block() {
        let module = parse_ok(
            "struct Point { x: Float64, y: Float64 }\nfunc origin() -> Point { return Point { x: 0.0, y: 0.0 }; }",
        );
        let func = first_func(&module);
        let body = func.body.as_ref().unwrap();
        let StmtKind::Return(Some(expr)) = &body.stmts[0].kind else {
            panic!("expected return with value");
        };
        let ExprKind::StructLiteral { type_name, fields } = &expr.kind else {
            panic!("expected struct literal, got {:?}", expr.kind);
        };
        assert_eq!(type_name, "Point");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "x");
    }

    #[test]
    fn ident_before_block_is_not_a_literal() {
        // `x { return; }` must not treat `{` as a struct literal
        let module = parse_ok("func f(x: Bool) -> Void { while x { return; } }");
        let func = first_func(&module);
        let StmtKind::While { .. } = &func.body.as_ref().unwrap().stmts[0].kind else {
            panic!("expected while statement");
        };
    }

    #[test]
    fn empty_struct_literal() {
        let expr = parse_expr("Empty {}");
        assert!(matches!(
            expr.kind,
            ExprKind::StructLiteral { ref fields, .. } if fields.is_empty()
        ));
    }

    #[test]
    fn construct_through_path() {
        let expr = parse_expr("shapes::Point { x: 1.0, y: 2.0 }");
        let ExprKind::Construct { path, fields } = &expr.kind else {
            panic!("expected construct expression, got {:?}", expr.kind);
        };
        assert_eq!(path, &["shapes", "Point"]);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn let_requires_annotation() {
        let (_, errors) = parse("func f() -> Void { let x = 1; }");
        assert!(errors >= 1);

        let module = parse_ok("func f() -> Void { let mut x: Int32 = 1; }");
        let func = first_func(&module);
        let StmtKind::Let { name, ty, mutable, init } = &func.body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected let");
        };
        assert_eq!(name, "x");
        assert!(*mutable);
        assert_eq!(ty.as_ref().unwrap().name_string(), "Int32");
        assert!(init.is_some());
    }

    #[test]
    fn const_statement() {
        let module = parse_ok("func f() -> Void { const MAX: Int32 = 100; }");
        let func = first_func(&module);
        assert!(matches!(
            func.body.as_ref().unwrap().stmts[0].kind,
            StmtKind::Const { .. }
        ));
    }

    #[test]
    fn control_flow_statements() {
        let module = parse_ok(
            "func f(n: Int32) -> Void {\n\
             if n > 0 { return; } else if n < 0 { return; } else { return; }\n\
             while n > 0 { break; }\n\
             loop { continue; }\n\
             for i: Int32 in 0..10 { }\n\
             }",
        );
        let stmts = &first_func(&module).body.as_ref().unwrap().stmts;
        assert!(matches!(stmts[0].kind, StmtKind::If { .. }));
        assert!(matches!(stmts[1].kind, StmtKind::While { .. }));
        assert!(matches!(stmts[2].kind, StmtKind::Loop { .. }));
        assert!(matches!(stmts[3].kind, StmtKind::For { .. }));
    }

    #[test]
    fn for_requires_loop_variable_type() {
        let (_, errors) = parse("func f() -> Void { for i in 0..10 { } }");
        assert!(errors >= 1);

        let module = parse_ok("func f() -> Void { for i: Int32 in 0..10 { } }");
        let StmtKind::For { var, var_ty, .. } = &first_func(&module).body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected for");
        };
        assert_eq!(var, "i");
        assert_eq!(var_ty.as_ref().unwrap().name_string(), "Int32");
    }

    #[test]
    fn match_statement_with_patterns() {
        let module = parse_ok(
            "func f(msg: Message) -> Void {\n\
             match msg {\n\
                 Message::Quit => return,\n\
                 Message::Move { x, y } => return,\n\
                 Message::Write(text) => return,\n\
                 (a, b) => return,\n\
                 1 | 2 => return,\n\
                 _ => return,\n\
             }\n\
             }",
        );
        let StmtKind::Match { arms, .. } = &first_func(&module).body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 6);
        assert!(matches!(
            &arms[0].pattern.kind,
            PatternKind::Constructor { path, positional, named }
                if path == &["Message", "Quit"] && positional.is_empty() && named.is_empty()
        ));
        assert!(matches!(
            &arms[1].pattern.kind,
            PatternKind::Constructor { named, .. } if named.len() == 2
        ));
        assert!(matches!(
            &arms[2].pattern.kind,
            PatternKind::Constructor { positional, .. } if positional.len() == 1
        ));
        assert!(matches!(&arms[3].pattern.kind, PatternKind::Tuple(v) if v.len() == 2));
        assert!(matches!(&arms[4].pattern.kind, PatternKind::Or(v) if v.len() == 2));
        assert!(matches!(&arms[5].pattern.kind, PatternKind::Wildcard));
    }

    #[test]
    fn match_arm_guard() {
        let module = parse_ok("func f(n: Int32) -> Void { match n { x if x > 0 => return, _ => return, } }");
        let StmtKind::Match { arms, .. } = &first_func(&module).body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected match");
        };
        assert!(arms[0].guard.is_some());
    }

    #[test]
    fn shorthand_field_pattern_expands() {
        let module = parse_ok("func f(m: M) -> Void { match m { M::P { x } => return, } }");
        let StmtKind::Match { arms, .. } = &first_func(&module).body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected match");
        };
        let PatternKind::Constructor { named, .. } = &arms[0].pattern.kind else {
            panic!("expected constructor pattern");
        };
        assert_eq!(named[0].name, "x");
        assert!(matches!(
            &named[0].pattern.kind,
            PatternKind::Ident { name, .. } if name == "x"
        ));
    }

    #[test]
    fn reference_type_synonyms() {
        let module = parse_ok("func f(a: ref Int32, b: &Int32, c: mut ref Int32, d: &mut Int32) -> Void {}");
        let params = &first_func(&module).params;
        assert_eq!(params[0].ty.as_ref().unwrap().name_string(), "&Int32");
        assert_eq!(params[1].ty.as_ref().unwrap().name_string(), "&Int32");
        assert_eq!(params[2].ty.as_ref().unwrap().name_string(), "&mut Int32");
        assert_eq!(params[3].ty.as_ref().unwrap().name_string(), "&mut Int32");
    }

    #[test]
    fn function_and_tuple_types() {
        let module = parse_ok("func apply(f: (Int32, Int32) -> Int32, pair: (Int32, String)) -> Void {}");
        let params = &first_func(&module).params;
        assert!(matches!(
            params[0].ty.as_ref().unwrap().kind,
            TypeKind::Function { ref params, .. } if params.len() == 2
        ));
        assert!(matches!(
            params[1].ty.as_ref().unwrap().kind,
            TypeKind::Tuple(ref elems) if elems.len() == 2
        ));
    }

    #[test]
    fn generic_and_array_types() {
        let module = parse_ok("func f(v: Vec<Int32>, m: Map<String, Int32>, a: Array<Int32, 5>) -> Void {}");
        let params = &first_func(&module).params;
        assert!(matches!(
            &params[0].ty.as_ref().unwrap().kind,
            TypeKind::Generic { base, args } if base.name_string() == "Vec" && args.len() == 1
        ));
        assert!(matches!(
            &params[1].ty.as_ref().unwrap().kind,
            TypeKind::Generic { args, .. } if args.len() == 2
        ));
        assert!(matches!(
            &params[2].ty.as_ref().unwrap().kind,
            TypeKind::Array { size: Some(5), .. }
        ));
    }

    #[test]
    fn block_expression_tail() {
        let module = parse_ok("func f() -> Int32 { let x: Int32 = { 1 + 2 }; return x; }");
        let StmtKind::Let { init, .. } = &first_func(&module).body.as_ref().unwrap().stmts[0].kind
        else {
            panic!("expected let");
        };
        let ExprKind::Block { stmts, tail } = &init.as_ref().unwrap().kind else {
            panic!("expected block expression");
        };
        assert!(stmts.is_empty());
        assert!(tail.is_some());
    }

    #[test]
    fn recovery_produces_following_decls() {
        // The malformed first declaration must not swallow the second
        let (module, errors) = parse("func broken( -> Void {}\nfunc ok() -> Void {}");
        assert!(errors >= 1);
        assert!(module
            .decls
            .iter()
            .any(|d| matches!(&d.kind, DeclKind::Func(f) if f.name == "ok")));
    }

    #[test]
    fn recovery_inside_block() {
        let (module, errors) = parse("func f() -> Void { let x: Int32 = ; return; }");
        assert!(errors >= 1);
        // The function still parses and keeps its later statements
        let func = first_func(&module);
        assert!(func
            .body
            .as_ref()
            .unwrap()
            .stmts
            .iter()
            .any(|s| matches!(s.kind, StmtKind::Return(_))));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let (_, errors) = parse("func f() -> Void { let x: Int32 = 1 }");
        assert!(errors >= 1);
    }

    #[test]
    fn well_formed_ast_despite_undeclared_names() {
        // Name errors are sema's concern; the parser builds the tree
        let module = parse_ok("func f() -> Void { let x: Int32 = y; }");
        let func = first_func(&module);
        let StmtKind::Let { init, .. } = &func.body.as_ref().unwrap().stmts[0].kind else {
            panic!("expected let");
        };
        assert!(matches!(
            init.as_ref().unwrap().kind,
            ExprKind::Ident(ref name) if name == "y"
        ));
    }

    #[test]
    fn every_node_span_is_in_bounds() {
        let source = "struct P { x: Int32 }\nfunc f(p: P) -> Int32 { return p.x + 1; }";
        let module = parse_ok(source);
        let len = source.len() as u32;

        fn check_expr(expr: &Expr, len: u32) {
            assert!(expr.span.start <= expr.span.end && expr.span.end <= len);
        }

        for decl in &module.decls {
            assert!(decl.span.end <= len);
            if let DeclKind::Func(f) = &decl.kind {
                for stmt in &f.body.as_ref().unwrap().stmts {
                    assert!(stmt.span.end <= len);
                    if let StmtKind::Return(Some(expr)) = &stmt.kind {
                        check_expr(expr, len);
                    }
                }
            }
        }
    }

    #[test]
    fn string_escapes_are_interpreted() {
        let expr = parse_expr(r#""a\nb\tc\\""#);
        let ExprKind::StringLiteral(s) = &expr.kind else {
            panic!("expected string literal");
        };
        assert_eq!(s, "a\nb\tc\\");
    }

    #[test]
    fn char_literals() {
        assert!(matches!(parse_expr("'a'").kind, ExprKind::CharLiteral('a')));
        assert!(matches!(parse_expr(r"'\n'").kind, ExprKind::CharLiteral('\n')));
    }
}
