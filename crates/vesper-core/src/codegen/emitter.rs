//! Lowering of validated AST functions to Cranelift IR
//!
//! Each named binding gets a Cranelift [`Variable`] ("slot"); control flow
//! lowers to the standard block shapes (`then`/`else`/`merge` for `if`,
//! `cond`/`body`/`exit` for `while`, `body`/`exit` for `loop`), and `if`
//! expressions merge their branch values through block parameters. A loop
//! context stack tracks `break`/`continue` targets.
//!
//! Constructs without a lowering yet (method calls, aggregates, match) yield
//! no value; earlier phases guarantee the code that reaches the backend is
//! well-typed.

use std::collections::HashMap;

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{types, InstBuilder, Type as ClifType, Value};
use cranelift_frontend::{FunctionBuilder, Variable};
use cranelift_module::{DataDescription, Linkage, Module};
use cranelift_object::ObjectModule;

use crate::ast::{BinaryOp, Expr, ExprKind, FuncDecl, Span, Stmt, StmtKind, UnaryOp};
use crate::diagnostics::DiagnosticEngine;
use crate::source::{FileId, SourceMap};

use super::types::TypeLowering;
use super::FuncInfo;

/// Branch targets for the innermost enclosing loop
struct LoopContext {
    break_block: cranelift_codegen::ir::Block,
    continue_block: cranelift_codegen::ir::Block,
}

/// Emits the body of a single function
pub(super) struct FunctionEmitter<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,
    module: &'a mut ObjectModule,
    funcs: &'a HashMap<String, FuncInfo>,
    lowering: TypeLowering,
    diag: &'a mut DiagnosticEngine,
    source_map: &'a SourceMap,
    file: FileId,
    str_counter: &'a mut usize,

    /// Declared return type of the function being emitted
    ret_type: Option<ClifType>,
    /// Named slots in the current function
    slots: HashMap<String, (Variable, ClifType)>,
    loop_stack: Vec<LoopContext>,
    next_var: u32,
    /// Whether the current block already ends in a terminator
    terminated: bool,
}

impl<'a, 'b> FunctionEmitter<'a, 'b> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        builder: &'a mut FunctionBuilder<'b>,
        module: &'a mut ObjectModule,
        funcs: &'a HashMap<String, FuncInfo>,
        lowering: TypeLowering,
        diag: &'a mut DiagnosticEngine,
        source_map: &'a SourceMap,
        file: FileId,
        str_counter: &'a mut usize,
        ret_type: Option<ClifType>,
    ) -> Self {
        Self {
            builder,
            module,
            funcs,
            lowering,
            diag,
            source_map,
            file,
            str_counter,
            ret_type,
            slots: HashMap::new(),
            loop_stack: Vec::new(),
            next_var: 0,
            terminated: false,
        }
    }

    /// Lower the function body. The entry block receives the parameters;
    /// each parameter is stored into a fresh slot.
    pub(super) fn emit(&mut self, decl: &FuncDecl) {
        let entry = self.builder.create_block();
        self.builder.append_block_params_for_function_params(entry);
        self.builder.switch_to_block(entry);

        let param_values: Vec<Value> = self.builder.block_params(entry).to_vec();
        for (i, param) in decl.params.iter().enumerate() {
            let ty = param
                .ty
                .as_ref()
                .and_then(|t| self.lowering.lower(t))
                .unwrap_or_else(|| self.lowering.pointer_type());
            let var = self.new_var(ty);
            self.builder.def_var(var, param_values[i]);
            self.slots.insert(param.name.clone(), (var, ty));
        }

        if let Some(body) = &decl.body {
            for stmt in &body.stmts {
                self.emit_stmt(stmt);
            }
        }

        if !self.terminated {
            match self.ret_type {
                None => {
                    self.builder.ins().return_(&[]);
                }
                Some(ty) => {
                    let zero = self.const_zero(ty);
                    self.builder.ins().return_(&[zero]);
                }
            }
        }

        self.builder.seal_all_blocks();
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        let loc = self.source_map.location(self.file, span.start);
        self.diag.error(loc, message);
    }

    fn new_var(&mut self, ty: ClifType) -> Variable {
        let var = Variable::from_u32(self.next_var);
        self.next_var += 1;
        self.builder.declare_var(var, ty);
        var
    }

    fn const_zero(&mut self, ty: ClifType) -> Value {
        if ty == types::F32 {
            self.builder.ins().f32const(0.0)
        } else if ty == types::F64 {
            self.builder.ins().f64const(0.0)
        } else {
            self.builder.ins().iconst(ty, 0)
        }
    }

    fn value_type(&self, value: Value) -> ClifType {
        self.builder.func.dfg.value_type(value)
    }

    /// Adjust a scalar value to the target width: sign-extend or truncate
    /// integers, promote or demote floats. Values whose domain differs from
    /// the target (int vs float) pass through untouched; those conversions
    /// only happen through explicit casts.
    fn adjust_width(&mut self, value: Value, target: ClifType) -> Value {
        let ty = self.value_type(value);
        if ty == target {
            return value;
        }
        if ty.is_int() && target.is_int() {
            return if target.bits() > ty.bits() {
                self.builder.ins().sextend(target, value)
            } else {
                self.builder.ins().ireduce(target, value)
            };
        }
        if ty.is_float() && target.is_float() {
            return if target.bits() > ty.bits() {
                self.builder.ins().fpromote(target, value)
            } else {
                self.builder.ins().fdemote(target, value)
            };
        }
        value
    }

    /// Open a fresh block when the current one already ended in a terminator,
    /// so trailing statements after `return`/`break` still verify
    fn ensure_open_block(&mut self) {
        if self.terminated {
            let block = self.builder.create_block();
            self.builder.switch_to_block(block);
            self.terminated = false;
        }
    }

    // ==================== Statements ====================

    fn emit_stmt(&mut self, stmt: &Stmt) {
        self.ensure_open_block();

        match &stmt.kind {
            StmtKind::Let { name, ty, init, .. }
            | StmtKind::Const {
                name,
                ty,
                value: init,
            } => self.emit_let(name, ty.as_ref(), init.as_ref()),

            StmtKind::Return(value) => self.emit_return(value.as_ref()),

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.emit_if(cond, then_branch, else_branch.as_deref()),

            StmtKind::While { cond, body } => self.emit_while(cond, body),

            StmtKind::Loop { body } => self.emit_loop(body),

            StmtKind::For {
                var, var_ty, body, ..
            } => self.emit_for(var, var_ty.as_ref(), body),

            StmtKind::Break => {
                if let Some(ctx) = self.loop_stack.last() {
                    let target = ctx.break_block;
                    self.builder.ins().jump(target, &[]);
                    self.terminated = true;
                }
            }

            StmtKind::Continue => {
                if let Some(ctx) = self.loop_stack.last() {
                    let target = ctx.continue_block;
                    self.builder.ins().jump(target, &[]);
                    self.terminated = true;
                }
            }

            StmtKind::Block(block) => {
                for stmt in &block.stmts {
                    self.emit_stmt(stmt);
                }
            }

            StmtKind::Expr(expr) => {
                // Evaluate and discard
                let _ = self.emit_expr(expr);
            }

            // Match lowering requires the runtime's discriminant support
            StmtKind::Match { .. } => {}
        }
    }

    fn emit_let(
        &mut self,
        name: &str,
        ty: Option<&crate::ast::TypeNode>,
        init: Option<&Expr>,
    ) {
        let slot_ty = ty
            .and_then(|t| self.lowering.lower(t))
            .unwrap_or(types::I64);
        let var = self.new_var(slot_ty);

        let value = init.and_then(|e| self.emit_expr(e));
        // The initializer may have ended the block (a block expression
        // containing `return`); the slot definition needs an open one
        self.ensure_open_block();
        match value {
            Some(v) => {
                let v = self.adjust_width(v, slot_ty);
                if self.value_type(v) == slot_ty {
                    self.builder.def_var(var, v);
                } else {
                    let zero = self.const_zero(slot_ty);
                    self.builder.def_var(var, zero);
                }
            }
            None => {
                let zero = self.const_zero(slot_ty);
                self.builder.def_var(var, zero);
            }
        }

        self.slots.insert(name.to_string(), (var, slot_ty));
    }

    fn emit_return(&mut self, value: Option<&Expr>) {
        let produced = value.and_then(|e| self.emit_expr(e));
        if self.terminated {
            // The value expression already left the block
            return;
        }
        match (produced, self.ret_type) {
            (Some(v), Some(ty)) => {
                let v = self.adjust_width(v, ty);
                self.builder.ins().return_(&[v]);
            }
            (_, None) => {
                self.builder.ins().return_(&[]);
            }
            (None, Some(ty)) => {
                let zero = self.const_zero(ty);
                self.builder.ins().return_(&[zero]);
            }
        }
        self.terminated = true;
    }

    /// Three-block lowering: `then`, optional `else`, and `merge`; the merge
    /// block is only entered when at least one branch falls through
    fn emit_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let Some(cond_val) = self.emit_expr(cond) else {
            return;
        };

        let then_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        let else_block = if else_branch.is_some() {
            self.builder.create_block()
        } else {
            merge_block
        };

        self.builder
            .ins()
            .brif(cond_val, then_block, &[], else_block, &[]);

        self.builder.switch_to_block(then_block);
        self.terminated = false;
        self.emit_stmt(then_branch);
        let then_falls = !self.terminated;
        if then_falls {
            self.builder.ins().jump(merge_block, &[]);
        }

        let mut else_falls = else_branch.is_none();
        if let Some(else_branch) = else_branch {
            self.builder.switch_to_block(else_block);
            self.terminated = false;
            self.emit_stmt(else_branch);
            else_falls = !self.terminated;
            if else_falls {
                self.builder.ins().jump(merge_block, &[]);
            }
        }

        if then_falls || else_falls {
            self.builder.switch_to_block(merge_block);
            self.terminated = false;
        } else {
            self.terminated = true;
        }
    }

    /// `cond` / `body` / `exit`, entering through `cond`
    fn emit_while(&mut self, cond: &Expr, body: &Stmt) {
        let cond_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit_block = self.builder.create_block();

        self.builder.ins().jump(cond_block, &[]);

        self.builder.switch_to_block(cond_block);
        self.terminated = false;
        match self.emit_expr(cond) {
            Some(c) => {
                self.builder.ins().brif(c, body_block, &[], exit_block, &[]);
            }
            None => {
                if !self.terminated {
                    self.builder.ins().jump(exit_block, &[]);
                }
            }
        }

        self.builder.switch_to_block(body_block);
        self.terminated = false;
        self.loop_stack.push(LoopContext {
            break_block: exit_block,
            continue_block: cond_block,
        });
        self.emit_stmt(body);
        self.loop_stack.pop();
        if !self.terminated {
            self.builder.ins().jump(cond_block, &[]);
        }

        self.builder.switch_to_block(exit_block);
        self.terminated = false;
    }

    /// `body` / `exit`; the body unconditionally jumps back to itself
    fn emit_loop(&mut self, body: &Stmt) {
        let body_block = self.builder.create_block();
        let exit_block = self.builder.create_block();

        self.builder.ins().jump(body_block, &[]);

        self.builder.switch_to_block(body_block);
        self.terminated = false;
        self.loop_stack.push(LoopContext {
            break_block: exit_block,
            continue_block: body_block,
        });
        self.emit_stmt(body);
        self.loop_stack.pop();
        if !self.terminated {
            self.builder.ins().jump(body_block, &[]);
        }

        self.builder.switch_to_block(exit_block);
        self.terminated = false;
    }

    /// Placeholder `cond` / `body` / `exit` shape; the iterator protocol
    /// needs runtime support
    fn emit_for(&mut self, var: &str, var_ty: Option<&crate::ast::TypeNode>, body: &Stmt) {
        let cond_block = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit_block = self.builder.create_block();

        self.builder.ins().jump(cond_block, &[]);
        self.builder.switch_to_block(cond_block);
        self.terminated = false;
        self.builder.ins().jump(body_block, &[]);

        self.builder.switch_to_block(body_block);
        self.terminated = false;

        // The loop variable gets a slot even before iteration is real
        let slot_ty = var_ty
            .and_then(|t| self.lowering.lower(t))
            .unwrap_or(types::I64);
        let slot = self.new_var(slot_ty);
        let zero = self.const_zero(slot_ty);
        self.builder.def_var(slot, zero);
        self.slots.insert(var.to_string(), (slot, slot_ty));

        self.loop_stack.push(LoopContext {
            break_block: exit_block,
            continue_block: cond_block,
        });
        self.emit_stmt(body);
        self.loop_stack.pop();
        if !self.terminated {
            self.builder.ins().jump(exit_block, &[]);
        }

        self.builder.switch_to_block(exit_block);
        self.terminated = false;
    }

    // ==================== Expressions ====================

    /// Lower an expression, returning its value; `None` for void results and
    /// constructs this backend does not lower
    fn emit_expr(&mut self, expr: &Expr) -> Option<Value> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Some(self.builder.ins().iconst(types::I64, *v)),
            ExprKind::FloatLiteral(v) => Some(self.builder.ins().f64const(*v)),
            ExprKind::BoolLiteral(b) => {
                Some(self.builder.ins().iconst(types::I8, i64::from(*b)))
            }
            ExprKind::CharLiteral(c) => {
                Some(self.builder.ins().iconst(types::I32, i64::from(*c as u32)))
            }
            ExprKind::StringLiteral(s) => self.emit_string_literal(s, expr.span),

            ExprKind::Ident(name) => self.emit_ident(name, expr.span),

            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_val = self.emit_expr(lhs)?;
                let rhs_val = self.emit_expr(rhs)?;
                self.emit_binary_values(*op, lhs_val, rhs_val, expr.span)
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.emit_expr(operand)?;
                let result = match op {
                    UnaryOp::Negate => {
                        if self.value_type(operand).is_float() {
                            self.builder.ins().fneg(operand)
                        } else {
                            self.builder.ins().ineg(operand)
                        }
                    }
                    UnaryOp::Not => self.builder.ins().icmp_imm(IntCC::Equal, operand, 0),
                    UnaryOp::BitwiseNot => self.builder.ins().bnot(operand),
                };
                Some(result)
            }

            ExprKind::Call { callee, args } => self.emit_call(callee, args, expr.span),

            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.emit_if_expr(cond, then_branch, else_branch.as_deref()),

            ExprKind::Block { stmts, tail } => {
                for stmt in stmts {
                    self.emit_stmt(stmt);
                }
                match tail {
                    Some(tail) if !self.terminated => self.emit_expr(tail),
                    _ => None,
                }
            }

            ExprKind::Assign { target, value } => {
                let value = self.emit_expr(value)?;
                // The assignment target must be an identifier for this core
                if let ExprKind::Ident(name) = &target.kind {
                    if let Some(&(var, ty)) = self.slots.get(name) {
                        let value = self.adjust_width(value, ty);
                        self.builder.def_var(var, value);
                        return Some(value);
                    }
                }
                None
            }

            ExprKind::CompoundAssign { op, target, value } => {
                let rhs = self.emit_expr(value)?;
                if let ExprKind::Ident(name) = &target.kind {
                    if let Some(&(var, ty)) = self.slots.get(name) {
                        let current = self.builder.use_var(var);
                        let result =
                            self.emit_binary_values(op.binary_op(), current, rhs, expr.span)?;
                        let result = self.adjust_width(result, ty);
                        self.builder.def_var(var, result);
                        return Some(result);
                    }
                }
                None
            }

            ExprKind::Cast { expr: inner, ty } => {
                let value = self.emit_expr(inner)?;
                let target = self.lowering.lower(ty)?;
                Some(self.emit_cast(value, target))
            }

            // No lowering yet: aggregates, paths, method dispatch, match,
            // ownership markers, async
            ExprKind::MethodCall { .. }
            | ExprKind::Member { .. }
            | ExprKind::Index { .. }
            | ExprKind::Match { .. }
            | ExprKind::Closure { .. }
            | ExprKind::Construct { .. }
            | ExprKind::StructLiteral { .. }
            | ExprKind::Tuple(_)
            | ExprKind::Array(_)
            | ExprKind::Range { .. }
            | ExprKind::Ref(_)
            | ExprKind::MutRef(_)
            | ExprKind::Move(_)
            | ExprKind::Await(_)
            | ExprKind::Try(_)
            | ExprKind::Path(_) => None,
        }
    }

    fn emit_ident(&mut self, name: &str, span: Span) -> Option<Value> {
        if let Some(&(var, _)) = self.slots.get(name) {
            return Some(self.builder.use_var(var));
        }

        // Function names evaluate to their address
        if let Some(info) = self.funcs.get(name) {
            let func_ref = self.module.declare_func_in_func(info.id, self.builder.func);
            let ptr = self.lowering.pointer_type();
            return Some(self.builder.ins().func_addr(ptr, func_ref));
        }

        self.error(span, format!("unknown variable '{name}'"));
        None
    }

    fn emit_string_literal(&mut self, text: &str, span: Span) -> Option<Value> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);

        let name = format!("str{}", *self.str_counter);
        *self.str_counter += 1;

        let data_id = match self
            .module
            .declare_data(&name, Linkage::Local, false, false)
        {
            Ok(id) => id,
            Err(e) => {
                self.error(span, format!("Cranelift compilation error: {e}"));
                return None;
            }
        };

        let mut desc = DataDescription::new();
        desc.define(bytes.into_boxed_slice());
        if let Err(e) = self.module.define_data(data_id, &desc) {
            self.error(span, format!("Cranelift compilation error: {e}"));
            return None;
        }

        let global = self.module.declare_data_in_func(data_id, self.builder.func);
        let ptr = self.lowering.pointer_type();
        Some(self.builder.ins().global_value(ptr, global))
    }

    /// Integer or floating-point operation selection; mismatched widths are
    /// reconciled first by sign-extending the narrower integer side or
    /// promoting the narrower float side
    fn emit_binary_values(
        &mut self,
        op: BinaryOp,
        mut lhs: Value,
        mut rhs: Value,
        span: Span,
    ) -> Option<Value> {
        let lhs_ty = self.value_type(lhs);
        let rhs_ty = self.value_type(rhs);
        if lhs_ty.is_int() && rhs_ty.is_int() && lhs_ty != rhs_ty {
            if lhs_ty.bits() > rhs_ty.bits() {
                rhs = self.builder.ins().sextend(lhs_ty, rhs);
            } else {
                lhs = self.builder.ins().sextend(rhs_ty, lhs);
            }
        } else if lhs_ty.is_float() && rhs_ty.is_float() && lhs_ty != rhs_ty {
            // The narrower float side is promoted
            if lhs_ty.bits() > rhs_ty.bits() {
                rhs = self.builder.ins().fpromote(lhs_ty, rhs);
            } else {
                lhs = self.builder.ins().fpromote(rhs_ty, lhs);
            }
        }

        let is_float = self.value_type(lhs).is_float();

        let result = match op {
            BinaryOp::Add => {
                if is_float {
                    self.builder.ins().fadd(lhs, rhs)
                } else {
                    self.builder.ins().iadd(lhs, rhs)
                }
            }
            BinaryOp::Sub => {
                if is_float {
                    self.builder.ins().fsub(lhs, rhs)
                } else {
                    self.builder.ins().isub(lhs, rhs)
                }
            }
            BinaryOp::Mul => {
                if is_float {
                    self.builder.ins().fmul(lhs, rhs)
                } else {
                    self.builder.ins().imul(lhs, rhs)
                }
            }
            BinaryOp::Div => {
                if is_float {
                    self.builder.ins().fdiv(lhs, rhs)
                } else {
                    self.builder.ins().sdiv(lhs, rhs)
                }
            }
            BinaryOp::Mod => {
                if is_float {
                    // The backend has no float remainder; this needs a
                    // runtime call
                    self.error(span, "float modulo requires runtime support");
                    return None;
                }
                self.builder.ins().srem(lhs, rhs)
            }
            BinaryOp::Equal => self.compare(IntCC::Equal, FloatCC::Equal, lhs, rhs, is_float),
            BinaryOp::NotEqual => {
                self.compare(IntCC::NotEqual, FloatCC::NotEqual, lhs, rhs, is_float)
            }
            BinaryOp::Less => {
                self.compare(IntCC::SignedLessThan, FloatCC::LessThan, lhs, rhs, is_float)
            }
            BinaryOp::LessEqual => self.compare(
                IntCC::SignedLessThanOrEqual,
                FloatCC::LessThanOrEqual,
                lhs,
                rhs,
                is_float,
            ),
            BinaryOp::Greater => self.compare(
                IntCC::SignedGreaterThan,
                FloatCC::GreaterThan,
                lhs,
                rhs,
                is_float,
            ),
            BinaryOp::GreaterEqual => self.compare(
                IntCC::SignedGreaterThanOrEqual,
                FloatCC::GreaterThanOrEqual,
                lhs,
                rhs,
                is_float,
            ),
            BinaryOp::And | BinaryOp::BitAnd => self.builder.ins().band(lhs, rhs),
            BinaryOp::Or | BinaryOp::BitOr => self.builder.ins().bor(lhs, rhs),
            BinaryOp::BitXor => self.builder.ins().bxor(lhs, rhs),
            BinaryOp::ShiftLeft => self.builder.ins().ishl(lhs, rhs),
            BinaryOp::ShiftRight => self.builder.ins().sshr(lhs, rhs),
        };

        Some(result)
    }

    fn compare(
        &mut self,
        int_cc: IntCC,
        float_cc: FloatCC,
        lhs: Value,
        rhs: Value,
        is_float: bool,
    ) -> Value {
        if is_float {
            self.builder.ins().fcmp(float_cc, lhs, rhs)
        } else {
            self.builder.ins().icmp(int_cc, lhs, rhs)
        }
    }

    /// Direct calls by name for identifier and path callees; arguments are
    /// evaluated left to right
    fn emit_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Option<Value> {
        let name = match &callee.kind {
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Path(segments) => segments.join("::"),
            _ => {
                self.error(span, "indirect calls require runtime support");
                return None;
            }
        };

        let Some(info) = self.funcs.get(&name) else {
            self.error(span, format!("unknown function '{name}'"));
            return None;
        };
        let func_id = info.id;
        let param_types = info.params.clone();
        let has_result = info.ret.is_some();

        let mut arg_values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let mut value = self.emit_expr(arg)?;
            if let Some(&target) = param_types.get(i) {
                value = self.adjust_width(value, target);
            }
            arg_values.push(value);
        }

        let func_ref = self.module.declare_func_in_func(func_id, self.builder.func);
        let call = self.builder.ins().call(func_ref, &arg_values);
        let results = self.builder.inst_results(call).to_vec();

        if has_result {
            results.first().copied()
        } else {
            None
        }
    }

    /// `if` expressions lower like `if` statements and merge their branch
    /// values through a block parameter when both branches produce a value of
    /// the same type
    fn emit_if_expr(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> Option<Value> {
        let cond_val = self.emit_expr(cond)?;

        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let merge_block = self.builder.create_block();

        self.builder
            .ins()
            .brif(cond_val, then_block, &[], else_block, &[]);

        // Then branch
        self.builder.switch_to_block(then_block);
        self.terminated = false;
        let then_val = self.emit_expr(then_branch);
        let then_falls = !self.terminated;

        let merge_ty = then_val.map(|v| self.value_type(v));
        if let Some(ty) = merge_ty {
            self.builder.append_block_param(merge_block, ty);
        }

        if then_falls {
            match then_val {
                Some(v) => {
                    self.builder.ins().jump(merge_block, &[v]);
                }
                None => {
                    self.builder.ins().jump(merge_block, &[]);
                }
            }
        }

        // Else branch
        self.builder.switch_to_block(else_block);
        self.terminated = false;
        let else_val = else_branch.and_then(|e| self.emit_expr(e));
        let else_falls = !self.terminated;

        if else_falls {
            match merge_ty {
                Some(ty) => {
                    let v = match else_val {
                        Some(v) => {
                            let v = self.adjust_width(v, ty);
                            if self.value_type(v) == ty {
                                v
                            } else {
                                self.const_zero(ty)
                            }
                        }
                        None => self.const_zero(ty),
                    };
                    self.builder.ins().jump(merge_block, &[v]);
                }
                None => {
                    self.builder.ins().jump(merge_block, &[]);
                }
            }
        }

        if then_falls || else_falls {
            self.builder.switch_to_block(merge_block);
            self.terminated = false;
            merge_ty.map(|_| self.builder.block_params(merge_block)[0])
        } else {
            self.terminated = true;
            None
        }
    }

    fn emit_cast(&mut self, value: Value, target: ClifType) -> Value {
        let ty = self.value_type(value);
        if ty == target {
            return value;
        }

        if (ty.is_int() && target.is_int()) || (ty.is_float() && target.is_float()) {
            return self.adjust_width(value, target);
        }
        if ty.is_int() && target.is_float() {
            return self.builder.ins().fcvt_from_sint(target, value);
        }
        if ty.is_float() && target.is_int() {
            return self.builder.ins().fcvt_to_sint(target, value);
        }

        value
    }
}
