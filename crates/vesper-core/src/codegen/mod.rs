//! Code generation for the Vesper compiler
//!
//! Lowers a validated module onto Cranelift: each function is declared with
//! its signature and linkage, lowered to CLIF by the [`emitter`], verified,
//! and defined in an object module. Outputs are textual IR, a native object
//! file, or an executable linked with the system C compiler.
//!
//! Code generation only runs when every earlier stage finished without
//! errors; a verifier failure here is a compiler bug and is reported as a
//! diagnostic naming the offending function.

mod emitter;
mod error;
mod types;

pub use error::{CodegenError, CodegenResult};
pub use types::TypeLowering;

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use cranelift_codegen::ir::{AbiParam, Signature, Type as ClifType, UserFuncName};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module as _};
use cranelift_object::{ObjectBuilder, ObjectModule};

use crate::ast::{DeclKind, FuncDecl, Module, Visibility};
use crate::diagnostics::DiagnosticEngine;
use crate::source::{FileId, SourceMap};

use emitter::FunctionEmitter;

/// Output formats this backend can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Textual IR, suitable for inspection and filecheck-style tests
    Ir,
    /// Native object file
    Object,
    /// Object file linked into an executable with the system C compiler
    #[default]
    Executable,
}

impl OutputFormat {
    /// Parse a `--emit` argument. Formats other backends provide (bitcode,
    /// assembly) are reported as unsupported.
    pub fn parse(name: &str) -> CodegenResult<Self> {
        match name {
            "ir" | "clif" => Ok(Self::Ir),
            "obj" => Ok(Self::Object),
            "exe" => Ok(Self::Executable),
            other => Err(CodegenError::UnsupportedFormat(other.to_string())),
        }
    }

    /// The conventional file extension for this format
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ir => "clif",
            Self::Object => "o",
            Self::Executable => "",
        }
    }
}

/// Options controlling code generation
#[derive(Debug, Clone, Default)]
pub struct CodeGenOptions {
    /// Target triple; host when absent
    pub target: Option<String>,
    /// Optimization level 0..=3, forwarded to the backend
    pub opt_level: u8,
    /// Requested output format
    pub format: OutputFormat,
}

/// A declared function: id, signature, and lowered parameter/return types
#[derive(Clone)]
pub(crate) struct FuncInfo {
    pub id: FuncId,
    pub sig: Signature,
    pub params: Vec<ClifType>,
    pub ret: Option<ClifType>,
}

/// The code generator
pub struct CodeGen<'d, 'm> {
    diag: &'d mut DiagnosticEngine,
    source_map: &'m SourceMap,
    file: FileId,
    opts: CodeGenOptions,

    module: ObjectModule,
    ctx: Context,
    builder_ctx: FunctionBuilderContext,
    lowering: TypeLowering,
    functions: HashMap<String, FuncInfo>,

    /// Collected textual IR, one entry per defined function
    clif: Vec<String>,
    /// Counter for unique string-literal data names
    str_counter: usize,
}

impl<'d, 'm> CodeGen<'d, 'm> {
    /// Create a code generator for the host or the requested target triple
    pub fn new(
        diag: &'d mut DiagnosticEngine,
        source_map: &'m SourceMap,
        file: FileId,
        module_name: &str,
        opts: CodeGenOptions,
    ) -> CodegenResult<Self> {
        let mut flag_builder = settings::builder();
        let opt_level = match opts.opt_level {
            0 => "none",
            1 | 2 => "speed",
            _ => "speed_and_size",
        };
        flag_builder
            .set("opt_level", opt_level)
            .map_err(|e| CodegenError::Build(e.to_string()))?;
        flag_builder
            .set("is_pic", "true")
            .map_err(|e| CodegenError::Build(e.to_string()))?;
        let flags = settings::Flags::new(flag_builder);

        let isa = match &opts.target {
            Some(target) => cranelift_codegen::isa::lookup_by_name(target)
                .map_err(|e| CodegenError::UnsupportedTarget(format!("{target}: {e}")))?
                .finish(flags)
                .map_err(|e| CodegenError::Build(e.to_string()))?,
            None => cranelift_native::builder()
                .map_err(|msg| CodegenError::Build(format!("host machine not supported: {msg}")))?
                .finish(flags)
                .map_err(|e| CodegenError::Build(e.to_string()))?,
        };

        let obj_builder = ObjectBuilder::new(
            isa,
            module_name.to_string(),
            cranelift_module::default_libcall_names(),
        )
        .map_err(|e| CodegenError::Cranelift(e.to_string()))?;
        let module = ObjectModule::new(obj_builder);
        let lowering = TypeLowering::new(module.target_config().pointer_type());

        Ok(Self {
            diag,
            source_map,
            file,
            opts,
            module,
            ctx: Context::new(),
            builder_ctx: FunctionBuilderContext::new(),
            lowering,
            functions: HashMap::new(),
            clif: Vec::new(),
            str_counter: 0,
        })
    }

    /// Lower every function in the module: declarations first so calls and
    /// forward references resolve, then bodies
    pub fn generate(&mut self, module: &Module) -> CodegenResult<()> {
        for decl in &module.decls {
            if let DeclKind::Func(f) = &decl.kind {
                self.declare_func(f, decl.vis)?;
            }
        }

        for decl in &module.decls {
            if let DeclKind::Func(f) = &decl.kind {
                if f.body.is_some() {
                    self.define_func(f)?;
                }
            }
        }

        Ok(())
    }

    /// True when a `main` function was declared
    #[must_use]
    pub fn has_main(&self) -> bool {
        self.functions.contains_key("main")
    }

    /// True when the shared diagnostic engine has recorded any errors
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diag.has_errors()
    }

    /// The collected textual IR
    #[must_use]
    pub fn ir_text(&self) -> String {
        self.clif.join("\n")
    }

    fn declare_func(&mut self, decl: &FuncDecl, vis: Visibility) -> CodegenResult<()> {
        let mut sig = self.module.make_signature();
        let mut params = Vec::with_capacity(decl.params.len());

        for param in &decl.params {
            let ty = param
                .ty
                .as_ref()
                .and_then(|t| self.lowering.lower(t))
                .unwrap_or_else(|| self.lowering.pointer_type());
            params.push(ty);
            sig.params.push(AbiParam::new(ty));
        }

        let ret = self.lowering.lower_return(decl.return_type.as_ref());
        if let Some(ty) = ret {
            sig.returns.push(AbiParam::new(ty));
        }

        // `pub` declarations and `main` get external linkage; bodiless
        // headers are external declarations
        let linkage = if decl.body.is_none() {
            Linkage::Import
        } else if vis == Visibility::Public || decl.name == "main" {
            Linkage::Export
        } else {
            Linkage::Local
        };

        let id = self
            .module
            .declare_function(&decl.name, linkage, &sig)
            .map_err(|e| CodegenError::Cranelift(e.to_string()))?;

        self.functions
            .insert(decl.name.clone(), FuncInfo { id, sig, params, ret });
        Ok(())
    }

    fn define_func(&mut self, decl: &FuncDecl) -> CodegenResult<()> {
        let info = self.functions[&decl.name].clone();

        self.ctx.func.signature = info.sig.clone();
        self.ctx.func.name = UserFuncName::user(0, info.id.as_u32());

        {
            let mut builder = FunctionBuilder::new(&mut self.ctx.func, &mut self.builder_ctx);
            let mut emitter = FunctionEmitter::new(
                &mut builder,
                &mut self.module,
                &self.functions,
                self.lowering,
                &mut *self.diag,
                self.source_map,
                self.file,
                &mut self.str_counter,
                info.ret,
            );
            emitter.emit(decl);
            builder.finalize();
        }

        // Verify before definition; a failure here is a compiler bug
        if let Err(errors) =
            cranelift_codegen::verify_function(&self.ctx.func, self.module.isa())
        {
            let loc = self.source_map.location(self.file, decl.span.start);
            self.diag.error(
                loc,
                CodegenError::InvalidIr {
                    function: decl.name.clone(),
                    details: errors.to_string(),
                }
                .to_string(),
            );
            self.module.clear_context(&mut self.ctx);
            return Ok(());
        }

        self.clif
            .push(format!("; function {}\n{}", decl.name, self.ctx.func.display()));

        self.module
            .define_function(info.id, &mut self.ctx)
            .map_err(|e| CodegenError::Cranelift(e.to_string()))?;
        self.module.clear_context(&mut self.ctx);

        Ok(())
    }

    /// Finish the object module and return the raw object bytes
    pub fn finish_object(self) -> CodegenResult<Vec<u8>> {
        let product = self.module.finish();
        product
            .emit()
            .map_err(|e| CodegenError::Build(format!("failed to emit object file: {e}")))
    }

    /// Write the requested output format to `path`
    pub fn write_output(self, path: &Path) -> CodegenResult<()> {
        match self.opts.format {
            OutputFormat::Ir => {
                std::fs::write(path, self.ir_text())?;
                Ok(())
            }
            OutputFormat::Object => {
                let bytes = self.finish_object()?;
                std::fs::write(path, bytes)?;
                Ok(())
            }
            OutputFormat::Executable => {
                let bytes = self.finish_object()?;
                let obj_path =
                    std::env::temp_dir().join(format!("vesper-{}.o", std::process::id()));
                std::fs::write(&obj_path, bytes)?;

                let status = Command::new("cc")
                    .arg(&obj_path)
                    .arg("-o")
                    .arg(path)
                    .status()
                    .map_err(|e| CodegenError::Link(format!("failed to run cc: {e}")))?;

                let _ = std::fs::remove_file(&obj_path);

                if !status.success() {
                    return Err(CodegenError::Link(format!(
                        "linker exited with status {status}"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::sema::Sema;

    fn lower(source: &str) -> (String, Vec<u8>, u32) {
        let mut diag = DiagnosticEngine::silent();
        let mut map = SourceMap::new();
        let file = map.load_from_string("test.vsp", source);

        let module = Parser::from_source(source, "test.vsp", &mut diag).parse_module();
        Sema::new(&mut diag, &map, file).analyze(&module);
        assert_eq!(diag.error_count(), 0, "front-end errors in {source:?}");

        let mut codegen = CodeGen::new(
            &mut diag,
            &map,
            file,
            "test",
            CodeGenOptions::default(),
        )
        .expect("code generator should initialize on the host");
        codegen.generate(&module).expect("lowering should succeed");

        let ir = codegen.ir_text();
        let object = codegen.finish_object().expect("object emission");
        let errors = diag.error_count();
        (ir, object, errors)
    }

    #[test]
    fn minimal_main() {
        let (ir, object, errors) = lower("func main() -> Void {}");
        assert_eq!(errors, 0);
        assert!(ir.contains("; function main"));
        assert!(ir.contains("return"));
        assert!(!object.is_empty());
    }

    #[test]
    fn arithmetic_and_locals() {
        let (ir, _, errors) = lower(
            "func main() -> Void { let mut x: Int32 = 1 + 2 * 3; x = x + 1; }",
        );
        assert_eq!(errors, 0);
        assert!(ir.contains("imul") || ir.contains("iconst"));
    }

    #[test]
    fn calls_between_functions() {
        let (ir, _, errors) = lower(
            "func add(a: Int32, b: Int32) -> Int32 { return a + b; }\n\
             func main() -> Void { let s: Int32 = add(1, 2); }",
        );
        assert_eq!(errors, 0);
        assert!(ir.contains("call"));
    }

    #[test]
    fn control_flow_blocks() {
        let (ir, _, errors) = lower(
            "func f(n: Int32) -> Int32 {\n\
             if n > 0 { return 1; } else { return 2; }\n\
             }\n\
             func g(flag: Bool) -> Void { while flag { break; } }\n\
             func h() -> Void { loop { break; } }",
        );
        assert_eq!(errors, 0);
        assert!(ir.contains("brif"));
        assert!(ir.contains("jump"));
    }

    #[test]
    fn if_expression_produces_merged_value() {
        let (ir, _, errors) = lower(
            "func pick(flag: Bool) -> Int64 { return if flag { 1 } else { 2 }; }",
        );
        assert_eq!(errors, 0);
        assert!(ir.contains("brif"));
    }

    #[test]
    fn string_literals_become_data() {
        let (ir, object, errors) =
            lower("func main() -> Void { let s: String = \"hello\"; }");
        assert_eq!(errors, 0);
        assert!(ir.contains("global_value") || ir.contains("gv"));
        assert!(!object.is_empty());
    }

    #[test]
    fn width_adjustment_on_let() {
        let (ir, _, errors) = lower("func f() -> Void { let x: Int8 = 1; let y: Int64 = 2; }");
        assert_eq!(errors, 0);
        assert!(ir.contains("ireduce") || ir.contains("iconst"));
    }

    #[test]
    fn bodiless_functions_are_external() {
        let (_, object, errors) = lower(
            "func external_helper(n: Int32) -> Int32;\n\
             func main() -> Void { let x: Int32 = external_helper(1); }",
        );
        assert_eq!(errors, 0);
        assert!(!object.is_empty());
    }

    #[test]
    fn casts_lower() {
        let (_, _, errors) = lower(
            "func f(x: Float64) -> Void {\n\
             let a: Int32 = x as Int32;\n\
             let b: Float32 = x as Float32;\n\
             let c: Float64 = a as Float64;\n\
             }",
        );
        assert_eq!(errors, 0);
    }

    #[test]
    fn statements_after_return_still_verify() {
        let (_, _, errors) = lower("func f() -> Int32 { return 1; let x: Int32 = 2; }");
        assert_eq!(errors, 0);
    }

    #[test]
    fn float_widths_narrow_on_let_return_and_call() {
        // A float-literal initializer narrows to a Float32 binding, return
        // value, and call argument rather than being dropped
        let (ir, _, errors) = lower(
            "func clamp(f: Float32) -> Float32 { return f; }\n\
             func narrow() -> Float32 { return 0.5; }\n\
             func main() -> Void {\n\
             let x: Float32 = 1.5;\n\
             let y: Float32 = clamp(2.5);\n\
             }",
        );
        assert_eq!(errors, 0);
        assert!(ir.contains("fdemote"));
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!(OutputFormat::parse("ir").unwrap(), OutputFormat::Ir);
        assert_eq!(OutputFormat::parse("obj").unwrap(), OutputFormat::Object);
        assert_eq!(OutputFormat::parse("exe").unwrap(), OutputFormat::Executable);
        assert!(matches!(
            OutputFormat::parse("bitcode"),
            Err(CodegenError::UnsupportedFormat(_))
        ));
    }
}
