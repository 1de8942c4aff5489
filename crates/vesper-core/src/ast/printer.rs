//! Compact AST summary printing for `--dump-ast`

use super::{Decl, DeclKind, Module, VariantKind, Visibility};

/// Render a one-line-per-declaration summary of the module
#[must_use]
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();

    if module.name.is_empty() {
        out.push_str("Module: <anonymous>\n");
    } else {
        out.push_str(&format!("Module: {}\n", module.name));
    }

    for import in &module.imports {
        out.push_str(&format!("  import {}\n", import.path_string()));
    }

    for decl in &module.decls {
        print_decl(&mut out, decl, 1);
    }

    out
}

fn print_decl(out: &mut String, decl: &Decl, depth: usize) {
    let pad = "  ".repeat(depth);
    let vis = match decl.vis {
        Visibility::Public => "pub ",
        Visibility::Private => "",
    };

    match &decl.kind {
        DeclKind::Func(f) => {
            let ret = f
                .return_type
                .as_ref()
                .map_or_else(|| "Void".to_string(), |t| t.name_string());
            let asyncness = if f.is_async { "async " } else { "" };
            let body = if f.body.is_some() { "" } else { " (no body)" };
            out.push_str(&format!(
                "{pad}{vis}{asyncness}func {}({} params) -> {ret}{body}\n",
                f.name,
                f.params.len()
            ));
        }
        DeclKind::Struct(s) => {
            out.push_str(&format!("{pad}{vis}struct {} ({} fields)\n", s.name, s.fields.len()));
        }
        DeclKind::Class(c) => {
            out.push_str(&format!(
                "{pad}{vis}class {} ({} fields, {} methods)\n",
                c.name,
                c.fields.len(),
                c.methods.len()
            ));
        }
        DeclKind::Enum(e) => {
            out.push_str(&format!("{pad}{vis}enum {}\n", e.name));
            for variant in &e.variants {
                let shape = match variant.kind {
                    VariantKind::Unit => String::new(),
                    VariantKind::Tuple => format!("({} fields)", variant.tuple_fields.len()),
                    VariantKind::Struct => format!("{{ {} fields }}", variant.struct_fields.len()),
                };
                out.push_str(&format!("{pad}  {} {shape}\n", variant.name));
            }
        }
        DeclKind::Trait(t) => {
            out.push_str(&format!(
                "{pad}{vis}trait {} ({} methods)\n",
                t.name,
                t.methods.len()
            ));
        }
        DeclKind::Impl(i) => {
            match &i.trait_name {
                Some(trait_name) => out.push_str(&format!(
                    "{pad}impl {trait_name} for {} ({} methods)\n",
                    i.target.name_string(),
                    i.methods.len()
                )),
                None => out.push_str(&format!(
                    "{pad}impl {} ({} methods)\n",
                    i.target.name_string(),
                    i.methods.len()
                )),
            };
        }
        DeclKind::TypeAlias(t) => {
            let aliased = t
                .aliased
                .as_ref()
                .map_or_else(|| "<error>".to_string(), |ty| ty.name_string());
            out.push_str(&format!("{pad}{vis}type {} = {aliased}\n", t.name));
        }
    }
}
