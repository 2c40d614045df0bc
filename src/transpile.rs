//! TSX to sandbox JavaScript.
//!
//! A sample is parsed as a TSX module, its imports are checked against the
//! allow-list and rewritten into `__sandbox_require__` bindings, and the
//! result is emitted as plain JavaScript with classic `React.createElement`
//! JSX so that it can run under direct `eval` (no module syntax left).

use crate::error::SandboxError;
use crate::modules;
use deno_ast::diagnostics::Diagnostic;
use deno_ast::swc::ast::{
    CallExpr, Callee, DefaultDecl, Expr, ImportDecl, ImportSpecifier, Lit, ModuleDecl,
    ModuleExportName, ModuleItem, TsModuleRef,
};
use deno_ast::swc::visit::{Visit, VisitWith};
use deno_ast::{
    parse_module, EmitOptions, ImportsNotUsedAsValues, MediaType, ModuleSpecifier, ParseParams,
    ParsedSource, SourceMapOption, SourceRange, SourceRangedForSpanned, TranspileOptions,
};
use std::ops::Range;

const SAMPLE_URL: &str = "file:///sample.tsx";

/// Append the render expression as a final statement, if there is one.
pub fn combine(source: &str, render_expression: &str) -> String {
    if render_expression.trim().is_empty() {
        source.to_string()
    } else {
        format!("{}; {};", source, render_expression)
    }
}

/// Compile a sample into JavaScript ready for evaluation.
///
/// # Errors
/// - [`SandboxError::Compile`] with the first diagnostic's message
/// - [`SandboxError::ImportViolation`] for the first unsanctioned specifier
pub fn compile(source: &str, render_expression: &str) -> Result<String, SandboxError> {
    let combined = combine(source, render_expression);
    let parsed = parse(&combined)?;
    let rewritten = rewrite_module_syntax(&parsed)?;

    // Parse again: the transpiler works on a ParsedSource, not on text
    let parsed = parse(&rewritten)?;
    emit(parsed)
}

fn parse(text: &str) -> Result<ParsedSource, SandboxError> {
    let specifier =
        ModuleSpecifier::parse(SAMPLE_URL).map_err(|e| SandboxError::Compile(e.to_string()))?;

    let parsed = parse_module(ParseParams {
        specifier,
        text: text.into(),
        media_type: MediaType::Tsx,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })
    .map_err(|diagnostic| SandboxError::Compile(diagnostic.message().to_string()))?;

    // Recoverable diagnostics still fail the render
    if let Some(first) = parsed.diagnostics().first() {
        return Err(SandboxError::Compile(first.message().to_string()));
    }

    Ok(parsed)
}

fn emit(parsed: ParsedSource) -> Result<String, SandboxError> {
    let transpiled = parsed
        .transpile(
            &TranspileOptions {
                imports_not_used_as_values: ImportsNotUsedAsValues::Remove,
                jsx_automatic: false,
                jsx_factory: "React.createElement".to_string(),
                jsx_fragment_factory: "React.Fragment".to_string(),
                transform_jsx: true,
                ..Default::default()
            },
            &EmitOptions {
                source_map: SourceMapOption::None,
                ..Default::default()
            },
        )
        .map_err(|e| SandboxError::Compile(e.to_string()))?
        .into_source();

    String::from_utf8(transpiled.source).map_err(|e| SandboxError::Compile(e.to_string()))
}

fn byte_range<T: SourceRangedForSpanned>(parsed: &ParsedSource, node: &T) -> Range<usize> {
    node.range()
        .as_byte_range(parsed.text_info_lazy().range().start)
}

/// Replace module syntax with sandbox bindings. Edits are byte-range
/// replacements on the parsed text, applied back to front.
fn rewrite_module_syntax(parsed: &ParsedSource) -> Result<String, SandboxError> {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for item in &parsed.module().body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };

        match decl {
            ModuleDecl::Import(import) => {
                let specifier = import.src.value.to_string();
                let module = modules::check(&specifier)?;
                let replacement = if import.type_only {
                    String::new()
                } else {
                    import_bindings(module.specifier, import)
                };
                edits.push((byte_range(parsed, import), replacement));
            }
            ModuleDecl::TsImportEquals(import) => {
                let TsModuleRef::TsExternalModuleRef(external) = &import.module_ref else {
                    continue;
                };
                let module = modules::check(&external.expr.value.to_string())?;
                let replacement = if import.is_type_only {
                    String::new()
                } else {
                    format!("const {} = {};", import.id.sym, require_call(module.specifier))
                };
                edits.push((byte_range(parsed, import), replacement));
            }
            ModuleDecl::ExportAll(export) => {
                modules::check(&export.src.value.to_string())?;
                edits.push((byte_range(parsed, export), String::new()));
            }
            ModuleDecl::ExportNamed(export) => {
                if let Some(src) = &export.src {
                    modules::check(&src.value.to_string())?;
                }
                edits.push((byte_range(parsed, export), String::new()));
            }
            ModuleDecl::ExportDecl(export) => {
                let outer = byte_range(parsed, export);
                let inner = byte_range(parsed, &export.decl);
                edits.push((outer.start..inner.start, String::new()));
            }
            ModuleDecl::ExportDefaultExpr(export) => {
                let outer = byte_range(parsed, export);
                let inner = byte_range(parsed, &*export.expr);
                edits.push((outer.start..inner.start, "exports.default = ".to_string()));
            }
            ModuleDecl::ExportDefaultDecl(export) => {
                let outer = byte_range(parsed, export);
                let inner = byte_range(parsed, &export.decl);
                let name = match &export.decl {
                    DefaultDecl::Fn(f) => f.ident.as_ref().map(|i| i.sym.to_string()),
                    DefaultDecl::Class(c) => c.ident.as_ref().map(|i| i.sym.to_string()),
                    DefaultDecl::TsInterfaceDecl(_) => {
                        edits.push((outer.start..inner.start, String::new()));
                        continue;
                    }
                };
                match name {
                    // Keep the declaration so the name stays bound
                    Some(name) => {
                        edits.push((outer.start..inner.start, String::new()));
                        edits.push((outer.end..outer.end, format!("\nexports.default = {name};")));
                    }
                    None => {
                        edits.push((outer.start..inner.start, "exports.default = ".to_string()));
                    }
                }
            }
            _ => {}
        }
    }

    // import(...) anywhere in the program resolves synchronously from the same table
    let mut dynamic = DynamicImports::default();
    parsed.module().visit_with(&mut dynamic);
    for call in dynamic.calls {
        if let Some(specifier) = &call.specifier {
            modules::check(specifier)?;
        }
        let callee = call
            .callee
            .as_byte_range(parsed.text_info_lazy().range().start);
        edits.push((callee, "__sandbox_import__".to_string()));
    }

    let mut text = parsed.text().to_string();
    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    for (range, replacement) in edits {
        text.replace_range(range, &replacement);
    }
    Ok(text)
}

struct DynamicImport {
    callee: SourceRange,
    /// The argument, when it is a string literal.
    specifier: Option<String>,
}

#[derive(Default)]
struct DynamicImports {
    calls: Vec<DynamicImport>,
}

impl Visit for DynamicImports {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if let Callee::Import(callee) = &call.callee {
            let specifier = call.args.first().and_then(|arg| match &*arg.expr {
                Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
                _ => None,
            });
            self.calls.push(DynamicImport {
                callee: callee.range(),
                specifier,
            });
        }
        call.visit_children_with(self);
    }
}

fn require_call(specifier: &str) -> String {
    let quoted = serde_json::to_string(specifier).unwrap_or_default();
    format!("__sandbox_require__({})", quoted)
}

fn import_bindings(specifier: &str, import: &ImportDecl) -> String {
    let mut fields = Vec::new();
    let mut statements = Vec::new();

    for spec in &import.specifiers {
        match spec {
            ImportSpecifier::Default(default) => {
                fields.push(format!("\"default\": {}", default.local.sym));
            }
            ImportSpecifier::Named(named) if !named.is_type_only => {
                let imported = match &named.imported {
                    Some(ModuleExportName::Ident(ident)) => ident.sym.to_string(),
                    Some(ModuleExportName::Str(s)) => s.value.to_string(),
                    None => named.local.sym.to_string(),
                };
                let key = serde_json::to_string(&imported).unwrap_or_default();
                fields.push(format!("{}: {}", key, named.local.sym));
            }
            ImportSpecifier::Named(_) => {}
            ImportSpecifier::Namespace(namespace) => {
                statements.push(format!(
                    "const {} = {};",
                    namespace.local.sym,
                    require_call(specifier)
                ));
            }
        }
    }

    if !fields.is_empty() {
        statements.insert(
            0,
            format!("const {{ {} }} = {};", fields.join(", "), require_call(specifier)),
        );
    }
    if statements.is_empty() && import.specifiers.is_empty() {
        // Side-effect import
        statements.push(format!("{};", require_call(specifier)));
    }
    statements.join(" ")
}
