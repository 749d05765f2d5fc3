//! Rewrites ES module syntax for the bundle's module registry.
//!
//! Every bundled module runs inside a registry function with `module`,
//! `exports` and `require` in scope. This pass removes all `import` and
//! `export` syntax from a transpiled module:
//!
//! - Imports become `var _dep = require("./dep")` at the top of the module.
//!   References to imported bindings become property reads (`_dep.name`), so
//!   they observe later assignments in the exporting module.
//! - Exports become a single `__export(exports, { name: () => local })` call
//!   that installs getters, so `let`/`var` exports stay live.
//! - `export * from "./dep"` becomes `__exportStar(exports, _dep)`.
//! - `import("./dep")` becomes `Promise.resolve().then(() => require("./dep"))`.
//!
//! Stylesheet imports are dropped from the code and only reported; the styles
//! stage extracts them.

use super::{CompilerError, Import};
use crate::css::is_stylesheet;
use std::collections::HashMap;
use std::path::Path;
use swc_common::{Mark, SyntaxContext, DUMMY_SP};
use swc_ecma_ast::{
    ArrowExpr, BindingIdent, BlockStmtOrExpr, CallExpr, Callee, ClassDecl, ClassExpr,
    ComputedPropName, Decl, DefaultDecl, ExportDecl, ExportDefaultDecl, ExportDefaultExpr,
    ExportSpecifier, Expr, ExprOrSpread, ExprStmt, FnDecl, FnExpr, Id, Ident, IdentName,
    ImportDecl, ImportSpecifier, KeyValueProp, Lit, MemberExpr, MemberProp, Module, ModuleDecl,
    ModuleExportName, ModuleItem, NamedExport, Number, ObjectLit, ObjectPatProp, Pat, Prop,
    PropName, PropOrSpread, SeqExpr, Stmt, Str, VarDecl, VarDeclKind, VarDeclarator,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};

/// Registry helper installing export getters: `__export(exports, getters)`.
pub const EXPORT_HELPER: &str = "__export";

/// Registry helper for `export *`: `__exportStar(exports, source)`.
pub const EXPORT_STAR_HELPER: &str = "__exportStar";

/// What a module imports and exports, after rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInterface {
    /// Static imports in source order, then dynamic imports.
    pub imports: Vec<Import>,
    /// Exported names in declaration order (without `export *` names).
    pub exports: Vec<String>,
}

/// Rewrite `module` in place for the registry.
///
/// `unresolved_mark` is the resolver's mark for globals; the registry
/// parameters and helpers are referenced through it.
pub(super) fn rewrite_module(
    module: &mut Module,
    unresolved_mark: Mark,
) -> Result<ModuleInterface, CompilerError> {
    let unresolved = SyntaxContext::empty().apply_mark(unresolved_mark);
    let mut collector = Collector::default();

    let mut body = Vec::with_capacity(module.body.len());
    for item in std::mem::take(&mut module.body) {
        match item {
            ModuleItem::Stmt(stmt) => body.push(stmt),
            ModuleItem::ModuleDecl(decl) => collector.module_decl(decl, &mut body)?,
        }
    }

    let global = |name: &str| Ident::new(name.into(), DUMMY_SP, unresolved);
    let mut stmts = Vec::with_capacity(body.len() + collector.requires.len() + 1);

    if !collector.exports.is_empty() {
        let getters = collector
            .exports
            .iter()
            .map(|(name, value)| {
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key: PropName::Str(string(name)),
                    value: Box::new(arrow(value.clone())),
                })))
            })
            .collect();
        stmts.push(expr_stmt(call(
            Expr::Ident(global(EXPORT_HELPER)),
            vec![
                Expr::Ident(global("exports")),
                Expr::Object(ObjectLit {
                    span: DUMMY_SP,
                    props: getters,
                }),
            ],
        )));
    }

    for (specifier, namespace) in &collector.requires {
        let required = call(
            Expr::Ident(global("require")),
            vec![Expr::Lit(Lit::Str(string(specifier)))],
        );
        stmts.push(match namespace {
            Some(namespace) => var_stmt(namespace.clone(), required),
            None => expr_stmt(required),
        });
    }

    for namespace in &collector.star_exports {
        stmts.push(expr_stmt(call(
            Expr::Ident(global(EXPORT_STAR_HELPER)),
            vec![Expr::Ident(global("exports")), Expr::Ident(namespace.clone())],
        )));
    }

    stmts.extend(body);

    let mut rebinder = Rebinder {
        bindings: &collector.bindings,
        require: global("require"),
        promise: global("Promise"),
        dynamic: Vec::new(),
    };
    for stmt in &mut stmts {
        stmt.visit_mut_with(&mut rebinder);
    }
    let dynamic = rebinder.dynamic;

    module.body = stmts.into_iter().map(ModuleItem::Stmt).collect();

    let mut imports = collector.imports;
    imports.extend(dynamic.into_iter().map(|specifier| Import {
        specifier,
        dynamic: true,
    }));

    Ok(ModuleInterface {
        imports,
        exports: collector.exports.into_iter().map(|(name, _)| name).collect(),
    })
}

/// How an imported local binding is read.
enum Binding {
    /// `import * as ns`: the namespace object itself.
    Namespace(Ident),
    /// `import { name }` / `import def`: a property of the namespace object.
    Member(Ident, String),
}

impl Binding {
    fn expr(&self) -> Expr {
        match self {
            Self::Namespace(ns) => Expr::Ident(ns.clone()),
            Self::Member(ns, name) => member(Expr::Ident(ns.clone()), name),
        }
    }
}

#[derive(Default)]
struct Collector {
    imports: Vec<Import>,
    /// Required specifiers in first-use order, with their namespace variable
    /// when bindings are read from them.
    requires: Vec<(String, Option<Ident>)>,
    bindings: HashMap<Id, Binding>,
    /// Exported name and the expression its getter returns.
    exports: Vec<(String, Expr)>,
    star_exports: Vec<Ident>,
}

impl Collector {
    fn module_decl(&mut self, decl: ModuleDecl, body: &mut Vec<Stmt>) -> Result<(), CompilerError> {
        match decl {
            ModuleDecl::Import(import) => self.import(import),
            ModuleDecl::ExportDecl(ExportDecl { decl, .. }) => {
                for ident in declared_idents(&decl) {
                    self.export(ident.sym.to_string(), Expr::Ident(ident));
                }
                body.push(Stmt::Decl(decl));
            }
            ModuleDecl::ExportNamed(named) => self.named_export(named),
            ModuleDecl::ExportDefaultDecl(ExportDefaultDecl { decl, .. }) => match decl {
                DefaultDecl::Fn(FnExpr { ident, function }) => {
                    let ident = ident.unwrap_or_else(|| private_ident("_default"));
                    self.export("default", Expr::Ident(ident.clone()));
                    body.push(Stmt::Decl(Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function,
                    })));
                }
                DefaultDecl::Class(ClassExpr { ident, class }) => {
                    let ident = ident.unwrap_or_else(|| private_ident("_default"));
                    self.export("default", Expr::Ident(ident.clone()));
                    body.push(Stmt::Decl(Decl::Class(ClassDecl {
                        ident,
                        declare: false,
                        class,
                    })));
                }
                DefaultDecl::TsInterfaceDecl(_) => {}
            },
            ModuleDecl::ExportDefaultExpr(ExportDefaultExpr { expr, .. }) => {
                let ident = private_ident("_default");
                self.export("default", Expr::Ident(ident.clone()));
                body.push(var_stmt(ident, *expr));
            }
            ModuleDecl::ExportAll(all) => {
                if !all.type_only {
                    let namespace = self.namespace(&all.src.value);
                    self.star_exports.push(namespace);
                }
            }
            ModuleDecl::TsImportEquals(_)
            | ModuleDecl::TsExportAssignment(_)
            | ModuleDecl::TsNamespaceExport(_) => {
                return Err(CompilerError::transform_error(
                    "`import =`, `export =` and `export as namespace` cannot be bundled",
                ));
            }
        }
        Ok(())
    }

    fn import(&mut self, import: ImportDecl) {
        if import.type_only {
            return;
        }
        let specifier = import.src.value.to_string();
        if !self.imports.iter().any(|i| i.specifier == specifier) {
            self.imports.push(Import {
                specifier: specifier.clone(),
                dynamic: false,
            });
        }
        if is_stylesheet(Path::new(&specifier)) {
            return;
        }

        let specifiers: Vec<ImportSpecifier> = import
            .specifiers
            .into_iter()
            .filter(|s| !s.is_type_only())
            .collect();
        if specifiers.is_empty() {
            self.require(&specifier);
            return;
        }

        let namespace = self.namespace(&specifier);
        for spec in specifiers {
            let (local, binding) = match spec {
                ImportSpecifier::Named(named) => {
                    let imported = named
                        .imported
                        .as_ref()
                        .map_or_else(|| named.local.sym.to_string(), |i| i.atom().to_string());
                    (named.local, Binding::Member(namespace.clone(), imported))
                }
                ImportSpecifier::Default(default) => (
                    default.local,
                    Binding::Member(namespace.clone(), "default".to_string()),
                ),
                ImportSpecifier::Namespace(ns) => (ns.local, Binding::Namespace(namespace.clone())),
            };
            self.bindings.insert(local.to_id(), binding);
        }
    }

    fn named_export(&mut self, named: NamedExport) {
        if named.type_only {
            return;
        }

        let Some(src) = named.src else {
            for spec in named.specifiers {
                if let ExportSpecifier::Named(spec) = spec {
                    if spec.is_type_only {
                        continue;
                    }
                    let exported = spec.exported.as_ref().unwrap_or(&spec.orig).atom().to_string();
                    if let ModuleExportName::Ident(local) = spec.orig {
                        self.export(exported, Expr::Ident(local));
                    }
                }
            }
            return;
        };

        let namespace = self.namespace(&src.value);
        for spec in named.specifiers {
            match spec {
                ExportSpecifier::Named(spec) => {
                    if spec.is_type_only {
                        continue;
                    }
                    let orig = spec.orig.atom().to_string();
                    let exported = spec
                        .exported
                        .as_ref()
                        .map_or_else(|| orig.clone(), |e| e.atom().to_string());
                    self.export(exported, member(Expr::Ident(namespace.clone()), &orig));
                }
                ExportSpecifier::Namespace(spec) => {
                    self.export(spec.name.atom().to_string(), Expr::Ident(namespace.clone()));
                }
                ExportSpecifier::Default(spec) => {
                    self.export(
                        spec.exported.sym.to_string(),
                        member(Expr::Ident(namespace.clone()), "default"),
                    );
                }
            }
        }
    }

    fn export(&mut self, name: impl Into<String>, value: Expr) {
        let name = name.into();
        match self.exports.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.exports.push((name, value)),
        }
    }

    /// Require `specifier` for its side effects only.
    fn require(&mut self, specifier: &str) {
        if !self.requires.iter().any(|(s, _)| s == specifier) {
            self.requires.push((specifier.to_string(), None));
        }
    }

    /// The namespace variable holding `require(specifier)`.
    fn namespace(&mut self, specifier: &str) -> Ident {
        if !self.imports.iter().any(|i| i.specifier == specifier) {
            self.imports.push(Import {
                specifier: specifier.to_string(),
                dynamic: false,
            });
        }
        match self.requires.iter_mut().find(|(s, _)| s == specifier) {
            Some((_, slot)) => slot
                .get_or_insert_with(|| private_ident(&namespace_name(specifier)))
                .clone(),
            None => {
                let ident = private_ident(&namespace_name(specifier));
                self.requires
                    .push((specifier.to_string(), Some(ident.clone())));
                ident
            }
        }
    }
}

/// Replaces reads of imported bindings and lowers `import()`.
struct Rebinder<'a> {
    bindings: &'a HashMap<Id, Binding>,
    require: Ident,
    promise: Ident,
    dynamic: Vec<String>,
}

impl Rebinder<'_> {
    /// `Promise.resolve().then(() => require(specifier))`
    fn lazy_require(&self, specifier: &str) -> Expr {
        let resolved = call(member(Expr::Ident(self.promise.clone()), "resolve"), Vec::new());
        let required = call(
            Expr::Ident(self.require.clone()),
            vec![Expr::Lit(Lit::Str(string(specifier)))],
        );
        call(member(resolved, "then"), vec![arrow(required)])
    }
}

impl VisitMut for Rebinder<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Expr::Ident(ident) = &*expr {
            if let Some(binding) = self.bindings.get(&ident.to_id()) {
                *expr = binding.expr();
            }
            return;
        }

        expr.visit_mut_children_with(self);

        if let Expr::Call(call) = &*expr {
            if let Some(specifier) = dynamic_specifier(call) {
                *expr = self.lazy_require(&specifier);
                self.dynamic.push(specifier);
            }
        }
    }

    fn visit_mut_callee(&mut self, callee: &mut Callee) {
        if let Callee::Expr(inner) = callee {
            if let Expr::Ident(ident) = &**inner {
                if let Some(binding @ Binding::Member(..)) = self.bindings.get(&ident.to_id()) {
                    // `(0, _dep.name)()` keeps `this` undefined in the callee.
                    **inner = Expr::Seq(SeqExpr {
                        span: DUMMY_SP,
                        exprs: vec![Box::new(number(0.0)), Box::new(binding.expr())],
                    });
                    return;
                }
            }
        }
        callee.visit_mut_children_with(self);
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = &*prop {
            if let Some(binding) = self.bindings.get(&ident.to_id()) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(IdentName::new(ident.sym.clone(), ident.span)),
                    value: Box::new(binding.expr()),
                });
            }
            return;
        }
        prop.visit_mut_children_with(self);
    }
}

/// Specifier of `import("literal")`.
fn dynamic_specifier(call: &CallExpr) -> Option<String> {
    if !matches!(call.callee, Callee::Import(_)) {
        return None;
    }
    match call.args.first() {
        Some(ExprOrSpread { spread: None, expr }) => match &**expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Every binding a declaration introduces.
fn declared_idents(decl: &Decl) -> Vec<Ident> {
    let mut idents = Vec::new();
    match decl {
        Decl::Class(class) => idents.push(class.ident.clone()),
        Decl::Fn(function) => idents.push(function.ident.clone()),
        Decl::Var(var) => {
            for declarator in &var.decls {
                pat_idents(&declarator.name, &mut idents);
            }
        }
        _ => {}
    }
    idents
}

fn pat_idents(pat: &Pat, out: &mut Vec<Ident>) {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.clone()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pat_idents(elem, out);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pat_idents(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(assign.key.id.clone()),
                    ObjectPatProp::Rest(rest) => pat_idents(&rest.arg, out),
                }
            }
        }
        Pat::Rest(rest) => pat_idents(&rest.arg, out),
        Pat::Assign(assign) => pat_idents(&assign.left, out),
        _ => {}
    }
}

/// `_name` from the last path segment of a specifier.
fn namespace_name(specifier: &str) -> String {
    let stem = Path::new(specifier)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");
    let mut name = String::with_capacity(stem.len() + 1);
    name.push('_');
    name.extend(stem.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
            c
        } else {
            '_'
        }
    }));
    name
}

/// An identifier no user binding can capture; hygiene renames on clashes.
fn private_ident(name: &str) -> Ident {
    Ident::new(
        name.into(),
        DUMMY_SP,
        SyntaxContext::empty().apply_mark(Mark::new()),
    )
}

fn is_identifier_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn member(obj: Expr, prop: &str) -> Expr {
    let prop = if is_identifier_name(prop) {
        MemberProp::Ident(IdentName::new(prop.into(), DUMMY_SP))
    } else {
        MemberProp::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: Box::new(Expr::Lit(Lit::Str(string(prop)))),
        })
    };
    Expr::Member(MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop,
    })
}

fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
        span: DUMMY_SP,
        callee: Callee::Expr(Box::new(callee)),
        args: args
            .into_iter()
            .map(|expr| ExprOrSpread {
                spread: None,
                expr: Box::new(expr),
            })
            .collect(),
        ..Default::default()
    })
}

/// `() => body`
fn arrow(body: Expr) -> Expr {
    Expr::Arrow(ArrowExpr {
        span: DUMMY_SP,
        params: Vec::new(),
        body: Box::new(BlockStmtOrExpr::Expr(Box::new(body))),
        ..Default::default()
    })
}

fn string(value: &str) -> Str {
    Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }
}

fn number(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

fn var_stmt(ident: Ident, init: Expr) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent {
                id: ident,
                type_ann: None,
            }),
            init: Some(Box::new(init)),
            definite: false,
        }],
    })))
}
