//! Module dependency graph.
//!
//! Tracks transpiled modules, their dependencies, and the stylesheets they
//! import.

use crate::compiler::Import;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute, canonical path to the module.
    pub path: PathBuf,
    /// Project-relative name, used in the bundle and its source map.
    pub name: String,
    /// Original source code.
    pub source: String,
    /// Transpiled JavaScript.
    pub code: String,
    /// Compiler source map for `code`, when source maps are on.
    pub map: Option<String>,
    /// Module requests found in the syntax tree.
    pub imports: Vec<Import>,
    /// Module IDs this module depends on (static imports).
    pub dependencies: Vec<ModuleId>,
    /// Module IDs this module loads through `import()`.
    pub dynamic_dependencies: Vec<ModuleId>,
}

/// The module dependency graph.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules, indexed by ID. The entry is always ID 0.
    modules: Vec<Module>,
    /// Path to ID mapping for deduplication.
    path_to_id: HashMap<PathBuf, ModuleId>,
    /// Specifier resolution: (from module, specifier) -> target module.
    specifier_map: HashMap<(ModuleId, String), ModuleId>,
    /// Imported stylesheets, in discovery order, without duplicates.
    stylesheets: Vec<PathBuf>,
}

impl ModuleGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning its ID.
    pub fn add(&mut self, module: Module) -> ModuleId {
        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        id
    }

    /// Get a module by ID.
    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Get module ID by path.
    #[must_use]
    pub fn id_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Number of modules in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Record that `specifier` in module `from` resolves to the module at `target`.
    ///
    /// Both modules must already be in the graph.
    pub fn link(&mut self, from: ModuleId, specifier: &str, target: &Path, dynamic: bool) {
        let Some(target_id) = self.id_by_path(target) else {
            return;
        };
        self.specifier_map
            .insert((from, specifier.to_string()), target_id);

        if let Some(module) = self.modules.get_mut(from) {
            let deps = if dynamic {
                &mut module.dynamic_dependencies
            } else {
                &mut module.dependencies
            };
            if !deps.contains(&target_id) {
                deps.push(target_id);
            }
        }
    }

    /// Record an imported stylesheet. Returns `false` if it was already known.
    pub fn add_stylesheet(&mut self, path: PathBuf) -> bool {
        if self.stylesheets.contains(&path) {
            return false;
        }
        self.stylesheets.push(path);
        true
    }

    /// Stylesheets in the order they were first imported.
    #[must_use]
    pub fn stylesheets(&self) -> &[PathBuf] {
        &self.stylesheets
    }

    /// Look up the module ID for a specifier from a given module.
    #[must_use]
    pub fn resolve_specifier(&self, from: ModuleId, specifier: &str) -> Option<ModuleId> {
        self.specifier_map
            .get(&(from, specifier.to_string()))
            .copied()
    }

    /// Get modules in topological order (dependencies before dependents).
    #[must_use]
    pub fn toposort(&self) -> Vec<ModuleId> {
        let n = self.modules.len();
        if n == 0 {
            return Vec::new();
        }

        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<ModuleId>> = vec![Vec::new(); n];

        for (id, module) in self.modules.iter().enumerate() {
            for &dep_id in &module.dependencies {
                adj[dep_id].push(id);
                in_degree[id] += 1;
            }
        }

        // Kahn's algorithm
        let mut queue: std::collections::VecDeque<ModuleId> = std::collections::VecDeque::new();
        for (id, &deg) in in_degree.iter().enumerate() {
            if deg == 0 {
                queue.push_back(id);
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &next in &adj[id] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        // Cycles are legal; the registry resolves them at run time.
        if order.len() < n {
            for id in 0..n {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }

        order
    }

    /// Iterate over all modules.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().enumerate()
    }
}
