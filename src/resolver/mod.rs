//! Module resolution.
//!
//! Loads every enabled module, checks that each declared dependency is
//! itself enabled, and orders the set so dependencies come first. The
//! resolver is all-or-nothing: any problem yields no modules at all.

pub mod errors;

pub use errors::ValidationError;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::module::Module;
use crate::core::project::ModuleRef;

/// Load and validate the enabled modules.
pub fn resolve_modules(
    refs: &[ModuleRef],
    project_folder: &Path,
) -> Result<Vec<Module>, ValidationError> {
    let mut seen = HashSet::new();
    for module_ref in refs {
        if !seen.insert(module_ref.id.as_str()) {
            return Err(ValidationError::DuplicateModule(module_ref.id.clone()));
        }
    }

    let modules = refs
        .iter()
        .map(|module_ref| {
            Module::load(module_ref, project_folder).map_err(|e| {
                ValidationError::InvalidModulePath {
                    module: module_ref.id.clone(),
                    path: module_ref.path.clone(),
                    reason: format!("{:#}", e),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for module in &modules {
        let missing: Vec<String> = module
            .dependencies()
            .iter()
            .filter(|dep| !seen.contains(dep.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingDependencies {
                module: module.id().to_string(),
                missing,
            });
        }
    }

    let ordered = order_by_dependencies(modules)?;
    tracing::debug!(
        "Resolved modules: {}",
        ordered.iter().map(Module::id).collect::<Vec<_>>().join(", ")
    );
    Ok(ordered)
}

/// Order modules so each comes after its dependencies.
///
/// Among modules that are ready at the same time, the enabled order wins.
fn order_by_dependencies(modules: Vec<Module>) -> Result<Vec<Module>, ValidationError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..modules.len()).map(|i| graph.add_node(i)).collect();
    let by_id: HashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id(), i))
        .collect();

    for (i, module) in modules.iter().enumerate() {
        for dep in module.dependencies() {
            if let Some(&d) = by_id.get(dep.as_str()) {
                graph.add_edge(nodes[d], nodes[i], ());
            }
        }
    }

    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BTreeSet<usize> = (0..modules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(modules.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for next in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
            let j = graph[next];
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() != modules.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let stuck = (0..modules.len())
            .filter(|i| !placed.contains(i))
            .map(|i| modules[i].id().to_string())
            .collect();
        return Err(ValidationError::DependencyCycle { modules: stuck });
    }

    let mut slots: Vec<Option<Module>> = modules.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
