//! Alias expansion
//!
//! Turns a requested task name into the ordered list of leaf tasks to execute.
//! Expansion is depth-first and left-to-right, so the declared order of alias
//! members is exactly the execution order.

use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;
use tracing::{debug, instrument};

use crate::registry::ExecutorRegistry;
use crate::types::{PipewrightError, PipewrightResult};

/// Alias name -> member names, remembering declaration order
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    order: Vec<String>,
    members: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, members: Vec<String>) -> PipewrightResult<()> {
        if self.members.contains_key(name) {
            return Err(PipewrightError::Config(format!(
                "Alias '{}' is declared more than once",
                name
            )));
        }
        self.order.push(name.to_string());
        self.members.insert(name.to_string(), members);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.members.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Aliases in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &[String])> {
        self.order
            .iter()
            .filter_map(|name| self.members.get(name).map(|m| (name, m.as_slice())))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct AliasExpander<'a> {
    aliases: &'a AliasTable,
    registry: &'a ExecutorRegistry,
}

impl<'a> AliasExpander<'a> {
    pub fn new(aliases: &'a AliasTable, registry: &'a ExecutorRegistry) -> Self {
        Self { aliases, registry }
    }

    /// Expand one task name into leaf task names
    #[instrument(skip(self))]
    pub fn expand(&self, name: &str) -> PipewrightResult<Vec<String>> {
        let mut leaves = Vec::new();
        let mut in_progress = Vec::new();
        self.visit(name, None, &mut in_progress, &mut leaves)?;
        debug!(leaves = leaves.len(), "expanded task");
        Ok(leaves)
    }

    /// Expand several requested names, concatenating their expansions
    pub fn expand_all(&self, names: &[String]) -> PipewrightResult<Vec<String>> {
        let mut leaves = Vec::new();
        for name in names {
            leaves.extend(self.expand(name)?);
        }
        Ok(leaves)
    }

    fn visit(
        &self,
        name: &str,
        referenced_by: Option<&str>,
        in_progress: &mut Vec<String>,
        leaves: &mut Vec<String>,
    ) -> PipewrightResult<()> {
        if let Some(members) = self.aliases.get(name) {
            if let Some(start) = in_progress.iter().position(|n| n == name) {
                let mut cycle = in_progress[start..].to_vec();
                cycle.push(name.to_string());
                return Err(PipewrightError::CyclicAlias {
                    cycle: cycle.join(" -> "),
                });
            }

            in_progress.push(name.to_string());
            for member in members {
                self.visit(member, Some(name), in_progress, leaves)?;
            }
            in_progress.pop();
            return Ok(());
        }

        if self.registry.contains(name) {
            let targets = self.registry.targets(name);
            if targets.is_empty() {
                leaves.push(name.to_string());
            } else {
                leaves.extend(targets.iter().map(|t| format!("{}:{}", name, t)));
            }
            return Ok(());
        }

        if self.registry.split_target(name).is_some() {
            leaves.push(name.to_string());
            return Ok(());
        }

        Err(PipewrightError::UnknownTask {
            name: name.to_string(),
            referenced_by: referenced_by.map(str::to_string),
        })
    }
}

/// Find alias cycles, each sorted by name
pub fn alias_cycles(aliases: &AliasTable) -> Vec<Vec<String>> {
    let mut graph = DiGraph::<String, ()>::new();
    let mut node_indices = HashMap::new();

    for (name, _) in aliases.iter() {
        let node_index = graph.add_node(name.clone());
        node_indices.insert(name.clone(), node_index);
    }

    for (name, members) in aliases.iter() {
        let from_node = node_indices[name];
        for member in members {
            // Only alias -> alias edges can form cycles
            if let Some(&to_node) = node_indices.get(member) {
                graph.add_edge(from_node, to_node, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
        .into_iter()
        .filter_map(|component| {
            if component.len() > 1 {
                let mut cycle = component
                    .iter()
                    .map(|node| graph[*node].clone())
                    .collect::<Vec<_>>();
                cycle.sort();
                Some(cycle)
            } else {
                let node = component[0];
                if graph.contains_edge(node, node) {
                    Some(vec![graph[node].clone()])
                } else {
                    None
                }
            }
        })
        .collect();

    cycles.sort();
    cycles
}
