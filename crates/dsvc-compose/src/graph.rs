//! Dependency graph over `requires` edges, built with `petgraph`.
//!
//! Startup proceeds in waves: every service whose dependencies have all
//! left the work-set is eligible, and the whole eligible set starts
//! together. A pass that finds nothing eligible while services remain means
//! the remaining services sit on (or behind) a cycle.

use std::collections::{BTreeSet, HashMap};

use dsvc_common::error::{Result, ServicesError};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::parser::ast::ServiceMap;
use crate::parser::validator;

/// A dependency graph of services.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Edges point from dependency to dependent.
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph for a declared service set.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesError::UnknownDependency`] if a `requires` entry
    /// names an undeclared service.
    pub fn from_services(services: &ServiceMap) -> Result<Self> {
        validator::validate(services)?;

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for name in services.keys() {
            let _ = nodes.insert(name.clone(), graph.add_node(name.clone()));
        }
        for spec in services.values() {
            let dependent = nodes[&spec.name];
            for dep in &spec.requires {
                let _ = graph.add_edge(nodes[dep], dependent, ());
            }
        }
        Ok(Self { graph, nodes })
    }

    /// Returns the services `name` requires, or an empty list if unknown.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.nodes.get(name).map_or_else(Vec::new, |&idx| {
            let mut deps: Vec<String> = self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Incoming)
                .map(|d| self.graph[d].clone())
                .collect();
            deps.sort();
            deps
        })
    }

    /// Returns the startup waves; names within a wave are sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesError::DependencyCycle`] when a pass makes no
    /// progress while services remain.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        let mut pending: BTreeSet<NodeIndex> = self.nodes.values().copied().collect();
        let mut waves = Vec::new();

        while !pending.is_empty() {
            let eligible: Vec<NodeIndex> = pending
                .iter()
                .copied()
                .filter(|&idx| {
                    self.graph
                        .neighbors_directed(idx, petgraph::Direction::Incoming)
                        .all(|dep| !pending.contains(&dep))
                })
                .collect();

            if eligible.is_empty() {
                return Err(ServicesError::DependencyCycle {
                    services: self.cycle_members(&pending),
                });
            }

            for idx in &eligible {
                let _ = pending.remove(idx);
            }
            let mut wave: Vec<String> = eligible.iter().map(|&i| self.graph[i].clone()).collect();
            wave.sort();
            waves.push(wave);
        }

        tracing::debug!(?waves, "startup waves resolved");
        Ok(waves)
    }

    /// Names the services that lie on a cycle among `stuck`.
    ///
    /// Services merely waiting behind a cycle are left out. Falls back to
    /// every stuck service if no strongly connected component is found.
    fn cycle_members(&self, stuck: &BTreeSet<NodeIndex>) -> Vec<String> {
        let mut members: Vec<String> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.iter().all(|idx| stuck.contains(idx)))
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .flatten()
            .map(|idx| self.graph[idx].clone())
            .collect();
        if members.is_empty() {
            members = stuck.iter().map(|&idx| self.graph[idx].clone()).collect();
        }
        members.sort();
        members
    }
}
