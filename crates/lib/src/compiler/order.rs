//! Ordering a release's compile requests so dependencies compile first.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::compiler::{CompileError, CompileRequest};

/// Sort `requests` so every package comes after the batch members it depends
/// on. Dependencies outside the batch are assumed to be compiled already.
pub fn sort_for_compilation(requests: Vec<CompileRequest>) -> Result<Vec<CompileRequest>, CompileError> {
  let mut graph: DiGraph<usize, ()> = DiGraph::new();
  let nodes: HashMap<&str, NodeIndex> = requests
    .iter()
    .enumerate()
    .map(|(i, request)| (request.package.name.as_str(), graph.add_node(i)))
    .collect();

  for request in &requests {
    let dependent = nodes[request.package.name.as_str()];
    for dependency in &request.dependencies {
      // Edge from dependency to dependent
      if let Some(&dep) = nodes.get(dependency.name.as_str()) {
        graph.add_edge(dep, dependent, ());
      }
    }
  }

  let sorted = toposort(&graph, None)
    .map_err(|cycle| CompileError::DependencyCycle(requests[graph[cycle.node_id()]].package.name.clone()))?;

  let order: Vec<usize> = sorted.into_iter().map(|idx| graph[idx]).collect();
  let mut slots: Vec<Option<CompileRequest>> = requests.into_iter().map(Some).collect();
  Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
