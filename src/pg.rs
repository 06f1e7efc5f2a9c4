//! Program graphs.
//!
//! A [`ProgramGraph`] is a control-flow automaton: nodes are dense
//! [`NodeId`]s, and every edge carries an [`Action`] that is executed (or, for
//! [`Action::BoolCheck`], tested) when the edge is taken. One node is the start
//! node and one is the end node; reaching the end node with no enabled edge
//! means the program terminated.
//!
//! Node identifiers are arbitrary: graphs that differ only by a renaming of
//! their nodes describe the same program. [`ProgramGraph::canonicalize`] picks
//! one representative numbering (reverse post-order from the start node).

use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ast::{AExpr, BExpr};
use crate::error::AnalysisError;
use crate::types::{Array, NodeId, Target, Variable};

/// How `if`/`do` choices are compiled and how runs treat simultaneously enabled edges.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Determinism {
    /// The first true guard (in declaration order) wins; at most one edge is enabled.
    Deterministic,
    /// Every true guard yields an enabled edge.
    NonDeterministic,
}

/// Edge label.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Action {
    Assign(Variable, AExpr),
    ArrayAssign(Array, AExpr, AExpr),
    /// The edge may only be taken if the condition holds in the current memory.
    BoolCheck(BExpr),
    Skip,
}

impl Action {
    /// Every variable and array read or written by this action.
    pub fn targets(&self) -> BTreeSet<Target> {
        match self {
            Action::Assign(v, e) => {
                let mut targets = e.targets();
                targets.insert(Target::Variable(v.clone()));
                targets
            }
            Action::ArrayAssign(a, idx, e) => {
                let mut targets = idx.targets();
                targets.extend(e.targets());
                targets.insert(Target::Array(a.clone()));
                targets
            }
            Action::BoolCheck(b) => b.targets(),
            Action::Skip => BTreeSet::new(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Assign(v, e) => write!(f, "{} := {}", v, e),
            Action::ArrayAssign(a, idx, e) => write!(f, "{}[{}] := {}", a, idx, e),
            Action::BoolCheck(b) => write!(f, "{}", b),
            Action::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub action: Action,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, action: Action, to: NodeId) -> Self {
        Self { from, action, to }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.action, self.to)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramGraph {
    start: NodeId,
    end: NodeId,
    node_count: usize,
    edges: Vec<Edge>,
    /// Indices into `edges`, per source node, in edge order.
    outgoing: Vec<Vec<usize>>,
}

impl ProgramGraph {
    /// Assembles a graph over nodes `0..node_count`.
    ///
    /// Edge order is preserved: it is the order in which [`outgoing`][Self::outgoing]
    /// reports the edges of a node.
    pub fn new(node_count: usize, start: NodeId, end: NodeId, edges: Vec<Edge>) -> Result<Self, AnalysisError> {
        let check = |node: NodeId| {
            if node.index() < node_count {
                Ok(())
            } else {
                Err(AnalysisError::UnknownNode { node })
            }
        };
        check(start)?;
        check(end)?;
        for edge in &edges {
            check(edge.from)?;
            check(edge.to)?;
        }
        Ok(Self::assemble(node_count, start, end, edges))
    }

    /// Same as [`new`][Self::new] for callers that only hand out nodes below `node_count`.
    pub(crate) fn assemble(node_count: usize, start: NodeId, end: NodeId, edges: Vec<Edge>) -> Self {
        let mut outgoing = vec![Vec::new(); node_count];
        for (i, edge) in edges.iter().enumerate() {
            outgoing[edge.from.index()].push(i);
        }
        Self {
            start,
            end,
            node_count,
            edges,
            outgoing,
        }
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.node_count).map(NodeId::new)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.node_count
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `node`, in edge order. Unknown nodes have no edges.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(node.index())
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.edges[i])
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing(node).map(|e| e.to)
    }

    /// Every variable and array mentioned on some edge.
    pub fn targets(&self) -> BTreeSet<Target> {
        self.edges.iter().flat_map(|e| e.action.targets()).collect()
    }

    /// Nodes reachable from the start node, in reverse post-order of a
    /// depth-first search that follows edges in edge order.
    pub fn reverse_post_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.node_count];
        let mut post_order = Vec::with_capacity(self.node_count);
        // Stack of (node, position among its outgoing edges).
        let mut stack = vec![(self.start, 0usize)];
        visited[self.start.index()] = true;

        while let Some((node, pos)) = stack.last_mut() {
            let node = *node;
            let out = &self.outgoing[node.index()];
            if *pos < out.len() {
                let next = self.edges[out[*pos]].to;
                *pos += 1;
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    stack.push((next, 0));
                }
            } else {
                post_order.push(node);
                stack.pop();
            }
        }

        post_order.reverse();
        post_order
    }

    /// Applies a node renaming: node `q` becomes `mapping[q]`.
    ///
    /// # Panics
    ///
    /// Panics if `mapping` is not a permutation of `0..node_count`.
    pub fn renumber(&self, mapping: &[NodeId]) -> Self {
        assert_eq!(mapping.len(), self.node_count, "Mapping must cover every node");
        let mut seen = vec![false; self.node_count];
        for &n in mapping {
            assert!(n.index() < self.node_count && !seen[n.index()], "Mapping must be a permutation");
            seen[n.index()] = true;
        }

        let rename = |n: NodeId| mapping[n.index()];
        let edges: Vec<Edge> = self
            .edges
            .iter()
            .map(|e| Edge::new(rename(e.from), e.action.clone(), rename(e.to)))
            .collect();
        Self::assemble(self.node_count, rename(self.start), rename(self.end), edges)
    }

    /// Canonical numbering: the start node becomes `0`, the other reachable
    /// nodes follow in reverse post-order, unreachable nodes come next, and the
    /// end node is always the last one.
    pub fn canonicalize(&self) -> Self {
        let mut order: Vec<NodeId> = self
            .reverse_post_order()
            .into_iter()
            .filter(|&n| n != self.end)
            .collect();
        let mut placed = vec![false; self.node_count];
        for &n in &order {
            placed[n.index()] = true;
        }
        placed[self.end.index()] = true;
        order.extend(self.nodes().filter(|n| !placed[n.index()]));
        order.push(self.end);

        let mut mapping = vec![NodeId::new(0); self.node_count];
        for (new, old) in order.into_iter().enumerate() {
            mapping[old.index()] = NodeId::new(new);
        }
        debug!("canonicalize: {} nodes, {} edges", self.node_count, self.edges.len());
        self.renumber(&mapping)
    }
}

impl fmt::Display for ProgramGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PG (start: {}, end: {}):", self.start, self.end)?;
        for edge in &self.edges {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}
