//! Forward worklist fixpoint over program graphs.
//!
//! The lattice is the powerset of some fact type, ordered by inclusion and
//! joined by union. Each node holds the set of facts that may reach it; the
//! engine propagates facts along edges until no node's set grows.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;

use log::{debug, trace, warn};

use crate::error::AnalysisError;
use crate::pg::{Edge, ProgramGraph};
use crate::types::NodeId;

/// Per-node fact sets, with an entry for every node of the graph.
pub type Facts<F> = BTreeMap<NodeId, BTreeSet<F>>;

/// A forward analysis described by its transfer function.
pub trait MonotoneFramework {
    type Fact: Clone + Ord + Debug;

    /// Facts that may hold after taking `edge` when `fact` holds before it.
    fn transfer(&self, edge: &Edge, fact: &Self::Fact) -> BTreeSet<Self::Fact>;
}

#[derive(Debug, Clone)]
pub struct FixpointConfig {
    /// Maximum number of worklist pops before giving up.
    pub max_iterations: usize,
}

impl Default for FixpointConfig {
    fn default() -> Self {
        Self { max_iterations: 100_000 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Worklist {
    pub config: FixpointConfig,
}

impl Worklist {
    pub fn new(config: FixpointConfig) -> Self {
        Self { config }
    }

    /// Least fixpoint with `initial` at the start node and nothing elsewhere.
    pub fn solve<M: MonotoneFramework>(
        &self,
        pg: &ProgramGraph,
        framework: &M,
        initial: BTreeSet<M::Fact>,
    ) -> Result<Facts<M::Fact>, AnalysisError> {
        let mut facts = Facts::new();
        facts.insert(pg.start(), initial);
        self.solve_from(pg, framework, facts)
    }

    /// Least fixpoint above `facts`.
    ///
    /// Feeding a result of this function back in returns it unchanged.
    pub fn solve_from<M: MonotoneFramework>(
        &self,
        pg: &ProgramGraph,
        framework: &M,
        facts: Facts<M::Fact>,
    ) -> Result<Facts<M::Fact>, AnalysisError> {
        let mut states: Vec<BTreeSet<M::Fact>> = vec![BTreeSet::new(); pg.node_count()];
        for (node, set) in facts {
            let state = states.get_mut(node.index()).ok_or(AnalysisError::UnknownNode { node })?;
            state.extend(set);
        }

        let mut queued = vec![false; pg.node_count()];
        let mut worklist = VecDeque::new();
        for node in pg.nodes() {
            if !states[node.index()].is_empty() {
                queued[node.index()] = true;
                worklist.push_back(node);
            }
        }

        let mut iterations = 0;
        while let Some(node) = worklist.pop_front() {
            queued[node.index()] = false;
            iterations += 1;
            if iterations > self.config.max_iterations {
                warn!("Fixpoint did not converge after {} iterations", self.config.max_iterations);
                return Err(AnalysisError::FixpointDiverged {
                    iterations: self.config.max_iterations,
                });
            }

            let current = states[node.index()].clone();
            for edge in pg.outgoing(node) {
                let target = edge.to.index();
                let before = states[target].len();
                for fact in &current {
                    states[target].extend(framework.transfer(edge, fact));
                }
                if states[target].len() > before {
                    trace!("{}: {} -> {} facts", edge.to, before, states[target].len());
                    if !queued[target] {
                        queued[target] = true;
                        worklist.push_back(edge.to);
                    }
                }
            }
        }

        debug!("Fixpoint converged after {} iterations", iterations);
        Ok(pg.nodes().zip(states).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::ast::{AExpr, BExpr, Guard, RelOp, Stmt};
    use crate::compiler::compile;
    use crate::pg::{Action, Determinism};

    /// Counts edges taken, saturating at a bound.
    struct Distance(u32);

    impl MonotoneFramework for Distance {
        type Fact = u32;

        fn transfer(&self, _edge: &Edge, fact: &u32) -> BTreeSet<u32> {
            [(*fact + 1).min(self.0)].into_iter().collect()
        }
    }

    /// Keeps only facts that pass through skip edges.
    struct SkipsOnly;

    impl MonotoneFramework for SkipsOnly {
        type Fact = ();

        fn transfer(&self, edge: &Edge, _fact: &()) -> BTreeSet<()> {
            match edge.action {
                Action::Skip => BTreeSet::from([()]),
                _ => BTreeSet::new(),
            }
        }
    }

    fn countdown() -> ProgramGraph {
        let s = Stmt::do_([Guard::new(
            BExpr::rel(AExpr::var("x"), RelOp::Gt, AExpr::num(0)),
            Stmt::assign("x", AExpr::sub(AExpr::var("x"), AExpr::num(1))),
        )]);
        compile(&s, Determinism::Deterministic).unwrap()
    }

    #[test]
    fn test_loop_converges() {
        let pg = countdown();
        let facts = Worklist::default().solve(&pg, &Distance(4), BTreeSet::from([0])).unwrap();
        assert_eq!(facts.len(), pg.node_count());
        assert_eq!(facts[&pg.start()], BTreeSet::from([0, 2, 4]));
        assert_eq!(facts[&pg.end()], BTreeSet::from([1, 3, 4]));
    }

    #[test]
    fn test_idempotent() {
        let pg = countdown();
        let worklist = Worklist::default();
        let facts = worklist.solve(&pg, &Distance(6), BTreeSet::from([0])).unwrap();
        let again = worklist.solve_from(&pg, &Distance(6), facts.clone()).unwrap();
        assert_eq!(facts, again);
    }

    #[test]
    fn test_unreachable_nodes_are_empty() {
        let pg = countdown();
        let facts = Worklist::default().solve(&pg, &SkipsOnly, BTreeSet::from([()])).unwrap();
        assert_eq!(facts[&pg.start()].len(), 1);
        assert!(facts[&pg.end()].is_empty());
    }

    #[test]
    fn test_iteration_limit() {
        let pg = countdown();
        let worklist = Worklist::new(FixpointConfig { max_iterations: 2 });
        let res = worklist.solve(&pg, &Distance(100), BTreeSet::from([0]));
        assert_eq!(res, Err(AnalysisError::FixpointDiverged { iterations: 2 }));
    }

    #[test]
    fn test_unknown_node() {
        let pg = countdown();
        let mut facts = Facts::new();
        facts.insert(NodeId::new(42), BTreeSet::from([0]));
        let res = Worklist::default().solve_from(&pg, &Distance(1), facts);
        assert_eq!(res, Err(AnalysisError::UnknownNode { node: NodeId::new(42) }));
    }
}
