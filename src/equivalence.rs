//! Behavioural comparison of program graphs.
//!
//! Two graphs are compared from the same initial memory without looking at
//! node identifiers. The checker explores both graphs breadth-first in
//! lockstep, keeping a frontier of pairings `(reference node, candidate node,
//! memory)`, deduplicated per step. A pairing survives a step when both sides
//! offer the same multiset of successor memories; its successor pairings match
//! every reference successor with every candidate successor of equal memory.
//! A step fails when some reference or candidate configuration is no longer
//! part of any surviving pairing.
//!
//! This is an approximation of isomorphism checking: pairings are never
//! backtracked, so coincidental matches can make it accept more than strict
//! trace equivalence.

use std::collections::BTreeSet;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::interpreter::{check_memory, next_configurations, Configuration, Execution, Outcome, Trace};
use crate::memory::InterpreterMemory;
use crate::pg::{Action, ProgramGraph};
use crate::types::NodeId;

#[derive(Debug, Clone)]
pub struct EquivalenceConfig {
    /// Number of lockstep steps after which both sides are declared to time out.
    pub max_steps: u64,
    /// Bound on the number of simultaneous pairings.
    pub max_pairings: usize,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_pairings: 100_000,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Both sides behave alike; `outcomes` lists every outcome reached.
    Equivalent { outcomes: BTreeSet<Outcome> },
    NonEquivalent(Mismatch),
}

impl Verdict {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent { .. })
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Mismatch {
    /// A reference configuration has no counterpart on the candidate side.
    UnmatchedReference {
        step: usize,
        node: NodeId,
        memory: InterpreterMemory,
    },
    /// A candidate configuration (or trace step) has no counterpart in the reference.
    UnmatchedCandidate {
        step: usize,
        node: NodeId,
        memory: InterpreterMemory,
    },
    /// Both sides stopped, with different outcomes.
    OutcomeDiverged {
        step: usize,
        reference: Outcome,
        candidate: Outcome,
    },
}

type Pairing = (NodeId, NodeId, InterpreterMemory);

/// Outcome of a configuration that cannot move, if it cannot.
fn stopped(pg: &ProgramGraph, node: NodeId, successors: &[(Action, Configuration)]) -> Option<Outcome> {
    if node == pg.end() {
        Some(Outcome::Terminated)
    } else if successors.is_empty() {
        Some(Outcome::Stuck)
    } else {
        None
    }
}

fn sorted_memories(successors: &[(Action, Configuration)]) -> Vec<&InterpreterMemory> {
    let mut mems: Vec<&InterpreterMemory> = successors.iter().map(|(_, c)| &c.memory).collect();
    mems.sort();
    mems
}

/// Compares `reference` and `candidate` started from `memory`.
pub fn check_equivalence(
    reference: &ProgramGraph,
    candidate: &ProgramGraph,
    memory: InterpreterMemory,
    config: &EquivalenceConfig,
) -> Result<Verdict, AnalysisError> {
    debug!(
        "check_equivalence: {} vs {} nodes",
        reference.node_count(),
        candidate.node_count()
    );
    check_memory(reference, &memory)?;
    check_memory(candidate, &memory)?;

    let mut frontier: BTreeSet<Pairing> = BTreeSet::from([(reference.start(), candidate.start(), memory)]);
    let mut outcomes = BTreeSet::new();

    let mut step = 0usize;
    while !frontier.is_empty() {
        if step as u64 >= config.max_steps {
            warn!("equivalence check timed out after {} steps", config.max_steps);
            outcomes.insert(Outcome::Timeout);
            break;
        }

        let next = {
            let mut next = BTreeSet::new();
            let mut covered_ref = BTreeSet::new();
            let mut covered_cand = BTreeSet::new();

            for (r, c, mem) in &frontier {
                let rs = next_configurations(reference, &Configuration::new(*r, mem.clone()));
                let cs = next_configurations(candidate, &Configuration::new(*c, mem.clone()));

                match (stopped(reference, *r, &rs), stopped(candidate, *c, &cs)) {
                    (Some(ro), Some(co)) if ro != co => {
                        return Ok(Verdict::NonEquivalent(Mismatch::OutcomeDiverged {
                            step,
                            reference: ro,
                            candidate: co,
                        }));
                    }
                    (Some(o), Some(_)) => {
                        outcomes.insert(o);
                    }
                    (None, None) if sorted_memories(&rs) == sorted_memories(&cs) => {
                        for (_, rc) in &rs {
                            for (_, cc) in cs.iter().filter(|(_, cc)| cc.memory == rc.memory) {
                                next.insert((rc.node, cc.node, rc.memory.clone()));
                            }
                        }
                    }
                    _ => {
                        trace!("pruned pairing ({}, {})", r, c);
                        continue;
                    }
                }
                covered_ref.insert((*r, mem));
                covered_cand.insert((*c, mem));
            }

            for (r, c, mem) in &frontier {
                if !covered_ref.contains(&(*r, mem)) {
                    return Ok(Verdict::NonEquivalent(Mismatch::UnmatchedReference {
                        step,
                        node: *r,
                        memory: mem.clone(),
                    }));
                }
                if !covered_cand.contains(&(*c, mem)) {
                    return Ok(Verdict::NonEquivalent(Mismatch::UnmatchedCandidate {
                        step,
                        node: *c,
                        memory: mem.clone(),
                    }));
                }
            }
            next
        };

        if next.len() > config.max_pairings {
            return Err(AnalysisError::ExplorationLimit {
                limit: config.max_pairings,
            });
        }
        trace!("step {}: {} pairings", step, next.len());
        frontier = next;
        step += 1;
    }

    debug!("equivalent after {} steps: {:?}", step, outcomes);
    Ok(Verdict::Equivalent { outcomes })
}

/// Replays `trace` against `reference`, matching every step by its effect on memory.
///
/// Node identifiers in the trace are ignored. At the end of the trace, a
/// reference configuration that could still move counts as a timeout.
pub fn validate_trace(reference: &ProgramGraph, memory: InterpreterMemory, trace: &Trace) -> Result<Verdict, AnalysisError> {
    Ok(match replay(reference, memory, trace)? {
        Ok(_) => Verdict::Equivalent {
            outcomes: BTreeSet::from([trace.outcome]),
        },
        Err(mismatch) => Verdict::NonEquivalent(mismatch),
    })
}

/// Like [`validate_trace`], and also checks the final memory of `execution`.
pub fn validate_execution(
    reference: &ProgramGraph,
    memory: InterpreterMemory,
    execution: &Execution,
) -> Result<Verdict, AnalysisError> {
    Ok(match replay(reference, memory, &execution.trace)? {
        Ok(last) if last != execution.memory => Verdict::NonEquivalent(Mismatch::UnmatchedCandidate {
            step: execution.trace.len(),
            node: execution.node,
            memory: execution.memory.clone(),
        }),
        Ok(_) => Verdict::Equivalent {
            outcomes: BTreeSet::from([execution.outcome()]),
        },
        Err(mismatch) => Verdict::NonEquivalent(mismatch),
    })
}

fn replay(
    reference: &ProgramGraph,
    memory: InterpreterMemory,
    trace: &Trace,
) -> Result<Result<InterpreterMemory, Mismatch>, AnalysisError> {
    check_memory(reference, &memory)?;

    let mut frontier: BTreeSet<NodeId> = BTreeSet::from([reference.start()]);
    let mut current = memory;

    for (i, step) in trace.steps.iter().enumerate() {
        let unmatched = |memory: &InterpreterMemory| Mismatch::UnmatchedCandidate {
            step: i,
            node: step.node,
            memory: memory.clone(),
        };
        let Ok(Some(after)) = step.action.execute(&current) else {
            return Ok(Err(unmatched(&current)));
        };

        let mut next = BTreeSet::new();
        for &node in &frontier {
            if node == reference.end() {
                continue;
            }
            let conf = Configuration::new(node, current.clone());
            next.extend(
                next_configurations(reference, &conf)
                    .into_iter()
                    .filter(|(_, c)| c.memory == after)
                    .map(|(_, c)| c.node),
            );
        }
        if next.is_empty() {
            return Ok(Err(unmatched(&current)));
        }
        frontier = next;
        current = after;
    }

    let mut possible = BTreeSet::new();
    for &node in &frontier {
        let successors = next_configurations(reference, &Configuration::new(node, current.clone()));
        possible.insert(stopped(reference, node, &successors).unwrap_or(Outcome::Timeout));
    }
    if !possible.contains(&trace.outcome) {
        let reference_outcome = possible.into_iter().next().unwrap_or(Outcome::Stuck);
        return Ok(Err(Mismatch::OutcomeDiverged {
            step: trace.len(),
            reference: reference_outcome,
            candidate: trace.outcome,
        }));
    }
    Ok(Ok(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::ast::{AExpr, BExpr, Guard, RelOp, Stmt};
    use crate::compiler::compile;
    use crate::interpreter::{Interpreter, TraceStep};
    use crate::pg::{Determinism, Edge};
    use crate::types::Variable;

    fn choice() -> Stmt {
        // if x > 0 -> y := 1 [] x <= 0 -> y := 2 fi
        Stmt::if_([
            Guard::new(
                BExpr::rel(AExpr::var("x"), RelOp::Gt, AExpr::num(0)),
                Stmt::assign("y", AExpr::num(1)),
            ),
            Guard::new(
                BExpr::rel(AExpr::var("x"), RelOp::Le, AExpr::num(0)),
                Stmt::assign("y", AExpr::num(2)),
            ),
        ])
    }

    fn reversed(pg: &ProgramGraph) -> ProgramGraph {
        let n = pg.node_count();
        let mapping: Vec<NodeId> = (0..n).map(|i| NodeId::new(n - 1 - i)).collect();
        pg.renumber(&mapping)
    }

    /// Swaps the targets of the first two edges leaving the start node.
    fn swapped(pg: &ProgramGraph) -> ProgramGraph {
        let mut edges: Vec<Edge> = pg.edges().to_vec();
        let out: Vec<usize> = (0..edges.len()).filter(|&i| edges[i].from == pg.start()).collect();
        let (a, b) = (out[0], out[1]);
        let tmp = edges[a].to;
        edges[a].to = edges[b].to;
        edges[b].to = tmp;
        ProgramGraph::new(pg.node_count(), pg.start(), pg.end(), edges).unwrap()
    }

    fn mem(x: i64) -> InterpreterMemory {
        InterpreterMemory::new().with_var("x", x).with_var("y", 0)
    }

    #[test]
    fn test_renumbered_copy_is_equivalent() {
        let pg = compile(&choice(), Determinism::Deterministic).unwrap();
        let verdict = check_equivalence(&pg, &reversed(&pg), mem(3), &EquivalenceConfig::default()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Equivalent {
                outcomes: BTreeSet::from([Outcome::Terminated])
            }
        );
    }

    #[test]
    fn test_swapped_target_is_not_equivalent() {
        let pg = compile(&choice(), Determinism::Deterministic).unwrap();
        let verdict = check_equivalence(&pg, &swapped(&pg), mem(3), &EquivalenceConfig::default()).unwrap();
        assert!(matches!(
            verdict,
            Verdict::NonEquivalent(Mismatch::UnmatchedReference { step: 1, .. })
        ));
    }

    #[test]
    fn test_outcome_diverged() {
        let reference = compile(&Stmt::assign("x", AExpr::num(1)), Determinism::Deterministic).unwrap();
        let candidate = compile(
            &Stmt::seq(
                Stmt::assign("x", AExpr::num(1)),
                Stmt::if_([Guard::new(BExpr::Bool(false), Stmt::Skip)]),
            ),
            Determinism::Deterministic,
        )
        .unwrap();
        let verdict = check_equivalence(
            &reference,
            &candidate,
            InterpreterMemory::new().with_var("x", 0),
            &EquivalenceConfig::default(),
        )
        .unwrap();
        assert_eq!(
            verdict,
            Verdict::NonEquivalent(Mismatch::OutcomeDiverged {
                step: 1,
                reference: Outcome::Terminated,
                candidate: Outcome::Stuck,
            })
        );
    }

    #[test]
    fn test_stuck_versus_moving() {
        let reference = compile(
            &Stmt::if_([Guard::new(
                BExpr::rel(AExpr::var("x"), RelOp::Gt, AExpr::num(0)),
                Stmt::Skip,
            )]),
            Determinism::Deterministic,
        )
        .unwrap();
        let candidate = compile(&Stmt::Skip, Determinism::Deterministic).unwrap();
        let memory = InterpreterMemory::new().with_var("x", 0);
        let verdict = check_equivalence(&reference, &candidate, memory, &EquivalenceConfig::default()).unwrap();
        assert!(matches!(
            verdict,
            Verdict::NonEquivalent(Mismatch::UnmatchedReference { step: 0, .. })
        ));
    }

    #[test]
    fn test_timeout() {
        let pg = compile(&Stmt::do_([Guard::new(BExpr::Bool(true), Stmt::Skip)]), Determinism::Deterministic).unwrap();
        let config = EquivalenceConfig {
            max_steps: 5,
            ..Default::default()
        };
        let verdict = check_equivalence(&pg, &reversed(&pg), InterpreterMemory::new(), &config).unwrap();
        assert_eq!(
            verdict,
            Verdict::Equivalent {
                outcomes: BTreeSet::from([Outcome::Timeout])
            }
        );
    }

    #[test]
    fn test_pairing_limit() {
        // do true -> x := x + 1 [] true -> x := x + 2 od
        let s = Stmt::do_([
            Guard::new(BExpr::Bool(true), Stmt::assign("x", AExpr::add(AExpr::var("x"), AExpr::num(1)))),
            Guard::new(BExpr::Bool(true), Stmt::assign("x", AExpr::add(AExpr::var("x"), AExpr::num(2)))),
        ]);
        let pg = compile(&s, Determinism::NonDeterministic).unwrap();
        let config = EquivalenceConfig {
            max_steps: 1000,
            max_pairings: 10,
        };
        let res = check_equivalence(&pg, &pg, InterpreterMemory::new().with_var("x", 0), &config);
        assert_eq!(res, Err(AnalysisError::ExplorationLimit { limit: 10 }));
    }

    #[test]
    fn test_validate_trace() {
        let pg = compile(&choice(), Determinism::Deterministic).unwrap();
        let candidate = reversed(&pg);
        let exec = Interpreter::default()
            .run(&candidate, mem(-4), Determinism::Deterministic)
            .unwrap();
        assert_eq!(exec.memory.get_var(&Variable::new("y")), Some(&2));

        assert!(validate_trace(&pg, mem(-4), &exec.trace).unwrap().is_equivalent());
        assert!(validate_execution(&pg, mem(-4), &exec).unwrap().is_equivalent());

        let mut stuck = exec.trace.clone();
        stuck.outcome = Outcome::Stuck;
        assert_eq!(
            validate_trace(&pg, mem(-4), &stuck).unwrap(),
            Verdict::NonEquivalent(Mismatch::OutcomeDiverged {
                step: 2,
                reference: Outcome::Terminated,
                candidate: Outcome::Stuck,
            })
        );

        let mut wrong = exec.trace.clone();
        wrong.steps[1] = TraceStep::new(NodeId::new(7), Action::Assign(Variable::new("y"), AExpr::num(5)));
        assert!(matches!(
            validate_trace(&pg, mem(-4), &wrong).unwrap(),
            Verdict::NonEquivalent(Mismatch::UnmatchedCandidate { step: 1, .. })
        ));

        let mut tampered = exec.clone();
        tampered.memory = mem(9);
        assert!(!validate_execution(&pg, mem(-4), &tampered).unwrap().is_equivalent());
    }
}
