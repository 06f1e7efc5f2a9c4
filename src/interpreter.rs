//! Concrete execution of program graphs.
//!
//! A run starts at the start node and repeatedly takes one enabled edge. An
//! edge is enabled when its action executes without fault and, for a
//! [`BoolCheck`][Action::BoolCheck], its condition holds. The run ends when:
//!
//! - the end node is reached ([`Outcome::Terminated`]);
//! - no edge is enabled at some other node ([`Outcome::Stuck`]);
//! - the step bound is exhausted ([`Outcome::Timeout`]).
//!
//! Non-determinism is handled as branching: [`Interpreter::explore`] keeps a
//! frontier of configurations and follows every enabled edge.

use std::fmt;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, RuntimeError};
use crate::memory::InterpreterMemory;
use crate::pg::{Action, Determinism, ProgramGraph};
use crate::types::NodeId;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Terminated,
    Stuck,
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Terminated => write!(f, "Terminated"),
            Outcome::Stuck => write!(f, "Stuck"),
            Outcome::Timeout => write!(f, "Timeout"),
        }
    }
}

/// One taken edge: the node it left and the action it carried.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TraceStep {
    pub node: NodeId,
    pub action: Action,
}

impl TraceStep {
    pub fn new(node: NodeId, action: Action) -> Self {
        Self { node, action }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
    pub outcome: Outcome,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A control point together with the memory at that point.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub node: NodeId,
    pub memory: InterpreterMemory,
}

impl Configuration {
    pub fn new(node: NodeId, memory: InterpreterMemory) -> Self {
        Self { node, memory }
    }
}

/// Result of one complete run.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub trace: Trace,
    /// Node the run stopped at.
    pub node: NodeId,
    /// Final memory snapshot.
    pub memory: InterpreterMemory,
    /// For stuck runs: the last fault that disabled an edge at the final node.
    pub fault: Option<RuntimeError>,
}

impl Execution {
    fn finish(steps: Vec<TraceStep>, outcome: Outcome, conf: Configuration, fault: Option<RuntimeError>) -> Self {
        Self {
            trace: Trace { steps, outcome },
            node: conf.node,
            memory: conf.memory,
            fault,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.trace.outcome
    }
}

#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Number of edges a single run may take before it times out.
    pub max_steps: u64,
    /// Bound on the number of simultaneous branches during exploration.
    pub max_executions: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_executions: 10_000,
        }
    }
}

struct Step {
    successors: Vec<(Action, Configuration)>,
    fault: Option<RuntimeError>,
}

fn step(pg: &ProgramGraph, conf: &Configuration) -> Step {
    let mut successors = Vec::new();
    let mut fault = None;
    for edge in pg.outgoing(conf.node) {
        match edge.action.execute(&conf.memory) {
            Ok(Some(memory)) => successors.push((edge.action.clone(), Configuration::new(edge.to, memory))),
            Ok(None) => {}
            Err(e) => {
                trace!("edge {} disabled: {}", edge, e);
                fault = Some(e);
            }
        }
    }
    Step { successors, fault }
}

/// Every configuration reachable from `conf` in one step, with the action taken, in edge order.
pub fn next_configurations(pg: &ProgramGraph, conf: &Configuration) -> Vec<(Action, Configuration)> {
    step(pg, conf).successors
}

pub(crate) fn check_memory(pg: &ProgramGraph, memory: &InterpreterMemory) -> Result<(), AnalysisError> {
    match memory.first_missing(&pg.targets()) {
        Some(target) => Err(AnalysisError::IncompleteMemory { target }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    pub config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    /// Runs `pg` once.
    ///
    /// In [`Determinism::Deterministic`] mode more than one enabled edge is an
    /// error; in [`Determinism::NonDeterministic`] mode the first enabled edge
    /// (in edge order) is taken.
    pub fn run(&self, pg: &ProgramGraph, memory: InterpreterMemory, det: Determinism) -> Result<Execution, AnalysisError> {
        debug!("run({:?}) on {} nodes", det, pg.node_count());
        self.drive(pg, memory, |conf, successors| match det {
            Determinism::Deterministic if successors.len() > 1 => Err(AnalysisError::NondeterministicStep {
                node: conf.node,
                enabled: successors.len(),
            }),
            _ => Ok(0),
        })
    }

    /// Runs `pg` once, letting `chooser` pick among the enabled edges.
    ///
    /// The returned index is taken modulo the number of enabled edges.
    pub fn run_scheduled<F>(&self, pg: &ProgramGraph, memory: InterpreterMemory, mut chooser: F) -> Result<Execution, AnalysisError>
    where
        F: FnMut(&Configuration, &[(Action, Configuration)]) -> usize,
    {
        self.drive(pg, memory, |conf, successors| Ok(chooser(conf, successors) % successors.len()))
    }

    fn drive<F>(&self, pg: &ProgramGraph, memory: InterpreterMemory, mut choose: F) -> Result<Execution, AnalysisError>
    where
        F: FnMut(&Configuration, &[(Action, Configuration)]) -> Result<usize, AnalysisError>,
    {
        check_memory(pg, &memory)?;

        let mut conf = Configuration::new(pg.start(), memory);
        let mut steps = Vec::new();
        loop {
            if conf.node == pg.end() {
                return Ok(Execution::finish(steps, Outcome::Terminated, conf, None));
            }
            let Step { mut successors, fault } = step(pg, &conf);
            if successors.is_empty() {
                debug!("stuck at {} after {} steps", conf.node, steps.len());
                return Ok(Execution::finish(steps, Outcome::Stuck, conf, fault));
            }
            if steps.len() as u64 >= self.config.max_steps {
                warn!("run timed out after {} steps", self.config.max_steps);
                return Ok(Execution::finish(steps, Outcome::Timeout, conf, None));
            }
            let i = choose(&conf, &successors)?;
            let (action, next) = successors.swap_remove(i);
            trace!("{} -[{}]-> {}", conf.node, action, next.node);
            steps.push(TraceStep::new(conf.node, action));
            conf = next;
        }
    }

    /// Follows every enabled edge and returns one execution per maximal branch,
    /// in breadth-first order.
    pub fn explore(&self, pg: &ProgramGraph, memory: InterpreterMemory) -> Result<Vec<Execution>, AnalysisError> {
        debug!("explore on {} nodes", pg.node_count());
        check_memory(pg, &memory)?;

        let mut finished = Vec::new();
        let mut frontier = vec![(Vec::new(), Configuration::new(pg.start(), memory))];
        let mut depth = 0u64;
        let mut timeouts = 0usize;

        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for (steps, conf) in frontier {
                if conf.node == pg.end() {
                    finished.push(Execution::finish(steps, Outcome::Terminated, conf, None));
                    continue;
                }
                let Step { successors, fault } = step(pg, &conf);
                if successors.is_empty() {
                    finished.push(Execution::finish(steps, Outcome::Stuck, conf, fault));
                    continue;
                }
                if depth >= self.config.max_steps {
                    timeouts += 1;
                    finished.push(Execution::finish(steps, Outcome::Timeout, conf, None));
                    continue;
                }
                for (action, next) in successors {
                    let mut steps = steps.clone();
                    steps.push(TraceStep::new(conf.node, action));
                    next_frontier.push((steps, next));
                }
            }
            if finished.len() + next_frontier.len() > self.config.max_executions {
                return Err(AnalysisError::ExplorationLimit {
                    limit: self.config.max_executions,
                });
            }
            trace!("explore: depth {}, frontier {}", depth, next_frontier.len());
            frontier = next_frontier;
            depth += 1;
        }

        if timeouts > 0 {
            warn!("{} branches timed out after {} steps", timeouts, self.config.max_steps);
        }
        Ok(finished)
    }
}
