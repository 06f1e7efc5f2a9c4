//! Sign analysis: which sign assignments may reach each node.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ast::Stmt;
use crate::compiler::compile;
use crate::error::{AnalysisError, Error};
use crate::fixpoint::{FixpointConfig, MonotoneFramework, Worklist};
use crate::pg::{Determinism, Edge, ProgramGraph};
use crate::sign::SignMemory;
use crate::types::NodeId;

/// Input of the analysis: the compilation mode and the initial sign assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignAnalysis {
    #[serde(rename = "deterministic")]
    pub determinism: Determinism,
    pub assignment: SignMemory,
}

/// Fixpoint: every node mapped to the sign assignments that may reach it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignAnalysisResult {
    pub nodes: BTreeMap<NodeId, BTreeSet<SignMemory>>,
}

impl SignAnalysisResult {
    pub fn at(&self, node: NodeId) -> Option<&BTreeSet<SignMemory>> {
        self.nodes.get(&node)
    }

    /// Nodes some assignment reaches.
    pub fn reachable(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|(_, set)| !set.is_empty()).map(|(&n, _)| n)
    }
}

struct Signs;

impl MonotoneFramework for Signs {
    type Fact = SignMemory;

    fn transfer(&self, edge: &Edge, fact: &SignMemory) -> BTreeSet<SignMemory> {
        edge.action.sign_transfer(fact)
    }
}

impl SignAnalysis {
    pub fn new(determinism: Determinism, assignment: SignMemory) -> Self {
        Self {
            determinism,
            assignment,
        }
    }

    /// Compiles `stmt` in this analysis' mode and analyzes the resulting graph.
    pub fn run(&self, stmt: &Stmt) -> Result<SignAnalysisResult, Error> {
        let pg = compile(stmt, self.determinism)?;
        Ok(self.analyze(&pg)?)
    }

    pub fn analyze(&self, pg: &ProgramGraph) -> Result<SignAnalysisResult, AnalysisError> {
        self.analyze_with(pg, &FixpointConfig::default())
    }

    pub fn analyze_with(&self, pg: &ProgramGraph, config: &FixpointConfig) -> Result<SignAnalysisResult, AnalysisError> {
        debug!("sign analysis ({:?}) from {}", self.determinism, self.assignment);
        if let Some(target) = self.assignment.first_missing(&pg.targets()) {
            return Err(AnalysisError::IncompleteAssignment { target });
        }
        let initial = BTreeSet::from([self.assignment.clone()]);
        let nodes = Worklist::new(config.clone()).solve(pg, &Signs, initial)?;
        Ok(SignAnalysisResult { nodes })
    }

    /// Resumes the fixpoint from a previous result.
    pub fn refine(&self, pg: &ProgramGraph, previous: SignAnalysisResult) -> Result<SignAnalysisResult, AnalysisError> {
        self.refine_with(pg, previous, &FixpointConfig::default())
    }

    pub fn refine_with(
        &self,
        pg: &ProgramGraph,
        previous: SignAnalysisResult,
        config: &FixpointConfig,
    ) -> Result<SignAnalysisResult, AnalysisError> {
        let nodes = Worklist::new(config.clone()).solve_from(pg, &Signs, previous.nodes)?;
        Ok(SignAnalysisResult { nodes })
    }
}
