//! Program graph to DOT (Graphviz) conversion.
//!
//! This module converts a [`ProgramGraph`] into DOT text, which can be rendered
//! with Graphviz tools like `dot` or with online viewers.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **Control nodes** are rendered as circles labelled `q0`, `q1`, ...
//! - **Start and end nodes** use the terminal shape; the start node sits at the
//!   top (source rank) and the end node at the bottom (sink rank)
//! - **Edges** are labelled with their action in GCL syntax; edges carrying a
//!   [`BoolCheck`][crate::pg::Action::BoolCheck] are dashed
//!
//! # Examples
//!
//! ```
//! use gcl_rs::ast::{AExpr, Stmt};
//! use gcl_rs::compiler::compile;
//! use gcl_rs::pg::Determinism;
//!
//! let pg = compile(&Stmt::assign("x", AExpr::num(1)), Determinism::Deterministic).unwrap();
//! let dot = pg.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::pg::{Action, ProgramGraph};

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use gcl_rs::ast::Stmt;
/// use gcl_rs::compiler::compile;
/// use gcl_rs::dot::DotConfig;
/// use gcl_rs::pg::Determinism;
///
/// let pg = compile(&Stmt::Skip, Determinism::Deterministic).unwrap();
/// let config = DotConfig {
///     node_shape: "ellipse",
///     ..DotConfig::default()
/// };
///
/// let dot = pg.to_dot_with_config(&config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for control nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for the start and end nodes (default: "doublecircle")
    pub terminal_shape: &'static str,
    /// Style for action edges (default: "solid")
    pub action_edge_style: &'static str,
    /// Style for guard edges (default: "dashed")
    pub guard_edge_style: &'static str,
    /// Font for edge labels (default: "monospace")
    pub edge_font: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "circle",
            terminal_shape: "doublecircle",
            action_edge_style: "solid",
            guard_edge_style: "dashed",
            edge_font: "monospace",
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

impl ProgramGraph {
    /// Converts the graph to DOT format with the default configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - A DOT-formatted string representation of the graph
    /// * `Err(std::fmt::Error)` - If string formatting fails (rare)
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the graph to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;
        writeln!(dot, "edge [fontname=\"{}\"];", config.edge_font)?;

        writeln!(dot, "{{ rank=source")?;
        writeln!(dot, "{} [shape={}];", self.start(), config.terminal_shape)?;
        writeln!(dot, "}}")?;
        if self.end() != self.start() {
            writeln!(dot, "{{ rank=sink")?;
            writeln!(dot, "{} [shape={}];", self.end(), config.terminal_shape)?;
            writeln!(dot, "}}")?;
        }

        for node in self.nodes() {
            if node != self.start() && node != self.end() {
                writeln!(dot, "{};", node)?;
            }
        }

        for edge in self.edges() {
            let style = match edge.action {
                Action::BoolCheck(_) => config.guard_edge_style,
                _ => config.action_edge_style,
            };
            writeln!(
                dot,
                "{} -> {} [label=\"{}\", style={}];",
                edge.from,
                edge.to,
                escape(&edge.action.to_string()),
                style
            )?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
