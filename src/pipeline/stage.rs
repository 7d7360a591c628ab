//! Macro-stage definitions for the pipeline.

use serde::{Deserialize, Serialize};

/// Stages of the coordination pipeline.
///
/// The flow runs spec → graph → validation → approval → execution →
/// summary. Approval requires an external signal; a rejected graph loops
/// back through a revision step (GraphValidated → GraphReady).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing recorded yet.
    #[default]
    Init,
    /// A requirements document has been recorded.
    PrdReady,
    /// A Goal Graph has been generated (or revised) and normalized.
    GraphReady,
    /// The graph has been validated; issues, if any, are known.
    GraphValidated,
    /// The external approval signal arrived.
    GraphApproved,
    /// The execution loop is assigning and dispatching tasks.
    Executing,
    /// The final summary has been produced.
    Summarized,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::PrdReady => write!(f, "prd_ready"),
            Stage::GraphReady => write!(f, "graph_ready"),
            Stage::GraphValidated => write!(f, "graph_validated"),
            Stage::GraphApproved => write!(f, "graph_approved"),
            Stage::Executing => write!(f, "executing"),
            Stage::Summarized => write!(f, "summarized"),
        }
    }
}
