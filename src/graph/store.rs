//! Persistence for Goal Graphs and the requirements document.
//!
//! Snapshots are timestamped and a `latest` pointer always mirrors the
//! newest one. Writes go through a temp file + rename so no reader ever
//! observes a partially written snapshot; loads of missing or corrupt
//! content decay to an empty value with a warning, never an error.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::graph::graph::GoalGraph;

/// Name of the pointer file mirroring the newest graph snapshot.
pub const LATEST_GRAPH: &str = "latest.json";

/// Name of the pointer file mirroring the newest PRD snapshot.
pub const LATEST_PRD: &str = "latest.md";

/// Atomic write: temp file in the same directory, then rename into place.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Stores versioned Goal Graph snapshots on disk.
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph_dir: PathBuf,
}

impl GraphStore {
    pub fn new(graph_dir: &Path) -> Self {
        Self {
            graph_dir: graph_dir.to_path_buf(),
        }
    }

    /// Write a timestamped snapshot and update the latest pointer.
    ///
    /// Returns the snapshot path.
    pub fn persist(&self, graph: &GoalGraph) -> Result<PathBuf> {
        let contents = serde_json::to_string_pretty(graph)?;
        let snapshot = self
            .graph_dir
            .join(format!("goal_graph_{}.json", Utc::now().timestamp()));

        write_atomic(&snapshot, &contents)?;
        write_atomic(&self.graph_dir.join(LATEST_GRAPH), &contents)?;

        info!(
            snapshot = %snapshot.display(),
            tasks = graph.len(),
            "goal graph persisted"
        );
        Ok(snapshot)
    }

    /// Load a snapshot by file name, defaulting to the latest pointer.
    ///
    /// Missing files and corrupt content both yield an empty graph, logged.
    pub fn load(&self, name: Option<&str>) -> GoalGraph {
        let path = self.graph_dir.join(name.unwrap_or(LATEST_GRAPH));
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), %err, "goal graph not found, starting empty");
                return GoalGraph::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(graph) => {
                debug!(path = %path.display(), "goal graph loaded");
                graph
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "corrupt goal graph, starting empty");
                GoalGraph::default()
            }
        }
    }
}

/// Stores the requirements document with the same snapshot discipline.
#[derive(Debug, Clone)]
pub struct PrdStore {
    prd_dir: PathBuf,
}

impl PrdStore {
    pub fn new(prd_dir: &Path) -> Self {
        Self {
            prd_dir: prd_dir.to_path_buf(),
        }
    }

    /// Write a timestamped PRD snapshot and update the latest pointer.
    pub fn persist(&self, prd: &str) -> Result<PathBuf> {
        let snapshot = self
            .prd_dir
            .join(format!("prd_{}.md", Utc::now().timestamp()));

        write_atomic(&snapshot, prd)?;
        write_atomic(&self.prd_dir.join(LATEST_PRD), prd)?;

        info!(snapshot = %snapshot.display(), bytes = prd.len(), "prd persisted");
        Ok(snapshot)
    }

    /// Load the latest PRD, if one has been recorded.
    pub fn load(&self) -> Option<String> {
        let path = self.prd_dir.join(LATEST_PRD);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(err) => {
                warn!(path = %path.display(), %err, "no prd found");
                None
            }
        }
    }
}
