//! Pipeline state with stage transition validation.
//!
//! `PipelineState` is an explicit record threaded through the coordinator,
//! not a mutable singleton: transitions are auditable through the history
//! and the whole record serializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::stage::Stage;

/// A record of a stage transition with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    /// The stage that was entered.
    pub stage: Stage,
    /// When this stage was entered.
    pub entered_at: DateTime<Utc>,
}

/// Tracks the pipeline's macro stage and enforces valid transitions.
///
/// The forward order is strict:
///
/// Init → PrdReady → GraphReady → GraphValidated → GraphApproved →
/// Executing → Summarized
///
/// with one legal backward edge, GraphValidated → GraphReady, taken when
/// the external approval signal is negative and the graph goes back
/// through a revision step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    stage: Stage,
    history: Vec<StageHistoryEntry>,
}

impl PipelineState {
    /// Start a fresh pipeline at Init.
    pub fn new() -> Self {
        Self {
            stage: Stage::Init,
            history: vec![StageHistoryEntry {
                stage: Stage::Init,
                entered_at: Utc::now(),
            }],
        }
    }

    /// Check if a transition to the target stage is valid from the current
    /// stage.
    pub fn can_transition(&self, target: Stage) -> bool {
        matches!(
            (self.stage, target),
            (Stage::Init, Stage::PrdReady)
                | (Stage::PrdReady, Stage::GraphReady)
                | (Stage::GraphReady, Stage::GraphValidated)
                | (Stage::GraphValidated, Stage::GraphApproved)
                | (Stage::GraphValidated, Stage::GraphReady)
                | (Stage::GraphApproved, Stage::Executing)
                | (Stage::Executing, Stage::Summarized)
        )
    }

    /// Attempt to transition the pipeline to a new stage.
    ///
    /// An invalid transition is a coordinator bug and aborts loudly; the
    /// state is left untouched.
    pub fn transition(&mut self, target: Stage) -> Result<()> {
        if !self.can_transition(target) {
            return Err(Error::InvalidStageTransition {
                from: self.stage.to_string(),
                to: target.to_string(),
            });
        }
        self.stage = target;
        self.history.push(StageHistoryEntry {
            stage: target,
            entered_at: Utc::now(),
        });
        Ok(())
    }

    /// The current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// All stages visited, in order.
    pub fn history(&self) -> &[StageHistoryEntry] {
        &self.history
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
