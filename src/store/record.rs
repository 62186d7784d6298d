//! [`RunRecord`] — on-disk representation of a run.

use crate::state::{RunState, RunStatus};
use serde::{Deserialize, Serialize};

/// On-disk representation of a deployment run.
///
/// Mirrors [`RunState`] plus the derived overall status so operators can
/// list runs without replaying phase logic. Credential tokens are never
/// part of the state, so nothing here needs redaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub state: RunState,
}

impl RunRecord {
    pub fn from_state(state: &RunState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            status: state.status(),
            state: state.clone(),
        }
    }

    pub fn into_state(self) -> RunState {
        self.state
    }
}
