//! Lifecycle states and the stages that move between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a run in the four-stage protocol.
///
/// States only move forward; going back requires an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
	#[default]
	Preparing,
	Submitting,
	Retrieving,
	Interacting,
	Complete,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			LifecycleState::Preparing => "preparing",
			LifecycleState::Submitting => "submitting",
			LifecycleState::Retrieving => "retrieving",
			LifecycleState::Interacting => "interacting",
			LifecycleState::Complete => "complete",
		};
		f.write_str(name)
	}
}

/// One step of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
	Prepare,
	Submit,
	Retrieve,
	Interact,
}

impl Stage {
	pub const ALL: [Stage; 4] = [Stage::Prepare, Stage::Submit, Stage::Retrieve, Stage::Interact];

	/// State the run must be in for this stage to execute.
	pub fn required_state(self) -> LifecycleState {
		match self {
			Stage::Prepare => LifecycleState::Preparing,
			Stage::Submit => LifecycleState::Submitting,
			Stage::Retrieve => LifecycleState::Retrieving,
			Stage::Interact => LifecycleState::Interacting,
		}
	}

	/// State the run advances to once this stage succeeds.
	pub fn next_state(self) -> LifecycleState {
		match self {
			Stage::Prepare => LifecycleState::Submitting,
			Stage::Submit => LifecycleState::Retrieving,
			Stage::Retrieve => LifecycleState::Interacting,
			Stage::Interact => LifecycleState::Complete,
		}
	}

	/// The stage that executes from `state`, if any.
	pub fn for_state(state: LifecycleState) -> Option<Stage> {
		Stage::ALL
			.into_iter()
			.find(|stage| stage.required_state() == state)
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Stage::Prepare => "prepare",
			Stage::Submit => "submit",
			Stage::Retrieve => "retrieve",
			Stage::Interact => "interact",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_stages_chain_forward() {
		let mut state = LifecycleState::default();
		for stage in Stage::ALL {
			assert_eq!(Stage::for_state(state), Some(stage));
			state = stage.next_state();
		}
		assert_eq!(state, LifecycleState::Complete);
		assert_eq!(Stage::for_state(LifecycleState::Complete), None);
	}
}
