// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Execution status and control codes.
//!
//! Pipelines and processors report their lifecycle as small integer codes.
//! Unlike [`crate::defs::EntityKind`] these sets are closed: a code outside
//! the set means the frame is malformed and gets dropped, not forwarded.
//!
//! ## Pipeline lifecycle
//!
//! ```text
//!     Init
//!      ↓
//!   Registered
//!      ↓
//!    Ready ←──────────┐
//!      ↓              │
//!   Running ⇄ Paused  │
//!      ↓              │
//!   Completed         │
//!      ↓              │
//!   PendingTermination┘
//! ```

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Commands a client may issue against a pipeline.
///
/// Control flows through pipelines only; processors are observed, never
/// commanded directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeAction {
    Start,
    Restart,
    Pause,
    Terminate,
}

impl PipeAction {
    pub const fn code(self) -> u8 {
        match self {
            Self::Start => 1,
            Self::Restart => 2,
            Self::Pause => 3,
            Self::Terminate => 4,
        }
    }
}

impl TryFrom<u8> for PipeAction {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Start),
            2 => Ok(Self::Restart),
            3 => Ok(Self::Pause),
            4 => Ok(Self::Terminate),
            code => Err(DecodeError::UnknownCode { what: "pipe action", code }),
        }
    }
}

/// Execution status of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Defined but not yet loaded by a controller.
    Init,
    /// Loaded and registered with the node controller.
    Registered,
    /// All processors wired, waiting for a start command.
    Ready,
    Paused,
    Running,
    Completed,
    /// Draining processors ahead of shutdown.
    PendingTermination,
}

impl PipeState {
    pub const fn code(self) -> u8 {
        match self {
            Self::Init => 1,
            Self::Registered => 2,
            Self::Ready => 3,
            Self::Paused => 4,
            Self::Running => 5,
            Self::Completed => 6,
            Self::PendingTermination => 7,
        }
    }

    /// Whether the pipeline has finished and will report nothing further.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl TryFrom<u8> for PipeState {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Init),
            2 => Ok(Self::Registered),
            3 => Ok(Self::Ready),
            4 => Ok(Self::Paused),
            5 => Ok(Self::Running),
            6 => Ok(Self::Completed),
            7 => Ok(Self::PendingTermination),
            code => Err(DecodeError::UnknownCode { what: "pipe state", code }),
        }
    }
}

/// Execution status of a single processor.
///
/// Processors skip the registration step, so code 2 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Init,
    Ready,
    Paused,
    Running,
    Completed,
    PendingTermination,
}

impl ProcessorState {
    pub const fn code(self) -> u8 {
        match self {
            Self::Init => 1,
            Self::Ready => 3,
            Self::Paused => 4,
            Self::Running => 5,
            Self::Completed => 6,
            Self::PendingTermination => 7,
        }
    }
}

impl TryFrom<u8> for ProcessorState {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Init),
            3 => Ok(Self::Ready),
            4 => Ok(Self::Paused),
            5 => Ok(Self::Running),
            6 => Ok(Self::Completed),
            7 => Ok(Self::PendingTermination),
            code => Err(DecodeError::UnknownCode { what: "processor state", code }),
        }
    }
}

macro_rules! impl_code_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_u8(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let code = u8::deserialize(deserializer)?;
                Self::try_from(code).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_code_serde!(PipeAction);
impl_code_serde!(PipeState);
impl_code_serde!(ProcessorState);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_state_codes_round_trip() {
        for code in 1..=7u8 {
            let state = PipeState::try_from(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert!(PipeState::try_from(0).is_err());
        assert!(PipeState::try_from(8).is_err());
    }

    #[test]
    fn test_processor_state_skips_code_two() {
        assert!(ProcessorState::try_from(2).is_err());
        assert_eq!(ProcessorState::try_from(5).unwrap(), ProcessorState::Running);
    }

    #[test]
    fn test_action_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&PipeAction::Pause).unwrap(), "3");
        let action: PipeAction = serde_json::from_str("4").unwrap();
        assert_eq!(action, PipeAction::Terminate);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = serde_json::from_str::<PipeAction>("9").unwrap_err();
        assert!(err.to_string().contains("unknown pipe action code 9"));
    }
}
