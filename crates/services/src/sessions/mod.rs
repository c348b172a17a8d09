mod outcome;
mod round;
mod timer;
mod workflow;

// Public API of the round subsystem.
pub use crate::error::SessionError;
pub use outcome::{RoundOutcome, SLOWEST_SHOWN, SmartSummary};
pub use round::{AnswerVerdict, DrillRound, RoundState};
pub use timer::{RoundTimer, TICK};
pub use workflow::{DrillLoopService, StartedRound};
