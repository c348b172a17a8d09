mod ids;
mod problem;
mod record;
mod session;
pub mod settings;

pub use ids::{ParseIdError, SessionId};
pub use problem::{Problem, ProblemOrigin};
pub use record::{ProblemRecord, slowest};
pub use session::{Session, SessionDraft, SessionModelError, SmartSnapshot, accuracy_percent};
pub use settings::{
    DEFAULT_ROUND_DURATION_SECS, SettingsError, SmartGeneratorConfig, SmartGeneratorDraft,
    validate_round_duration,
};
