//! Domain model and pure algorithms for the drill trainer: practice modes,
//! history pools, smart selection and leaderboards. No I/O lives here.

pub mod error;
pub mod history;
pub mod leaderboard;
pub mod model;
pub mod modes;
pub mod selector;
pub mod time;

pub use error::Error;
pub use time::Clock;
