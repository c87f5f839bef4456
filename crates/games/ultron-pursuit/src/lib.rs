//! Ultron pursuit engine.
//!
//! Pure and synchronous: every operation takes the current [`Timestamp`]
//! explicitly, so the same code serves a live per-session driver and a
//! stateless polling caller.
//!
//! [`Timestamp`]: ultron_core::time::Timestamp

pub mod adversary;
pub mod clock;
pub mod obstacles;
pub mod pathfinder;
pub mod rules;
pub mod scoring;
pub mod session;

pub use adversary::{Adversary, RoutePreview, StepOutcome};
pub use clock::TickReport;
pub use obstacles::{Hit, Obstacle, ObstacleRegistry};
pub use pathfinder::find_path;
pub use rules::GameRules;
pub use scoring::{Finalization, calculate_score, finalize};
pub use session::Session;
