//! Stateless routing front end: scores workers on live telemetry, selects
//! among the top candidates with anti-herding randomization, and fails over
//! on transport errors.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod poller;
pub mod registry;
pub mod routes;
pub mod scorer;
pub mod selector;
pub mod state;

pub use config::Config;
pub use poller::Poller;
pub use registry::{Registry, WorkerEntry};
pub use scorer::{score, ScoreWeights, EXCLUDED_SCORE};
pub use state::{AppState, RoutingStats};
