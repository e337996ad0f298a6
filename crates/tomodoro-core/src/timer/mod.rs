mod engine;
mod service;

pub use engine::{EngineStatus, TimerEngine, TimerState, TransitionError};
pub use service::TimerService;
