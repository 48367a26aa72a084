// Publishing workflows: facts, stages and the resumable engine that runs them

pub mod engine;
pub mod error;
pub mod facts;
pub mod registry;
pub mod stage;
pub mod stages;

pub use engine::{EngineState, WorkflowEngine, WorkflowOutcome, WorkflowRun};
pub use error::StageError;
pub use facts::{keys, WorkflowFacts};
pub use registry::{stages_for, submit_stages, update_stages};
pub use stage::{Stage, StageContext};
