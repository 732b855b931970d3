pub mod batch;
pub mod chords;
pub mod key;
pub mod melody;
pub mod mood;
pub mod orchestrator;
pub mod pitch;
pub mod report;
pub mod separation;
pub mod tempo;
