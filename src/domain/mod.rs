// Domain layer - Pure models and logic, no I/O
pub mod channel;
pub mod dashboard;
pub mod playback;
pub mod rig;
pub mod sample;
pub mod simulation;
pub mod telemetry;
pub mod trace;
