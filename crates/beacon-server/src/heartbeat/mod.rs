//! Heartbeat protocol: liveness recording and policy change detection.

pub mod coordinator;
pub mod liveness;
pub mod types;

pub use coordinator::HeartbeatCoordinator;
pub use liveness::{LivenessOutcome, LivenessRecorder, OfflineMonitor, OnlineStatistics};
pub use types::{HeartbeatRequest, HeartbeatResponse, PolicyPayload, UpdateType};
