pub mod client;
pub mod error;
pub mod id;
pub mod policy;
pub mod time;

pub use client::{ClientRecord, OnlineStatus};
pub use error::{CoreError, Result};
pub use id::IdGenerator;
pub use policy::{ClientPolicyMapping, Policy, PolicyId, PolicyStatus};
pub use time::{epoch_millis, format_timestamp, now_utc, parse_timestamp};
