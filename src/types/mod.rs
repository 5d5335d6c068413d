// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent mixing cloud resource IDs at compile time.

mod environment;
mod id;

pub use environment::{EnvironmentName, EnvironmentNameError};
pub use id::{Id, InstanceId, KeyPairId, SecurityGroupId, SubnetId};
