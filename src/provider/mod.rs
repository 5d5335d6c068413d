// ABOUTME: Capability traits for the external systems the pipeline drives.
// ABOUTME: Defines ComputeOps, KeyPairOps, SecretStore, SchedulerOps and the aws CLI binding.

pub mod aws;
mod compute;
mod scheduler;
mod secrets;

pub use compute::{ComputeError, ComputeOps, Instance, InstanceState, InstanceTags, LaunchSpec};
pub use scheduler::{DescriptorRevision, SchedulerError, SchedulerOps, ServiceDescriptor};
pub use secrets::{KeyPairOps, SecretError, SecretStore};
