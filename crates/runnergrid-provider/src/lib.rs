//! runnergrid-provider — the cloud provider port.
//!
//! Every cloud is reduced to two operations on an Auto Scaling Group:
//! read the current allocation and desired size, and write a new target
//! size. The engine treats an ASG as a fixed-size pool, so a write sets
//! min, max and desired to the same value.
//!
//! Clients are created lazily per region and cached for the lifetime of
//! the process; the [`ProviderRegistry`] maps provider keys to their
//! region pools and ASG names to provider keys.
//!
//! A new cloud is added by implementing [`Provider`] and [`ProviderPool`]
//! and registering the pool under a new key in
//! [`ProviderRegistry::from_config`].

mod aws;
mod error;
mod port;
mod registry;

pub use aws::{AwsClients, AwsProvider, ALLOCATED_LIFECYCLE_STATES};
pub use error::{ProviderError, ProviderResult};
pub use port::{validate_write_request, AsgReading, Provider, ProviderPool};
pub use registry::ProviderRegistry;
