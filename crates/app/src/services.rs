//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod directory_cache;
pub mod executor;
pub mod permission_gate;
pub mod resolver;

pub use directory_cache::{AliasTable, DirectoryCache, Generation, RefreshReport};
pub use executor::CommandExecutor;
pub use permission_gate::PermissionGate;
pub use resolver::{AmbiguityPolicy, Resolver};
