// kegforge-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod formulary;
pub mod keg;
pub mod model;
pub mod tab;

// Re-export key types
pub use cache::Cache;
pub use config::Config;
pub use dependency::{Dependency, DependencyExt, DependencyTag, Requirement, RequirementKind};
pub use error::{KfError, Result};
pub use keg::{InstalledKeg, KegRegistry};
pub use model::{BottleSpec, BuildOptions, Formula, InstalledArtifact, Options, Version};
pub use tab::Tab;
