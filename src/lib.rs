#[macro_use]
extern crate rocket;

pub mod access;
pub mod api;
pub mod cache;
pub mod config;
pub mod migrator;
pub mod models;
pub mod referent;
pub mod resolver;

pub use access::AccessPolicy;
pub use config::{AppConfig, ConfigError};
pub use models::{ImageRecord, Referent, ResolveStatus};
pub use resolver::{IdentifierResolver, ResolverError};
