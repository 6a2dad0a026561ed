//! # ecsefs_spec
//!
//! Stack configuration for ecsefs: the data model, loading from disk and
//! validation.
//!
//! A stack is an ECS cluster on EC2 capacity plus an ordered list of services.
//! Each service names a shared load balancer, may mount EFS volumes and may
//! declare one autoscaling trigger.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ecsefs_spec::{StackLoader, StackValidator};
//!
//! let config = StackLoader::load("stack.yaml").unwrap();
//! let result = StackValidator::validate(&config);
//! for error in &result.errors {
//!     eprintln!("Error: {}", error);
//! }
//! ```

pub mod error;
pub mod loader;
pub mod models;
pub mod sample;
pub mod validator;
pub mod writer;

pub use error::{SpecError, SpecResult};
pub use loader::{ConfigFormat, StackLoader};
pub use models::*;
pub use sample::sample_stack;
pub use validator::{StackValidator, ValidationResult};
pub use writer::StackWriter;
