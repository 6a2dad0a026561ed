//! # ecsefs_core
//!
//! Resource graph and stack assembly.
//!
//! [`StackAssembler`] walks the services of a [`ecsefs_spec::StackConfig`] in
//! order and declares their resources into a [`ResourceGraph`]. Shared load
//! balancers go through a [`SharedRegistry`] so each name is constructed once.
//!
//! ```rust,no_run
//! use ecsefs_core::StackAssembler;
//! use ecsefs_spec::sample_stack;
//!
//! let stack = StackAssembler::default().assemble(&sample_stack()).unwrap();
//! println!("{} resources", stack.graph.len());
//! ```

pub mod assembler;
pub mod error;
pub mod graph;
pub mod registry;

pub use assembler::{AssembledStack, AssemblerOptions, ServiceAssembly, StackAssembler};
pub use error::{CoreError, CoreResult};
pub use graph::{
    logical_id, Concern, DeletionPolicy, Parameter, Resource, ResourceGraph, ResourceId,
    ResourceKind, StackOutput,
};
pub use registry::SharedRegistry;
