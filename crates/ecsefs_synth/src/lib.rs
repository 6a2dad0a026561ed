//! # ecsefs_synth
//!
//! Renders an assembled stack as a CloudFormation template and writes it to
//! disk together with an `outputs.json` report of every emitted value.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use ecsefs_core::StackAssembler;
//! use ecsefs_spec::sample_stack;
//! use ecsefs_synth::{TemplateFormat, TemplateSynthesizer};
//!
//! let stack = StackAssembler::default().assemble(&sample_stack()).unwrap();
//! let files = TemplateSynthesizer::new(TemplateFormat::Yaml)
//!     .synthesize(&stack, Path::new("cdk.out"))
//!     .unwrap();
//! println!("{}", files.template.display());
//! ```

pub mod error;
pub mod format;
pub mod synthesizer;
pub mod template;

pub use error::{SynthError, SynthResult};
pub use format::TemplateFormat;
pub use synthesizer::{OutputEntry, OutputReport, SynthesizedFiles, TemplateSynthesizer, OUTPUTS_FILE};
pub use template::Template;
