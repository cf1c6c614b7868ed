//! OCSF Schema Compiler
//!
//! Assembles a single OCSF schema document from a source repository of
//! JSON definitions: extensions, includes, profiles, inheritance and the
//! dictionary are resolved into fully populated classes and objects.
//!
//! ## Features
//!
//! - **Plan before apply**: planners only read; every edit is an inspectable op
//! - **Deterministic**: locations are visited in sorted order throughout
//! - **Failure propagation**: a failed op fails everything that depends on it
//! - **Checksums**: SHA256 fingerprints of the source tree and rendered schema
//!
//! ## Pipeline
//!
//! ```text
//! Repository::load(dir)
//!     │
//!     ▼
//! Compilation::analyze()   structure → dictionary → identifiers → schema
//!     │                    (planners emit ops into a Plan)
//!     ▼
//! Compilation::compile()   ops applied to the ProtoSchema, outcomes logged
//!     │
//!     ▼
//! Compilation::schema()    Schema { classes, objects, dictionary, ... }
//! ```

pub mod checksum;
pub mod compile;
pub mod config;
pub mod error;
pub mod merge;
pub mod protoschema;
pub mod repository;
pub mod schema;

pub use checksum::Checksum;
pub use compile::{Compilation, CompilationState, MergeResult, Op, OpKind, Phase, Plan, Planner};
pub use config::{CompilationOptions, CompilerConfig, OutputFormat};
pub use error::{CompileError, Result};
pub use protoschema::ProtoSchema;
pub use repository::{Definition, Location, LocationKind, Repository, Section};
pub use schema::Schema;
