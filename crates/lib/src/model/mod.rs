//! The build model and its evaluator.
//!
//! # Submodules
//!
//! - [`decl`] - declaration records produced by a parser
//! - [`namespace`] - hierarchical declaration lookup
//! - [`property`] - resolved properties and constraint sets
//! - [`stack`] - resolution stack for cycle detection and traces
//! - [`context`] - per-configuration resolution
//! - [`build_model`] - the model and its context cache
//! - [`loader`] - build file loading

pub mod build_model;
pub mod context;
pub mod decl;
pub mod loader;
pub mod namespace;
pub mod property;
pub mod stack;

pub use build_model::BuildModel;
pub use context::{BuildContext, ContextId};
pub use decl::{
  BuildFile, Decl, Declaration, NamespaceDecl, PropertyDecl, PropertyType, SourceLocation, TargetDecl, TargetDefDecl,
  Value,
};
pub use loader::{BuildFileContents, BuildFileParser, Loader};
pub use namespace::{Entry, MatchedDecl, Namespace, PrefixMatch};
pub use property::{Constraints, Property};
pub use stack::DependencyStack;
