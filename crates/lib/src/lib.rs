//! fabr-lib: a lazy, memoizing build-description evaluator.
//!
//! A build description is a tree of declared targets, properties, and
//! namespaces. This crate resolves named properties and targets into strings,
//! file sets, or rule-produced outputs, under an explicit set of configuration
//! constraints.
//!
//! - [`Computable`](computable::Computable): shared, memoized async values
//! - [`Name`](name::Name): literal/glob/variable expressions
//! - [`Namespace`](model::Namespace): hierarchical declaration lookup
//! - [`BuildContext`](model::BuildContext): per-configuration resolution
//! - [`BuildCache`](cache::BuildCache): content-addressed rule outputs
//!
//! # Example
//!
//! ```no_run
//! use fabr_lib::cache::BuildCache;
//! use fabr_lib::config::EngineConfig;
//! use fabr_lib::model::{BuildModel, Constraints, DependencyStack, Namespace};
//! use fabr_lib::rules::RuleRegistry;
//!
//! # async fn run(root: Namespace) -> fabr_lib::error::Result<()> {
//! let config = EngineConfig::from_env();
//! let model = BuildModel::new(root, RuleRegistry::with_builtins(&config), BuildCache::from_config(&config));
//!
//! let context = model.get_config(Constraints::new());
//! let outputs = context.get_target("app", &DependencyStack::new())?.await?;
//! println!("app produced {} outputs", outputs.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod computable;
pub mod config;
pub mod consts;
pub mod error;
pub mod files;
pub mod model;
pub mod name;
pub mod platform;
pub mod rules;
pub mod support;
pub mod util;

pub use error::{Error, Result};
