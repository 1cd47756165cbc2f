//! Rules turn a resolved target into build output.
//!
//! A [`Rule`] is registered under a target type name in a [`RuleRegistry`].
//! When a target of that type is resolved, every property assignment on it is
//! resolved first and the rule receives them as a [`ResolvedTarget`].

mod builtin;

pub use builtin::{ArchiveRule, FileGroupRule};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::computable::Computable;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::files::FileSource;
use crate::model::{BuildContext, Property};

/// A resolved target property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
  Strings(Property),
  Files(Vec<FileSource>),
}

/// A target with all its properties resolved.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
  name: String,
  properties: BTreeMap<String, PropertyValue>,
}

impl ResolvedTarget {
  pub fn new(name: impl Into<String>, properties: BTreeMap<String, PropertyValue>) -> Self {
    Self {
      name: name.into(),
      properties,
    }
  }

  /// Qualified name of the target.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn get(&self, property: &str) -> Option<&PropertyValue> {
    self.properties.get(property)
  }

  /// A string property, if present and string-typed.
  pub fn strings(&self, property: &str) -> Option<&Property> {
    match self.properties.get(property)? {
      PropertyValue::Strings(p) => Some(p),
      PropertyValue::Files(_) => None,
    }
  }

  /// A file property, if present and file-typed.
  pub fn files(&self, property: &str) -> Option<&[FileSource]> {
    match self.properties.get(property)? {
      PropertyValue::Files(f) => Some(f),
      PropertyValue::Strings(_) => None,
    }
  }

  /// The first value of a string property, or a rule error naming the target.
  pub fn require_string(&self, property: &str) -> Result<&str> {
    self.strings(property).and_then(Property::first).ok_or_else(|| Error::Rule {
      target: self.name.clone(),
      message: format!("missing required property '{property}'"),
    })
  }

  pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
    self.properties.iter().map(|(k, v)| (k.as_str(), v))
  }
}

/// Build logic for one target type.
pub trait Rule {
  fn evaluate(&self, target: ResolvedTarget, context: Rc<BuildContext>) -> Computable<FileSource>;
}

impl<F> Rule for F
where
  F: Fn(ResolvedTarget, Rc<BuildContext>) -> Computable<FileSource>,
{
  fn evaluate(&self, target: ResolvedTarget, context: Rc<BuildContext>) -> Computable<FileSource> {
    self(target, context)
  }
}

/// Rules by target type name.
#[derive(Default, Clone)]
pub struct RuleRegistry {
  rules: HashMap<String, Rc<dyn Rule>>,
}

impl RuleRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the built-in `filegroup` and `archive` rules.
  pub fn with_builtins(config: &EngineConfig) -> Self {
    let mut registry = Self::new();
    registry.register("filegroup", FileGroupRule);
    registry.register("archive", ArchiveRule::new(config.clone()));
    registry
  }

  /// Register `rule` for `type_name`, replacing any earlier registration.
  pub fn register(&mut self, type_name: impl Into<String>, rule: impl Rule + 'static) -> &mut Self {
    self.rules.insert(type_name.into(), Rc::new(rule));
    self
  }

  pub fn lookup(&self, type_name: &str) -> Option<Rc<dyn Rule>> {
    self.rules.get(type_name).cloned()
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.rules.contains_key(type_name)
  }
}

impl fmt::Debug for RuleRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names: Vec<_> = self.rules.keys().collect();
    names.sort();
    f.debug_struct("RuleRegistry").field("rules", &names).finish()
  }
}
