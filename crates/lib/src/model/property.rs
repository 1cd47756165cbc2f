use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A resolved string property: one string per contributing assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Property(pub Vec<String>);

impl Property {
  pub fn new(values: Vec<String>) -> Self {
    Self(values)
  }

  /// A property with exactly one value.
  pub fn single(value: impl Into<String>) -> Self {
    Self(vec![value.into()])
  }

  pub fn values(&self) -> &[String] {
    &self.0
  }

  pub fn first(&self) -> Option<&str> {
    self.0.first().map(String::as_str)
  }
}

/// Values are joined with a single space, as they are when substituted into a name.
impl fmt::Display for Property {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join(" "))
  }
}

impl From<&str> for Property {
  fn from(value: &str) -> Self {
    Property::single(value)
  }
}

/// Property values selecting one build configuration.
///
/// Equal maps identify the same configuration.
pub type Constraints = BTreeMap<String, Property>;
