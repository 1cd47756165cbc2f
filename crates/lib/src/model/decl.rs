//! Declaration records produced by a build-file parser.
//!
//! Qualified names use `/` between components (`mylib/sub/target`). Target
//! properties carry their unqualified property name (`srcs`).

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::consts::NAME_COMPONENT_SEPARATOR;
use crate::files::SourceTree;
use crate::name::Name;

/// A position in a build file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
  pub file: String,
  pub line: u32,
  pub column: u32,
}

impl SourceLocation {
  pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
    Self {
      file: file.into(),
      line,
      column,
    }
  }
}

impl fmt::Display for SourceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

/// A loaded build file and the tree it was read from.
pub struct BuildFile {
  /// Path within `tree`.
  pub path: String,
  pub tree: Rc<dyn SourceTree>,
}

impl BuildFile {
  pub fn new(path: impl Into<String>, tree: Rc<dyn SourceTree>) -> Self {
    Self {
      path: path.into(),
      tree,
    }
  }

  /// The directory containing this file, without a trailing separator.
  pub fn dir(&self) -> &str {
    match self.path.rfind(NAME_COMPONENT_SEPARATOR) {
      Some(idx) => &self.path[..idx],
      None => "",
    }
  }
}

impl fmt::Debug for BuildFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildFile").field("path", &self.path).finish_non_exhaustive()
  }
}

/// One assignment expression contributing to a property.
#[derive(Debug, Clone)]
pub struct Value {
  pub name: Name,
  pub location: SourceLocation,
}

/// A property, either standalone or attached to a target.
#[derive(Debug)]
pub struct PropertyDecl {
  pub name: String,
  pub values: Vec<Value>,
  pub location: SourceLocation,
  pub source: Rc<BuildFile>,
}

/// A buildable unit: a rule type plus property assignments.
#[derive(Debug)]
pub struct TargetDecl {
  pub name: String,
  pub rule_type: String,
  pub properties: Vec<Rc<PropertyDecl>>,
  pub location: SourceLocation,
  pub source: Rc<BuildFile>,
}

/// Kind of a property declared by a target definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
  String,
  StringList,
  FileSet,
  FileSetList,
}

/// The schema of a rule type ("targetdef").
#[derive(Debug)]
pub struct TargetDefDecl {
  pub name: String,
  pub properties: BTreeMap<String, PropertyType>,
  pub location: SourceLocation,
}

/// An explicitly declared namespace.
#[derive(Debug)]
pub struct NamespaceDecl {
  pub name: String,
  pub location: SourceLocation,
}

/// A declaration found by qualified name.
#[derive(Debug, Clone)]
pub enum Decl {
  Target(Rc<TargetDecl>),
  Property(Rc<PropertyDecl>),
  Namespace(Rc<NamespaceDecl>),
}

impl Decl {
  pub fn name(&self) -> &str {
    match self {
      Decl::Target(t) => &t.name,
      Decl::Property(p) => &p.name,
      Decl::Namespace(n) => &n.name,
    }
  }

  pub fn location(&self) -> &SourceLocation {
    match self {
      Decl::Target(t) => &t.location,
      Decl::Property(p) => &p.location,
      Decl::Namespace(n) => &n.location,
    }
  }
}

/// A top-level declaration of a build file.
#[derive(Debug, Clone)]
pub enum Declaration {
  Target(Rc<TargetDecl>),
  Property(Rc<PropertyDecl>),
  Namespace(Rc<NamespaceDecl>),
  TargetDef(Rc<TargetDefDecl>),
}
