//! Shared fixtures for resolution tests.
//!
//! Declarations are built directly, standing in for a parser: each call on
//! [`Fixture`] adds one declaration on the next line of `proj/BUILD`.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use fabr_lib::cache::BuildCache;
use fabr_lib::computable::Computable;
use fabr_lib::files::{File, FileSet, FileSource, SourceTree};
use fabr_lib::model::{
  BuildContext, BuildFile, BuildFileContents, BuildModel, Constraints, Declaration, PropertyDecl, PropertyType,
  SourceLocation, TargetDecl, TargetDefDecl, Value,
};
use fabr_lib::name::Name;
use fabr_lib::rules::{ResolvedTarget, RuleRegistry};
use tempfile::TempDir;

pub const BUILD_FILE: &str = "proj/BUILD";

pub struct Fixture {
  file: Rc<BuildFile>,
  declarations: Vec<Declaration>,
  line: u32,
}

impl Fixture {
  pub fn new(tree: impl SourceTree + 'static) -> Self {
    let tree: Rc<dyn SourceTree> = Rc::new(tree);
    Self {
      file: Rc::new(BuildFile::new(BUILD_FILE, tree)),
      declarations: Vec::new(),
      line: 0,
    }
  }

  fn next_location(&mut self) -> SourceLocation {
    self.line += 1;
    SourceLocation::new(BUILD_FILE, self.line, 1)
  }

  fn property_decl(&mut self, name: &str, values: &[&str]) -> Rc<PropertyDecl> {
    let location = self.next_location();
    let values = values
      .iter()
      .enumerate()
      .map(|(idx, text)| Value {
        name: Name::parse(text).unwrap(),
        location: SourceLocation::new(BUILD_FILE, location.line, 10 + 6 * idx as u32),
      })
      .collect();
    Rc::new(PropertyDecl {
      name: name.to_string(),
      values,
      location,
      source: self.file.clone(),
    })
  }

  /// A standalone property with one value per entry of `values`.
  pub fn property(mut self, name: &str, values: &[&str]) -> Self {
    let decl = self.property_decl(name, values);
    self.declarations.push(Declaration::Property(decl));
    self
  }

  pub fn target(mut self, name: &str, rule_type: &str, properties: &[(&str, &[&str])]) -> Self {
    let location = self.next_location();
    let properties = properties
      .iter()
      .map(|(prop, values)| self.property_decl(prop, values))
      .collect();
    self.declarations.push(Declaration::Target(Rc::new(TargetDecl {
      name: name.to_string(),
      rule_type: rule_type.to_string(),
      properties,
      location,
      source: self.file.clone(),
    })));
    self
  }

  pub fn target_def(mut self, name: &str, properties: &[(&str, PropertyType)]) -> Self {
    let location = self.next_location();
    self.declarations.push(Declaration::TargetDef(Rc::new(TargetDefDecl {
      name: name.to_string(),
      properties: properties.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
      location,
    })));
    self
  }

  /// The usual `filegroup` and `archive` definitions.
  pub fn builtin_defs(self) -> Self {
    self
      .target_def("filegroup", &[("srcs", PropertyType::FileSetList)])
      .target_def(
        "archive",
        &[
          ("srcs", PropertyType::FileSet),
          ("url", PropertyType::String),
          ("sha256", PropertyType::String),
        ],
      )
  }

  pub fn contents(self) -> Rc<BuildFileContents> {
    Rc::new(BuildFileContents {
      file: self.file,
      includes: Vec::new(),
      declarations: self.declarations,
    })
  }

  pub fn model(self, rules: RuleRegistry, cache_dir: &TempDir) -> BuildModel {
    BuildModel::from_files([self.contents()], rules, BuildCache::new(cache_dir.path())).unwrap()
  }
}

pub fn constraints(pairs: &[(&str, &str)]) -> Constraints {
  pairs.iter().map(|(k, v)| (k.to_string(), (*v).into())).collect()
}

/// A rule that counts its invocations and outputs one in-memory file per
/// entry of `outputs`, named as given with `${arch}` replaced by the
/// context's `arch` constraint.
pub fn counting_rule(
  calls: Rc<Cell<u32>>,
  outputs: &'static [&'static str],
) -> impl Fn(ResolvedTarget, Rc<BuildContext>) -> Computable<FileSource> {
  move |target, context| {
    calls.set(calls.get() + 1);
    let arch = context
      .constraints()
      .get("arch")
      .map(|p| p.to_string())
      .unwrap_or_default();
    let srcs: Vec<String> = target
      .files("srcs")
      .unwrap_or_default()
      .iter()
      .flat_map(|s| s.names())
      .map(str::to_string)
      .collect();
    let files = outputs
      .iter()
      .map(|name| File::from_string(name.replace("${arch}", &arch), &srcs.join(",")));
    Computable::resolve(FileSource::Set(FileSet::from_files(files)))
  }
}

pub fn names(sources: &[FileSource]) -> Vec<String> {
  sources
    .iter()
    .flat_map(|s| s.names())
    .map(str::to_string)
    .collect()
}
