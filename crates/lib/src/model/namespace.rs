//! Hierarchical declaration lookup.
//!
//! A [`Namespace`] maps identifiers to nested namespaces, targets, and
//! properties. Target definitions are kept in a separate table per level and
//! are not inherited by nested namespaces.
//!
//! # Prefix matching
//!
//! [`Namespace::get_prefix_match`] finds the first target or property named by
//! the literal path prefix of a [`Name`]. Components are separated by `/` or
//! by `:`; a `:` introduces a selector whose text is handed back to the caller
//! as the retained prefix.
//!
//! | name | declared | decl | retained | rest |
//! |---|---|---|---|---|
//! | `mylib/lib/*` | target `mylib` | `mylib` | `mylib` | `lib/*` |
//! | `pkg:out/x.h` | namespace `pkg`, target `pkg/out` | `pkg/out` | `out` | `x.h` |
//! | `other/lib/*` | nothing named `other` | none | | |

use std::collections::BTreeMap;
use std::collections::btree_map::Entry as MapEntry;
use std::rc::Rc;

use crate::consts::{NAME_COMPONENT_SEPARATOR, SELECTOR_SEPARATOR};
use crate::error::{Error, Result};
use crate::model::decl::{Decl, NamespaceDecl, PropertyDecl, SourceLocation, TargetDecl, TargetDefDecl};
use crate::name::Name;

/// Something stored in a namespace under one identifier.
#[derive(Debug)]
pub enum Entry {
  Namespace(Namespace),
  Target(Rc<TargetDecl>),
  Property(Rc<PropertyDecl>),
}

/// A declaration found by prefix match.
#[derive(Debug, Clone)]
pub enum MatchedDecl {
  Target(Rc<TargetDecl>),
  Property(Rc<PropertyDecl>),
}

impl MatchedDecl {
  /// Qualified name of the matched declaration.
  pub fn name(&self) -> &str {
    match self {
      MatchedDecl::Target(t) => &t.name,
      MatchedDecl::Property(p) => &p.name,
    }
  }
}

/// Result of [`Namespace::get_prefix_match`].
#[derive(Debug, Clone)]
pub struct PrefixMatch {
  pub decl: MatchedDecl,
  /// The matched text after its last `:`, or all of it if there is none.
  pub retained_prefix: String,
  /// What is left of the original name after the match and one separator.
  pub rest: Name,
}

#[derive(Debug, Default)]
pub struct Namespace {
  content: BTreeMap<String, Entry>,
  target_defs: BTreeMap<String, Rc<TargetDefDecl>>,
  decl: Option<Rc<NamespaceDecl>>,
}

impl Namespace {
  pub fn new() -> Self {
    Self::default()
  }

  /// The declaration record of an explicit namespace.
  pub fn decl(&self) -> Option<&Rc<NamespaceDecl>> {
    self.decl.as_ref()
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
    self.content.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Look up a declaration by qualified name.
  ///
  /// A name resolving to a namespace yields its declaration record, or
  /// `None` for an implicit namespace.
  pub fn get_decl(&self, name: &str) -> Option<Decl> {
    let (parents, last) = split_qualified(name);
    match self.walk(parents)?.content.get(last)? {
      Entry::Namespace(ns) => ns.decl.clone().map(Decl::Namespace),
      Entry::Target(t) => Some(Decl::Target(t.clone())),
      Entry::Property(p) => Some(Decl::Property(p.clone())),
    }
  }

  /// Look up a target definition, strictly at the level the name resolves to.
  pub fn get_target_def(&self, name: &str) -> Option<Rc<TargetDefDecl>> {
    let (parents, last) = split_qualified(name);
    self.walk(parents)?.target_defs.get(last).cloned()
  }

  /// Find the first target or property named by the literal path prefix of `name`.
  pub fn get_prefix_match(&self, name: &Name) -> Option<PrefixMatch> {
    let prefix = name.literal_path_prefix();
    if prefix.is_empty() {
      return None;
    }

    let mut node = self;
    let mut start = 0;
    for part in prefix.split([NAME_COMPONENT_SEPARATOR, SELECTOR_SEPARATOR]) {
      let end = start + part.len();
      let decl = match node.content.get(part)? {
        Entry::Namespace(ns) => {
          node = ns;
          start = end + 1;
          continue;
        }
        Entry::Target(t) => MatchedDecl::Target(t.clone()),
        Entry::Property(p) => MatchedDecl::Property(p.clone()),
      };

      let matched = &prefix[..end];
      let retained_prefix = match matched.rfind(SELECTOR_SEPARATOR) {
        Some(idx) => &matched[idx + 1..],
        None => matched,
      };
      return Some(PrefixMatch {
        decl,
        retained_prefix: retained_prefix.to_string(),
        rest: name.skip_literal(end + 1),
      });
    }

    None
  }

  pub fn declare_target(&mut self, decl: Rc<TargetDecl>) -> Result<()> {
    let (name, location) = (decl.name.clone(), decl.location.clone());
    self.insert(&name, &location, Entry::Target(decl))
  }

  pub fn declare_property(&mut self, decl: Rc<PropertyDecl>) -> Result<()> {
    let (name, location) = (decl.name.clone(), decl.location.clone());
    self.insert(&name, &location, Entry::Property(decl))
  }

  /// Mark a namespace explicit, creating it if needed.
  pub fn declare_namespace(&mut self, decl: Rc<NamespaceDecl>) -> Result<()> {
    let (parents, last) = split_qualified(&decl.name);
    let parent = self.walk_or_create(parents, &decl.name, &decl.location)?;
    match parent.content.entry(last.to_string()) {
      MapEntry::Vacant(slot) => {
        slot.insert(Entry::Namespace(Namespace {
          decl: Some(decl),
          ..Namespace::default()
        }));
        Ok(())
      }
      MapEntry::Occupied(mut slot) => match slot.get_mut() {
        Entry::Namespace(ns) if ns.decl.is_none() => {
          ns.decl = Some(decl);
          Ok(())
        }
        _ => Err(duplicate(&decl.name, &decl.location)),
      },
    }
  }

  pub fn declare_target_def(&mut self, decl: Rc<TargetDefDecl>) -> Result<()> {
    let (parents, last) = split_qualified(&decl.name);
    let level = self.walk_or_create(parents, &decl.name, &decl.location)?;
    match level.target_defs.entry(last.to_string()) {
      MapEntry::Vacant(slot) => {
        slot.insert(decl);
        Ok(())
      }
      MapEntry::Occupied(_) => Err(duplicate(&decl.name, &decl.location)),
    }
  }

  fn insert(&mut self, name: &str, location: &SourceLocation, entry: Entry) -> Result<()> {
    let (parents, last) = split_qualified(name);
    let parent = self.walk_or_create(parents, name, location)?;
    match parent.content.entry(last.to_string()) {
      MapEntry::Vacant(slot) => {
        slot.insert(entry);
        Ok(())
      }
      MapEntry::Occupied(_) => Err(duplicate(name, location)),
    }
  }

  fn walk<'a>(&self, parts: impl IntoIterator<Item = &'a str>) -> Option<&Namespace> {
    let mut node = self;
    for part in parts {
      match node.content.get(part)? {
        Entry::Namespace(ns) => node = ns,
        _ => return None,
      }
    }
    Some(node)
  }

  fn walk_or_create<'a>(
    &mut self,
    parts: impl IntoIterator<Item = &'a str>,
    name: &str,
    location: &SourceLocation,
  ) -> Result<&mut Namespace> {
    let mut node = self;
    for part in parts {
      let entry = node
        .content
        .entry(part.to_string())
        .or_insert_with(|| Entry::Namespace(Namespace::default()));
      node = match entry {
        Entry::Namespace(ns) => ns,
        _ => return Err(duplicate(name, location)),
      };
    }
    Ok(node)
  }
}

fn split_qualified(name: &str) -> (std::iter::Take<std::str::Split<'_, char>>, &str) {
  let count = name.matches(NAME_COMPONENT_SEPARATOR).count();
  let last = name.rsplit(NAME_COMPONENT_SEPARATOR).next().unwrap_or(name);
  (name.split(NAME_COMPONENT_SEPARATOR).take(count), last)
}

fn duplicate(name: &str, location: &SourceLocation) -> Error {
  Error::DuplicateDeclaration {
    name: name.to_string(),
    location: location.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::files::{MemorySourceTree, SourceTree};
  use crate::model::decl::BuildFile;

  fn source() -> Rc<BuildFile> {
    let tree: Rc<dyn SourceTree> = Rc::new(MemorySourceTree::new());
    Rc::new(BuildFile::new("BUILD", tree))
  }

  fn loc() -> SourceLocation {
    SourceLocation::new("BUILD", 1, 1)
  }

  fn target(name: &str) -> Rc<TargetDecl> {
    Rc::new(TargetDecl {
      name: name.to_string(),
      rule_type: "cc".to_string(),
      properties: Vec::new(),
      location: loc(),
      source: source(),
    })
  }

  fn property(name: &str) -> Rc<PropertyDecl> {
    Rc::new(PropertyDecl {
      name: name.to_string(),
      values: Vec::new(),
      location: loc(),
      source: source(),
    })
  }

  fn namespace() -> Namespace {
    let mut ns = Namespace::new();
    ns.declare_target(target("mylib")).unwrap();
    ns.declare_target(target("pkg/out")).unwrap();
    ns.declare_property(property("pkg/flags")).unwrap();
    ns.declare_target(target("deep/a/b/leaf")).unwrap();
    ns.declare_namespace(Rc::new(NamespaceDecl {
      name: "pkg".to_string(),
      location: loc(),
    }))
    .unwrap();
    ns.declare_target_def(Rc::new(TargetDefDecl {
      name: "pkg/cc".to_string(),
      properties: BTreeMap::new(),
      location: loc(),
    }))
    .unwrap();
    ns
  }

  fn matched(ns: &Namespace, name: &str) -> Option<(String, String, String)> {
    ns.get_prefix_match(&Name::parse(name).unwrap())
      .map(|m| (m.decl.name().to_string(), m.retained_prefix, m.rest.to_string()))
  }

  fn m(decl: &str, retained: &str, rest: &str) -> Option<(String, String, String)> {
    Some((decl.to_string(), retained.to_string(), rest.to_string()))
  }

  // ==========================================================================
  // Qualified lookup
  // ==========================================================================

  #[test]
  fn get_decl_by_qualified_name() {
    let ns = namespace();
    assert!(matches!(ns.get_decl("mylib"), Some(Decl::Target(t)) if t.name == "mylib"));
    assert!(matches!(ns.get_decl("pkg/flags"), Some(Decl::Property(_))));
    assert!(matches!(ns.get_decl("pkg"), Some(Decl::Namespace(n)) if n.name == "pkg"));
    assert!(ns.get_decl("deep/a").is_none(), "implicit namespaces have no decl");
    assert!(ns.get_decl("mylib/inner").is_none());
    assert!(ns.get_decl("nothing").is_none());
  }

  #[test]
  fn target_defs_are_not_inherited() {
    let ns = namespace();
    assert!(ns.get_target_def("pkg/cc").is_some());
    assert!(ns.get_target_def("cc").is_none());
    assert!(ns.get_target_def("pkg/out/cc").is_none());
  }

  #[test]
  fn duplicates_are_rejected() {
    let mut ns = namespace();
    let err = ns.declare_target(target("mylib")).unwrap_err();
    assert!(matches!(err, Error::DuplicateDeclaration { ref name, .. } if name == "mylib"));

    // A target cannot act as a namespace.
    assert!(ns.declare_property(property("mylib/x")).is_err());

    // An explicit namespace cannot be declared twice.
    let again = ns.declare_namespace(Rc::new(NamespaceDecl {
      name: "pkg".to_string(),
      location: loc(),
    }));
    assert!(again.is_err());
  }

  // ==========================================================================
  // Prefix matching
  // ==========================================================================

  #[test]
  fn prefix_match_on_declared_target() {
    let ns = namespace();
    assert_eq!(matched(&ns, "mylib/lib/*"), m("mylib", "mylib", "lib/*"));
    assert_eq!(matched(&ns, "other/lib/*"), None);
  }

  #[test]
  fn prefix_match_whole_name() {
    let ns = namespace();
    assert_eq!(matched(&ns, "mylib"), m("mylib", "mylib", ""));
    assert_eq!(matched(&ns, "pkg/out"), m("pkg/out", "pkg/out", ""));
  }

  #[test]
  fn prefix_match_stops_before_last_component() {
    let ns = namespace();
    assert_eq!(matched(&ns, "mylib/include/foo.h"), m("mylib", "mylib", "include/foo.h"));
  }

  #[test]
  fn prefix_match_through_namespaces() {
    let ns = namespace();
    assert_eq!(matched(&ns, "deep/a/b/leaf/x/*.o"), m("deep/a/b/leaf", "deep/a/b/leaf", "x/*.o"));
    assert_eq!(matched(&ns, "deep/a/*"), None);
    assert_eq!(matched(&ns, "deep/a/missing/*"), None);
  }

  #[test]
  fn prefix_match_with_selector_keeps_text_after_colon() {
    let ns = namespace();
    assert_eq!(matched(&ns, "pkg:out/x.h"), m("pkg/out", "out", "x.h"));
    assert_eq!(matched(&ns, "pkg:flags"), m("pkg/flags", "flags", ""));
  }

  #[test]
  fn prefix_match_ending_at_colon() {
    let ns = namespace();
    assert_eq!(matched(&ns, "mylib:"), m("mylib", "mylib", ""));
    assert_eq!(matched(&ns, "mylib:debug/*.a"), m("mylib", "mylib", "debug/*.a"));
    assert_eq!(matched(&ns, "pkg:"), None);
  }

  #[test]
  fn glob_immediately_after_prefix() {
    let ns = namespace();
    assert_eq!(matched(&ns, "mylib/*"), m("mylib", "mylib", "*"));
    // The glob is in the first component, so there is no literal path prefix.
    assert_eq!(matched(&ns, "mylib*"), None);
    assert_eq!(matched(&ns, "*/lib"), None);
  }

  #[test]
  fn variables_block_prefix_matching() {
    let ns = namespace();
    assert_eq!(matched(&ns, "${x}/lib"), None);
    assert_eq!(matched(&ns, "mylib/${x}"), m("mylib", "mylib", "${x}"));
  }
}
