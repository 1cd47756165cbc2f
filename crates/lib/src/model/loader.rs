//! Loading build files and their includes.
//!
//! The [`Loader`] reads build files through a [`SourceTree`], hands their text
//! to a [`BuildFileParser`], and follows `include` declarations relative to the
//! including file. It belongs to one session: its per-path cache is dropped
//! with it, so separate sessions never share loaded files.
//!
//! Include cycles are caught two ways: a path already on the including chain,
//! and a path whose pending load already waits, through includes recorded so
//! far, on a file of that chain. The second covers files that reach each other
//! through separate branches of the include tree.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, info};

use crate::cache::BuildCache;
use crate::computable::Computable;
use crate::consts::NAME_COMPONENT_SEPARATOR;
use crate::error::{Error, Result};
use crate::files::SourceTree;
use crate::model::build_model::BuildModel;
use crate::model::decl::{BuildFile, Declaration};
use crate::rules::RuleRegistry;

/// Everything a parser extracts from one build file.
#[derive(Debug)]
pub struct BuildFileContents {
  pub file: Rc<BuildFile>,
  /// Included files, as written (relative to the including file).
  pub includes: Vec<String>,
  pub declarations: Vec<Declaration>,
}

/// Turns build-file text into declarations.
pub trait BuildFileParser {
  fn parse(&self, file: Rc<BuildFile>, text: &str) -> Result<BuildFileContents>;
}

/// Loaded files by path.
pub type BuildFiles = BTreeMap<String, Rc<BuildFileContents>>;

pub struct Loader {
  tree: Rc<dyn SourceTree>,
  parser: Rc<dyn BuildFileParser>,
  loaded: RefCell<HashMap<String, Computable<Rc<BuildFiles>>>>,
  /// Paths each file has asked to include so far.
  includes: RefCell<HashMap<String, Vec<String>>>,
}

impl Loader {
  pub fn new(tree: Rc<dyn SourceTree>, parser: Rc<dyn BuildFileParser>) -> Rc<Self> {
    Rc::new(Self {
      tree,
      parser,
      loaded: RefCell::new(HashMap::new()),
      includes: RefCell::new(HashMap::new()),
    })
  }

  /// Load `path` and everything it includes, directly or indirectly.
  pub fn load(self: &Rc<Self>, path: &str) -> Computable<Rc<BuildFiles>> {
    self.load_file(normalize(path), Vec::new())
  }

  /// Load a project starting at `path` and assemble its build model.
  pub fn load_project(self: &Rc<Self>, path: &str, rules: RuleRegistry, cache: BuildCache) -> Computable<BuildModel> {
    self.load(path).map(move |files| {
      info!(files = files.len(), "loaded build files");
      BuildModel::from_files(files.values().cloned(), rules, cache)
    })
  }

  fn load_file(self: &Rc<Self>, path: String, mut chain: Vec<String>) -> Computable<Rc<BuildFiles>> {
    if chain.contains(&path) {
      chain.push(path);
      return Computable::reject(Error::CircularInclude {
        chain: chain.join(" -> "),
      });
    }

    let cached = self.loaded.borrow().get(&path).cloned();
    if let Some(existing) = cached {
      if !existing.is_settled() {
        if let Some(route) = self.pending_route(&path, &chain) {
          let start = chain.iter().position(|p| route.last() == Some(p)).unwrap_or(0);
          let mut cycle = chain.split_off(start);
          cycle.extend(route);
          debug!(path = %path, "include waits on an including file");
          return Computable::reject(Error::CircularInclude {
            chain: cycle.join(" -> "),
          });
        }
      }
      self.record_include(&chain, &path);
      return existing;
    }
    self.record_include(&chain, &path);

    debug!(path = %path, "loading build file");
    let loader = self.clone();
    let key = path.clone();
    let result = self.tree.get(&path).then(move |file| async move {
      let file = file.ok_or_else(|| Error::FileNotFound(path.clone()))?;
      let text = file.read_string().await?;
      let build_file = Rc::new(BuildFile::new(path.clone(), loader.tree.clone()));
      let contents = Rc::new(loader.parser.parse(build_file, &text)?);

      chain.push(path.clone());
      let children: Vec<_> = contents
        .includes
        .iter()
        .map(|include| loader.load_file(resolve_include(&path, include), chain.clone()))
        .collect();
      let children = Computable::for_all(children).await?;

      let mut files = BuildFiles::new();
      files.insert(path, contents);
      for child in children {
        files.extend(child.iter().map(|(k, v)| (k.clone(), v.clone())));
      }
      Ok(Rc::new(files))
    });

    self.loaded.borrow_mut().insert(key, result.clone());
    result
  }

  fn record_include(&self, chain: &[String], path: &str) {
    if let Some(parent) = chain.last() {
      self
        .includes
        .borrow_mut()
        .entry(parent.clone())
        .or_default()
        .push(path.to_string());
    }
  }

  /// Include route from `path`, through files still loading, to a file on `chain`.
  fn pending_route(&self, path: &str, chain: &[String]) -> Option<Vec<String>> {
    let includes = self.includes.borrow();
    let loaded = self.loaded.borrow();
    let mut seen = HashSet::new();
    let mut routes = vec![vec![path.to_string()]];
    while let Some(route) = routes.pop() {
      let Some(node) = route.last() else { continue };
      if chain.contains(node) {
        return Some(route);
      }
      if !seen.insert(node.clone()) || !loaded.get(node).is_some_and(|c| !c.is_settled()) {
        continue;
      }
      for next in includes.get(node).into_iter().flatten() {
        let mut extended = route.clone();
        extended.push(next.clone());
        routes.push(extended);
      }
    }
    None
  }
}

/// Resolve `include` against the directory of `from`.
fn resolve_include(from: &str, include: &str) -> String {
  if include.starts_with(NAME_COMPONENT_SEPARATOR) {
    return normalize(include);
  }
  match from.rfind(NAME_COMPONENT_SEPARATOR) {
    Some(idx) => normalize(&format!("{}/{}", &from[..idx], include)),
    None => normalize(include),
  }
}

/// Collapse `.` and `..` components and repeated separators.
fn normalize(path: &str) -> String {
  let absolute = path.starts_with(NAME_COMPONENT_SEPARATOR);
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split(NAME_COMPONENT_SEPARATOR) {
    match part {
      "" | "." => {}
      ".." => {
        if matches!(parts.last(), Some(last) if *last != "..") {
          parts.pop();
        } else if !absolute {
          parts.push("..");
        }
      }
      _ => parts.push(part),
    }
  }
  let joined = parts.join("/");
  if absolute { format!("/{joined}") } else { joined }
}
