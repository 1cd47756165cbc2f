//! The build model: declarations, rules, and the per-configuration contexts.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::cache::BuildCache;
use crate::error::{Error, Result};
use crate::model::context::{BuildContext, ContextId};
use crate::model::decl::{Decl, Declaration, TargetDefDecl};
use crate::model::loader::BuildFileContents;
use crate::model::namespace::{Namespace, PrefixMatch};
use crate::model::property::Constraints;
use crate::name::Name;
use crate::rules::RuleRegistry;

pub(crate) struct ModelInner {
  pub(crate) root: Namespace,
  pub(crate) rules: RuleRegistry,
  pub(crate) cache: BuildCache,
  configs: RefCell<HashMap<Constraints, Rc<BuildContext>>>,
  next_id: Cell<u64>,
}

impl ModelInner {
  /// The context for `constraints`, created on first use.
  pub(crate) fn config(self: &Rc<Self>, constraints: Constraints) -> Rc<BuildContext> {
    if let Some(context) = self.configs.borrow().get(&constraints) {
      return context.clone();
    }

    let id = ContextId(self.next_id.get());
    self.next_id.set(id.0 + 1);
    debug!(context = id.0, constraints = ?constraints, "creating build context");

    let context = Rc::new(BuildContext::new(id, Rc::downgrade(self), constraints.clone()));
    self.configs.borrow_mut().insert(constraints, context.clone());
    context
  }
}

/// A loaded build description for one session.
///
/// Cloning is cheap and shares the model. Contexts handed out by
/// [`BuildModel::get_config`] stop resolving with
/// [`Error::SessionClosed`] once every clone of the model is dropped.
#[derive(Clone)]
pub struct BuildModel {
  inner: Rc<ModelInner>,
}

impl BuildModel {
  pub fn new(root: Namespace, rules: RuleRegistry, cache: BuildCache) -> Self {
    Self {
      inner: Rc::new(ModelInner {
        root,
        rules,
        cache,
        configs: RefCell::new(HashMap::new()),
        next_id: Cell::new(0),
      }),
    }
  }

  /// Assemble a model from parsed build files.
  ///
  /// # Errors
  ///
  /// - [`Error::DuplicateDeclaration`] if two declarations share a qualified name
  /// - [`Error::UnknownTargetType`] if a target's type has no target definition
  pub fn from_files(
    files: impl IntoIterator<Item = Rc<BuildFileContents>>,
    rules: RuleRegistry,
    cache: BuildCache,
  ) -> Result<Self> {
    let mut root = Namespace::new();
    let mut targets = Vec::new();
    let mut count = 0;

    for contents in files {
      count += 1;
      for declaration in &contents.declarations {
        match declaration {
          Declaration::Target(t) => {
            root.declare_target(t.clone())?;
            targets.push(t.clone());
          }
          Declaration::Property(p) => root.declare_property(p.clone())?,
          Declaration::Namespace(n) => root.declare_namespace(n.clone())?,
          Declaration::TargetDef(d) => root.declare_target_def(d.clone())?,
        }
      }
    }

    for target in &targets {
      if root.get_target_def(&target.rule_type).is_none() {
        return Err(Error::UnknownTargetType {
          rule_type: target.rule_type.clone(),
          target: target.name.clone(),
          location: target.location.to_string(),
        });
      }
    }

    info!(files = count, targets = targets.len(), "build model assembled");
    Ok(Self::new(root, rules, cache))
  }

  /// The context for `constraints`. Equal constraint sets share one context.
  pub fn get_config(&self, constraints: Constraints) -> Rc<BuildContext> {
    self.inner.config(constraints)
  }

  pub fn get_decl(&self, name: &str) -> Option<Decl> {
    self.inner.root.get_decl(name)
  }

  pub fn get_target_def(&self, name: &str) -> Option<Rc<TargetDefDecl>> {
    self.inner.root.get_target_def(name)
  }

  pub fn get_prefix_match(&self, name: &Name) -> Option<PrefixMatch> {
    self.inner.root.get_prefix_match(name)
  }

  pub fn root(&self) -> &Namespace {
    &self.inner.root
  }

  pub fn rules(&self) -> &RuleRegistry {
    &self.inner.rules
  }

  pub fn build_cache(&self) -> &BuildCache {
    &self.inner.cache
  }

  /// Number of contexts created so far.
  pub fn config_count(&self) -> usize {
    self.inner.configs.borrow().len()
  }
}

impl std::fmt::Debug for BuildModel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildModel")
      .field("rules", &self.inner.rules)
      .field("configs", &self.config_count())
      .finish_non_exhaustive()
  }
}
