//! Constraint-scoped resolution of properties and targets.
//!
//! A [`BuildContext`] is the build model under one set of [`Constraints`]. It
//! resolves names lazily and memoizes every request: asking twice for the same
//! name returns the identical [`Computable`], so the work behind it runs once
//! no matter how many dependents share it.
//!
//! # Errors
//!
//! A request fails synchronously (`Err` from the request method, before any
//! future exists) for an unresolved name, a cycle, a missing rule, or a target
//! property with no type, including such a failure in a target named literally
//! by one of its file references. Everything else, including failures of file
//! lookups and rules, rejects the returned `Computable`.
//!
//! # Cycles
//!
//! Each request carries the [`DependencyStack`] that led to it. A request for
//! a name that already appears on the stack for the same context is a cycle.
//! Variable substitution and literal file references are requested eagerly,
//! so cycles through them are caught synchronously.
//!
//! A file reference containing variables names its target only once the
//! variables are known, so that target is requested from inside the pending
//! computation. The context records which names each request waits on; a
//! request that hits a pending entry which already waits, directly or
//! transitively, on the requester rejects instead of waiting forever.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::computable::Computable;
use crate::error::{Error, Result};
use crate::files::{FileSet, FileSource};
use crate::model::build_model::ModelInner;
use crate::model::decl::{BuildFile, Decl, PropertyDecl, PropertyType, TargetDecl};
use crate::model::property::{Constraints, Property};
use crate::model::stack::DependencyStack;
use crate::name::Name;
use crate::rules::{PropertyValue, ResolvedTarget};

/// Identity of a context within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u64);

pub struct BuildContext {
  id: ContextId,
  model: Weak<ModelInner>,
  constraints: Constraints,
  properties: RefCell<HashMap<String, Computable<Property>>>,
  targets: RefCell<HashMap<String, Computable<Vec<FileSource>>>>,
  /// Names requested on behalf of each name's resolution.
  waits: RefCell<HashMap<String, HashSet<String>>>,
}

impl BuildContext {
  pub(crate) fn new(id: ContextId, model: Weak<ModelInner>, constraints: Constraints) -> Self {
    // Constraint values are resolved up front and never go through resolution.
    let properties = constraints
      .iter()
      .map(|(name, value)| (name.clone(), Computable::resolve(value.clone())))
      .collect();
    Self {
      id,
      model,
      constraints,
      properties: RefCell::new(properties),
      targets: RefCell::new(HashMap::new()),
      waits: RefCell::new(HashMap::new()),
    }
  }

  pub fn id(&self) -> ContextId {
    self.id
  }

  pub fn constraints(&self) -> &Constraints {
    &self.constraints
  }

  /// Whether this context was created for exactly `constraints`.
  pub fn has_constraints(&self, constraints: &Constraints) -> bool {
    &self.constraints == constraints
  }

  fn model(&self) -> Result<Rc<ModelInner>> {
    self.model.upgrade().ok_or(Error::SessionClosed)
  }

  /// Resolve a string property.
  pub fn get_property(self: &Rc<Self>, name: &str, stack: &DependencyStack) -> Result<Computable<Property>> {
    self.assert_non_circular(name, stack)?;

    let cached = self.properties.borrow().get(name).cloned();
    if let Some(existing) = cached {
      trace!(context = self.id.0, property = %name, "property cache hit");
      if !existing.is_settled() {
        self.assert_not_awaiting(name, stack)?;
      }
      self.record_wait(name, stack);
      return Ok(existing);
    }
    self.record_wait(name, stack);

    let prop = match self.model()?.root.get_decl(name) {
      Some(Decl::Property(prop)) => prop,
      _ => return Err(Error::UnresolvedName { name: name.to_string() }),
    };

    debug!(context = self.id.0, property = %name, "resolving property");
    let result = self.resolve_string_property(&prop, None, stack)?;
    self.properties.borrow_mut().insert(name.to_string(), result.clone());
    Ok(result)
  }

  /// Resolve a target, or a property, to the files it stands for.
  pub fn get_target(self: &Rc<Self>, name: &str, stack: &DependencyStack) -> Result<Computable<Vec<FileSource>>> {
    self.assert_non_circular(name, stack)?;

    let cached = self.targets.borrow().get(name).cloned();
    if let Some(existing) = cached {
      trace!(context = self.id.0, target_name = %name, "target cache hit");
      if !existing.is_settled() {
        self.assert_not_awaiting(name, stack)?;
      }
      self.record_wait(name, stack);
      return Ok(existing);
    }
    self.record_wait(name, stack);

    let result = match self.model()?.root.get_decl(name) {
      Some(Decl::Target(target)) => {
        debug!(context = self.id.0, target_name = %name, "resolving target");
        self.resolve_target(&target, stack)?.map(|source| Ok(vec![source]))
      }
      Some(Decl::Property(prop)) => {
        debug!(context = self.id.0, property = %name, "resolving file property");
        self.resolve_file_property(&prop, None, stack)?
      }
      Some(Decl::Namespace(_)) | None => return Err(Error::UnresolvedName { name: name.to_string() }),
    };
    self.targets.borrow_mut().insert(name.to_string(), result.clone());
    Ok(result)
  }

  /// Resolve a property in the context for these constraints plus `overrides`.
  pub fn get_property_with_overrides(&self, name: &str, overrides: &Constraints) -> Result<Computable<Property>> {
    self
      .with_overrides(overrides)?
      .get_property(name, &DependencyStack::new())
  }

  /// Resolve a target in the context for these constraints plus `overrides`.
  pub fn get_target_with_overrides(
    &self,
    name: &str,
    overrides: &Constraints,
  ) -> Result<Computable<Vec<FileSource>>> {
    self.with_overrides(overrides)?.get_target(name, &DependencyStack::new())
  }

  fn with_overrides(&self, overrides: &Constraints) -> Result<Rc<BuildContext>> {
    let mut combined = self.constraints.clone();
    combined.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(self.model()?.config(combined))
  }

  /// Resolve the target named by the literal prefix of `name`.
  ///
  /// Returns the target's files together with what is left of `name`, or
  /// `None` when no declared target or property prefixes it.
  pub fn get_prefix_target_if_exists(
    self: &Rc<Self>,
    name: &Name,
    stack: &DependencyStack,
  ) -> Result<Option<(Computable<Vec<FileSource>>, Name)>> {
    let Some(found) = self.model()?.root.get_prefix_match(name) else {
      return Ok(None);
    };
    debug!(
      context = self.id.0,
      reference = %name,
      decl = found.decl.name(),
      rest = %found.rest,
      "resolved name prefix"
    );
    let target = self.get_target(found.decl.name(), stack)?;
    Ok(Some((target, found.rest)))
  }

  /// Fetch a build cache entry, creating it with `create` if needed.
  pub fn get_cached_or_build<F>(&self, manifest: &str, create: F) -> Computable<FileSet>
  where
    F: FnOnce(std::path::PathBuf) -> Computable<FileSet> + 'static,
  {
    match self.model() {
      Ok(model) => model.cache.get_or_create(manifest, create),
      Err(e) => Computable::reject(e),
    }
  }

  fn assert_non_circular(&self, name: &str, stack: &DependencyStack) -> Result<()> {
    match stack.find_cycle(name, self.id) {
      Some(trace) => Err(Error::CircularDependency {
        name: name.to_string(),
        trace,
      }),
      None => Ok(()),
    }
  }

  /// Fail if the pending entry for `name` already waits, through earlier
  /// requests, on a name this request is resolving on behalf of.
  fn assert_not_awaiting(&self, name: &str, stack: &DependencyStack) -> Result<()> {
    let waits = self.waits.borrow();
    let mut seen = HashSet::new();
    let mut queue = vec![name];
    while let Some(node) = queue.pop() {
      if !seen.insert(node) {
        continue;
      }
      if let Some(trace) = stack.find_cycle(node, self.id) {
        debug!(context = self.id.0, reference = %name, waiting = %node, "pending request waits on requester");
        return Err(Error::CircularDependency {
          name: name.to_string(),
          trace,
        });
      }
      if !self.is_pending(node) {
        continue;
      }
      if let Some(next) = waits.get(node) {
        queue.extend(next.iter().map(String::as_str));
      }
    }
    Ok(())
  }

  fn record_wait(&self, name: &str, stack: &DependencyStack) {
    if let Some(requester) = stack.innermost(self.id) {
      self
        .waits
        .borrow_mut()
        .entry(requester.to_string())
        .or_default()
        .insert(name.to_string());
    }
  }

  /// Whether `name` has a memoized entry that has not settled yet.
  fn is_pending(&self, name: &str) -> bool {
    let targets = self.targets.borrow().get(name).is_some_and(|c| !c.is_settled());
    targets || self.properties.borrow().get(name).is_some_and(|c| !c.is_settled())
  }

  /// One string per assignment, in assignment order.
  fn resolve_string_property(
    self: &Rc<Self>,
    prop: &Rc<PropertyDecl>,
    target: Option<&Rc<TargetDecl>>,
    stack: &DependencyStack,
  ) -> Result<Computable<Property>> {
    let values = prop
      .values
      .iter()
      .map(|value| {
        let frame = stack.push(self.id, target, prop, &value.location);
        self.substitute_name_vars(&value.name, &frame)
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Computable::for_all(values).map(|names| Ok(Property::new(names.iter().map(Name::to_string).collect()))))
  }

  /// The files of every assignment, flattened in assignment order.
  fn resolve_file_property(
    self: &Rc<Self>,
    prop: &Rc<PropertyDecl>,
    target: Option<&Rc<TargetDecl>>,
    stack: &DependencyStack,
  ) -> Result<Computable<Vec<FileSource>>> {
    let sources = prop
      .values
      .iter()
      .map(|value| {
        let frame = stack.push(self.id, target, prop, &value.location);
        self.resolve_file_source(&value.name, prop, frame)
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Computable::for_all(sources).map(|lists| Ok(lists.into_iter().flatten().collect())))
  }

  fn resolve_file_source(
    self: &Rc<Self>,
    name: &Name,
    declared_in: &Rc<PropertyDecl>,
    stack: DependencyStack,
  ) -> Result<Computable<Vec<FileSource>>> {
    if !name.has_variables() {
      return self.resolve_substituted_source(name, &declared_in.source, &stack);
    }

    let context = self.clone();
    let source = declared_in.source.clone();
    let substituted = self.substitute_name_vars(name, &stack)?;

    Ok(substituted.then(move |name| {
      context
        .resolve_substituted_source(&name, &source, &stack)
        .unwrap_or_else(Computable::reject)
    }))
  }

  /// Files for a variable-free name: a target's outputs (or a selection from
  /// them) when a declaration prefixes it, otherwise source files.
  fn resolve_substituted_source(
    self: &Rc<Self>,
    name: &Name,
    source: &Rc<BuildFile>,
    stack: &DependencyStack,
  ) -> Result<Computable<Vec<FileSource>>> {
    if name.is_empty() {
      return Ok(Computable::resolve(Vec::new()));
    }
    Ok(match self.get_prefix_target_if_exists(name, stack)? {
      Some((target, rest)) if rest.is_empty() => target,
      Some((target, rest)) => target.map(move |files| Ok(vec![FileSource::Set(FileSet::find_all(&files, &rest)?)])),
      None => source.tree.find(&name.relative_to(source.dir())).map(|found| Ok(vec![found])),
    })
  }

  fn substitute_name_vars(self: &Rc<Self>, name: &Name, stack: &DependencyStack) -> Result<Computable<Name>> {
    if !name.has_variables() {
      return Ok(Computable::resolve(name.clone()));
    }

    let vars: Vec<String> = name.variables().into_iter().map(str::to_string).collect();
    let values = vars
      .iter()
      .map(|var| self.get_property(var, stack))
      .collect::<Result<Vec<_>>>()?;

    let name = name.clone();
    Ok(Computable::for_all(values).map(move |props| {
      let values: Vec<String> = props.iter().map(Property::to_string).collect();
      Ok(name.substitute(&vars, &values))
    }))
  }

  fn resolve_target(self: &Rc<Self>, target: &Rc<TargetDecl>, stack: &DependencyStack) -> Result<Computable<FileSource>> {
    let model = self.model()?;
    let target_def = model.root.get_target_def(&target.rule_type).ok_or_else(|| {
      Error::Internal(format!(
        "target definition '{}' for '{}' not found",
        target.rule_type, target.name
      ))
    })?;
    let rule = model.rules.lookup(&target.rule_type).ok_or_else(|| Error::MissingRule {
      rule_type: target.rule_type.clone(),
      target: target.name.clone(),
      location: target.location.to_string(),
      trace: stack.render(),
    })?;

    let mut names = Vec::with_capacity(target.properties.len());
    let mut resolved = Vec::with_capacity(target.properties.len());
    for prop in &target.properties {
      let kind = target_def
        .properties
        .get(&prop.name)
        .ok_or_else(|| Error::UnsupportedPropertyType {
          target: target.name.clone(),
          property: prop.name.clone(),
          location: prop.location.to_string(),
        })?;
      let value = match kind {
        PropertyType::String | PropertyType::StringList => self
          .resolve_string_property(prop, Some(target), stack)?
          .map(|p| Ok(PropertyValue::Strings(p))),
        PropertyType::FileSet | PropertyType::FileSetList => self
          .resolve_file_property(prop, Some(target), stack)?
          .map(|f| Ok(PropertyValue::Files(f))),
      };
      names.push(prop.name.clone());
      resolved.push(value);
    }

    let context = self.clone();
    let target_name = target.name.clone();
    Ok(Computable::for_all(resolved).then(move |values| {
      let properties: BTreeMap<String, PropertyValue> = names.into_iter().zip(values).collect();
      debug!(context = context.id.0, target_name = %target_name, "evaluating rule");
      rule.evaluate(ResolvedTarget::new(target_name, properties), context)
    }))
  }
}

impl std::fmt::Debug for BuildContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildContext")
      .field("id", &self.id)
      .field("constraints", &self.constraints)
      .finish_non_exhaustive()
  }
}
