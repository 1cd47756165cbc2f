//! The resolution stack.
//!
//! An immutable linked list of the property assignments currently being
//! resolved. Extending it never mutates a frame, so every in-flight resolution
//! keeps the exact chain that led to it. It is used to detect cycles and to
//! render traces for diagnostics.

use std::rc::Rc;

use crate::model::context::ContextId;
use crate::model::decl::{PropertyDecl, SourceLocation, TargetDecl};

#[derive(Debug)]
struct Frame {
  context: ContextId,
  target: Option<Rc<TargetDecl>>,
  property: Rc<PropertyDecl>,
  location: SourceLocation,
  next: Option<Rc<Frame>>,
}

impl Frame {
  /// Name of the declaration this frame resolves: the target for target
  /// properties, otherwise the property itself.
  fn decl_name(&self) -> &str {
    match &self.target {
      Some(target) => &target.name,
      None => &self.property.name,
    }
  }

  fn render(&self) -> String {
    match &self.target {
      Some(target) => format!("    at {}.{} ({})", target.name, self.property.name, self.location),
      None => format!("    at {} ({})", self.property.name, self.location),
    }
  }
}

/// A chain of in-progress resolutions, innermost first.
#[derive(Debug, Clone, Default)]
pub struct DependencyStack {
  head: Option<Rc<Frame>>,
}

impl DependencyStack {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  /// A new stack with one more frame on top of this one.
  pub fn push(
    &self,
    context: ContextId,
    target: Option<&Rc<TargetDecl>>,
    property: &Rc<PropertyDecl>,
    location: &SourceLocation,
  ) -> DependencyStack {
    DependencyStack {
      head: Some(Rc::new(Frame {
        context,
        target: target.cloned(),
        property: property.clone(),
        location: location.clone(),
        next: self.head.clone(),
      })),
    }
  }

  /// Render the trace if `name` is already being resolved in `context`.
  ///
  /// The trace runs from the innermost frame down to and including the
  /// frame that started resolving `name`.
  pub fn find_cycle(&self, name: &str, context: ContextId) -> Option<String> {
    let mut lines = Vec::new();
    let mut node = self.head.as_deref();
    while let Some(frame) = node {
      lines.push(frame.render());
      if frame.context == context && frame.decl_name() == name {
        return Some(lines.join("\n"));
      }
      node = frame.next.as_deref();
    }
    None
  }

  /// The declaration the innermost frame resolves, if that frame belongs to `context`.
  pub(crate) fn innermost(&self, context: ContextId) -> Option<&str> {
    self
      .head
      .as_deref()
      .filter(|frame| frame.context == context)
      .map(Frame::decl_name)
  }

  /// Render every frame, innermost first.
  pub fn render(&self) -> String {
    let mut lines = Vec::new();
    let mut node = self.head.as_deref();
    while let Some(frame) = node {
      lines.push(frame.render());
      node = frame.next.as_deref();
    }
    lines.join("\n")
  }

  /// Number of frames.
  pub fn depth(&self) -> usize {
    let mut depth = 0;
    let mut node = self.head.as_deref();
    while let Some(frame) = node {
      depth += 1;
      node = frame.next.as_deref();
    }
    depth
  }
}
