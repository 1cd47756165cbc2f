use crate::computable::Computable;
use crate::files::{File, FileSource};
use crate::name::Name;

/// A tree of source files addressed by `/`-separated relative paths.
///
/// Build files are read through a tree, and file references that do not name
/// a target are looked up in the tree of the build file declaring them.
pub trait SourceTree {
  /// The file at `path`, or `None` if there is no such file.
  fn get(&self, path: &str) -> Computable<Option<File>>;

  /// Files matching `pattern`.
  ///
  /// A glob-free pattern names exactly one file and yields
  /// [`FileSource::File`], failing with `FileNotFound` if it does not exist.
  /// A glob yields a (possibly empty) [`FileSource::Set`].
  fn find(&self, pattern: &Name) -> Computable<FileSource>;
}
