//! Structured names: literal text, glob patterns, and variable references.
//!
//! A [`Name`] is what build files use for target names, property values, and
//! file patterns. It is an ordered list of [`Segment`]s:
//!
//! - `Literal` - text matched or emitted verbatim
//! - `Glob` - live glob metacharacters (`*`, `?`, `[...]`)
//! - `Var` - a `${VAR}` reference, replaced by [`Name::substitute`]
//!
//! # Invariants
//!
//! - A name is never empty: the empty name is a single empty `Literal`.
//! - Adjacent `Literal` segments (and adjacent `Glob` segments) are always
//!   coalesced. `Var` segments stay distinct so each can be substituted; after
//!   substitution the surrounding runs coalesce again, so a substituted name is
//!   indistinguishable from one built without variables.
//!
//! # Escapes
//!
//! Double-quoted and unquoted text decode backslash sequences:
//!
//! | sequence | result |
//! |---|---|
//! | `\0ooo` | octal byte (up to three digits after the `0`) |
//! | `\ooo` (leading `1`-`7`) | octal byte (up to three digits) |
//! | `\xHH` | hex byte |
//! | `\a \b \e \f \n \r \t \v` | control characters |
//! | `\` + anything else | that character |
//!
//! # Example
//!
//! ```
//! use fabr_lib::name::Name;
//!
//! let name = Name::parse("prefix-${VAR}-suffix").unwrap();
//! assert_eq!(name.variables(), vec!["VAR"]);
//!
//! let done = name.substitute(&["VAR"], &["X"]);
//! assert_eq!(done.simple_name(), Some("prefix-X-suffix"));
//! ```

use std::collections::HashMap;
use std::fmt;

use glob::{MatchOptions, Pattern};

use crate::consts::NAME_COMPONENT_SEPARATOR;
use crate::error::{Error, Result};

/// One run of a [`Name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
  /// Literal text.
  Literal(String),
  /// Live glob metacharacters.
  Glob(String),
  /// A variable reference, by variable name.
  Var(String),
}

impl Segment {
  fn text(&self) -> &str {
    match self {
      Segment::Literal(s) | Segment::Glob(s) | Segment::Var(s) => s,
    }
  }
}

/// A parsed literal/glob/variable expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
  segments: Vec<Segment>,
}

impl Default for Name {
  fn default() -> Self {
    Self::empty()
  }
}

impl Name {
  /// The empty name.
  pub fn empty() -> Self {
    Self {
      segments: vec![Segment::Literal(String::new())],
    }
  }

  /// A name consisting of a single literal.
  pub fn literal(text: impl Into<String>) -> Self {
    Self {
      segments: vec![Segment::Literal(text.into())],
    }
  }

  /// Build a name from arbitrary segments, applying the coalescing rules.
  pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
    let mut builder = NameBuilder::new();
    for segment in segments {
      builder.push(segment);
    }
    builder.finish()
  }

  /// Parse unquoted name text.
  ///
  /// `${VAR}` introduces a variable reference, glob metacharacters are live,
  /// and backslash escapes are decoded. A `$` not followed by `{` is literal.
  ///
  /// # Errors
  ///
  /// Returns [`Error::NameSyntax`] for an unterminated or empty `${...}`.
  pub fn parse(input: &str) -> Result<Self> {
    let mut builder = NameBuilder::new();
    let mut text = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
      match ch {
        '\\' => {
          // Keep the escape intact for append_unquoted, including the escaped char.
          text.push(ch);
          if let Some((_, next)) = chars.next() {
            text.push(next);
          }
        }
        '$' if matches!(chars.peek(), Some((_, '{'))) => {
          chars.next();
          let mut var = String::new();
          let mut closed = false;
          for (_, c) in chars.by_ref() {
            if c == '}' {
              closed = true;
              break;
            }
            var.push(c);
          }
          if !closed {
            return Err(Error::NameSyntax {
              input: input.to_string(),
              position: pos,
              message: "unterminated variable reference".to_string(),
            });
          }
          if var.is_empty() {
            return Err(Error::NameSyntax {
              input: input.to_string(),
              position: pos,
              message: "empty variable reference".to_string(),
            });
          }
          builder.append_unquoted(&std::mem::take(&mut text));
          builder.append_subst_var(&var);
        }
        _ => text.push(ch),
      }
    }

    builder.append_unquoted(&text);
    Ok(builder.finish())
  }

  /// The segments of this name.
  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Whether this is a single literal (possibly empty) needing no substitution or globbing.
  pub fn is_simple_name(&self) -> bool {
    matches!(self.segments.as_slice(), [Segment::Literal(_)])
  }

  /// Whether this is the empty name.
  pub fn is_empty(&self) -> bool {
    matches!(self.segments.as_slice(), [Segment::Literal(s)] if s.is_empty())
  }

  /// The literal text, if this is a simple name.
  pub fn simple_name(&self) -> Option<&str> {
    match self.segments.as_slice() {
      [Segment::Literal(s)] => Some(s),
      _ => None,
    }
  }

  pub fn has_glob(&self) -> bool {
    self.segments.iter().any(|s| matches!(s, Segment::Glob(_)))
  }

  pub fn has_variables(&self) -> bool {
    self.segments.iter().any(|s| matches!(s, Segment::Var(_)))
  }

  /// Variable names in order of occurrence, duplicates included.
  pub fn variables(&self) -> Vec<&str> {
    self
      .segments
      .iter()
      .filter_map(|s| match s {
        Segment::Var(v) => Some(v.as_str()),
        _ => None,
      })
      .collect()
  }

  /// Replace variable references with literal values.
  ///
  /// `variables` and `values` pair up positionally (as returned by
  /// [`Name::variables`]). References to variables not listed are left in
  /// place.
  pub fn substitute<V, S>(&self, variables: &[V], values: &[S]) -> Name
  where
    V: AsRef<str>,
    S: AsRef<str>,
  {
    let map: HashMap<&str, &str> = variables
      .iter()
      .map(AsRef::as_ref)
      .zip(values.iter().map(AsRef::as_ref))
      .collect();

    Name::from_segments(self.segments.iter().map(|segment| match segment {
      Segment::Var(v) => match map.get(v.as_str()) {
        Some(value) => Segment::Literal((*value).to_string()),
        None => segment.clone(),
      },
      _ => segment.clone(),
    }))
  }

  /// The first segment's text if it is a literal, otherwise empty.
  pub fn literal_prefix(&self) -> &str {
    match self.segments.first() {
      Some(Segment::Literal(s)) => s,
      _ => "",
    }
  }

  /// The fixed, glob-free and variable-free path prefix of this name.
  ///
  /// If anything follows the leading literal, the literal is cut at its last
  /// separator so a pattern in the final path component never leaks into the
  /// prefix: `src/bar/foo*.ts` gives `src/bar`.
  pub fn literal_path_prefix(&self) -> &str {
    let prefix = self.literal_prefix();
    if self.segments.len() == 1 {
      return prefix;
    }
    match prefix.rfind(NAME_COMPONENT_SEPARATOR) {
      Some(idx) => &prefix[..idx],
      None => "",
    }
  }

  /// Remove `prefix` (and a separator directly following it) from the start of the name.
  ///
  /// Returns an unchanged copy when the leading literal does not start with
  /// `prefix`. For example `mylib/lib/*` without `mylib` is `lib/*`.
  pub fn without_prefix(&self, prefix: &str) -> Name {
    match self.segments.first() {
      Some(Segment::Literal(head)) => match head.strip_prefix(prefix) {
        Some(rest) => self.with_head(rest.strip_prefix(NAME_COMPONENT_SEPARATOR).unwrap_or(rest)),
        None => self.clone(),
      },
      _ => self.clone(),
    }
  }

  /// Drop the first `len` bytes of the leading literal (clamped to its length).
  pub(crate) fn skip_literal(&self, len: usize) -> Name {
    match self.segments.first() {
      Some(Segment::Literal(head)) => {
        let rest = head.get(len.min(head.len())..).unwrap_or("");
        self.with_head(rest)
      }
      _ => self.clone(),
    }
  }

  /// Resolve this name relative to a directory.
  ///
  /// Absolute names and an empty directory leave the name unchanged.
  pub fn relative_to(&self, dir: &str) -> Name {
    if dir.is_empty() || self.literal_prefix().starts_with(NAME_COMPONENT_SEPARATOR) {
      return self.clone();
    }
    let mut head = dir.trim_end_matches(NAME_COMPONENT_SEPARATOR).to_string();
    head.push(NAME_COMPONENT_SEPARATOR);
    Name::from_segments(std::iter::once(Segment::Literal(head)).chain(self.segments.iter().cloned()))
  }

  /// Glob pattern text: literals escaped, globs live.
  pub fn to_pattern_string(&self) -> String {
    self
      .segments
      .iter()
      .map(|segment| match segment {
        Segment::Literal(s) => Pattern::escape(s),
        Segment::Glob(s) => s.clone(),
        Segment::Var(v) => Pattern::escape(&format!("${{{v}}}")),
      })
      .collect()
  }

  /// Compile this name into a glob pattern.
  pub fn to_pattern(&self) -> Result<Pattern> {
    let text = self.to_pattern_string();
    Pattern::new(&text).map_err(|e| Error::InvalidPattern {
      pattern: text.clone(),
      message: e.to_string(),
    })
  }

  /// Whether `path` matches this name as a glob. Wildcards never match `/`.
  pub fn matches(&self, path: &str) -> Result<bool> {
    if let Some(literal) = self.simple_name() {
      return Ok(literal == path);
    }
    Ok(self.to_pattern()?.matches_with(path, match_options()))
  }

  fn with_head(&self, head: &str) -> Name {
    let tail = self.segments[1..].iter().cloned();
    if head.is_empty() {
      Name::from_segments(tail)
    } else {
      Name::from_segments(std::iter::once(Segment::Literal(head.to_string())).chain(tail))
    }
  }
}

/// Options used whenever names are matched against paths.
pub fn match_options() -> MatchOptions {
  MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for segment in &self.segments {
      match segment {
        Segment::Var(v) => write!(f, "${{{v}}}")?,
        _ => f.write_str(segment.text())?,
      }
    }
    Ok(())
  }
}

impl From<&str> for Name {
  fn from(text: &str) -> Self {
    Name::literal(text)
  }
}

/// Incremental [`Name`] construction from the pieces a build-file parser sees.
#[derive(Debug, Default)]
pub struct NameBuilder {
  segments: Vec<Segment>,
}

impl NameBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  fn push(&mut self, segment: Segment) {
    if segment.text().is_empty() {
      return;
    }
    match (self.segments.last_mut(), &segment) {
      (Some(Segment::Literal(last)), Segment::Literal(s)) | (Some(Segment::Glob(last)), Segment::Glob(s)) => {
        last.push_str(s);
      }
      _ => self.segments.push(segment),
    }
  }

  /// Add characters taken literally, such as the contents of a single-quoted string.
  pub fn append_literal_string(&mut self, text: &str) -> &mut Self {
    self.push(Segment::Literal(text.to_string()));
    self
  }

  /// Add the contents of a double-quoted string: escapes decoded, result literal.
  pub fn append_escaped_string(&mut self, text: &str) -> &mut Self {
    self.push(Segment::Literal(unescape(text)));
    self
  }

  /// Add glob metacharacters, kept live.
  pub fn append_glob_metachars(&mut self, text: &str) -> &mut Self {
    self.push(Segment::Glob(text.to_string()));
    self
  }

  /// Add a variable reference.
  pub fn append_subst_var(&mut self, var: &str) -> &mut Self {
    self.push(Segment::Var(var.to_string()));
    self
  }

  /// Add unquoted text: `*`, `?` and `[...]` become live globs, everything
  /// else is decoded as in a double-quoted string.
  pub fn append_unquoted(&mut self, text: &str) -> &mut Self {
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
      match ch {
        '\\' => {
          literal.push(ch);
          if let Some(next) = chars.next() {
            literal.push(next);
          }
        }
        '*' | '?' => {
          self.append_escaped_string(&std::mem::take(&mut literal));
          self.append_glob_metachars(&ch.to_string());
        }
        '[' => {
          let class: String = chars.clone().take_while(|c| *c != ']').collect();
          let rest_len = chars.clone().count();
          if class.chars().count() < rest_len {
            // Closing bracket present.
            for _ in 0..=class.chars().count() {
              chars.next();
            }
            self.append_escaped_string(&std::mem::take(&mut literal));
            self.append_glob_metachars(&format!("[{class}]"));
          } else {
            literal.push(ch);
          }
        }
        _ => literal.push(ch),
      }
    }

    self.append_escaped_string(&literal);
    self
  }

  /// Take the accumulated name, leaving the builder empty.
  pub fn finish(&mut self) -> Name {
    let segments = std::mem::take(&mut self.segments);
    if segments.is_empty() {
      Name::empty()
    } else {
      Name { segments }
    }
  }
}

/// Decode backslash escape sequences.
pub fn unescape(text: &str) -> String {
  if !text.contains('\\') {
    return text.to_string();
  }

  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();

  while let Some(ch) = chars.next() {
    if ch != '\\' {
      out.push(ch);
      continue;
    }
    let Some(escaped) = chars.next() else {
      out.push('\\');
      break;
    };
    match escaped {
      '0' => {
        let digits = take_digits(&mut chars, 8, 3);
        out.push(code_point(&digits, 8));
      }
      '1'..='7' => {
        let mut digits = escaped.to_string();
        digits.push_str(&take_digits(&mut chars, 8, 2));
        out.push(code_point(&digits, 8));
      }
      'x' => {
        let lookahead: String = chars.clone().take(2).collect();
        if lookahead.len() == 2 && lookahead.chars().all(|c| c.is_ascii_hexdigit()) {
          chars.next();
          chars.next();
          out.push(code_point(&lookahead, 16));
        } else {
          out.push('x');
        }
      }
      'a' => out.push('\x07'),
      'b' => out.push('\x08'),
      'e' => out.push('\x1b'),
      'f' => out.push('\x0c'),
      'n' => out.push('\n'),
      'r' => out.push('\r'),
      't' => out.push('\t'),
      'v' => out.push('\x0b'),
      other => out.push(other),
    }
  }

  out
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, radix: u32, max: usize) -> String {
  let mut digits = String::new();
  while digits.len() < max {
    match chars.peek() {
      Some(c) if c.is_digit(radix) => {
        digits.push(*c);
        chars.next();
      }
      _ => break,
    }
  }
  digits
}

fn code_point(digits: &str, radix: u32) -> char {
  if digits.is_empty() {
    return '\0';
  }
  u32::from_str_radix(digits, radix)
    .ok()
    .and_then(char::from_u32)
    .unwrap_or(char::REPLACEMENT_CHARACTER)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lit(s: &str) -> Segment {
    Segment::Literal(s.to_string())
  }

  fn glob(s: &str) -> Segment {
    Segment::Glob(s.to_string())
  }

  fn var(s: &str) -> Segment {
    Segment::Var(s.to_string())
  }

  // ==========================================================================
  // Construction
  // ==========================================================================

  #[test]
  fn empty_name_is_single_empty_literal() {
    let name = NameBuilder::new().finish();
    assert_eq!(name.segments(), &[lit("")]);
    assert!(name.is_empty());
    assert!(name.is_simple_name());
    assert_eq!(name.simple_name(), Some(""));
  }

  #[test]
  fn adjacent_literals_and_globs_coalesce() {
    let name = NameBuilder::new()
      .append_literal_string("src/")
      .append_escaped_string("lib")
      .append_glob_metachars("*")
      .append_glob_metachars("?")
      .append_literal_string(".c")
      .finish();
    assert_eq!(name.segments(), &[lit("src/lib"), glob("*?"), lit(".c")]);
  }

  #[test]
  fn adjacent_variables_stay_distinct() {
    let name = NameBuilder::new().append_subst_var("A").append_subst_var("A").finish();
    assert_eq!(name.segments(), &[var("A"), var("A")]);
    assert_eq!(name.variables(), vec!["A", "A"]);
  }

  #[test]
  fn builder_resets_after_finish() {
    let mut builder = NameBuilder::new();
    builder.append_literal_string("one");
    let first = builder.finish();
    builder.append_literal_string("two");
    let second = builder.finish();
    assert_eq!(first.to_string(), "one");
    assert_eq!(second.to_string(), "two");
  }

  #[test]
  fn single_quoted_text_is_verbatim() {
    let name = NameBuilder::new().append_literal_string(r"a\tb*").finish();
    assert_eq!(name.simple_name(), Some(r"a\tb*"));
  }

  #[test]
  fn unquoted_text_splits_globs() {
    let name = NameBuilder::new().append_unquoted(r"src/[ab]*.c\*").finish();
    assert_eq!(name.segments(), &[lit("src/"), glob("[ab]*"), lit(".c*")]);
  }

  #[test]
  fn unclosed_bracket_is_literal() {
    let name = NameBuilder::new().append_unquoted("a[b").finish();
    assert_eq!(name.simple_name(), Some("a[b"));
  }

  #[test]
  fn parse_variables_and_globs() {
    let name = Name::parse("out/${arch}/*.o").unwrap();
    assert_eq!(name.segments(), &[lit("out/"), var("arch"), lit("/"), glob("*"), lit(".o")]);
    assert_eq!(name.to_string(), "out/${arch}/*.o");
  }

  #[test]
  fn parse_lone_dollar_is_literal() {
    let name = Name::parse("cost$5").unwrap();
    assert_eq!(name.simple_name(), Some("cost$5"));
  }

  #[test]
  fn parse_unterminated_variable_fails() {
    let err = Name::parse("a${b").unwrap_err();
    assert!(matches!(err, Error::NameSyntax { position: 1, .. }));
  }

  #[test]
  fn parse_empty_variable_fails() {
    assert!(matches!(Name::parse("${}"), Err(Error::NameSyntax { .. })));
  }

  // ==========================================================================
  // Escapes
  // ==========================================================================

  #[test]
  fn escape_table() {
    assert_eq!(unescape(r"a\tb\101c"), "a\tbAc");
    assert_eq!(unescape(r"\0101"), "A");
    assert_eq!(unescape(r"\0"), "\0");
    assert_eq!(unescape(r"\x41\x4a"), "AJ");
    assert_eq!(unescape(r"\a\b\e\f\n\r\t\v"), "\x07\x08\x1b\x0c\n\r\t\x0b");
    assert_eq!(unescape(r"\q\\\'"), r"q\'");
  }

  #[test]
  fn escape_edge_cases() {
    assert_eq!(unescape(r"\xZZ"), "xZZ");
    assert_eq!(unescape(r"\x4"), "x4");
    assert_eq!(unescape(r"\08"), "\08");
    assert_eq!(unescape(r"\8"), "8");
    assert_eq!(unescape("trailing\\"), "trailing\\");
  }

  #[test]
  fn double_quoted_input_decodes() {
    let name = NameBuilder::new().append_escaped_string(r"a\tb\101c").finish();
    assert_eq!(name.simple_name(), Some("a\tbAc"));
  }

  // ==========================================================================
  // Substitution
  // ==========================================================================

  #[test]
  fn substitution_round_trip() {
    let name = Name::parse("prefix-${VAR}-suffix").unwrap();
    let done = name.substitute(&["VAR"], &["X"]);
    assert_eq!(done.segments(), &[lit("prefix-X-suffix")]);
    assert!(done.variables().is_empty());
    assert_eq!(done, Name::literal("prefix-X-suffix"));
  }

  #[test]
  fn substitution_recoalesces_with_globs() {
    let name = Name::parse("${dir}/*.h").unwrap();
    let done = name.substitute(&["dir"], &["include"]);
    assert_eq!(done.segments(), &[lit("include/"), glob("*"), lit(".h")]);
  }

  #[test]
  fn substitution_with_empty_value_leaves_empty_name() {
    let name = Name::parse("${EMPTY}").unwrap();
    let done = name.substitute(&["EMPTY"], &[""]);
    assert!(done.is_empty());
  }

  #[test]
  fn substitution_of_repeated_variable() {
    let name = Name::parse("${A}-${A}").unwrap();
    let done = name.substitute(&name.variables(), &["x", "x"]);
    assert_eq!(done.simple_name(), Some("x-x"));
  }

  #[test]
  fn unknown_variables_are_kept() {
    let name = Name::parse("${A}${B}").unwrap();
    let done = name.substitute(&["A"], &["a"]);
    assert_eq!(done.segments(), &[lit("a"), var("B")]);
  }

  // ==========================================================================
  // Prefixes
  // ==========================================================================

  #[test]
  fn literal_prefix_requires_leading_literal() {
    assert_eq!(Name::parse("abc*").unwrap().literal_prefix(), "abc");
    assert_eq!(Name::parse("*abc").unwrap().literal_prefix(), "");
  }

  #[test]
  fn literal_path_prefix_cuts_at_last_separator() {
    assert_eq!(Name::parse("src/bar/foo*.ts").unwrap().literal_path_prefix(), "src/bar");
    assert_eq!(Name::parse("src/bar/foo.ts").unwrap().literal_path_prefix(), "src/bar/foo.ts");
    assert_eq!(Name::parse("mylib/*").unwrap().literal_path_prefix(), "mylib");
    assert_eq!(Name::parse("foo*").unwrap().literal_path_prefix(), "");
    assert_eq!(Name::parse("${x}/a").unwrap().literal_path_prefix(), "");
  }

  #[test]
  fn without_prefix_consumes_separator() {
    let name = Name::parse("mylib/lib/*").unwrap();
    assert_eq!(name.without_prefix("mylib").to_string(), "lib/*");
    assert_eq!(name.without_prefix("myl").to_string(), "ib/lib/*");
    assert_eq!(name.without_prefix("other"), name);
  }

  #[test]
  fn without_whole_literal_leaves_rest() {
    let name = Name::parse("mylib/*").unwrap();
    assert_eq!(name.without_prefix("mylib").segments(), &[glob("*")]);
    assert!(Name::literal("mylib").without_prefix("mylib").is_empty());
  }

  #[test]
  fn relative_to_prepends_directory() {
    let name = Name::parse("*.h").unwrap();
    let rel = name.relative_to("proj/src/");
    assert_eq!(rel.segments(), &[lit("proj/src/"), glob("*"), lit(".h")]);
    assert_eq!(Name::literal("/abs").relative_to("proj"), Name::literal("/abs"));
    assert_eq!(Name::literal("a.c").relative_to(""), Name::literal("a.c"));
  }

  // ==========================================================================
  // Matching
  // ==========================================================================

  #[test]
  fn glob_matching_respects_separators() {
    let name = Name::parse("lib/*").unwrap();
    assert!(name.matches("lib/libfoo.a").unwrap());
    assert!(!name.matches("lib/sub/libfoo.a").unwrap());
    assert!(!name.matches("include/foo.h").unwrap());
  }

  #[test]
  fn literal_segments_are_not_globs() {
    let name = NameBuilder::new().append_literal_string("a[1]").append_glob_metachars("*").finish();
    assert!(name.matches("a[1].txt").unwrap());
    assert!(!name.matches("a1.txt").unwrap());
  }
}
