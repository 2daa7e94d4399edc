use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// A dependency reference found in script source, in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScannedImport {
  pub specifier: String,
  pub kind: ImportKind,
  pub offset: usize,
  /// Inside a try block, so a resolution failure is survivable at runtime.
  pub is_optional: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImportKind {
  Require,
  EsmImport,
  DynamicImport,
  Worker,
  ServiceWorker,
}

static REQUIRE_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#));
static DYNAMIC_IMPORT_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\bimport\s*\(\s*["']([^"']+)["']\s*\)"#));
static BARE_IMPORT_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\bimport\s+["']([^"']+)["']"#));
static NAMED_IMPORT_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\bimport\s+[^"'();]+?\bfrom\s+["']([^"']+)["']"#));
static EXPORT_FROM_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\bexport\s+(?:\*|\{[^}]*\})\s*from\s+["']([^"']+)["']"#));
static WORKER_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"\bnew\s+Worker\s*\(\s*["']([^"']+)["']"#));
static SERVICE_WORKER_RE: LazyLock<Regex> =
  LazyLock::new(|| compile(r#"serviceWorker\s*\.\s*register\s*\(\s*["']([^"']+)["']"#));

fn compile(pattern: &str) -> Regex {
  Regex::new(pattern).unwrap_or_else(|err| panic!("invalid scanner pattern: {err}"))
}

/// Scans script source for module references. The source is not parsed,
/// only pattern matched over a comment-blanked copy, which is enough for
/// the generated intermediate form this bundler consumes.
pub fn scan_imports(code: &str) -> Vec<ScannedImport> {
  let tokens = tokenize(code);
  let try_blocks = try_block_ranges(&tokens.stripped);

  let mut imports: Vec<ScannedImport> = Vec::new();
  let mut push = |kind: ImportKind, regex: &Regex| {
    for capture in regex.captures_iter(&tokens.stripped) {
      let Some(matched) = capture.get(1) else {
        continue;
      };
      let offset = capture
        .get(0)
        .map(|whole| whole.start())
        .unwrap_or(matched.start());
      // A call pattern that starts inside a string literal is just text.
      if tokens.strings.iter().any(|range| range.contains(&offset)) {
        continue;
      }
      imports.push(ScannedImport {
        specifier: matched.as_str().to_string(),
        kind,
        offset,
        is_optional: kind == ImportKind::Require
          && try_blocks.iter().any(|range| range.contains(&offset)),
      });
    }
  };

  push(ImportKind::DynamicImport, &DYNAMIC_IMPORT_RE);
  push(ImportKind::Require, &REQUIRE_RE);
  push(ImportKind::EsmImport, &BARE_IMPORT_RE);
  push(ImportKind::EsmImport, &NAMED_IMPORT_RE);
  push(ImportKind::EsmImport, &EXPORT_FROM_RE);
  push(ImportKind::Worker, &WORKER_RE);
  push(ImportKind::ServiceWorker, &SERVICE_WORKER_RE);

  imports.sort_by_key(|import| import.offset);
  imports.dedup_by(|a, b| a.offset == b.offset && a.specifier == b.specifier);
  imports
}

struct Tokenized {
  /// The source with comments blanked to spaces, same byte length as the
  /// input so match offsets stay aligned.
  stripped: String,
  /// Interior byte ranges of string and template literals.
  strings: Vec<Range<usize>>,
}

fn tokenize(code: &str) -> Tokenized {
  let bytes = code.as_bytes();
  let mut out = bytes.to_vec();
  let mut strings = Vec::new();
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'"' | b'\'' | b'`' => {
        let end = skip_string(bytes, i);
        strings.push(i + 1..end.saturating_sub(1));
        i = end;
      }
      b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
        while i < bytes.len() && bytes[i] != b'\n' {
          out[i] = b' ';
          i += 1;
        }
      }
      b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
        while i < bytes.len() {
          let closing = bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/';
          if bytes[i] != b'\n' {
            out[i] = b' ';
          }
          i += 1;
          if closing {
            out[i] = b' ';
            i += 1;
            break;
          }
        }
      }
      _ => i += 1,
    }
  }

  // Only ascii bytes were replaced, so the result stays valid utf-8.
  let stripped = String::from_utf8(out).unwrap_or_else(|_| code.to_string());
  Tokenized { stripped, strings }
}

/// Byte ranges of `try { ... }` block bodies, for optional-require
/// detection. Nested braces are balanced; strings are skipped.
fn try_block_ranges(code: &str) -> Vec<Range<usize>> {
  let bytes = code.as_bytes();
  let mut ranges = Vec::new();
  let mut i = 0;

  while i + 3 <= bytes.len() {
    if &bytes[i..i + 3] == b"try"
      && !is_ident_byte(i.checked_sub(1).and_then(|prev| bytes.get(prev)))
      && !is_ident_byte(bytes.get(i + 3))
    {
      let mut j = i + 3;
      while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
      }
      if j < bytes.len() && bytes[j] == b'{' {
        let start = j + 1;
        let mut depth = 1;
        let mut k = start;
        while k < bytes.len() && depth > 0 {
          match bytes[k] {
            b'"' | b'\'' | b'`' => k = skip_string(bytes, k),
            b'{' => {
              depth += 1;
              k += 1;
            }
            b'}' => {
              depth -= 1;
              k += 1;
            }
            _ => k += 1,
          }
        }
        ranges.push(start..k.saturating_sub(1));
        i = k;
        continue;
      }
    }
    i += 1;
  }

  ranges
}

fn is_ident_byte(byte: Option<&u8>) -> bool {
  matches!(byte, Some(b) if b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$')
}

/// Advances past a string literal starting at `start`, honoring escapes.
fn skip_string(bytes: &[u8], start: usize) -> usize {
  let quote = bytes[start];
  let mut i = start + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 2,
      b if b == quote => return i + 1,
      _ => i += 1,
    }
  }
  i
}
