use std::sync::LazyLock;

use anyhow::Error;
use regex::Regex;
use satchel_core::plugin::OptimizerPlugin;
use satchel_core::types::Bundle;

static STRING_COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(['"])([^'"]*)['"]\s*([!=]==?)\s*(['"])([^'"]*)['"]"#)
    .unwrap_or_else(|err| panic!("invalid comparison pattern: {err}"))
});

/// Conservative built-in minifier for production builds.
///
/// Strips comments, folds string-literal comparisons left behind by
/// environment substitution, removes the dead branches they guard and
/// collapses horizontal whitespace. Newlines are preserved so statement
/// boundaries never change, and the module's export shape is untouched.
#[derive(Debug)]
pub struct SatchelOptimizerPlugin {}

impl SatchelOptimizerPlugin {
  pub fn new() -> Self {
    SatchelOptimizerPlugin {}
  }
}

impl Default for SatchelOptimizerPlugin {
  fn default() -> Self {
    Self::new()
  }
}

impl OptimizerPlugin for SatchelOptimizerPlugin {
  #[tracing::instrument(level = "debug", skip_all)]
  fn optimize(&self, _bundle: &Bundle, contents: String) -> Result<String, Error> {
    let contents = strip_comments(&contents);
    let contents = fold_string_comparisons(&contents);
    let contents = eliminate_dead_branches(&contents);
    Ok(collapse_whitespace(&contents))
  }
}

/// Folds `"a" === "b"` style comparisons into boolean literals. Runs after
/// environment substitution, which is what produces most of them.
fn fold_string_comparisons(code: &str) -> String {
  STRING_COMPARISON_RE
    .replace_all(code, |captures: &regex::Captures| {
      let equal = &captures[2] == &captures[5];
      let negated = captures[3].starts_with('!');
      if equal != negated { "true" } else { "false" }
    })
    .into_owned()
}

/// Removes `if (false) { ... }` blocks and unwraps `if (true) { ... }`
/// blocks, including their `else` arms. Repeats until a fixpoint so nested
/// folded conditions collapse too.
fn eliminate_dead_branches(code: &str) -> String {
  let mut current = code.to_string();

  for _ in 0..16 {
    let Some(next) = eliminate_one_branch(&current) else {
      return current;
    };
    current = next;
  }

  current
}

fn eliminate_one_branch(code: &str) -> Option<String> {
  let bytes = code.as_bytes();

  let conditions = [
    ("if (true)", true),
    ("if(true)", true),
    ("if (false)", false),
    ("if(false)", false),
  ];

  for (condition, keep_then) in conditions {
    let Some(start) = code.find(condition) else {
      continue;
    };
    let after_condition = start + condition.len();
    let then_block = block_range(bytes, after_condition)?;

    let mut end = then_block.1;
    let else_block = else_range(code, end);
    if let Some((_, else_end)) = else_block {
      end = else_end;
    }

    let replacement = if keep_then {
      body_of(code, then_block)
    } else {
      else_block.map(|range| body_of(code, range)).unwrap_or_default()
    };

    let mut next = String::with_capacity(code.len());
    next.push_str(&code[..start]);
    next.push_str(&replacement);
    next.push_str(&code[end..]);
    return Some(next);
  }

  None
}

/// The interior of a brace block, given its surrounding range.
fn body_of(code: &str, (start, end): (usize, usize)) -> String {
  code[start + 1..end - 1].trim().to_string()
}

/// Finds the `{ ... }` block starting at or after `from`, returning the
/// range including both braces.
fn block_range(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
  let mut i = from;
  while i < bytes.len() && bytes[i].is_ascii_whitespace() {
    i += 1;
  }
  if i >= bytes.len() || bytes[i] != b'{' {
    return None;
  }

  let open = i;
  let mut depth = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'"' | b'\'' | b'`' => i = skip_string(bytes, i),
      b'{' => {
        depth += 1;
        i += 1;
      }
      b'}' => {
        depth -= 1;
        i += 1;
        if depth == 0 {
          return Some((open, i));
        }
      }
      _ => i += 1,
    }
  }

  None
}

/// The `else { ... }` arm following a then-block, if present.
fn else_range(code: &str, from: usize) -> Option<(usize, usize)> {
  let bytes = code.as_bytes();
  let mut i = from;
  while i < bytes.len() && bytes[i].is_ascii_whitespace() {
    i += 1;
  }
  if !code[i..].starts_with("else") {
    return None;
  }

  let (_, end) = block_range(bytes, i + 4)?;
  Some((from, end))
}

fn strip_comments(code: &str) -> String {
  let bytes = code.as_bytes();
  let mut out = String::with_capacity(code.len());
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'"' | b'\'' | b'`' => {
        let end = skip_string(bytes, i);
        out.push_str(&code[i..end]);
        i = end;
      }
      b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
        // Source map references survive minification
        if code[i..].starts_with("//#") {
          out.push_str(&code[i..]);
          break;
        }
        while i < bytes.len() && bytes[i] != b'\n' {
          i += 1;
        }
      }
      b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
        i += 2;
        while i < bytes.len() {
          if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            i += 2;
            break;
          }
          i += 1;
        }
      }
      _ => {
        let ch = code[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8();
      }
    }
  }

  out
}

/// Collapses runs of spaces and tabs and drops blank lines. Newlines stay
/// so automatic semicolon insertion is unaffected.
fn collapse_whitespace(code: &str) -> String {
  let mut out = String::with_capacity(code.len());
  let bytes = code.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    match bytes[i] {
      b'"' | b'\'' | b'`' => {
        let end = skip_string(bytes, i);
        out.push_str(&code[i..end]);
        i = end;
      }
      b' ' | b'\t' => {
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
          i += 1;
        }
        if i < bytes.len() && bytes[i] != b'\n' && !out.ends_with('\n') && !out.is_empty() {
          out.push(' ');
        }
      }
      b'\n' => {
        while out.ends_with(' ') {
          out.pop();
        }
        if !out.ends_with('\n') && !out.is_empty() {
          out.push('\n');
        }
        i += 1;
      }
      _ => {
        let ch = code[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8();
      }
    }
  }

  out
}

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

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn optimize(code: &str) -> String {
    SatchelOptimizerPlugin::new()
      .optimize(&Bundle::default(), code.to_string())
      .unwrap()
  }

  #[test]
  fn folds_string_comparisons() {
    assert_eq!(fold_string_comparisons(r#""production" === "production""#), "true");
    assert_eq!(fold_string_comparisons(r#""production" !== "production""#), "false");
    assert_eq!(fold_string_comparisons(r#""production" === 'development'"#), "false");
    assert_eq!(fold_string_comparisons(r#""production" != "development""#), "true");
  }

  #[test]
  fn strips_dead_node_env_branches() {
    let code = concat!(
      "if (\"production\" === \"development\") {\n",
      "  var dev = require('./dev-only');\n",
      "}\n",
      "module.exports = 2;\n",
    );

    let optimized = optimize(code);

    assert!(!optimized.contains("dev-only"));
    assert!(optimized.contains("module.exports = 2;"));
  }

  #[test]
  fn keeps_the_live_branch_of_a_folded_conditional() {
    let code = concat!(
      "if (\"production\" === \"production\") {\n",
      "  module.exports = 'prod';\n",
      "} else {\n",
      "  module.exports = 'dev';\n",
      "}\n",
    );

    let optimized = optimize(code);

    assert!(optimized.contains("module.exports = 'prod';"));
    assert!(!optimized.contains("'dev'"));
  }

  #[test]
  fn keeps_the_else_arm_of_a_dead_conditional() {
    let code = "if ('a' === 'b') { one(); } else { two(); }\n";

    let optimized = optimize(code);

    assert!(!optimized.contains("one()"));
    assert!(optimized.contains("two();"));
  }

  #[test]
  fn strips_comments_but_not_string_contents() {
    let code = "// leading\nvar a = \"// not a comment\"; /* block */ var b = 1;\n";

    let optimized = optimize(code);

    assert!(!optimized.contains("leading"));
    assert!(!optimized.contains("block"));
    assert!(optimized.contains("\"// not a comment\""));
  }

  #[test]
  fn preserves_source_map_references() {
    let code = "var a = 1;\n//# sourceMappingURL=index.js.map\n";

    assert!(optimize(code).contains("//# sourceMappingURL=index.js.map"));
  }

  #[test]
  fn collapses_indentation_without_joining_statements() {
    let code = "function f() {\n    return   1;\n}\n\n\nvar x = f();\n";

    assert_eq!(optimize(code), "function f() {\nreturn 1;\n}\nvar x = f();\n");
  }
}
