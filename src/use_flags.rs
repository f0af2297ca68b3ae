use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use crate::config::MinusStarPolicy;
use crate::error::{Error, Result};
use crate::overlay::read_optional;
use crate::profile::ProfileUse;

/// Turns a `make.defaults` file into the tokens of its final `USE` value.
///
/// Implementations must not depend on process-wide state so profiles can
/// be evaluated concurrently.
pub trait UseEvaluator: Send + Sync {
    /// Evaluate `make_defaults` and split the resulting `USE` on whitespace.
    fn use_tokens(&self, make_defaults: &Path) -> Result<Vec<String>>;
}

/// Fold `USE` tokens into one flag per name.
///
/// A `-` prefix disables a flag and a later token for the same flag
/// overrides an earlier one. `-*` is an ordinary token and disables a flag
/// named `*`; see [`resolve_use_tokens_with`] for incremental stacking.
///
/// # Examples
///
/// ```
/// use portage_explorer::resolve_use_tokens;
///
/// let flags = resolve_use_tokens(["use", "-flag", "-use", "abc"]);
/// let flags: Vec<_> = flags.iter().map(|f| (f.name.as_str(), f.enabled)).collect();
/// assert_eq!(flags, [("abc", true), ("flag", false), ("use", false)]);
/// ```
pub fn resolve_use_tokens<I, S>(tokens: I) -> Vec<ProfileUse>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    resolve_use_tokens_with(tokens, MinusStarPolicy::Literal)
}

/// Fold `USE` tokens, choosing what `-*` does.
///
/// ```
/// use portage_explorer::{resolve_use_tokens_with, MinusStarPolicy};
///
/// let flags = resolve_use_tokens_with(["a", "-*", "b"], MinusStarPolicy::Clear);
/// assert_eq!(flags.len(), 1);
/// assert_eq!(flags[0].name, "b");
/// ```
pub fn resolve_use_tokens_with<I, S>(tokens: I, minus_star: MinusStarPolicy) -> Vec<ProfileUse>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut flags: BTreeMap<String, bool> = BTreeMap::new();
    for token in tokens {
        let token = token.as_ref();
        if token == "-*" && minus_star == MinusStarPolicy::Clear {
            flags.clear();
            continue;
        }
        match token.strip_prefix('-') {
            Some("") => {}
            Some(name) => {
                flags.insert(name.to_string(), false);
            }
            None => {
                flags.insert(token.to_string(), true);
            }
        }
    }
    flags
        .into_iter()
        .map(|(name, enabled)| ProfileUse { name, enabled })
        .collect()
}

/// Resolve the USE flags of one profile directory.
///
/// A profile without `make.defaults` has no flags. Evaluation failures are
/// logged and also yield no flags.
pub fn profile_use_flags(
    evaluator: &dyn UseEvaluator,
    profile_dir: &Path,
    minus_star: MinusStarPolicy,
) -> Vec<ProfileUse> {
    let make_defaults = profile_dir.join("make.defaults");
    if !make_defaults.is_file() {
        return Vec::new();
    }
    match evaluator.use_tokens(&make_defaults) {
        Ok(tokens) => {
            debug!(
                "{}: {} USE tokens",
                make_defaults.display(),
                tokens.len()
            );
            resolve_use_tokens_with(tokens, minus_star)
        }
        Err(e) => {
            warn!("No USE flags resolved: {}", e);
            Vec::new()
        }
    }
}

/// Evaluates `make.defaults` without a shell.
///
/// Understands the restricted syntax profiles are limited to: variable
/// assignments (optionally `export`ed, `+=` appends), single and double quotes,
/// backslash escapes and line continuations, `$VAR` and `${VAR}`
/// references, and `#` comments. Other statements are skipped. Every
/// variable starts out unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEvaluator;

impl NativeEvaluator {
    /// Evaluate `make.defaults` text and return all assigned variables.
    pub fn evaluate(text: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        let mut scanner = Scanner {
            chars: text.chars().collect(),
            pos: 0,
        };
        while let Some((name, value)) = scanner.next_assignment(&vars) {
            vars.insert(name, value);
        }
        vars
    }
}

impl UseEvaluator for NativeEvaluator {
    fn use_tokens(&self, make_defaults: &Path) -> Result<Vec<String>> {
        let text = read_optional(make_defaults)?.ok_or_else(|| Error::ShellEval {
            path: make_defaults.to_path_buf(),
            reason: "file disappeared".to_string(),
        })?;
        let vars = Self::evaluate(&text);
        Ok(vars
            .get("USE")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' {
                self.pos += 1;
            } else if c == '\\' && self.peek_at(1) == Some('\n') {
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += 1,
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    /// Find the next `NAME=value` statement, skipping anything else.
    fn next_assignment(&mut self, vars: &HashMap<String, String>) -> Option<(String, String)> {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace() || c == ';') {
                self.pos += 1;
            }
            match self.peek() {
                None => return None,
                Some('#') => {
                    self.skip_line();
                    continue;
                }
                _ => {}
            }

            let statement_start = self.pos;
            let mut name = match self.identifier() {
                Some(name) => name,
                None => {
                    self.skip_line();
                    continue;
                }
            };
            if name == "export" && matches!(self.peek(), Some(' ' | '\t')) {
                self.skip_blanks();
                name = match self.identifier() {
                    Some(name) => name,
                    None => {
                        self.skip_line();
                        continue;
                    }
                };
            }
            let append = self.peek() == Some('+') && self.peek_at(1) == Some('=');
            if append {
                self.pos += 1;
            }
            if self.peek() != Some('=') {
                let skipped: String = self.chars[statement_start..self.pos].iter().collect();
                debug!("Skipping unsupported make.defaults statement {:?}", skipped);
                self.skip_line();
                continue;
            }
            self.pos += 1;
            let mut value = self.word(vars);
            if append {
                value = format!("{}{}", vars.get(&name).map_or("", String::as_str), value);
            }
            self.skip_blanks();
            if self.peek() == Some('#') {
                self.skip_line();
            }
            return Some((name, value));
        }
    }

    /// Read one shell word, expanding quotes, escapes and variables.
    fn word(&mut self, vars: &HashMap<String, String>) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\n' | ';' => break,
                '\'' => {
                    self.pos += 1;
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == '\'' {
                            break;
                        }
                        out.push(c);
                    }
                }
                '"' => {
                    self.pos += 1;
                    self.double_quoted(vars, &mut out);
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('\n') => self.pos += 1,
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => {}
                    }
                }
                '$' => {
                    self.pos += 1;
                    self.expand(vars, &mut out);
                }
                _ => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        out
    }

    fn double_quoted(&mut self, vars: &HashMap<String, String>, out: &mut String) {
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '"' => return,
                '\\' => match self.peek() {
                    Some('\n') => self.pos += 1,
                    Some(next @ ('"' | '\\' | '$' | '`')) => {
                        out.push(next);
                        self.pos += 1;
                    }
                    _ => out.push('\\'),
                },
                '$' => self.expand(vars, out),
                _ => out.push(c),
            }
        }
    }

    /// Expand a reference whose `$` was already consumed.
    fn expand(&mut self, vars: &HashMap<String, String>, out: &mut String) {
        if self.peek() == Some('{') {
            let close = self.chars[self.pos..].iter().position(|&c| c == '}');
            if let Some(len) = close {
                let name: String = self.chars[self.pos + 1..self.pos + len].iter().collect();
                self.pos += len + 1;
                if let Some(value) = vars.get(&name) {
                    out.push_str(value);
                }
                return;
            }
            out.push('$');
            return;
        }
        match self.identifier() {
            Some(name) => {
                if let Some(value) = vars.get(&name) {
                    out.push_str(value);
                }
            }
            None => out.push('$'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(list: &[ProfileUse]) -> Vec<(&str, bool)> {
        list.iter().map(|f| (f.name.as_str(), f.enabled)).collect()
    }

    #[test]
    fn last_write_wins() {
        let resolved = resolve_use_tokens(["use", "-flag", "-use", "abc"]);
        assert_eq!(
            flags(&resolved),
            [("abc", true), ("flag", false), ("use", false)]
        );
    }

    #[test]
    fn reenabled_flag() {
        let resolved = resolve_use_tokens(["-x", "x"]);
        assert_eq!(flags(&resolved), [("x", true)]);
    }

    #[test]
    fn minus_star_is_a_plain_token() {
        let resolved = resolve_use_tokens(["a", "-*"]);
        assert_eq!(flags(&resolved), [("*", false), ("a", true)]);
    }

    #[test]
    fn minus_star_clears_when_incremental() {
        let resolved = resolve_use_tokens_with(["a", "-b", "-*", "c"], MinusStarPolicy::Clear);
        assert_eq!(flags(&resolved), [("c", true)]);
    }

    #[test]
    fn bare_minus_ignored() {
        let resolved = resolve_use_tokens(["-", "a"]);
        assert_eq!(flags(&resolved), [("a", true)]);
    }

    #[test]
    fn native_accumulates_use() {
        let vars = NativeEvaluator::evaluate(
            r#"
# Profile defaults
USE="use -flag"
CHROMEOS_KERNEL="kernel-5_15"
USE="${USE} -use abc"
"#,
        );
        assert_eq!(vars["USE"], "use -flag -use abc");
        assert_eq!(vars["CHROMEOS_KERNEL"], "kernel-5_15");
        let resolved = resolve_use_tokens(vars["USE"].split_whitespace());
        assert_eq!(
            flags(&resolved),
            [("abc", true), ("flag", false), ("use", false)]
        );
    }

    #[test]
    fn native_quoting_and_references() {
        let vars = NativeEvaluator::evaluate(
            "BOARD=elm\nexport ARCH='arm64'\nUSE=\"$BOARD ${ARCH}_bits \\\"q\\\" \\\n cont\" # trailing\nUSE=$USE'$lit'\n",
        );
        assert_eq!(vars["ARCH"], "arm64");
        assert_eq!(vars["USE"], "elm arm64_bits \"q\"  cont$lit");
    }

    #[test]
    fn native_skips_unsupported() {
        let vars = NativeEvaluator::evaluate("source foo.sh\nif true; then\nUSE=\"a\"\nfi\n");
        assert_eq!(vars["USE"], "a");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn native_append_assignment() {
        let vars = NativeEvaluator::evaluate("USE=\"a\"\nUSE+=\" -a b\"\n");
        assert_eq!(vars["USE"], "a -a b");
    }

    #[test]
    fn native_unset_reference_is_empty() {
        let vars = NativeEvaluator::evaluate("USE=\"${USE} ${UNSET} x\"\n");
        assert_eq!(vars["USE"].split_whitespace().collect::<Vec<_>>(), ["x"]);
    }

    #[test]
    fn profile_without_make_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = profile_use_flags(&NativeEvaluator, tmp.path(), MinusStarPolicy::Literal);
        assert!(resolved.is_empty());
    }

    #[test]
    fn profile_with_make_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("make.defaults"),
            "USE=\"b a\"\nUSE=\"${USE} -b\"\n",
        )
        .unwrap();
        let resolved = profile_use_flags(&NativeEvaluator, tmp.path(), MinusStarPolicy::Literal);
        assert_eq!(flags(&resolved), [("a", true), ("b", false)]);
    }
}
