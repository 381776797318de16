// src/builders/patterns.rs

//! Wildcard patterns selecting which source files are resources.
//!
//! Syntax, per pattern:
//!
//! - `*` any run of characters, `?` exactly one, `*?` / `?*` one or more
//! - leading `!` negates the pattern
//! - `srcroot:` prefix matches the name of the file's source root directory
//! - `dir/` part (up to the last `/`) matches the file's parent directory
//!   relative to its source root; `**/` spans any number of directories

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_RESOURCE_PATTERNS: &[&str] = &[
    "?*.properties",
    "?*.xml",
    "?*.gif",
    "?*.png",
    "?*.jpeg",
    "?*.jpg",
    "?*.html",
    "?*.dtd",
    "?*.tld",
    "?*.ftl",
];

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    file: Regex,
    dir: Option<Regex>,
    src_root: Option<Regex>,
}

impl CompiledPattern {
    fn matches(&self, file_name: &str, parent: &str, src_root: &str) -> bool {
        if let Some(dir) = &self.dir {
            if !dir.is_match(parent) {
                return false;
            }
        }
        if let Some(root) = &self.src_root {
            if !root.is_match(src_root) {
                return false;
            }
        }
        self.file.is_match(file_name)
    }
}

#[derive(Debug, Clone)]
pub struct ResourcePatterns {
    positive: Vec<CompiledPattern>,
    negative: Vec<CompiledPattern>,
}

impl Default for ResourcePatterns {
    fn default() -> Self {
        let patterns = DEFAULT_RESOURCE_PATTERNS.iter().filter_map(|p| compile(p).ok());
        Self {
            positive: patterns.collect(),
            negative: Vec::new(),
        }
    }
}

impl ResourcePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_prefix('!') {
                Some(rest) if !rest.is_empty() => negative.push(compile(rest)?),
                _ => positive.push(compile(pattern)?),
            }
        }
        Ok(Self { positive, negative })
    }

    /// Whether `file` under `source_root` is a resource.
    pub fn is_resource(&self, file: &Path, source_root: &Path) -> bool {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = file
            .parent()
            .and_then(|p| p.strip_prefix(source_root).ok())
            .map(|p| format!("/{}", p.to_string_lossy().replace('\\', "/")))
            .unwrap_or_else(|| "/".to_string());
        let root_name = source_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self
            .positive
            .iter()
            .any(|p| p.matches(&file_name, &parent, &root_name))
        {
            return true;
        }
        if self.negative.is_empty() {
            return false;
        }
        !self
            .negative
            .iter()
            .any(|p| p.matches(&file_name, &parent, &root_name))
    }

    pub fn sources(&self) -> impl Iterator<Item = String> + '_ {
        self.positive
            .iter()
            .map(|p| p.source.clone())
            .chain(self.negative.iter().map(|p| format!("!{}", p.source)))
    }
}

fn compile(pattern: &str) -> Result<CompiledPattern> {
    compile_parts(pattern).with_context(|| format!("invalid resource pattern: {pattern}"))
}

fn compile_parts(pattern: &str) -> Result<CompiledPattern> {
    let mut rest = pattern;

    let mut src_root = None;
    if let Some(colon) = rest.find(':') {
        if colon > 0 {
            src_root = Some(anchored(&optimize(&wildcards_to_regex(&rest[..colon])))?);
            rest = &rest[colon + 1..];
        }
    }

    let mut dir = None;
    if let Some(slash) = rest.rfind('/') {
        let mut dir_regex = format!("/{}", wildcards_to_regex(&rest[..=slash]));
        dir_regex = dir_regex.replace("/.*.*/", "(/.*)?/");
        if dir_regex.len() > 1 && dir_regex.ends_with('/') {
            dir_regex.pop();
        }
        dir = Some(anchored(&optimize(&dir_regex))?);
        rest = &rest[slash + 1..];
    }

    let file = anchored(&optimize(&wildcards_to_regex(rest)))?;
    Ok(CompiledPattern {
        source: pattern.to_string(),
        file,
        dir,
        src_root,
    })
}

fn anchored(body: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{body})$")).with_context(|| format!("compiling regex {body}"))
}

fn wildcards_to_regex(wildcard: &str) -> String {
    let chars: Vec<char> = wildcard.chars().collect();
    let mut out = String::with_capacity(wildcard.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('*', Some('?')) | ('?', Some('*')) => {
                out.push_str(".+");
                i += 2;
                continue;
            }
            ('*', _) => out.push_str(".*"),
            ('?', _) => out.push('.'),
            ('/', _) => out.push('/'),
            (c, _) => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out
}

/// Collapse runs of `.*`.
fn optimize(regex: &str) -> String {
    let mut out = regex.to_string();
    while out.contains(".*.*") {
        out = out.replace(".*.*", ".*");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_res(patterns: &ResourcePatterns, file: &str, root: &str) -> bool {
        patterns.is_resource(Path::new(file), Path::new(root))
    }

    #[test]
    fn defaults_select_common_resource_types() {
        let p = ResourcePatterns::default();
        assert!(is_res(&p, "/p/src/app.properties", "/p/src"));
        assert!(is_res(&p, "/p/src/img/logo.png", "/p/src"));
        assert!(!is_res(&p, "/p/src/Main.java", "/p/src"));
        // `?*` needs at least one character before the extension.
        assert!(!is_res(&p, "/p/src/.xml", "/p/src"));
    }

    #[test]
    fn negated_patterns_admit_everything_else() {
        let p = ResourcePatterns::new(["!?*.java", "!?*.kt"]).unwrap();
        assert!(!is_res(&p, "/p/src/A.java", "/p/src"));
        assert!(is_res(&p, "/p/src/data.bin", "/p/src"));
    }

    #[test]
    fn directory_and_source_root_restrictions() {
        let p = ResourcePatterns::new(["conf/**/*.txt", "res:*.bin"]).unwrap();
        assert!(is_res(&p, "/p/src/conf/a.txt", "/p/src"));
        assert!(is_res(&p, "/p/src/conf/x/y/a.txt", "/p/src"));
        assert!(!is_res(&p, "/p/src/other/a.txt", "/p/src"));
        assert!(is_res(&p, "/p/res/deep/a.bin", "/p/res"));
        assert!(!is_res(&p, "/p/src/a.bin", "/p/src"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = ResourcePatterns::new(["a+b(1).txt"]).unwrap();
        assert!(is_res(&p, "/r/a+b(1).txt", "/r"));
        assert!(!is_res(&p, "/r/aab1.txt", "/r"));
    }
}
