//! URL and identifier derivation for converted modules.

use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DASH_LETTER: Regex = Regex::new(r"-([a-zA-Z0-9])").unwrap();
    static ref NON_IDENT: Regex = Regex::new(r"[^A-Za-z0-9_$]").unwrap();
}

/// Name recorded in an import map for a whole-namespace reference.
pub const NAMESPACE_IMPORT: &str = "*";

/// `elements/foo-bar.html` -> `elements/foo-bar.js`
pub fn module_url(document_url: &str) -> String {
    if let Some(stem) = document_url.strip_suffix(".html") {
        format!("{}.js", stem)
    } else if document_url.ends_with(".js") {
        document_url.to_string()
    } else {
        format!("{}.js", document_url)
    }
}

/// Resolve `href` against the document at `base`, collapsing `.` and `..`.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.contains("://") || href.starts_with('/') {
        return href.to_string();
    }
    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();
    for part in href.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(s) if *s != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    segments.retain(|s| !s.is_empty());
    segments.join("/")
}

/// Import specifier for `to` as seen from the module at `from`.
///
/// Always relative: `./dep.js`, `../lib/dep.js`.
pub fn relative_specifier(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = {
        let mut parts: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
        parts.pop();
        parts
    };
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let (to_dir, file) = match to_parts.split_last() {
        Some((file, dir)) => (dir, *file),
        None => return "./".to_string(),
    };

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        out.push("..");
    }
    out.extend(&to_dir[common..]);
    out.push(file);

    let joined = out.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

fn dash_to_camel_case(name: &str) -> String {
    DASH_LETTER
        .replace_all(name, |caps: &regex::Captures| caps[1].to_uppercase())
        .into_owned()
}

/// `$` + camel-cased basename: `iron-meta/iron-meta.html` -> `$ironMeta`.
pub fn module_identifier(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    let stem = file.split('.').next().unwrap_or(file);
    let camel = dash_to_camel_case(stem);
    format!("${}", NON_IDENT.replace_all(&camel, "_"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORT ALIASES
// ═══════════════════════════════════════════════════════════════════════════════

/// Assigns one stable local name per (dependency URL, imported name).
#[derive(Debug, Default)]
pub struct AliasTable {
    assigned: IndexMap<(String, String), String>,
    taken: IndexSet<String>,
}

impl AliasTable {
    pub fn new<I: IntoIterator<Item = String>>(reserved: I) -> Self {
        Self {
            assigned: IndexMap::new(),
            taken: reserved.into_iter().collect(),
        }
    }

    pub fn alias_for(&mut self, url: &str, name: &str) -> String {
        let key = (url.to_string(), name.to_string());
        if let Some(alias) = self.assigned.get(&key) {
            return alias.clone();
        }
        let base = if name == NAMESPACE_IMPORT {
            module_identifier(url)
        } else {
            format!("${}", name)
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{}${}", base, suffix);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        self.assigned.insert(key, candidate.clone());
        candidate
    }

    pub fn get(&self, url: &str, name: &str) -> Option<&str> {
        self.assigned
            .get(&(url.to_string(), name.to_string()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_urls_become_js() {
        assert_eq!(module_url("lib/foo-bar.html"), "lib/foo-bar.js");
        assert_eq!(module_url("lib/already.js"), "lib/already.js");
    }

    #[test]
    fn resolves_relative_imports() {
        assert_eq!(resolve_url("a/b/c.html", "d.html"), "a/b/d.html");
        assert_eq!(resolve_url("a/b/c.html", "../x/y.html"), "a/x/y.html");
        assert_eq!(resolve_url("c.html", "./sub/d.html"), "sub/d.html");
        assert_eq!(resolve_url("c.html", "../up.html"), "../up.html");
    }

    #[test]
    fn specifiers_are_always_relative() {
        assert_eq!(relative_specifier("a/main.js", "a/other.js"), "./other.js");
        assert_eq!(relative_specifier("a/b/main.js", "a/x/y.js"), "../x/y.js");
        assert_eq!(relative_specifier("a/b/main.js", "z.js"), "../../z.js");
        assert_eq!(relative_specifier("main.js", "lib/dep.js"), "./lib/dep.js");
    }

    #[test]
    fn module_identifiers_are_camel_cased() {
        assert_eq!(module_identifier("iron-meta/iron-meta.html"), "$ironMeta");
        assert_eq!(module_identifier("lib/utils/async.js"), "$async");
    }

    #[test]
    fn aliases_avoid_collisions() {
        let mut table = AliasTable::new(vec!["$local".to_string()]);
        assert_eq!(table.alias_for("a.js", "thing"), "$thing");
        assert_eq!(table.alias_for("b.js", "thing"), "$thing$1");
        assert_eq!(table.alias_for("a.js", "thing"), "$thing");
        assert_eq!(table.alias_for("c.js", "local"), "$local$1");
        assert_eq!(table.alias_for("c.js", NAMESPACE_IMPORT), "$c");
    }
}
