/// Core domain types for change regions, methods, and test patterns.
use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;

use serde::ser::SerializeSeq as _;

/// A contiguous changed span within one file's current content.
/// Offsets are bytes into the content of the read session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRegion {
    /// Offset of the last changed byte. For a deletion, the first surviving
    /// byte after the removed text.
    pub end: usize,
    /// File the region belongs to.
    pub file: PathBuf,
    /// Whether the region covers changed text or brackets removed text.
    pub kind: RegionKind,
    /// Inclusive start offset. For a deletion, the last surviving byte
    /// before the removed text.
    pub start: usize,
}

/// Outcome of one reverse-index query, carried as a value instead of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQueryResult {
    /// The index could not answer (I/O failure). Carries the reason for logs.
    Failed(String),
    /// Raw patterns in index form (`-` separated).
    Found(Vec<String>),
    /// The key has no entry.
    Missing,
}

/// A method declaration found in a parsed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    /// Byte range of the whole declaration.
    pub byte_range: Range<u32>,
    /// Qualified name of the containing class, if it has one.
    /// `None` for anonymous or local class contexts and free functions.
    pub class: Option<String>,
    /// Simple method name.
    pub name: String,
}

impl MethodDecl {
    /// The lookup identity of this method, or `None` when it has no
    /// resolvable qualified class.
    pub fn identifier(&self) -> Option<MethodIdentifier> {
        let class = self.class.as_deref().filter(|c| return !c.is_empty())?;
        if self.name.is_empty() {
            return None;
        }
        return Some(MethodIdentifier {
            class: class.to_string(),
            method: self.name.clone(),
        });
    }
}

/// Fully qualified method identity used to build index keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentifier {
    /// Qualified class name, e.g. `com.acme.Foo`.
    pub class: String,
    /// Simple method name.
    pub method: String,
}

/// Insertion-ordered, duplicate-free set of consumer-facing test patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    /// Membership index for `order`.
    seen: HashSet<String>,
    /// Patterns in first-insertion order.
    order: Vec<String>,
}

impl PatternSet {
    /// Add every pattern from `patterns`, keeping first-seen order.
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, patterns: I) {
        for pattern in patterns {
            self.insert(pattern);
        }
    }

    /// Add a pattern. Returns `false` if it was already present.
    pub fn insert(&mut self, pattern: String) -> bool {
        if self.seen.contains(&pattern) {
            return false;
        }
        self.seen.insert(pattern.clone());
        self.order.push(pattern);
        return true;
    }

    /// Whether no pattern was collected.
    pub fn is_empty(&self) -> bool {
        return self.order.is_empty();
    }

    /// Patterns in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        return self.order.iter();
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        return self.order.len();
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type IntoIter = std::slice::Iter<'a, String>;
    type Item = &'a String;

    fn into_iter(self) -> Self::IntoIter {
        return self.iter();
    }
}

impl serde::Serialize for PatternSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.order.len()))?;
        for pattern in &self.order {
            seq.serialize_element(pattern)?;
        }
        return seq.end();
    }
}

/// How a [`ChangeRegion`] relates to the change it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// The bytes from `start` to `end` were added or modified.
    Changed,
    /// Text was removed between `start` and `end`; both bytes survived.
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse_and_order_is_kept() {
        let mut set = PatternSet::default();
        set.extend(["b".to_string(), "a".to_string(), "b".to_string()]);
        assert!(!set.insert("a".to_string()), "second insert of `a` must be a no-op");

        let items: Vec<&String> = set.iter().collect();
        assert_eq!(items, ["b", "a"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut set = PatternSet::default();
        set.extend(["x,Y,z".to_string(), "a,B,c".to_string()]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["x,Y,z","a,B,c"]"#);
    }

    #[test]
    fn identifier_requires_a_class() {
        let decl = MethodDecl {
            byte_range: 0..10,
            class: None,
            name: "run".to_string(),
        };
        assert_eq!(decl.identifier(), None);

        let decl = MethodDecl {
            class: Some("pkg.Cls".to_string()),
            ..decl
        };
        assert_eq!(
            decl.identifier(),
            Some(MethodIdentifier {
                class: "pkg.Cls".to_string(),
                method: "run".to_string(),
            })
        );
    }

    #[test]
    fn identifier_rejects_empty_class() {
        let decl = MethodDecl {
            byte_range: 0..1,
            class: Some(String::new()),
            name: "m".to_string(),
        };
        assert_eq!(decl.identifier(), None);
    }
}
