//! Read-consistent access to source files and their syntax trees.
//!
//! A [`ReadSession`] is a snapshot of one file's content. Every offset,
//! region, and method resolved for that file is computed against the same
//! snapshot, so concurrent edits on disk are never observed mid-resolution.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::Error;
use crate::grammar::{Container, SourceLanguage, node_text};
use crate::types::MethodDecl;

/// A syntax tree that can answer the four questions region resolution needs.
pub trait SourceTree {
    /// Handle to one syntax element. Cheap to copy.
    type Element<'t>: Copy
    where
        Self: 't;

    /// Nearest element that is, or contains, both `first` and `second`.
    fn common_ancestor<'t>(
        &'t self,
        first: Self::Element<'t>,
        second: Self::Element<'t>,
    ) -> Option<Self::Element<'t>>;

    /// Smallest element covering `offset`, or `None` if nothing maps there.
    fn element_at(&self, offset: usize) -> Option<Self::Element<'_>>;

    /// Nearest method declaration that is, or contains, `element`.
    fn enclosing_method<'t>(&'t self, element: Self::Element<'t>) -> Option<MethodDecl>;

    /// Every method declared strictly inside `element`, in source order.
    fn methods_under<'t>(&'t self, element: Self::Element<'t>) -> Vec<MethodDecl>;
}

/// A parsed snapshot backed by tree-sitter.
pub struct ParsedSource<'s> {
    /// Language rules used for method and class detection.
    language: SourceLanguage,
    /// File-level package prefix, if the language has one.
    package: Option<String>,
    /// Snapshot content the tree was parsed from.
    source: &'s str,
    /// The syntax tree.
    tree: Tree,
}

impl ParsedSource<'_> {
    /// Collect methods in `node`'s subtree, including `node` itself.
    fn collect_methods(&self, node: Node<'_>, methods: &mut Vec<MethodDecl>) {
        if self.language.is_method(node.kind())
            && let Some(decl) = self.declaration(node)
        {
            methods.push(decl);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_methods(child, methods);
        }
    }

    /// Build a declaration from a method node. `None` if it has no name.
    fn declaration(&self, node: Node<'_>) -> Option<MethodDecl> {
        let name = node_text(node.child_by_field_name("name")?, self.source)?;
        let start = u32::try_from(node.start_byte()).ok()?;
        let end = u32::try_from(node.end_byte()).ok()?;

        return Some(MethodDecl {
            byte_range: start..end,
            class: self.qualified_class(node),
            name: name.to_string(),
        });
    }

    /// Qualified name of the class that declares `method`.
    ///
    /// Walks from the method to the root. Any anonymous or local context on
    /// the way means the class has no qualified name.
    fn qualified_class(&self, method: Node<'_>) -> Option<String> {
        if let Some(receiver) = self.language.receiver_type(method, self.source) {
            return Some(self.with_package(vec![receiver]));
        }

        let mut segments: Vec<String> = Vec::new();
        let mut has_class = false;
        let mut current = method.parent();
        while let Some(node) = current {
            match self.language.classify(node, self.source) {
                Container::Class(name) => {
                    has_class = true;
                    segments.push(name);
                },
                Container::Local => return None,
                Container::Scope(name) => segments.push(name),
                Container::Transparent => {},
            }
            current = node.parent();
        }

        if !has_class {
            return None;
        }
        segments.reverse();
        return Some(self.with_package(segments));
    }

    /// Prefix dotted segments with the file's package.
    fn with_package(&self, segments: Vec<String>) -> String {
        let joined = segments.join(".");
        return match &self.package {
            None => joined,
            Some(package) => format!("{package}.{joined}"),
        };
    }
}

impl SourceTree for ParsedSource<'_> {
    type Element<'t>
        = Node<'t>
    where
        Self: 't;

    fn common_ancestor<'t>(&'t self, first: Node<'t>, second: Node<'t>) -> Option<Node<'t>> {
        let mut lineage: HashSet<usize> = HashSet::new();
        let mut current = Some(first);
        while let Some(node) = current {
            lineage.insert(node.id());
            current = node.parent();
        }

        let mut current = Some(second);
        while let Some(node) = current {
            if lineage.contains(&node.id()) {
                return Some(node);
            }
            current = node.parent();
        }
        return None;
    }

    fn element_at(&self, offset: usize) -> Option<Node<'_>> {
        let len = self.source.len();
        if len == 0 || offset > len {
            return None;
        }
        // A region ending at EOF points one past the last byte.
        let at = if offset == len { len.saturating_sub(1) } else { offset };
        return self.tree.root_node().descendant_for_byte_range(at, at);
    }

    fn enclosing_method<'t>(&'t self, element: Node<'t>) -> Option<MethodDecl> {
        let mut current = Some(element);
        while let Some(node) = current {
            if self.language.is_method(node.kind()) {
                return self.declaration(node);
            }
            current = node.parent();
        }
        return None;
    }

    fn methods_under<'t>(&'t self, element: Node<'t>) -> Vec<MethodDecl> {
        let mut methods = Vec::new();
        let mut cursor = element.walk();
        for child in element.children(&mut cursor) {
            self.collect_methods(child, &mut methods);
        }
        return methods;
    }
}

/// Snapshot of one file taken for the duration of its resolution.
/// Dropping the session releases the snapshot.
#[derive(Debug)]
pub struct ReadSession {
    /// Path relative to the workspace root.
    file: PathBuf,
    /// Content at the time the session was opened.
    source: String,
}

impl ReadSession {
    /// Path of the snapshotted file, relative to the workspace root.
    pub fn file(&self) -> &Path {
        return &self.file;
    }

    /// Parse the snapshot with the grammar for its extension.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLanguage` for unknown extensions or
    /// `Error::ParseFailed` if tree-sitter cannot parse the content.
    pub fn parse(&self) -> Result<ParsedSource<'_>, Error> {
        let language = SourceLanguage::for_path(&self.file)?;
        let mut parser = Parser::new();
        parser.set_language(&language.grammar()).map_err(|e| {
            return Error::ParseFailed {
                file: self.file.clone(),
                reason: e.to_string(),
            };
        })?;

        let tree = parser.parse(&self.source, None).ok_or_else(|| {
            return Error::ParseFailed {
                file: self.file.clone(),
                reason: "tree-sitter returned None".to_string(),
            };
        })?;

        let package = language.package(tree.root_node(), &self.source);
        return Ok(ParsedSource {
            language,
            package,
            source: &self.source,
            tree,
        });
    }

    /// Snapshot content.
    pub fn source(&self) -> &str {
        return &self.source;
    }
}

/// The working tree that changed files are read from.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory all relative paths are resolved against.
    root: PathBuf,
}

impl Workspace {
    /// Whether `relative` names a live file in the workspace.
    pub fn is_live(&self, relative: &Path) -> bool {
        return self.root.join(relative).is_file();
    }

    /// Create a workspace rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        return Self { root };
    }

    /// Open a read session on `relative`, snapshotting its content.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file is gone, or `Error::Io` for
    /// other read failures.
    pub fn read_session(&self, relative: &Path) -> Result<ReadSession, Error> {
        let path = self.root.join(relative);
        let source = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound { path });
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Ok(ReadSession {
            file: relative.to_path_buf(),
            source,
        });
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        return &self.root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str, source: &str) -> ReadSession {
        return ReadSession {
            file: PathBuf::from(name),
            source: source.to_string(),
        };
    }

    fn all_methods(parsed: &ParsedSource<'_>) -> Vec<(String, Option<String>)> {
        let root = parsed.tree.root_node();
        return parsed
            .methods_under(root)
            .into_iter()
            .map(|m| return (m.name, m.class))
            .collect();
    }

    fn offset_of(source: &str, needle: &str) -> usize {
        return source.find(needle).unwrap();
    }

    const JAVA: &str = "package com.acme;

public class Outer {
    public Outer() {}

    void run() {
        Runnable r = new Runnable() {
            public void run() {}
        };
        class Local {
            void inLocal() {}
        }
        Runnable l = () -> helper();
    }

    static class Inner {
        int size() { return 0; }
    }
}
";

    #[test]
    fn java_methods_are_qualified_by_package_and_nesting() {
        let file = session("src/com/acme/Outer.java", JAVA);
        let parsed = file.parse().unwrap();
        let methods = all_methods(&parsed);

        assert_eq!(
            methods,
            vec![
                ("Outer".to_string(), Some("com.acme.Outer".to_string())),
                ("run".to_string(), Some("com.acme.Outer".to_string())),
                ("run".to_string(), None),
                ("inLocal".to_string(), None),
                ("size".to_string(), Some("com.acme.Outer.Inner".to_string())),
            ]
        );
    }

    #[test]
    fn enclosing_method_includes_the_element_itself() {
        let file = session("Outer.java", JAVA);
        let parsed = file.parse().unwrap();

        let inside = parsed.element_at(offset_of(JAVA, "return 0")).unwrap();
        let method = parsed.enclosing_method(inside).unwrap();
        assert_eq!(method.name, "size");

        let method_node = parsed
            .tree
            .root_node()
            .descendant_for_byte_range(
                usize::try_from(method.byte_range.start).unwrap(),
                usize::try_from(method.byte_range.end).unwrap(),
            )
            .unwrap();
        assert_eq!(method_node.kind(), "method_declaration");
        assert_eq!(parsed.enclosing_method(method_node).unwrap().name, "size");
    }

    #[test]
    fn element_at_end_of_content_is_clamped() {
        let file = session("Outer.java", JAVA);
        let parsed = file.parse().unwrap();
        assert!(parsed.element_at(JAVA.len()).is_some(), "EOF offset maps to the last byte");
        assert!(parsed.element_at(JAVA.len() + 1).is_none(), "past EOF maps to nothing");
    }

    #[test]
    fn common_ancestor_of_siblings_is_their_parent() {
        let file = session("Outer.java", JAVA);
        let parsed = file.parse().unwrap();
        let ctor = parsed.element_at(offset_of(JAVA, "public Outer()")).unwrap();
        let inner = parsed.element_at(offset_of(JAVA, "static class Inner")).unwrap();
        let ancestor = parsed.common_ancestor(ctor, inner).unwrap();
        assert_eq!(ancestor.kind(), "class_body");
    }

    #[test]
    fn rust_methods_use_module_and_impl_type() {
        let source = "mod net {
    pub struct Server<T>(T);
    impl<T> Server<T> {
        pub fn start(&self) {}
    }
    pub fn free() {}
}
";
        let file = session("src/lib.rs", source);
        let parsed = file.parse().unwrap();
        let methods = all_methods(&parsed);
        assert_eq!(
            methods,
            vec![
                ("start".to_string(), Some("net.Server".to_string())),
                ("free".to_string(), None),
            ]
        );
    }

    #[test]
    fn python_methods_use_class_chain() {
        let source = "class Outer:
    class Inner:
        def ping(self):
            def local():
                pass
            return local
";
        let file = session("app.py", source);
        let parsed = file.parse().unwrap();
        let methods = all_methods(&parsed);
        assert_eq!(
            methods,
            vec![
                ("ping".to_string(), Some("Outer.Inner".to_string())),
                ("local".to_string(), None),
            ]
        );
    }

    #[test]
    fn go_methods_use_package_and_receiver() {
        let source = "package server

type Server struct{}

func (s *Server) Run() {}

func helper() {}
";
        let file = session("server.go", source);
        let parsed = file.parse().unwrap();
        let methods = all_methods(&parsed);
        assert_eq!(
            methods,
            vec![
                ("Run".to_string(), Some("server.Server".to_string())),
                ("helper".to_string(), None),
            ]
        );
    }

    #[test]
    fn typescript_methods_use_class_name() {
        let source = "export class Cart {
    total(): number { return 0; }
}
";
        let file = session("cart.ts", source);
        let parsed = file.parse().unwrap();
        assert_eq!(all_methods(&parsed), vec![("total".to_string(), Some("Cart".to_string()))]);
    }

    #[test]
    fn unsupported_extension_fails_to_parse() {
        let file = session("README.md", "# title");
        assert!(matches!(file.parse(), Err(Error::UnsupportedLanguage { .. })));
    }

    #[test]
    fn read_session_snapshots_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        let workspace = Workspace::new(dir.path().to_path_buf());

        let snapshot = workspace.read_session(Path::new("A.java")).unwrap();
        std::fs::write(dir.path().join("A.java"), "class B {}").unwrap();
        assert_eq!(snapshot.source(), "class A {}");

        let missing = workspace.read_session(Path::new("Gone.java"));
        assert!(matches!(missing, Err(Error::FileNotFound { .. })));
    }
}
