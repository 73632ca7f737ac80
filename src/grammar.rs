/// Tree-sitter grammar resolution and per-language declaration rules.
use std::path::Path;

use tree_sitter::{Language, Node};

use crate::error::Error;

/// How a node on the path from a method to the root affects the method's
/// qualified class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// A named class-like declaration; contributes its name.
    Class(String),
    /// An anonymous or local context; the method has no qualified class.
    Local,
    /// A namespace (e.g. a Rust `mod`); contributes its name but is not a class.
    Scope(String),
    /// Structural node with no effect on naming.
    Transparent,
}

/// Languages the source model can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    /// Go: methods are qualified by package and receiver type.
    Go,
    /// Java: the index's native naming convention.
    Java,
    /// Python: methods are qualified by enclosing classes.
    Python,
    /// Rust: methods are qualified by modules and impl/trait type.
    Rust,
    /// TSX files.
    Tsx,
    /// TypeScript and JavaScript files.
    TypeScript,
}

impl SourceLanguage {
    /// Classify one ancestor of a method declaration.
    pub fn classify(self, node: Node<'_>, source: &str) -> Container {
        let kind = node.kind();
        if self.is_method(kind) {
            return Container::Local;
        }
        return match self {
            Self::Go => Container::Transparent,
            Self::Java => classify_java(node, source),
            Self::Python => classify_python(node, source),
            Self::Rust => classify_rust(node, source),
            Self::Tsx | Self::TypeScript => classify_typescript(node, source),
        };
    }

    /// Map a file extension to its language.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLanguage` for unknown extensions.
    pub fn for_path(path: &Path) -> Result<Self, Error> {
        let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

        return match ext {
            "go" => Ok(Self::Go),
            "java" => Ok(Self::Java),
            "js" | "ts" => Ok(Self::TypeScript),
            "jsx" | "tsx" => Ok(Self::Tsx),
            "py" => Ok(Self::Python),
            "rs" => Ok(Self::Rust),
            _ => Err(Error::UnsupportedLanguage {
                ext: ext.to_string(),
            }),
        };
    }

    /// The tree-sitter grammar for this language.
    pub fn grammar(self) -> Language {
        return match self {
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        };
    }

    /// Whether a node kind is a method (or function) declaration.
    pub fn is_method(self, kind: &str) -> bool {
        return match self {
            Self::Go => matches!(kind, "function_declaration" | "method_declaration"),
            Self::Java => matches!(
                kind,
                "compact_constructor_declaration" | "constructor_declaration" | "method_declaration"
            ),
            Self::Python => kind == "function_definition",
            Self::Rust => matches!(kind, "function_item" | "function_signature_item"),
            Self::Tsx | Self::TypeScript => matches!(
                kind,
                "function_declaration" | "generator_function_declaration" | "method_definition"
            ),
        };
    }

    /// The file-level package prefix, if the language declares one.
    pub fn package(self, root: Node<'_>, source: &str) -> Option<String> {
        let wanted = match self {
            Self::Go => "package_clause",
            Self::Java => "package_declaration",
            Self::Python | Self::Rust | Self::Tsx | Self::TypeScript => return None,
        };

        let mut cursor = root.walk();
        let declaration = root.named_children(&mut cursor).find(|n| return n.kind() == wanted)?;

        let mut inner = declaration.walk();
        let name = declaration.named_children(&mut inner).find(|n| {
            return matches!(n.kind(), "identifier" | "package_identifier" | "scoped_identifier");
        })?;
        return node_text(name, source).map(str::to_string);
    }

    /// For Go method declarations, the receiver's base type name.
    pub fn receiver_type(self, method: Node<'_>, source: &str) -> Option<String> {
        if self != Self::Go || method.kind() != "method_declaration" {
            return None;
        }
        let receiver = method.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let parameter = receiver
            .named_children(&mut cursor)
            .find(|n| return n.kind() == "parameter_declaration")?;
        let type_text = node_text(parameter.child_by_field_name("type")?, source)?;
        let base = type_text.trim_start_matches('*');
        let base = base.split('[').next().unwrap_or(base).trim();
        if base.is_empty() {
            return None;
        }
        return Some(base.to_string());
    }
}

/// Java: named type declarations are classes; anonymous bodies, lambdas, and
/// blocks (local classes) are local.
fn classify_java(node: Node<'_>, source: &str) -> Container {
    return match node.kind() {
        "annotation_type_declaration" | "class_declaration" | "enum_declaration"
        | "interface_declaration" | "record_declaration" => named_class(node, source),
        "block" | "enum_constant" | "lambda_expression" | "object_creation_expression" => {
            Container::Local
        },
        _ => Container::Transparent,
    };
}

/// Python: class bodies are `block` nodes, so only lambdas are local here.
fn classify_python(node: Node<'_>, source: &str) -> Container {
    return match node.kind() {
        "class_definition" => named_class(node, source),
        "lambda" => Container::Local,
        _ => Container::Transparent,
    };
}

/// Rust: `impl` and `trait` name the class, `mod` adds a scope.
fn classify_rust(node: Node<'_>, source: &str) -> Container {
    return match node.kind() {
        "block" | "closure_expression" => Container::Local,
        "impl_item" => {
            let Some(type_text) = node.child_by_field_name("type").and_then(|t| return node_text(t, source))
            else {
                return Container::Local;
            };
            let base = type_text.split('<').next().unwrap_or(type_text);
            let base = base.rsplit("::").next().unwrap_or(base).trim();
            if base.is_empty() {
                return Container::Local;
            }
            Container::Class(base.to_string())
        },
        "mod_item" => match node.child_by_field_name("name").and_then(|n| return node_text(n, source)) {
            None => Container::Local,
            Some(name) => Container::Scope(name.to_string()),
        },
        "trait_item" => named_class(node, source),
        _ => Container::Transparent,
    };
}

/// TypeScript: class declarations name the class; class expressions are anonymous.
fn classify_typescript(node: Node<'_>, source: &str) -> Container {
    return match node.kind() {
        "abstract_class_declaration" | "class_declaration" => named_class(node, source),
        "arrow_function" | "class" | "function_expression" | "statement_block" => Container::Local,
        _ => Container::Transparent,
    };
}

/// A class container named by the node's `name` field, or local if unnamed.
fn named_class(node: Node<'_>, source: &str) -> Container {
    return match node.child_by_field_name("name").and_then(|n| return node_text(n, source)) {
        None => Container::Local,
        Some(name) => Container::Class(name.to_string()),
    };
}

/// UTF-8 text of a node.
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    return node.utf8_text(source.as_bytes()).ok();
}
