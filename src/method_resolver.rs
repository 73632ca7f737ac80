//! Map a changed region to the methods it touches.

use crate::source_model::SourceTree;
use crate::types::{ChangeRegion, MethodDecl, RegionKind};

/// Find the methods affected by `region`.
///
/// The region's start and end elements are joined at their nearest common
/// ancestor. Every method nested under that ancestor is collected in source
/// order, then the method containing the ancestor (if any) is appended
/// unless already present. An offset that maps to no element yields nothing.
///
/// A deletion removed nothing that is still in the tree, so only the method
/// containing both surviving neighbours is affected. Removed text between
/// two methods touches neither.
pub fn find_enclosing_methods<T: SourceTree>(tree: &T, region: &ChangeRegion) -> Vec<MethodDecl> {
    let (Some(start), Some(end)) = (tree.element_at(region.start), tree.element_at(region.end))
    else {
        return Vec::new();
    };
    let Some(ancestor) = tree.common_ancestor(start, end) else {
        return Vec::new();
    };

    if region.kind == RegionKind::Deleted {
        return tree.enclosing_method(ancestor).into_iter().collect();
    }

    let mut methods: Vec<MethodDecl> = Vec::new();
    for method in tree.methods_under(ancestor) {
        push_unique(&mut methods, method);
    }
    if let Some(containing) = tree.enclosing_method(ancestor) {
        push_unique(&mut methods, containing);
    }
    return methods;
}

/// Append `method` unless the same declaration is already listed.
fn push_unique(methods: &mut Vec<MethodDecl>, method: MethodDecl) {
    let present = methods
        .iter()
        .any(|m| return m.byte_range == method.byte_range && m.name == method.name);
    if !present {
        methods.push(method);
    }
}
