//! TR-009: Type introspection: compilable type names and property lists.
//!
//! Emitters never look at type metadata directly; they go through
//! [`TypeIntrospector`] so an embedding front end can supply its own naming.

use super::error::CodegenError;
use super::types::{Property, RewrittenTypeMap, StructuralType, TypeRef};

/// Strict and reserved Rust keywords (2021 edition), plus `_`.
const KEYWORDS: &[&str] = &[
    "_", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
    "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Whether `name` cannot be used as a plain Rust identifier.
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Supplies compilable names and property lists for manifest types.
pub trait TypeIntrospector {
    /// Deterministic, compilable name for `ty`, with structural types
    /// replaced by their rewritten names.
    fn compilable_name(&self, ty: &TypeRef, rewritten: &RewrittenTypeMap)
        -> Result<String, CodegenError>;

    /// Properties of a structural type in declaration order.
    fn properties(&self, shape: &StructuralType) -> Vec<Property> {
        shape.properties.clone()
    }
}

/// Names types the way they are spelled in Rust source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustTypeNamer;

impl TypeIntrospector for RustTypeNamer {
    fn compilable_name(
        &self,
        ty: &TypeRef,
        rewritten: &RewrittenTypeMap,
    ) -> Result<String, CodegenError> {
        match ty {
            TypeRef::Named(name) => Ok(name.clone()),
            TypeRef::List { list } => Ok(format!("Vec<{}>", self.compilable_name(list, rewritten)?)),
            TypeRef::Optional { option } => {
                Ok(format!("Option<{}>", self.compilable_name(option, rewritten)?))
            }
            TypeRef::Structural(shape) => rewritten
                .get(shape)
                .map(str::to_string)
                .ok_or_else(|| CodegenError::UnmappedStructuralType {
                    shape: shape.to_string(),
                }),
        }
    }
}
