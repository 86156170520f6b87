//! TR-002: Type materialization: one named, serializable struct per structural shape.
//!
//! The unified map is built once per run from every context's own proposals
//! (first proposal for a shape wins) and then handed back to every context,
//! so all later stages resolve a shape to the same name.

use crate::core::builder::CodeBuilder;
use crate::core::error::CodegenError;
use crate::core::naming::TypeIntrospector;
use crate::core::types::{QueryContext, RewrittenTypeMap};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Derives applied to every materialized type.
const DERIVES: &str = "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]";

/// Merge every context's rewritten types into one map and install it in
/// every context.
///
/// Names are unique across the map: a proposal already taken by another
/// shape gets the first free `_<n>` suffix.
pub fn unify_rewritten_types(contexts: &mut [QueryContext]) -> Arc<RewrittenTypeMap> {
    let mut unified = RewrittenTypeMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    for ctx in contexts.iter() {
        for (shape, proposed) in ctx.rewritten_types.iter() {
            if let Some(kept) = unified.get(shape) {
                debug!(query = %ctx.name, proposed, kept, "structural type already named");
                continue;
            }
            let name = free_name(proposed, &taken);
            if name != proposed {
                warn!(query = %ctx.name, proposed, renamed = %name, "type name taken by another shape");
            }
            taken.insert(name.clone());
            unified.insert_if_absent(shape.clone(), name);
        }
    }

    let unified = Arc::new(unified);
    for ctx in contexts.iter_mut() {
        ctx.rewritten_types = Arc::clone(&unified);
    }
    unified
}

fn free_name(proposed: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(proposed) {
        return proposed.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", proposed, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| proposed.to_string())
}

/// Emit one struct declaration per entry of the unified map, in map order.
pub fn emit_type_declarations(
    builder: &mut CodeBuilder,
    rewritten: &RewrittenTypeMap,
    types: &dyn TypeIntrospector,
) -> Result<(), CodegenError> {
    for (shape, name) in rewritten.iter() {
        builder.append_line(DERIVES);
        builder.open_block(format!("pub struct {}", name));
        for property in types.properties(shape) {
            let ty = types.compilable_name(&property.ty, rewritten)?;
            builder.append_line(format!("pub {}: {},", property.name, ty));
        }
        builder.end_block();
        builder.blank();

        builder.open_block(format!("impl {}", name));
        builder.open_block("pub fn new() -> Self");
        builder.append_line("Self::default()");
        builder.end_block();
        builder.end_block();
        builder.blank();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::RustTypeNamer;
    use crate::core::types::{Expr, Property, StructuralType, TypeRef};

    fn pair() -> StructuralType {
        StructuralType::new(vec![
            Property::new("key", TypeRef::named("String")),
            Property::new("value", TypeRef::named("i64")),
        ])
    }

    fn ctx_proposing(name: &str, proposals: &[(StructuralType, &str)]) -> QueryContext {
        let mut ctx = QueryContext::new(name, TypeRef::named("i32"), TypeRef::named("i32"), Expr::Request);
        let mut map = RewrittenTypeMap::new();
        for (shape, proposed) in proposals {
            map.insert_if_absent(shape.clone(), *proposed);
        }
        ctx.rewritten_types = Arc::new(map);
        ctx
    }

    #[test]
    fn test_tr002_first_writer_wins() {
        let mut contexts = vec![
            ctx_proposing("a", &[(pair(), "A_T0")]),
            ctx_proposing("b", &[(pair(), "B_T0")]),
        ];
        let unified = unify_rewritten_types(&mut contexts);
        assert_eq!(unified.len(), 1);
        assert_eq!(unified.get(&pair()), Some("A_T0"));
    }

    #[test]
    fn test_tr002_every_context_shares_the_map() {
        let other = StructuralType::new(vec![Property::new("n", TypeRef::named("u8"))]);
        let mut contexts = vec![
            ctx_proposing("a", &[(pair(), "A_T0")]),
            ctx_proposing("b", &[(other.clone(), "B_T0")]),
        ];
        let unified = unify_rewritten_types(&mut contexts);
        for ctx in &contexts {
            assert!(Arc::ptr_eq(&ctx.rewritten_types, &unified));
        }
        // b now resolves a's shape too
        assert_eq!(contexts[1].rewritten_types.get(&pair()), Some("A_T0"));
        assert_eq!(contexts[0].rewritten_types.get(&other), Some("B_T0"));
    }

    #[test]
    fn test_tr002_emit_declaration() {
        let mut contexts = vec![ctx_proposing("a", &[(pair(), "A_T0")])];
        let unified = unify_rewritten_types(&mut contexts);
        let mut b = CodeBuilder::new();
        emit_type_declarations(&mut b, &unified, &RustTypeNamer).unwrap();
        let out = b.into_string();
        assert!(out.contains("pub struct A_T0 {\n    pub key: String,\n    pub value: i64,\n}"));
        assert!(out.contains("impl A_T0 {\n    pub fn new() -> Self {\n        Self::default()\n"));
        assert!(out.contains("Serialize, Deserialize"));
    }

    #[test]
    fn test_tr002_nested_shape_resolved_through_map() {
        let inner = pair();
        let outer = StructuralType::new(vec![Property::new(
            "entries",
            TypeRef::list(TypeRef::Structural(inner.clone())),
        )]);
        let mut contexts = vec![ctx_proposing("a", &[(inner, "Entry"), (outer, "Page")])];
        let unified = unify_rewritten_types(&mut contexts);
        let mut b = CodeBuilder::new();
        emit_type_declarations(&mut b, &unified, &RustTypeNamer).unwrap();
        assert!(b.as_str().contains("pub entries: Vec<Entry>,"));
    }

    #[test]
    fn test_tr002_missing_nested_shape_fails() {
        let outer = StructuralType::new(vec![Property::new("inner", TypeRef::Structural(pair()))]);
        let mut contexts = vec![ctx_proposing("a", &[(outer, "Outer")])];
        let unified = unify_rewritten_types(&mut contexts);
        let mut b = CodeBuilder::new();
        let err = emit_type_declarations(&mut b, &unified, &RustTypeNamer).unwrap_err();
        assert!(matches!(err, CodegenError::UnmappedStructuralType { .. }));
    }

    #[test]
    fn test_tr002_name_taken_by_other_shape_gets_suffix() {
        let a = StructuralType::new(vec![Property::new("a", TypeRef::named("String"))]);
        let b = StructuralType::new(vec![Property::new("b", TypeRef::named("i32"))]);
        let c = StructuralType::new(vec![Property::new("c", TypeRef::named("u8"))]);
        let mut contexts = vec![
            ctx_proposing("lookup", &[(a.clone(), "Lookup_T0")]),
            ctx_proposing("Lookup", &[(b.clone(), "Lookup_T0"), (a.clone(), "Lookup_T1")]),
            ctx_proposing("other", &[(c.clone(), "Lookup_T0")]),
        ];
        let unified = unify_rewritten_types(&mut contexts);
        assert_eq!(unified.get(&a), Some("Lookup_T0"));
        assert_eq!(unified.get(&b), Some("Lookup_T0_1"));
        assert_eq!(unified.get(&c), Some("Lookup_T0_2"));

        let mut builder = CodeBuilder::new();
        emit_type_declarations(&mut builder, &unified, &RustTypeNamer).unwrap();
        let out = builder.into_string();
        assert_eq!(out.matches("pub struct Lookup_T0 {").count(), 1);
        assert_eq!(out.matches("pub struct Lookup_T0_1 {").count(), 1);
        assert_eq!(out.matches("pub struct Lookup_T0_2 {").count(), 1);
    }

    #[test]
    fn test_tr002_empty_map_emits_nothing() {
        let mut b = CodeBuilder::new();
        emit_type_declarations(&mut b, &RewrittenTypeMap::new(), &RustTypeNamer).unwrap();
        assert!(b.as_str().is_empty());
    }
}
