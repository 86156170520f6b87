//! TR-012: Query context resolution.
//!
//! Turns a manifest into one `QueryContext` per query: services and call
//! sites are found by walking the body, imported modules come from `invoke`
//! nodes, and every structural shape the query touches gets a proposed name
//! `<QueryName>_T<n>`, nested shapes before the shapes that contain them.

use super::types::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Build the query contexts for every query in the manifest, in declaration order.
///
/// Type-name prefixes are distinct across queries: `lookup` and `Lookup`
/// both camel-case to `Lookup`, so the later one becomes `Lookup_1`.
pub fn build_contexts(manifest: &Manifest) -> Result<Vec<QueryContext>, String> {
    let mut prefixes = HashSet::new();
    manifest
        .queries
        .iter()
        .map(|(name, decl)| {
            let prefix = unique_prefix(&camel_case(name), &mut prefixes);
            resolve(manifest, name, decl, &prefix)
        })
        .collect()
}

/// Build the context of a single query.
pub fn build_context(manifest: &Manifest, name: &str, decl: &QueryDecl) -> Result<QueryContext, String> {
    resolve(manifest, name, decl, &camel_case(name))
}

fn unique_prefix(base: &str, taken: &mut HashSet<String>) -> String {
    let mut prefix = base.to_string();
    let mut n = 0usize;
    while !taken.insert(prefix.clone()) {
        n += 1;
        prefix = format!("{}_{}", base, n);
    }
    prefix
}

fn resolve(manifest: &Manifest, name: &str, decl: &QueryDecl, prefix: &str) -> Result<QueryContext, String> {
    let mut ctx = QueryContext::new(name, decl.input.clone(), decl.output.clone(), decl.body.clone());
    ctx.locals = decl.locals.clone();

    let mut nodes = Vec::new();
    decl.body.walk(&mut |e| nodes.push(e));

    let mut construct_types = Vec::new();
    for node in nodes {
        match node {
            Expr::Call { target, method, .. } => {
                let Expr::Member(member) = target.as_ref() else {
                    return Err(format!(
                        "query '{}': call to '{}' is not made through a service member",
                        name, method
                    ));
                };
                let descriptor = manifest
                    .services
                    .get(member)
                    .ok_or_else(|| format!("query '{}': unknown service '{}'", name, member))?;
                let sig = descriptor.schema.methods.get(method).ok_or_else(|| {
                    format!(
                        "query '{}': service '{}' has no method '{}'",
                        name, member, method
                    )
                })?;
                ctx.services
                    .entry(ServiceRef::new(member.as_str()))
                    .or_insert_with(|| descriptor.clone());
                ctx.service_calls.push((
                    CallSite {
                        object: Expr::member(member.as_str()),
                        method: method.clone(),
                        request_type: sig.request.clone(),
                        response_type: sig.response.clone(),
                    },
                    descriptor.clone(),
                ));
            }
            Expr::Invoke {
                module, function, ..
            } => {
                let method = MethodRef {
                    module: module.clone(),
                    name: function.clone(),
                };
                if !ctx.methods.contains(&method) {
                    ctx.methods.push(method);
                }
            }
            Expr::Construct { ty, .. } => construct_types.push(ty.clone()),
            _ => {}
        }
    }

    ctx.rewritten_types = Arc::new(propose_type_names(&ctx, prefix, &construct_types));
    Ok(ctx)
}

/// Propose a name for every structural shape reachable from the query's
/// signature, locals, call sites and constructed values.
fn propose_type_names(ctx: &QueryContext, prefix: &str, construct_types: &[TypeRef]) -> RewrittenTypeMap {
    let mut map = RewrittenTypeMap::new();
    let mut next = 0usize;

    let call_types = ctx
        .service_calls
        .iter()
        .flat_map(|(site, _)| [&site.request_type, &site.response_type]);
    let all = [&ctx.input_type, &ctx.output_type]
        .into_iter()
        .chain(ctx.locals.values())
        .chain(call_types)
        .chain(construct_types.iter());

    for ty in all {
        ty.for_each_structural(&mut |shape| {
            if map.insert_if_absent(shape.clone(), format!("{}_T{}", prefix, next)) {
                next += 1;
            }
        });
    }
    map
}

/// `lookup_value` -> `LookupValue`.
pub fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
