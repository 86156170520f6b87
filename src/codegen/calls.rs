//! TR-004: Call wrappers: one self-healing function per remote call signature.
//!
//! A signature is `(Call_<Schema>_<Method>, request type)`. Each wrapper is a
//! `CallState` machine: Calling -> Succeeded on success, Calling ->
//! Reconnecting on failure, Reconnecting -> Calling once a fresh client is
//! installed in the shared proxy slot. It never gives up.

use crate::core::builder::CodeBuilder;
use crate::core::error::CodegenError;
use crate::core::naming::TypeIntrospector;
use crate::core::types::{Expr, QueryContext};
use indexmap::IndexMap;
use tracing::debug;

/// Pause between client acquisition attempts while reconnecting.
pub const RECONNECT_INTERVAL_MS: u64 = 500;

/// Name of the wrapper for `method` on services implementing `schema`.
pub fn wrapper_name(schema: &str, method: &str) -> String {
    format!("Call_{}_{}", schema, method)
}

/// One distinct remote call signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSignature {
    pub wrapper: String,
    /// Proxy slot the call goes through (first call site wins)
    pub member: String,
    pub method: String,
    /// Logical service name used to reconnect
    pub service_name: String,
    pub proxy_type: String,
    pub request_type: String,
    pub response_type: String,
}

/// Collect the distinct call signatures across all contexts, in discovery order.
pub fn distinct_call_signatures(
    contexts: &[QueryContext],
    types: &dyn TypeIntrospector,
) -> Result<Vec<CallSignature>, CodegenError> {
    let mut signatures: IndexMap<String, CallSignature> = IndexMap::new();

    for ctx in contexts {
        for (site, descriptor) in &ctx.service_calls {
            let Expr::Member(member) = &site.object else {
                return Err(CodegenError::MalformedCallSite {
                    query: ctx.name.clone(),
                    method: site.method.clone(),
                    object: format!("{:?}", site.object),
                });
            };
            let wrapper = wrapper_name(&descriptor.schema.name, &site.method);
            let request_type = types.compilable_name(&site.request_type, &ctx.rewritten_types)?;

            // Keyed by wrapper name; the same name with another request type
            // cannot be expressed without overloading.
            if let Some(existing) = signatures.get(&wrapper) {
                if existing.request_type == request_type {
                    debug!(query = %ctx.name, wrapper = %wrapper, "reusing call wrapper");
                    continue;
                }
                return Err(CodegenError::WrapperNameCollision {
                    wrapper,
                    first: existing.request_type.clone(),
                    second: request_type,
                });
            }

            let response_type = types.compilable_name(&site.response_type, &ctx.rewritten_types)?;
            signatures.insert(
                wrapper.clone(),
                CallSignature {
                    wrapper,
                    member: member.clone(),
                    method: site.method.clone(),
                    service_name: descriptor.name.clone(),
                    proxy_type: descriptor.schema.proxy_type(),
                    request_type,
                    response_type,
                },
            );
        }
    }

    Ok(signatures.into_values().collect())
}

/// Emit every wrapper.
pub fn emit_call_wrappers(builder: &mut CodeBuilder, signatures: &[CallSignature]) {
    for sig in signatures {
        emit_call_wrapper(builder, sig);
        builder.blank();
    }
}

fn emit_call_wrapper(b: &mut CodeBuilder, sig: &CallSignature) {
    b.open_block(format!(
        "fn {}(req: {}) -> {}",
        sig.wrapper, sig.request_type, sig.response_type
    ));
    b.append_line("let mut state = CallState::Calling;");
    b.open_block("loop");
    b.open_block("state = match state");

    b.open_block(format!("CallState::Calling => match {}.current()", sig.member));
    b.open_block(format!("Some(proxy) => match proxy.{}(req.clone())", sig.method));
    b.append_line("Ok(resp) => CallState::Succeeded(resp),");
    b.open_block("Err(err) =>");
    b.append_line(format!(
        "warn!(service = {:?}, method = {:?}, error = %err, \"remote call failed, reconnecting\");",
        sig.member, sig.method
    ));
    b.append_line("CallState::Reconnecting");
    b.end_block();
    b.end_block_with("},");
    b.append_line("None => CallState::Reconnecting,");
    b.end_block_with("},");

    b.open_block("CallState::Reconnecting =>");
    b.open_block("let client = loop");
    b.open_block(format!("match init_client({:?})", sig.service_name));
    b.append_line("Ok(client) => break client,");
    b.append_line(format!(
        "Err(_) => thread::sleep(Duration::from_millis({})),",
        RECONNECT_INTERVAL_MS
    ));
    b.end_block();
    b.end_block_with("};");
    b.append_line(format!("{}.replace({}::new(client));", sig.member, sig.proxy_type));
    b.append_line("CallState::Calling");
    b.end_block();

    b.append_line("CallState::Succeeded(resp) => return resp,");
    b.end_block_with("};");
    b.end_block();
    b.end_block();
}
