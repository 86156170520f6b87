//! TR-003: Service clients: one proxy slot and one init step per service member.
//!
//! Services are deduplicated by member name across all queries. The first
//! descriptor seen for a member is the one that gets wired up.

use crate::core::builder::CodeBuilder;
use crate::core::types::{QueryContext, RemoteServiceDescriptor};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// A service member and the descriptor that provisions it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    pub member: String,
    pub descriptor: RemoteServiceDescriptor,
}

/// Services across all contexts, distinct by member name, in discovery order.
pub fn distinct_services(contexts: &[QueryContext]) -> Vec<ServiceBinding> {
    let mut bindings: IndexMap<&str, &RemoteServiceDescriptor> = IndexMap::new();
    for ctx in contexts {
        for (service, descriptor) in &ctx.services {
            match bindings.get(service.member.as_str()) {
                Some(kept) if *kept != descriptor => warn!(
                    query = %ctx.name,
                    member = %service.member,
                    kept = %kept.name,
                    ignored = %descriptor.name,
                    "conflicting descriptors for service member, keeping the first"
                ),
                Some(_) => debug!(member = %service.member, "service already bound"),
                None => {
                    bindings.insert(service.member.as_str(), descriptor);
                }
            }
        }
    }
    bindings
        .into_iter()
        .map(|(member, descriptor)| ServiceBinding {
            member: member.to_string(),
            descriptor: descriptor.clone(),
        })
        .collect()
}

/// Emit the proxy slots followed by the `ServiceMesh` implementation that
/// registers every service and connects its client.
pub fn emit_service_clients(builder: &mut CodeBuilder, app_name: &str, services: &[ServiceBinding]) {
    for binding in services {
        builder.append_line(format!(
            "static {}: ProxySlot<{}> = ProxySlot::empty();",
            binding.member,
            binding.descriptor.schema.proxy_type()
        ));
        builder.blank();
    }

    builder.open_block(format!("impl ServiceMesh for {}", app_name));
    builder.open_block("fn init_services_and_clients(&self) -> ErrorCode");
    for binding in services {
        emit_init_step(builder, binding);
        builder.blank();
    }
    builder.append_line("ErrorCode::Success");
    builder.end_block();
    builder.end_block();
    builder.blank();
}

fn emit_init_step(builder: &mut CodeBuilder, binding: &ServiceBinding) {
    let d = &binding.descriptor;
    builder.append_line(format!(
        "let err = init_service({:?}, {:?}, {:?});",
        d.package, d.url, d.name
    ));
    builder.open_block("if err != ErrorCode::Success && err != ErrorCode::AppServiceAlreadyExist");
    builder.append_line("return err;");
    builder.end_block();
    builder.open_block(format!("match init_client({:?})", d.name));
    builder.append_line(format!(
        "Ok(client) => {}.replace({}::new(client)),",
        binding.member,
        d.schema.proxy_type()
    ));
    builder.append_line("Err(err) => return err,");
    builder.end_block();
}
