//! TR-006: Module assembly pieces: imports, application declaration, footer.

use crate::core::builder::CodeBuilder;
use crate::core::types::QueryContext;
use indexmap::IndexSet;

/// Imports every generated program starts with, in emission order.
pub const BASE_NAMESPACES: &[&str] = &[
    // core runtime
    "std::sync::Arc",
    // collections
    "std::collections::{BTreeMap, HashMap, HashSet, VecDeque}",
    // text
    "std::fmt::Write as _",
    // reflection
    "std::any::{Any, TypeId}",
    // diagnostics
    "tracing::{debug, trace, warn}",
    // networking
    "std::net::SocketAddr",
    // concurrency
    "std::thread",
    "std::time::Duration",
    // application support
    "serde::{Deserialize, Serialize}",
    "tron_runtime::prelude::*",
    // transport
    "tron_transport::TransportClient",
];

/// Lints the generated module opts out of. Wrapper and proxy names follow
/// schema spelling, not Rust conventions.
const MODULE_ALLOWS: &str = "#[allow(non_snake_case, non_camel_case_types, non_upper_case_globals, unused_imports, unused_variables, unused_mut, dead_code, clippy::needless_return)]";

/// Base imports followed by every module referenced through a query's
/// method manifest, in discovery order, without duplicates.
pub fn collect_namespaces(contexts: &[QueryContext]) -> IndexSet<String> {
    let mut namespaces: IndexSet<String> = BASE_NAMESPACES.iter().map(|s| s.to_string()).collect();
    for method in contexts.iter().flat_map(|c| &c.methods) {
        namespaces.insert(format!("{}::*", method.module));
    }
    namespaces
}

/// One `use` line per namespace.
pub fn emit_header(builder: &mut CodeBuilder, namespaces: &IndexSet<String>) {
    for ns in namespaces {
        builder.append_line(format!("use {};", ns));
    }
    builder.blank();
}

/// Module name for an application type, e.g. `KvApp` -> `kv_app`.
pub fn module_name(app_name: &str) -> String {
    let mut out = String::with_capacity(app_name.len() + 4);
    let mut prev_lower = false;
    for ch in app_name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Open the application module and declare the application type with its
/// empty default constructor.
pub fn open_application(builder: &mut CodeBuilder, app_name: &str, module: &str) {
    builder.append_line(MODULE_ALLOWS);
    builder.open_block(format!("pub mod {}", module));
    builder.append_line("use super::*;");
    builder.blank();

    builder.append_line(format!("pub struct {};", app_name));
    builder.blank();

    builder.open_block(format!("impl {}", app_name));
    builder.open_block("pub fn new() -> Self");
    builder.append_line(app_name);
    builder.end_block();
    builder.end_block();
    builder.blank();

    builder.open_block(format!("impl Default for {}", app_name));
    builder.open_block("fn default() -> Self");
    builder.append_line("Self::new()");
    builder.end_block();
    builder.end_block();
    builder.blank();
}

pub fn close_application(builder: &mut CodeBuilder, module: &str) {
    builder.end_block_with(&format!("}} // end mod {}", module));
    builder.blank();
}

/// Machine-generated marker; the only line that varies between identical builds.
pub fn emit_footer(builder: &mut CodeBuilder, generated_at: &str) {
    builder.append_line(format!("/* AUTO GENERATED BY tron AT {} */", generated_at));
}
