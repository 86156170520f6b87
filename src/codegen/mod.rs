//! Program emission: query contexts -> one compilable application module.
//!
//! `CodeGenerator::build` drives the emitters in program order: materialized
//! types, imports, the application module with its service clients, call
//! wrappers and query entry points, then the footer marker.

pub mod calls;
pub mod header;
pub mod materialize;
pub mod query;
pub mod services;

use crate::core::builder::CodeBuilder;
use crate::core::error::CodegenError;
use crate::core::naming::{self, RustTypeNamer, TypeIntrospector};
use crate::core::translate::{ExpressionTranslator, RustExpressionTranslator};
use crate::core::types::QueryContext;
use tracing::{debug, info};

/// Timestamp format of the footer marker.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    /// Identifier drawn for this build
    pub app_id: u64,
    pub app_name: String,
    /// Name of the generated module
    pub module: String,
    /// Local time written into the footer marker
    pub generated_at: String,
    /// Complete program text
    pub source: String,
    /// Emitted entry points, in input order
    pub queries: Vec<String>,
    /// Distinct service members
    pub services: Vec<String>,
    /// Distinct call wrappers
    pub wrappers: Vec<String>,
}

/// Single-use program generator.
pub struct CodeGenerator<'a> {
    app_id: u64,
    builder: CodeBuilder,
    translator: &'a dyn ExpressionTranslator,
    types: &'a dyn TypeIntrospector,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(translator: &'a dyn ExpressionTranslator, types: &'a dyn TypeIntrospector) -> Self {
        Self {
            app_id: rand::random::<u64>(),
            builder: CodeBuilder::new(),
            translator,
            types,
        }
    }

    /// Replace the random identifier, e.g. to reproduce a recorded build.
    pub fn with_app_id(mut self, app_id: u64) -> Self {
        self.app_id = app_id;
        self
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Emit the whole application for `contexts`.
    ///
    /// The contexts' `rewritten_types` are replaced by the unified map; nothing
    /// else in them is modified. Any error aborts the build.
    pub fn build(
        mut self,
        app_name: &str,
        contexts: &mut [QueryContext],
    ) -> Result<GeneratedProgram, CodegenError> {
        if !is_type_name(app_name) {
            return Err(CodegenError::InvalidAppName(app_name.to_string()));
        }
        let module = header::module_name(app_name);
        info!(app = app_name, app_id = self.app_id, queries = contexts.len(), "generating application");

        let rewritten = materialize::unify_rewritten_types(contexts);
        debug!(types = rewritten.len(), "unified rewritten types");
        materialize::emit_type_declarations(&mut self.builder, &rewritten, self.types)?;

        let namespaces = header::collect_namespaces(contexts);
        header::emit_header(&mut self.builder, &namespaces);
        header::open_application(&mut self.builder, app_name, &module);

        let services = services::distinct_services(contexts);
        services::emit_service_clients(&mut self.builder, app_name, &services);

        let signatures = calls::distinct_call_signatures(contexts, self.types)?;
        calls::emit_call_wrappers(&mut self.builder, &signatures);

        for ctx in contexts.iter() {
            debug!(query = %ctx.name, "emitting query");
            query::emit_query(&mut self.builder, ctx, self.types, self.translator)?;
        }

        header::close_application(&mut self.builder, &module);
        let generated_at = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        header::emit_footer(&mut self.builder, &generated_at);

        Ok(GeneratedProgram {
            app_id: self.app_id,
            app_name: app_name.to_string(),
            module,
            generated_at,
            source: self.builder.into_string(),
            queries: contexts.iter().map(|c| c.name.clone()).collect(),
            services: services.into_iter().map(|s| s.member).collect(),
            wrappers: signatures.into_iter().map(|s| s.wrapper).collect(),
        })
    }
}

impl CodeGenerator<'static> {
    /// Generator using the built-in Rust translator and type namer.
    pub fn with_defaults() -> Self {
        Self::new(&RustExpressionTranslator, &RustTypeNamer)
    }
}

/// CamelCase-compatible Rust type name whose module name is not a keyword
/// (`Self` would open `pub mod self`).
fn is_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !naming::is_keyword(name)
        && !naming::is_keyword(&header::module_name(name))
}
