//! TR-005: Query entry points.
//!
//! Body layout: progress marker, one uninitialized local per alias in alias
//! table order, then the translated computation as the return expression.
//! Locals are `mut`: a body may assign the same alias more than once.

use crate::core::builder::CodeBuilder;
use crate::core::error::CodegenError;
use crate::core::naming::TypeIntrospector;
use crate::core::translate::ExpressionTranslator;
use crate::core::types::QueryContext;

/// Emit the public entry point for one query.
pub fn emit_query(
    builder: &mut CodeBuilder,
    ctx: &QueryContext,
    types: &dyn TypeIntrospector,
    translator: &dyn ExpressionTranslator,
) -> Result<(), CodegenError> {
    let map = &ctx.rewritten_types;
    let input = types.compilable_name(&ctx.input_type, map)?;
    let output = types.compilable_name(&ctx.output_type, map)?;

    builder.open_block(format!("pub fn {}(request: {}) -> {}", ctx.name, input, output));
    builder.append_line(format!("trace!(query = {:?}, \"query invoked\");", ctx.name));

    for (alias, ty) in &ctx.locals {
        builder.append_line(format!("let mut {}: {};", alias, types.compilable_name(ty, map)?));
    }
    if !ctx.locals.is_empty() {
        builder.blank();
    }

    let code = translator.translate(&ctx.root, ctx, types, builder.indent_level())?;
    builder.append_line(format!("return {};", code));

    builder.end_block();
    builder.blank();
    Ok(())
}
