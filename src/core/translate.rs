//! TR-010: Expression translation: query body tree -> one Rust expression.
//!
//! The translator produces an expression, never a statement, and leaves the
//! terminator to the caller. Continuation lines are indented absolutely,
//! relative to the `indent` level the expression starts at.

use super::builder::indentation;
use super::error::CodegenError;
use super::naming::TypeIntrospector;
use super::types::{Expr, QueryContext};
use crate::codegen::calls::wrapper_name;

/// Turns a query's root expression into source text.
pub trait ExpressionTranslator {
    fn translate(
        &self,
        root: &Expr,
        ctx: &QueryContext,
        types: &dyn TypeIntrospector,
        indent: usize,
    ) -> Result<String, CodegenError>;
}

/// Default translator emitting Rust expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustExpressionTranslator;

impl ExpressionTranslator for RustExpressionTranslator {
    fn translate(
        &self,
        root: &Expr,
        ctx: &QueryContext,
        types: &dyn TypeIntrospector,
        indent: usize,
    ) -> Result<String, CodegenError> {
        Translation { ctx, types }.expr(root, indent)
    }
}

struct Translation<'a> {
    ctx: &'a QueryContext,
    types: &'a dyn TypeIntrospector,
}

impl Translation<'_> {
    fn expr(&self, expr: &Expr, indent: usize) -> Result<String, CodegenError> {
        match expr {
            Expr::Literal(text) => Ok(text.clone()),
            Expr::Request | Expr::Local(_) | Expr::Field { .. } => {
                Ok(format!("{}.clone()", self.place(expr, indent)?))
            }
            Expr::Member(member) => Err(self.error(format!(
                "service member '{}' can only be the target of a call",
                member
            ))),
            Expr::Call {
                target,
                method,
                args,
            } => self.call(target, method, args, indent),
            Expr::Invoke { function, args, .. } => {
                let rendered = args
                    .iter()
                    .map(|a| self.expr(a, indent))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("{}({})", function, rendered.join(", ")))
            }
            Expr::Construct { ty, fields } => {
                let name = self
                    .types
                    .compilable_name(ty, &self.ctx.rewritten_types)?;
                if fields.is_empty() {
                    return Ok(format!("{}::new()", name));
                }
                let inner = indentation(indent + 1);
                let mut out = format!("{} {{\n", name);
                for (field, value) in fields {
                    out.push_str(&format!("{}{}: {},\n", inner, field, self.expr(value, indent + 1)?));
                }
                out.push_str(&format!("{}}}", indentation(indent)));
                Ok(out)
            }
            Expr::Seq { assign, result } => {
                if assign.is_empty() {
                    return self.expr(result, indent);
                }
                let inner = indentation(indent + 1);
                let mut out = String::from("{\n");
                for (alias, value) in assign {
                    if !self.ctx.locals.contains_key(alias) {
                        return Err(self.error(format!("assignment to undeclared local '{}'", alias)));
                    }
                    out.push_str(&format!("{}{} = {};\n", inner, alias, self.expr(value, indent + 1)?));
                }
                out.push_str(&format!("{}{}\n", inner, self.expr(result, indent + 1)?));
                out.push_str(&format!("{}}}", indentation(indent)));
                Ok(out)
            }
        }
    }

    /// Render a value path without cloning it.
    fn place(&self, expr: &Expr, indent: usize) -> Result<String, CodegenError> {
        match expr {
            Expr::Request => Ok("request".to_string()),
            Expr::Local(alias) => {
                if self.ctx.locals.contains_key(alias) {
                    Ok(alias.clone())
                } else {
                    Err(self.error(format!("use of undeclared local '{}'", alias)))
                }
            }
            Expr::Field { of, name } => Ok(format!("{}.{}", self.place(of, indent)?, name)),
            other => Ok(format!("({})", self.expr(other, indent)?)),
        }
    }

    fn call(
        &self,
        target: &Expr,
        method: &str,
        args: &[Expr],
        indent: usize,
    ) -> Result<String, CodegenError> {
        let Expr::Member(member) = target else {
            return Err(CodegenError::MalformedCallSite {
                query: self.ctx.name.clone(),
                method: method.to_string(),
                object: format!("{:?}", target),
            });
        };
        let descriptor = self
            .ctx
            .service(member)
            .ok_or_else(|| self.error(format!("unknown service member '{}'", member)))?;
        let [arg] = args else {
            return Err(self.error(format!(
                "remote call '{}.{}' takes exactly one request, got {}",
                member,
                method,
                args.len()
            )));
        };
        Ok(format!(
            "{}({})",
            wrapper_name(&descriptor.schema.name, method),
            self.expr(arg, indent)?
        ))
    }

    fn error(&self, message: String) -> CodegenError {
        CodegenError::translation(&self.ctx.name, message)
    }
}
