//! TR-011: YAML parsing and validation.
//!
//! Parses tron.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Application, member, query, local, property and field names must be
//!   valid identifiers and not Rust keywords
//! - Call targets must be declared services, and the method must exist
//! - Remote calls take exactly one request
//! - Locals must be declared, and assigned before a body reads them

use super::naming::is_keyword;
use super::types::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Names that would clash with the generated application module.
const RESERVED: &[&str] = &["new", "default", "request", "init_services_and_clients"];

fn type_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("static regex"))
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn is_ident(name: &str) -> bool {
    ident_re().is_match(name) && !is_keyword(name)
}

fn is_module_path(path: &str) -> bool {
    module_path_re().is_match(path) && !path.split("::").any(is_keyword)
}

fn module_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z_][a-z0-9_]*(::[a-z_][a-z0-9_]*)*$").expect("static regex")
    })
}

/// Parse a tron.yaml file from disk.
pub fn parse_manifest_file(path: &Path) -> Result<Manifest, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_manifest(&content)
}

/// Parse a tron.yaml from a string.
pub fn parse_manifest(yaml: &str) -> Result<Manifest, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed manifest. Returns a list of errors (empty = valid).
pub fn validate_manifest(manifest: &Manifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut err = |message: String| errors.push(ValidationError { message });

    if manifest.version != "1.0" {
        err(format!("version must be \"1.0\", got \"{}\"", manifest.version));
    }

    if manifest.name.is_empty() {
        err("name must not be empty".to_string());
    } else if !type_name_re().is_match(&manifest.name) || is_keyword(&manifest.name) {
        err(format!(
            "name '{}' must be a CamelCase type name",
            manifest.name
        ));
    }

    for (member, service) in &manifest.services {
        if !is_ident(member) {
            err(format!("service member '{}' is not a valid identifier", member));
        }
        if service.name.is_empty() {
            err(format!("service '{}' has no logical name", member));
        }
        if service.url.is_empty() {
            err(format!("service '{}' has no url", member));
        }
        if !is_ident(&service.schema.name) {
            err(format!(
                "service '{}' has invalid schema name '{}'",
                member, service.schema.name
            ));
        }
        if let Some(module) = &service.schema.module {
            if !is_module_path(module) {
                err(format!("service '{}' has invalid schema module '{}'", member, module));
            }
        }
        for (method, sig) in &service.schema.methods {
            if !is_ident(method) {
                err(format!("service '{}' has invalid method name '{}'", member, method));
            }
            for ty in [&sig.request, &sig.response] {
                for property in invalid_properties(ty) {
                    err(format!(
                        "service '{}' method '{}' has invalid property name '{}'",
                        member, method, property
                    ));
                }
            }
        }
    }

    for (name, query) in &manifest.queries {
        if !is_ident(name) {
            err(format!("query '{}' is not a valid identifier", name));
        }
        if manifest.services.contains_key(name) {
            err(format!("query '{}' has the same name as a service member", name));
        }
        if RESERVED.contains(&name.as_str()) || name.starts_with("Call_") {
            err(format!("query name '{}' is reserved", name));
        }
        for local in query.locals.keys() {
            if !is_ident(local) || local == "request" {
                err(format!("query '{}' has invalid local '{}'", name, local));
            }
        }
        let declared = [&query.input, &query.output].into_iter().chain(query.locals.values());
        for ty in declared {
            for property in invalid_properties(ty) {
                err(format!("query '{}' has invalid property name '{}'", name, property));
            }
        }
        let mut body_errors = Vec::new();
        validate_expr(manifest, name, query, &query.body, &mut body_errors);
        for message in body_errors {
            err(message);
        }
    }

    errors
}

fn validate_expr(
    manifest: &Manifest,
    query_name: &str,
    query: &QueryDecl,
    root: &Expr,
    errors: &mut Vec<String>,
) {
    let mut assigned = HashSet::new();
    check_reads(query_name, query, root, &mut assigned, errors);

    root.walk(&mut |expr| match expr {
        Expr::Field { name, .. } if !is_ident(name) => {
            errors.push(format!("query '{}' accesses invalid field '{}'", query_name, name));
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            let Expr::Member(member) = target.as_ref() else {
                errors.push(format!(
                    "query '{}' calls '{}' on something other than a service member",
                    query_name, method
                ));
                return;
            };
            match manifest.services.get(member) {
                None => errors.push(format!(
                    "query '{}' references unknown service '{}'",
                    query_name, member
                )),
                Some(service) if !service.schema.methods.contains_key(method) => {
                    errors.push(format!(
                        "query '{}' calls unknown method '{}' on service '{}'",
                        query_name, method, member
                    ))
                }
                Some(_) => {}
            }
            if args.len() != 1 {
                errors.push(format!(
                    "query '{}' calls '{}.{}' with {} arguments, expected 1",
                    query_name,
                    member,
                    method,
                    args.len()
                ));
            }
        }
        Expr::Invoke {
            module, function, ..
        } => {
            if !is_module_path(module) {
                errors.push(format!("query '{}' invokes from invalid module '{}'", query_name, module));
            }
            if !is_ident(function) {
                errors.push(format!("query '{}' invokes invalid function '{}'", query_name, function));
            }
        }
        Expr::Construct { ty, fields } => {
            for property in invalid_properties(ty) {
                errors.push(format!(
                    "query '{}' constructs a type with invalid property name '{}'",
                    query_name, property
                ));
            }
            for field in fields.keys().filter(|f| !is_ident(f)) {
                errors.push(format!("query '{}' constructs invalid field '{}'", query_name, field));
            }
        }
        Expr::Seq { assign, .. } => {
            for alias in assign.keys() {
                if !query.locals.contains_key(alias) {
                    errors.push(format!(
                        "query '{}' assigns undeclared local '{}'",
                        query_name, alias
                    ));
                }
            }
        }
        _ => {}
    });
}

/// Property names anywhere inside `ty` that cannot become struct fields.
fn invalid_properties(ty: &TypeRef) -> Vec<String> {
    let mut bad = Vec::new();
    ty.for_each_structural(&mut |shape| {
        for property in &shape.properties {
            if !is_ident(&property.name) && !bad.contains(&property.name) {
                bad.push(property.name.clone());
            }
        }
    });
    bad
}

/// Follow the body in evaluation order and report reads of locals that are
/// undeclared or not yet assigned on every path to the read.
fn check_reads<'a>(
    query_name: &str,
    query: &QueryDecl,
    expr: &'a Expr,
    assigned: &mut HashSet<&'a str>,
    errors: &mut Vec<String>,
) {
    match expr {
        Expr::Local(alias) if !query.locals.contains_key(alias) => {
            errors.push(format!("query '{}' reads undeclared local '{}'", query_name, alias));
        }
        Expr::Local(alias) if !assigned.contains(alias.as_str()) => {
            errors.push(format!(
                "query '{}' reads local '{}' before it is assigned",
                query_name, alias
            ));
        }
        Expr::Field { of, .. } => check_reads(query_name, query, of, assigned, errors),
        Expr::Call { target, args, .. } => {
            check_reads(query_name, query, target, assigned, errors);
            for arg in args {
                check_reads(query_name, query, arg, assigned, errors);
            }
        }
        Expr::Invoke { args, .. } => {
            for arg in args {
                check_reads(query_name, query, arg, assigned, errors);
            }
        }
        Expr::Construct { fields, .. } => {
            for value in fields.values() {
                check_reads(query_name, query, value, assigned, errors);
            }
        }
        Expr::Seq { assign, result } => {
            for (alias, value) in assign {
                check_reads(query_name, query, value, assigned, errors);
                assigned.insert(alias.as_str());
            }
            check_reads(query_name, query, result, assigned, errors);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KV: &str = r#"
version: "1.0"
name: KvApp
services:
  kv:
    package: simple_kv
    url: "127.0.0.1:34601"
    name: simple_kv.instance0
    schema:
      name: SimpleKv
      module: simple_kv
      methods:
        read: { request: String, response: String }
        write: { request: { struct: { key: String, value: String } }, response: i32 }
"#;

    fn with_queries(queries: &str) -> Manifest {
        parse_manifest(&format!("{}queries:\n{}", KV, queries)).unwrap()
    }

    fn messages(manifest: &Manifest) -> Vec<String> {
        validate_manifest(manifest)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_tr011_parse_valid() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    locals: { value: String }
    body:
      seq:
        assign:
          value: { call: { target: { member: kv }, method: read, args: [request] } }
        result: { local: value }
"#,
        );
        assert_eq!(manifest.name, "KvApp");
        let errors = messages(&manifest);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_tr011_bad_version() {
        let manifest = parse_manifest("version: \"2.0\"\nname: App\n").unwrap();
        assert!(messages(&manifest).iter().any(|e| e.contains("version")));
    }

    #[test]
    fn test_tr011_bad_app_name() {
        let manifest = parse_manifest("version: \"1.0\"\nname: kv-app\n").unwrap();
        assert!(messages(&manifest).iter().any(|e| e.contains("CamelCase")));

        let manifest = parse_manifest("version: \"1.0\"\nname: \"\"\n").unwrap();
        assert!(messages(&manifest).iter().any(|e| e.contains("must not be empty")));
    }

    #[test]
    fn test_tr011_unknown_service() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body: { call: { target: { member: cache }, method: read, args: [request] } }
"#,
        );
        assert!(messages(&manifest).iter().any(|e| e.contains("unknown service 'cache'")));
    }

    #[test]
    fn test_tr011_unknown_method() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body: { call: { target: { member: kv }, method: remove, args: [request] } }
"#,
        );
        assert!(messages(&manifest).iter().any(|e| e.contains("unknown method 'remove'")));
    }

    #[test]
    fn test_tr011_call_arity() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body: { call: { target: { member: kv }, method: read, args: [request, request] } }
"#,
        );
        assert!(messages(&manifest).iter().any(|e| e.contains("with 2 arguments")));
    }

    #[test]
    fn test_tr011_call_on_non_member() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body: { call: { target: request, method: read, args: [request] } }
"#,
        );
        assert!(messages(&manifest)
            .iter()
            .any(|e| e.contains("something other than a service member")));
    }

    #[test]
    fn test_tr011_undeclared_locals() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body:
      seq:
        assign: { tmp: request }
        result: { local: other }
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.iter().any(|e| e.contains("assigns undeclared local 'tmp'")));
        assert!(errors.iter().any(|e| e.contains("reads undeclared local 'other'")));
    }

    #[test]
    fn test_tr011_local_read_before_assignment() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    locals: { value: String, spare: String }
    body:
      seq:
        assign:
          value: { call: { target: { member: kv }, method: read, args: [{ local: value }] } }
        result: { local: spare }
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.iter().any(|e| e.contains("reads local 'value' before it is assigned")));
        assert!(errors.iter().any(|e| e.contains("reads local 'spare' before it is assigned")));
    }

    #[test]
    fn test_tr011_reassignment_and_nested_reads() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    locals: { value: String }
    body:
      seq:
        assign:
          value:
            seq:
              assign:
                value: request
              result: { call: { target: { member: kv }, method: read, args: [{ local: value }] } }
        result: { local: value }
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_tr011_query_name_clashes() {
        let manifest = with_queries(
            r#"
  kv:
    input: String
    output: String
    body: request
  new:
    input: String
    output: String
    body: request
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.iter().any(|e| e.contains("same name as a service member")));
        assert!(errors.iter().any(|e| e.contains("'new' is reserved")));
    }

    #[test]
    fn test_tr011_invalid_invoke() {
        let manifest = with_queries(
            r#"
  lookup:
    input: String
    output: String
    body: { invoke: { module: "Kv-Util", function: normalize, args: [request] } }
"#,
        );
        assert!(messages(&manifest).iter().any(|e| e.contains("invalid module 'Kv-Util'")));
    }

    #[test]
    fn test_tr011_keyword_names_rejected() {
        let manifest = with_queries(
            r#"
  type:
    input: String
    output: String
    body: request
  lookup:
    input: String
    output: String
    locals: { match: String }
    body: { field: { of: request, name: fn } }
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.iter().any(|e| e.contains("query 'type' is not a valid identifier")));
        assert!(errors.iter().any(|e| e.contains("invalid local 'match'")));
        assert!(errors.iter().any(|e| e.contains("invalid field 'fn'")));

        let manifest = parse_manifest("version: \"1.0\"\nname: Self\n").unwrap();
        assert!(messages(&manifest).iter().any(|e| e.contains("CamelCase")));
    }

    #[test]
    fn test_tr011_invalid_property_names() {
        let manifest = with_queries(
            r#"
  lookup:
    input: { struct: { "my-key": String } }
    output: { struct: { inner: { struct: { loop: i32 } } } }
    body:
      construct:
        type: { struct: { "a b": String } }
        fields: { "a b": request, "type": request }
"#,
        );
        let errors = messages(&manifest);
        assert!(errors.iter().any(|e| e.contains("invalid property name 'my-key'")));
        assert!(errors.iter().any(|e| e.contains("invalid property name 'loop'")));
        assert!(errors
            .iter()
            .any(|e| e.contains("constructs a type with invalid property name 'a b'")));
        assert!(errors.iter().any(|e| e.contains("constructs invalid field 'a b'")));
        assert!(errors.iter().any(|e| e.contains("constructs invalid field 'type'")));
    }

    #[test]
    fn test_tr011_invalid_method_property() {
        let manifest = parse_manifest(&KV.replace("key: String, value", "\"my-key\": String, value")).unwrap();
        assert!(messages(&manifest)
            .iter()
            .any(|e| e.contains("method 'write' has invalid property name 'my-key'")));
    }

    #[test]
    fn test_tr011_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tron.yaml");
        std::fs::write(&path, KV).unwrap();
        let manifest = parse_manifest_file(&path).unwrap();
        assert_eq!(manifest.services.len(), 1);
        assert!(manifest.queries.is_empty());
    }

    #[test]
    fn test_tr011_parse_missing_file() {
        let err = parse_manifest_file(Path::new("/nonexistent/tron.yaml")).unwrap_err();
        assert!(err.contains("failed to read"));
    }

    #[test]
    fn test_tr011_parse_invalid_yaml() {
        assert!(parse_manifest("not: [valid: yaml: {{").is_err());
    }
}
