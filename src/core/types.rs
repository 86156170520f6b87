//! TR-001: All types shared by the manifest, the query contexts and the emitters.
//!
//! Manifest types derive Serialize/Deserialize for YAML roundtripping. Query
//! contexts are built from a manifest (or by an embedding front end) and are
//! read-only to the emitters except for `rewritten_types`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Top-level tron.yaml
// ============================================================================

/// Root manifest: the services an application talks to and the queries it exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Generated application type name (CamelCase)
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Remote services keyed by the application member that reaches them
    #[serde(default)]
    pub services: IndexMap<String, RemoteServiceDescriptor>,

    /// Query declarations (order-preserving)
    #[serde(default)]
    pub queries: IndexMap<String, QueryDecl>,
}

/// A single declarative query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDecl {
    /// Request value type
    pub input: TypeRef,

    /// Response value type
    pub output: TypeRef,

    /// Local symbols, declared in this order in the entry point
    #[serde(default)]
    pub locals: IndexMap<String, TypeRef>,

    /// Root computation. Variants are written as single-key maps
    /// (`{ call: .. }`, `{ local: x }`) or bare words (`request`).
    #[serde(with = "serde_yaml_ng::with::singleton_map_recursive")]
    pub body: Expr,
}

// ============================================================================
// Services
// ============================================================================

/// Registration and addressing data for one remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServiceDescriptor {
    /// Package the service is deployed from
    pub package: String,

    /// Network address
    pub url: String,

    /// Logical service name used for registration and client lookup
    pub name: String,

    /// Service contract
    pub schema: ServiceSchema,
}

/// The contract a service implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSchema {
    /// Short schema name, used in wrapper names
    pub name: String,

    /// Module path the schema (and its proxy) live in
    #[serde(default)]
    pub module: Option<String>,

    /// Remote methods with their request/response types
    #[serde(default)]
    pub methods: IndexMap<String, MethodSig>,
}

impl ServiceSchema {
    /// Fully qualified schema path.
    pub fn full_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{}::{}", module, self.name),
            None => self.name.clone(),
        }
    }

    /// Generated proxy type for this schema.
    pub fn proxy_type(&self) -> String {
        format!("{}_Proxy", self.full_name())
    }
}

/// Static typing of one remote method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub request: TypeRef,
    pub response: TypeRef,
}

/// The application member through which a service is referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceRef {
    pub member: String,
}

impl ServiceRef {
    pub fn new(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
        }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.member)
    }
}

// ============================================================================
// Types
// ============================================================================

/// A value type as written in a manifest.
///
/// ```yaml
/// input: i64                               # Named
/// output: { list: String }                 # List
/// locals: { hit: { option: String } }      # Optional
/// output: { struct: { key: String, n: i32 } }  # Structural
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    /// Primitive or declared type with a stable name
    Named(String),
    /// Sequence of values
    List { list: Box<TypeRef> },
    /// Possibly absent value
    Optional { option: Box<TypeRef> },
    /// Shape-only type that needs a generated name to cross a boundary
    Structural(StructuralType),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::List {
            list: Box::new(inner),
        }
    }

    pub fn optional(inner: TypeRef) -> Self {
        Self::Optional {
            option: Box::new(inner),
        }
    }

    /// Visit every structural shape reachable from this type, innermost first.
    pub fn for_each_structural(&self, f: &mut impl FnMut(&StructuralType)) {
        match self {
            Self::Named(_) => {}
            Self::List { list: inner } | Self::Optional { option: inner } => {
                inner.for_each_structural(f)
            }
            Self::Structural(shape) => {
                for property in &shape.properties {
                    property.ty.for_each_structural(f);
                }
                f(shape);
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::List { list } => write!(f, "[{}]", list),
            Self::Optional { option } => write!(f, "{}?", option),
            Self::Structural(shape) => write!(f, "{}", shape),
        }
    }
}

/// An anonymous record type identified by its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuralType {
    /// Properties in declaration order
    #[serde(rename = "struct", with = "property_map")]
    pub properties: Vec<Property>,
}

impl StructuralType {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }
}

impl fmt::Display for StructuralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .properties
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        write!(f, "{{ {} }}", fields.join(", "))
    }
}

/// One property of a structural type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    pub name: String,
    pub ty: TypeRef,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Properties are written as an ordered YAML map.
mod property_map {
    use super::{Property, TypeRef};
    use indexmap::IndexMap;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(properties: &[Property], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(properties.len()))?;
        for p in properties {
            map.serialize_entry(&p.name, &p.ty)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Property>, D::Error> {
        let map = IndexMap::<String, TypeRef>::deserialize(d)?;
        Ok(map
            .into_iter()
            .map(|(name, ty)| Property { name, ty })
            .collect())
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Computation tree of a query body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Code literal, emitted verbatim
    Literal(String),
    /// The query's request value
    Request,
    /// A declared local symbol
    Local(String),
    /// An application member (a service reference)
    Member(String),
    /// Property access
    Field { of: Box<Expr>, name: String },
    /// Remote call through a service member
    Call {
        target: Box<Expr>,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Call to a local function from an imported module
    Invoke {
        module: String,
        function: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Build a record value
    Construct {
        #[serde(rename = "type")]
        ty: TypeRef,
        #[serde(default)]
        fields: IndexMap<String, Expr>,
    },
    /// Assign locals in order, then evaluate `result`
    Seq {
        #[serde(default)]
        assign: IndexMap<String, Expr>,
        result: Box<Expr>,
    },
}

impl Expr {
    pub fn member(name: impl Into<String>) -> Self {
        Self::Member(name.into())
    }

    pub fn call(target: Expr, method: impl Into<String>, arg: Expr) -> Self {
        Self::Call {
            target: Box::new(target),
            method: method.into(),
            args: vec![arg],
        }
    }

    /// Visit this node and all its children, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Self::Literal(_) | Self::Request | Self::Local(_) | Self::Member(_) => {}
            Self::Field { of, .. } => of.walk(f),
            Self::Call { target, args, .. } => {
                target.walk(f);
                for arg in args {
                    arg.walk(f);
                }
            }
            Self::Invoke { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Self::Construct { fields, .. } => {
                for value in fields.values() {
                    value.walk(f);
                }
            }
            Self::Seq { assign, result } => {
                for value in assign.values() {
                    value.walk(f);
                }
                result.walk(f);
            }
        }
    }
}

// ============================================================================
// Query contexts
// ============================================================================

/// A remote call site with its static typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Object the method is invoked on (must be `Expr::Member`)
    pub object: Expr,
    pub method: String,
    pub request_type: TypeRef,
    pub response_type: TypeRef,
}

/// A function referenced by a query; its module must be imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub module: String,
    pub name: String,
}

/// Mapping from structural type to generated type name.
///
/// Append-only. Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenTypeMap {
    entries: IndexMap<StructuralType, String>,
}

impl RewrittenTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `name` for `shape` unless the shape already has a name.
    /// Returns whether the entry was inserted.
    pub fn insert_if_absent(&mut self, shape: StructuralType, name: impl Into<String>) -> bool {
        if self.entries.contains_key(&shape) {
            return false;
        }
        self.entries.insert(shape, name.into());
        true
    }

    pub fn get(&self, shape: &StructuralType) -> Option<&str> {
        self.entries.get(shape).map(String::as_str)
    }

    pub fn contains(&self, shape: &StructuralType) -> bool {
        self.entries.contains_key(shape)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StructuralType, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiled intermediate form of one query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub name: String,
    pub input_type: TypeRef,
    pub output_type: TypeRef,
    pub root: Expr,

    /// Local alias -> type, in declaration order
    pub locals: IndexMap<String, TypeRef>,

    /// Services referenced by this query
    pub services: IndexMap<ServiceRef, RemoteServiceDescriptor>,

    /// Every remote call site with the service it targets
    pub service_calls: Vec<(CallSite, RemoteServiceDescriptor)>,

    /// Functions whose modules must be imported
    pub methods: Vec<MethodRef>,

    /// Structural type names; replaced by the unified map during a build
    pub rewritten_types: Arc<RewrittenTypeMap>,
}

impl QueryContext {
    pub fn new(name: impl Into<String>, input_type: TypeRef, output_type: TypeRef, root: Expr) -> Self {
        Self {
            name: name.into(),
            input_type,
            output_type,
            root,
            locals: IndexMap::new(),
            services: IndexMap::new(),
            service_calls: Vec::new(),
            methods: Vec::new(),
            rewritten_types: Arc::new(RewrittenTypeMap::new()),
        }
    }

    /// Look up a referenced service by member name.
    pub fn service(&self, member: &str) -> Option<&RemoteServiceDescriptor> {
        self.services.get(&ServiceRef::new(member))
    }
}

// ============================================================================
// Tests
// ============================================================================
