//! Signature registry
//!
//! Each exposed method is registered once as an [`RpcMethod`]: an immutable
//! [`MethodDescriptor`] plus a typed invocable handle that already holds its
//! receiver. The [`Registry`] is frozen by [`RegistryBuilder::build`] and
//! only read afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::MethodError;
use crate::schema::{Describe, RecordDescriptor, TypeDescriptor};

/// Registration-time errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("method '{0}' is registered more than once")]
    DuplicateMethod(String),
    #[error("method '{method}' declares parameter '{param}' more than once")]
    DuplicateParameter { method: String, param: String },
    #[error("default for parameter '{param}' of method '{method}' cannot be serialized: {reason}")]
    InvalidDefault {
        method: String,
        param: String,
        reason: String,
    },
    #[error("invalid method name '{0}'")]
    InvalidName(String),
    #[error("two different records are named '{0}'")]
    ConflictingRecord(String),
    #[error("record '{record}' has the same name as the parameter definition of method '{method}'")]
    DefinitionClash { method: String, record: String },
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Wire value used when the caller omits the parameter
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: TypeDescriptor, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Everything known about a method's signature
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ParameterSpec>,
    pub returns: TypeDescriptor,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl MethodDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// First line of the description
    pub fn summary(&self) -> Option<&str> {
        self.description
            .as_deref()
            .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
    }
}

/// Coerced arguments handed to a method handle, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    method: String,
    values: Map<String, Value>,
}

impl BoundArgs {
    pub fn new(method: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            values,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Move an argument out as its declared Rust type.
    ///
    /// Arguments have already passed coercion, so a failure here means the
    /// descriptor and the Rust type disagree and is treated as unhandled.
    pub fn take<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, MethodError> {
        let raw = self.values.remove(name).unwrap_or(Value::Null);
        serde_json::from_value(raw).map_err(|e| {
            MethodError::Unhandled(anyhow::Error::new(e).context(format!(
                "argument '{}' of method '{}' does not match its declared type",
                name, self.method
            )))
        })
    }
}

pub type MethodHandler =
    Arc<dyn Fn(BoundArgs) -> BoxFuture<'static, Result<Value, MethodError>> + Send + Sync>;

/// A typed invocable handle: descriptor plus bound function
#[derive(Clone)]
pub struct RpcMethod {
    descriptor: MethodDescriptor,
    handler: MethodHandler,
    error: Option<RegistryError>,
}

impl RpcMethod {
    pub fn builder(name: impl Into<String>) -> MethodBuilder {
        MethodBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Run the method with already coerced arguments
    pub fn invoke(&self, args: BoundArgs) -> BoxFuture<'static, Result<Value, MethodError>> {
        (self.handler)(args)
    }
}

impl fmt::Debug for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcMethod")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Builder for a single [`RpcMethod`]
///
/// ```rust,ignore
/// let method = MethodBuilder::new("scale")
///     .param::<Point>("p")
///     .param_with_default::<i64>("factor", 2)
///     .handler(|mut args| async move {
///         let p: Point = args.take("p")?;
///         let factor: i64 = args.take("factor")?;
///         Ok::<_, MethodError>(Point { x: p.x * factor, y: p.y * factor })
///     });
/// ```
pub struct MethodBuilder {
    name: String,
    params: Vec<ParameterSpec>,
    description: Option<String>,
    tags: Vec<String>,
    error: Option<RegistryError>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            description: None,
            tags: Vec::new(),
            error: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declare a required parameter of type `T`
    pub fn param<T: Describe>(self, name: impl Into<String>) -> Self {
        self.push_param(ParameterSpec::required(name, T::describe()))
    }

    /// Declare a parameter of type `T` that falls back to `default`
    pub fn param_with_default<T: Describe + Serialize>(
        self,
        name: impl Into<String>,
        default: T,
    ) -> Self {
        let name = name.into();
        match serde_json::to_value(&default) {
            Ok(value) => self.push_param(ParameterSpec::with_default(name, T::describe(), value)),
            Err(e) => {
                let error = RegistryError::InvalidDefault {
                    method: self.name.clone(),
                    param: name,
                    reason: e.to_string(),
                };
                self.record_error(error)
            }
        }
    }

    /// Declare a parameter from an explicit spec
    pub fn param_spec(self, spec: ParameterSpec) -> Self {
        self.push_param(spec)
    }

    fn push_param(mut self, spec: ParameterSpec) -> Self {
        if self.params.iter().any(|p| p.name == spec.name) {
            let error = RegistryError::DuplicateParameter {
                method: self.name.clone(),
                param: spec.name,
            };
            return self.record_error(error);
        }
        self.params.push(spec);
        self
    }

    fn record_error(mut self, error: RegistryError) -> Self {
        self.error.get_or_insert(error);
        self
    }

    /// Attach the function body; its return type becomes the declared
    /// return type.
    pub fn handler<F, Fut, R, E>(self, f: F) -> RpcMethod
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Describe + 'static,
        E: Into<MethodError> + 'static,
    {
        let handler: MethodHandler = Arc::new(move |args: BoundArgs| {
            let fut = f(args);
            async move {
                match fut.await {
                    Ok(value) => serde_json::to_value(value).map_err(MethodError::from),
                    Err(e) => Err(e.into()),
                }
            }
            .boxed()
        });

        RpcMethod {
            descriptor: MethodDescriptor {
                name: self.name,
                params: self.params,
                returns: R::describe(),
                description: self.description,
                tags: self.tags,
            },
            handler,
            error: self.error,
        }
    }
}

/// A value whose methods are exposed over JSON-RPC.
///
/// Usually implemented by `#[instant_api::methods]`.
pub trait RpcService: Send + Sync + 'static {
    /// Bound handles for every exposed method
    fn methods(self: Arc<Self>) -> Vec<RpcMethod>;
}

/// Immutable name → method table
#[derive(Debug, Default)]
pub struct Registry {
    methods: BTreeMap<String, RpcMethod>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&RpcMethod> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Descriptors in name order
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().map(RpcMethod::descriptor)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Collects methods and validates them into a [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    methods: Vec<RpcMethod>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose every method of `service`
    pub fn service<S: RpcService>(self, service: S) -> Self {
        self.service_arc(Arc::new(service))
    }

    /// Expose every method of a service that is shared elsewhere
    pub fn service_arc<S: RpcService>(mut self, service: Arc<S>) -> Self {
        self.methods.extend(service.methods());
        self
    }

    /// Expose every method of `service`, adding `tags` to each
    pub fn service_with_tags<S, I, T>(mut self, service: S, tags: I) -> Self
    where
        S: RpcService,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        for mut method in Arc::new(service).methods() {
            for tag in &tags {
                if !method.descriptor.tags.contains(tag) {
                    method.descriptor.tags.push(tag.clone());
                }
            }
            self.methods.push(method);
        }
        self
    }

    /// Expose a single hand-built method
    pub fn method(mut self, method: RpcMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut methods = BTreeMap::new();
        for method in self.methods {
            if let Some(error) = method.error {
                return Err(error);
            }
            let name = method.descriptor.name.clone();
            if name.is_empty() || name.contains('/') {
                return Err(RegistryError::InvalidName(name));
            }
            if methods.contains_key(&name) {
                return Err(RegistryError::DuplicateMethod(name));
            }
            tracing::debug!("Registered method '{}'", name);
            methods.insert(name, RpcMethod { error: None, ..method });
        }
        check_definitions(&methods)?;
        Ok(Registry { methods })
    }
}

/// Documents list every record and every `<method>_params` object under one
/// namespace, so names must not collide there.
fn check_definitions(methods: &BTreeMap<String, RpcMethod>) -> Result<(), RegistryError> {
    let mut records = BTreeMap::new();
    for method in methods.values() {
        let descriptor = method.descriptor();
        for param in &descriptor.params {
            collect_records(&param.ty, &mut records)?;
        }
        collect_records(&descriptor.returns, &mut records)?;
    }
    for name in methods.keys() {
        let params_name = format!("{}_params", name);
        if records.contains_key(params_name.as_str()) {
            return Err(RegistryError::DefinitionClash {
                method: name.clone(),
                record: params_name,
            });
        }
    }
    Ok(())
}

fn collect_records<'a>(
    ty: &'a TypeDescriptor,
    records: &mut BTreeMap<&'a str, &'a RecordDescriptor>,
) -> Result<(), RegistryError> {
    match ty {
        TypeDescriptor::Record(record) => {
            if let Some(seen) = records.get(record.name.as_str()) {
                return if *seen == record {
                    Ok(())
                } else {
                    Err(RegistryError::ConflictingRecord(record.name.clone()))
                };
            }
            records.insert(record.name.as_str(), record);
            for field in &record.fields {
                collect_records(&field.ty, records)?;
            }
            Ok(())
        }
        TypeDescriptor::Sequence(inner) | TypeDescriptor::Optional(inner) => {
            collect_records(inner, records)
        }
        _ => Ok(()),
    }
}
