//! Runtime argument values and declared parameter shapes.
//!
//! Channels that are looked up by name (from configuration or tooling) carry
//! their arguments as a list of [`Value`]s. Every channel and every callback
//! declares a [`Signature`]; the bus compares the two positionally using
//! [`ValueType::accepts`].

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Opaque host object passed through the bus by reference.
///
/// The type name is the object's identity for signature checks; two objects
/// compare equal only when they share both the name and the allocation.
#[derive(Clone)]
pub struct Object {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    /// Wrap a value under the given type name.
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: T) -> Self {
        Self::from_arc(type_name, Arc::new(value))
    }

    /// Wrap an already shared value without copying it.
    pub fn from_arc<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: Arc<T>) -> Self {
        Self {
            type_name: type_name.into(),
            inner: value,
        }
    }

    /// The declared type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Borrow the inner value if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Get a shared handle to the inner value if it is a `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name)
    }
}

/// A single runtime argument
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Nil,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Host object handle.
    Object(Object),
}

impl Value {
    /// The runtime type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List,
            Value::Object(object) => ValueType::Object(object.type_name().to_string()),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Convert to JSON for logging and tooling output.
    ///
    /// Objects have no JSON form and are rendered as their type name.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(object) => serde_json::Value::String(format!("<{}>", object.type_name())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            // Maps flatten to their values in key order
            serde_json::Value::Object(map) => {
                Value::List(map.into_iter().map(|(_, v)| Value::from(v)).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "<{}>", object.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

/// Declared type of a parameter or runtime type of a value.
///
/// Serialized in its text form (`"int"`, `"object:Player"`, ...) so that
/// signatures can be written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    /// Accepts any value.
    Any,
    Nil,
    Bool,
    Int,
    Float,
    Str,
    List,
    /// Host object with the given type name.
    Object(String),
}

impl ValueType {
    /// Object type with the given name
    pub fn object(name: impl Into<String>) -> Self {
        ValueType::Object(name.into())
    }

    /// Whether a parameter of this type can receive a value of type `actual`.
    ///
    /// `Int` widens to `Float`; that is the only implicit conversion.
    pub fn accepts(&self, actual: &ValueType) -> bool {
        match (self, actual) {
            (ValueType::Any, _) => true,
            (ValueType::Float, ValueType::Int) => true,
            (expected, actual) => expected == actual,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Nil => write!(f, "nil"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Str => write!(f, "str"),
            ValueType::List => write!(f, "list"),
            ValueType::Object(name) => write!(f, "object:{}", name),
        }
    }
}

/// Unrecognized type name in a signature declaration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown value type '{0}'")]
pub struct ParseValueTypeError(pub String);

impl FromStr for ValueType {
    type Err = ParseValueTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(name) = trimmed.strip_prefix("object:") {
            if name.is_empty() {
                return Err(ParseValueTypeError(s.to_string()));
            }
            return Ok(ValueType::Object(name.to_string()));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "any" | "variant" => Ok(ValueType::Any),
            "nil" | "null" => Ok(ValueType::Nil),
            "bool" => Ok(ValueType::Bool),
            "int" | "integer" => Ok(ValueType::Int),
            "float" | "number" => Ok(ValueType::Float),
            "str" | "string" => Ok(ValueType::Str),
            "list" | "array" => Ok(ValueType::List),
            _ => Err(ParseValueTypeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = ParseValueTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.to_string()
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    /// Optional parameters may be omitted by the caller.
    #[serde(default)]
    pub optional: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: true,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.optional { "?" } else { "" };
        write!(f, "{}{}: {}", self.name, marker, self.ty)
    }
}

/// Why an argument list or callback does not fit a signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// More arguments than declared parameters
    #[error("Invalid param count: {declared} declared, {supplied} supplied")]
    TooMany { declared: usize, supplied: usize },

    /// A required parameter has nothing to bind to
    #[error("Missing required param '{name}' at position {index}")]
    Missing { index: usize, name: String },

    /// Declared and supplied types disagree
    #[error(
        "Mismatch param type for '{name}' at position {index}: expected {expected}, got {actual}"
    )]
    TypeMismatch {
        index: usize,
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// Arguments passed the parameter check but the handler could not
    /// decode them into its native types
    #[error("Arguments do not decode as {target}")]
    Undecodable { target: String },
}

/// Ordered parameter list of a channel or callback
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<Param>);

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a required parameter
    pub fn param(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.0.push(Param::new(name, ty));
        self
    }

    /// Append an optional parameter
    pub fn optional(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.0.push(Param::optional(name, ty));
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of parameters that are not optional
    pub fn required_len(&self) -> usize {
        self.0.iter().filter(|p| !p.optional).count()
    }

    /// Check a concrete argument list against this signature.
    ///
    /// Missing trailing arguments are allowed only for optional parameters,
    /// surplus arguments never are.
    pub fn check_args(&self, args: &[Value]) -> Result<(), ShapeError> {
        if args.len() > self.0.len() {
            return Err(ShapeError::TooMany {
                declared: self.0.len(),
                supplied: args.len(),
            });
        }

        for (index, param) in self.0.iter().enumerate() {
            match args.get(index) {
                Some(arg) => {
                    let actual = arg.value_type();
                    if !param.ty.accepts(&actual) {
                        return Err(ShapeError::TypeMismatch {
                            index,
                            name: param.name.clone(),
                            expected: param.ty.clone(),
                            actual,
                        });
                    }
                }
                None if param.optional => {}
                None => {
                    return Err(ShapeError::Missing {
                        index,
                        name: param.name.clone(),
                    })
                }
            }
        }

        Ok(())
    }

    /// Check that a callback declaring `self` can listen on a channel
    /// declaring `channel`, given the arguments bound at subscription time.
    ///
    /// A dispatch may stop anywhere inside the channel's optional tail, and
    /// the bound arguments follow whatever it supplied. The listener is
    /// accepted when at least one such dispatch length fits the callback.
    /// Otherwise the error for a full-length dispatch is returned.
    pub fn check_listener(&self, channel: &Signature, binds: &[Value]) -> Result<(), ShapeError> {
        let required = channel
            .0
            .iter()
            .rposition(|param| !param.optional)
            .map_or(0, |index| index + 1);

        let full = self.check_dispatch_shape(channel, channel.len(), binds);
        if full.is_ok() {
            return full;
        }

        for supplied in (required..channel.len()).rev() {
            if self.check_dispatch_shape(channel, supplied, binds).is_ok() {
                return Ok(());
            }
        }

        full
    }

    /// Check one dispatch shape: the first `supplied` channel parameters
    /// followed by `binds`.
    fn check_dispatch_shape(
        &self,
        channel: &Signature,
        supplied: usize,
        binds: &[Value],
    ) -> Result<(), ShapeError> {
        let total = supplied + binds.len();
        if total > self.0.len() {
            return Err(ShapeError::TooMany {
                declared: self.0.len(),
                supplied: total,
            });
        }

        for (index, param) in self.0.iter().enumerate() {
            let actual = if index < supplied {
                channel.0[index].ty.clone()
            } else if let Some(bound) = binds.get(index - supplied) {
                bound.value_type()
            } else if param.optional {
                continue;
            } else {
                return Err(ShapeError::Missing {
                    index,
                    name: param.name.clone(),
                });
            };

            if !param.ty.accepts(&actual) {
                return Err(ShapeError::TypeMismatch {
                    index,
                    name: param.name.clone(),
                    expected: param.ty.clone(),
                    actual,
                });
            }
        }

        Ok(())
    }
}

impl From<Vec<Param>> for Signature {
    fn from(params: Vec<Param>) -> Self {
        Self(params)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}
