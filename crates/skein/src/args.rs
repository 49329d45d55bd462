// Call surface — Arguments, static keys and declared signatures
//
// Pure functions receive their non-state inputs as `Args`: positional values
// plus keyword values. A `Signature` declares which parameters a function
// takes so that bad calls fail before anything runs or compiles.
//
// Values that select a compiled program (static arguments) must be hashable.
// `Value::static_key` converts a value into a `StaticKey`; arrays are traced
// data and have no static key.

use std::collections::BTreeSet;
use std::fmt;

use skein_core::{Array, Error, Result};

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Array),
    Tuple(Vec<Value>),
}

/// Hashable identity of a static argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StaticKey {
    None,
    Bool(bool),
    Int(i64),
    /// Bit pattern of the float. Values that compare equal share a pattern:
    /// `-0.0` is stored as `0.0` and every NaN as the canonical NaN.
    Float(u64),
    Str(String),
    Tuple(Vec<StaticKey>),
}

fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }

    /// The hashable key of this value. Arrays are rejected.
    pub fn static_key(&self) -> Result<StaticKey> {
        Ok(match self {
            Value::None => StaticKey::None,
            Value::Bool(b) => StaticKey::Bool(*b),
            Value::Int(i) => StaticKey::Int(*i),
            Value::Float(f) => StaticKey::Float(float_bits(*f)),
            Value::Str(s) => StaticKey::Str(s.clone()),
            Value::Tuple(items) => StaticKey::Tuple(
                items
                    .iter()
                    .map(Value::static_key)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Array(a) => {
                return Err(Error::config(format!(
                    "static argument must be hashable, got array of shape {}",
                    a.shape()
                )))
            }
        })
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(f, "{a}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Positional and keyword arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
    function: Option<String>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    fn owner(&self) -> &str {
        self.function.as_deref().unwrap_or("<anonymous>")
    }

    fn mismatch(&self, what: impl fmt::Display, expected: &str, got: Option<&Value>) -> Error {
        let message = match got {
            Some(v) => format!("argument {what} must be {expected}, got {}", v.type_name()),
            None => format!("missing argument {what}"),
        };
        Error::call(self.owner(), message)
    }

    /// Positional argument `index` as an array.
    pub fn array(&self, index: usize) -> Result<&Array> {
        let value = self.get(index);
        value
            .and_then(Value::as_array)
            .ok_or_else(|| self.mismatch(index, "an array", value))
    }

    /// Keyword argument `name` as an array.
    pub fn kw_array(&self, name: &str) -> Result<&Array> {
        let value = self.kw(name);
        value
            .and_then(Value::as_array)
            .ok_or_else(|| self.mismatch(name, "an array", value))
    }

    pub fn kw_str(&self, name: &str) -> Result<&str> {
        let value = self.kw(name);
        value
            .and_then(Value::as_str)
            .ok_or_else(|| self.mismatch(name, "a string", value))
    }

    pub fn kw_float(&self, name: &str) -> Result<f64> {
        let value = self.kw(name);
        value
            .and_then(Value::as_float)
            .ok_or_else(|| self.mismatch(name, "a number", value))
    }

    pub fn kw_bool(&self, name: &str) -> Result<bool> {
        let value = self.kw(name);
        value
            .and_then(Value::as_bool)
            .ok_or_else(|| self.mismatch(name, "a bool", value))
    }

    /// Split off the keyword arguments named in `names`. With
    /// `keep_positional` unset the dynamic half is keyword-only, which is
    /// the right shape for re-binding arguments already bound to a declared
    /// signature.
    pub(crate) fn partition(
        &self,
        names: &BTreeSet<String>,
        keep_positional: bool,
    ) -> (Vec<(String, Value)>, Args) {
        let mut statics = Vec::new();
        let mut dynamic = Args {
            positional: if keep_positional {
                self.positional.clone()
            } else {
                Vec::new()
            },
            keywords: Vec::new(),
            function: self.function.clone(),
        };
        for (name, value) in &self.keywords {
            if names.contains(name) {
                statics.push((name.clone(), value.clone()));
            } else {
                dynamic.keywords.push((name.clone(), value.clone()));
            }
        }
        statics.sort_by(|a, b| a.0.cmp(&b.0));
        (statics, dynamic)
    }

    /// These arguments with `extra` keywords appended.
    pub(crate) fn with_keywords(&self, extra: &[(String, Value)]) -> Args {
        let mut out = self.clone();
        out.keywords.extend(extra.iter().cloned());
        out
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// Declared parameters of a pure function.
///
/// A variadic signature (the default) accepts any arguments unchanged. A
/// declared signature binds positional and keyword arguments to named
/// parameters, fills defaults, and rejects everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    variadic: bool,
}

impl Default for Signature {
    fn default() -> Self {
        Self::variadic()
    }
}

impl Signature {
    /// Accept any arguments.
    pub fn variadic() -> Self {
        Signature {
            params: Vec::new(),
            variadic: true,
        }
    }

    /// A signature with no parameters yet; add them with `param`.
    pub fn new() -> Self {
        Signature {
            params: Vec::new(),
            variadic: false,
        }
    }

    /// Add a required parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Add a parameter with a default value.
    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Bind `args` for a call to `function`.
    ///
    /// For a declared signature the result holds every parameter twice: once
    /// positionally in declaration order and once as a keyword, so the callee
    /// can read arguments either way.
    pub fn bind(&self, function: &str, args: &Args) -> Result<Args> {
        let mut seen = BTreeSet::new();
        for (name, _) in &args.keywords {
            if !seen.insert(name.as_str()) {
                return Err(Error::call(
                    function,
                    format!("got multiple values for keyword argument {name:?}"),
                ));
            }
        }

        if self.variadic {
            let mut bound = args.clone();
            bound.function = Some(function.to_string());
            return Ok(bound);
        }

        if args.positional.len() > self.params.len() {
            return Err(Error::call(
                function,
                format!(
                    "takes {} positional arguments but {} were given",
                    self.params.len(),
                    args.positional.len()
                ),
            ));
        }

        let mut slots: Vec<Option<Value>> = args.positional.iter().cloned().map(Some).collect();
        slots.resize(self.params.len(), None);

        for (name, value) in &args.keywords {
            let index = self
                .params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| {
                    Error::call(function, format!("got an unexpected keyword argument {name:?}"))
                })?;
            if slots[index].is_some() {
                return Err(Error::call(
                    function,
                    format!("got multiple values for argument {name:?}"),
                ));
            }
            slots[index] = Some(value.clone());
        }

        let mut bound = Args {
            function: Some(function.to_string()),
            ..Args::default()
        };
        for (param, slot) in self.params.iter().zip(slots) {
            let value = slot.or_else(|| param.default.clone()).ok_or_else(|| {
                Error::call(
                    function,
                    format!("missing required argument {:?}", param.name),
                )
            })?;
            bound.positional.push(value.clone());
            bound.keywords.push((param.name.clone(), value));
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::DType;

    fn program_signature() -> Signature {
        Signature::new().param("x").param_default("mode", "train")
    }

    #[test]
    fn test_bind_fills_defaults() {
        let args = Args::new().arg(Array::scalar(1.0, DType::F32));
        let bound = program_signature().bind("program", &args).unwrap();
        assert_eq!(bound.kw_str("mode").unwrap(), "train");
        assert_eq!(bound.array(0).unwrap().to_scalar().unwrap(), 1.0);
        assert_eq!(bound.get(1), Some(&Value::from("train")));
    }

    #[test]
    fn test_bind_keyword_for_positional_param() {
        let args = Args::new().kwarg("x", 3i64).kwarg("mode", "eval");
        let bound = program_signature().bind("program", &args).unwrap();
        assert_eq!(bound.get(0), Some(&Value::Int(3)));
        assert_eq!(bound.kw_str("mode").unwrap(), "eval");
    }

    #[test]
    fn test_bind_rejects_bad_calls() {
        let sig = program_signature();
        let too_many = Args::new().arg(1i64).arg("a").arg("b");
        assert!(matches!(sig.bind("p", &too_many), Err(Error::Call { .. })));

        let unknown = Args::new().arg(1i64).kwarg("speed", 2i64);
        assert!(matches!(sig.bind("p", &unknown), Err(Error::Call { .. })));

        let missing = Args::new().kwarg("mode", "eval");
        assert!(matches!(sig.bind("p", &missing), Err(Error::Call { .. })));

        let twice = Args::new().arg(1i64).kwarg("x", 2i64);
        assert!(matches!(sig.bind("p", &twice), Err(Error::Call { .. })));

        let duplicate = Args::new().kwarg("mode", "a").kwarg("mode", "b");
        assert!(Signature::variadic().bind("p", &duplicate).is_err());
    }

    #[test]
    fn test_static_key() {
        assert_eq!(
            Value::from("train").static_key().unwrap(),
            StaticKey::Str("train".into())
        );
        assert_eq!(
            Value::Float(0.5).static_key().unwrap(),
            Value::Float(0.5).static_key().unwrap()
        );
        assert_eq!(
            Value::Float(-0.0).static_key().unwrap(),
            Value::Float(0.0).static_key().unwrap()
        );
        let other_nan = f64::from_bits(f64::NAN.to_bits() | 1);
        assert!(other_nan.is_nan());
        assert_eq!(
            Value::Float(other_nan).static_key().unwrap(),
            Value::Float(f64::NAN).static_key().unwrap()
        );
        assert_ne!(
            Value::Float(1.0).static_key().unwrap(),
            Value::Float(-1.0).static_key().unwrap()
        );
        let arr = Value::from(Array::ones(2, DType::F32));
        assert!(matches!(arr.static_key(), Err(Error::Config { .. })));
        let nested = Value::Tuple(vec![Value::Int(1), arr]);
        assert!(nested.static_key().is_err());
    }

    #[test]
    fn test_accessor_errors_name_the_function() {
        let bound = program_signature()
            .bind("program", &Args::new().arg("not an array"))
            .unwrap();
        match bound.array(0) {
            Err(Error::Call { function, .. }) => assert_eq!(function, "program"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_partition_sorts_statics() {
        let args = Args::new().arg(1i64).kwarg("b", 2i64).kwarg("a", 1i64).kwarg("c", 3i64);
        let names: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        let (statics, dynamic) = args.partition(&names, true);
        let keys: Vec<&str> = statics.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(dynamic.positional().len(), 1);
        assert_eq!(dynamic.kw("c"), Some(&Value::Int(3)));

        let (_, keyword_only) = args.partition(&names, false);
        assert!(keyword_only.positional().is_empty());
    }

    #[test]
    fn test_bound_args_rebind_from_keywords() {
        let sig = program_signature();
        let bound = sig
            .bind("program", &Args::new().arg(1i64).kwarg("mode", "eval"))
            .unwrap();
        let names: BTreeSet<String> = ["mode".to_string()].into();
        let (statics, dynamic) = bound.partition(&names, false);
        let rebound = sig.bind("program", &dynamic.with_keywords(&statics)).unwrap();
        assert_eq!(rebound, bound);
    }
}
