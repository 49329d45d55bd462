// Initializer — How a state entry gets its first value
//
// An initializer is a function of (shape, dtype) and, for stochastic
// initializers only, a randomness token:
//
//   Zeros / Ones / Constant(v)   — deterministic, consume no randomness
//   Value(array)                 — a fixed initial array
//   Uniform { low, high }        — U(low, high), consumes one split
//   Normal { mean, std }         — N(mean, std), consumes one split
//   Custom                       — user function, optionally stochastic
//
// Stochastic initializers always request a fresh split from the context, so
// two variables initialized in the same call never share randomness.

use std::fmt;
use std::sync::Arc;

use skein_core::{Array, DType, Error, Key, Result, Shape};

use crate::context::Context;

type InitFn = dyn Fn(&Shape, DType, Option<Key>) -> Result<Array> + Send + Sync;

/// Produces the first value of a state entry.
#[derive(Clone)]
pub enum Initializer {
    Zeros,
    Ones,
    Constant(f64),
    Value(Array),
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std: f64 },
    Custom { func: Arc<InitFn>, random: bool },
}

impl Initializer {
    /// A deterministic user initializer; it receives no key.
    pub fn custom(
        func: impl Fn(&Shape, DType, Option<Key>) -> Result<Array> + Send + Sync + 'static,
    ) -> Self {
        Initializer::Custom {
            func: Arc::new(func),
            random: false,
        }
    }

    /// A stochastic user initializer; it receives a fresh key.
    pub fn custom_random(
        func: impl Fn(&Shape, DType, Option<Key>) -> Result<Array> + Send + Sync + 'static,
    ) -> Self {
        Initializer::Custom {
            func: Arc::new(func),
            random: true,
        }
    }

    /// Whether this initializer consumes randomness.
    pub fn is_random(&self) -> bool {
        match self {
            Initializer::Uniform { .. } | Initializer::Normal { .. } => true,
            Initializer::Custom { random, .. } => *random,
            _ => false,
        }
    }

    /// Build the initial value, drawing a key from `ctx` when needed.
    pub fn init(&self, shape: &Shape, dtype: DType, ctx: &mut Context) -> Result<Array> {
        let key = if self.is_random() {
            Some(ctx.next_key()?)
        } else {
            None
        };
        self.init_with_key(shape, dtype, key)
    }

    fn init_with_key(&self, shape: &Shape, dtype: DType, key: Option<Key>) -> Result<Array> {
        let value = match self {
            Initializer::Zeros => Array::zeros(shape, dtype),
            Initializer::Ones => Array::ones(shape, dtype),
            Initializer::Constant(v) => Array::full(shape, *v, dtype),
            Initializer::Value(a) => a.clone(),
            Initializer::Uniform { low, high } => {
                required(key)?.uniform(shape, dtype, *low, *high)
            }
            Initializer::Normal { mean, std } => required(key)?.normal(shape, dtype, *mean, *std),
            Initializer::Custom { func, .. } => func(shape, dtype, key)?,
        };
        Ok(value)
    }
}

fn required(key: Option<Key>) -> Result<Key> {
    key.ok_or_else(|| Error::scope("stochastic initializer called without a key"))
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Zeros => write!(f, "Zeros"),
            Initializer::Ones => write!(f, "Ones"),
            Initializer::Constant(v) => write!(f, "Constant({v})"),
            Initializer::Value(a) => write!(f, "Value({a})"),
            Initializer::Uniform { low, high } => write!(f, "Uniform({low}, {high})"),
            Initializer::Normal { mean, std } => write!(f, "Normal({mean}, {std})"),
            Initializer::Custom { random, .. } => write!(f, "Custom(random: {random})"),
        }
    }
}
