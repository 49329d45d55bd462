// Array — Dense values held in the state store
//
// The state-threading layer never computes on values itself; it only names,
// stores and threads them. `Array` is the minimal value type it needs: a
// shape, a dtype and row-major data. Elementwise arithmetic with broadcasting
// is provided so stateful functions have something to compute with.
//
// Data is stored as f64 and coerced into the dtype's domain on every
// construction, so an I32 array never holds 2.5.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::shape::Shape;

/// An n-dimensional array with a fixed shape and element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArray")]
pub struct Array {
    shape: Shape,
    dtype: DType,
    data: Vec<f64>,
}

// Wire form of `Array`; decoded payloads go through `from_vec` so the
// element count and dtype domain hold for everything deserialized.
#[derive(Deserialize)]
struct RawArray {
    shape: Shape,
    dtype: DType,
    data: Vec<f64>,
}

impl TryFrom<RawArray> for Array {
    type Error = Error;

    fn try_from(raw: RawArray) -> Result<Self> {
        Array::from_vec(raw.data, raw.shape, raw.dtype)
    }
}

impl Array {
    /// Build an array from raw values; the element count must match the shape.
    pub fn from_vec(data: Vec<f64>, shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCount {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let data = data.into_iter().map(|v| dtype.coerce(v)).collect();
        Ok(Array { shape, dtype, data })
    }

    /// Build an array whose element count is known to match `shape`.
    pub(crate) fn from_parts(shape: Shape, dtype: DType, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), shape.elem_count());
        let data = data.into_iter().map(|v| dtype.coerce(v)).collect();
        Array { shape, dtype, data }
    }

    /// Build an array from a typed slice, taking the dtype from `T`.
    pub fn from_slice<T: WithDType>(values: &[T], shape: impl Into<Shape>) -> Result<Self> {
        let data = values.iter().map(|v| WithDType::to_f64(*v)).collect();
        Self::from_vec(data, shape, T::DTYPE)
    }

    /// A 0-dimensional array.
    pub fn scalar(value: f64, dtype: DType) -> Self {
        Array {
            shape: Shape::scalar(),
            dtype,
            data: vec![dtype.coerce(value)],
        }
    }

    /// A 0-dimensional array typed by the Rust scalar.
    pub fn from_scalar<T: WithDType>(value: T) -> Self {
        Self::scalar(WithDType::to_f64(value), T::DTYPE)
    }

    pub fn full(shape: impl Into<Shape>, value: f64, dtype: DType) -> Self {
        let shape = shape.into();
        let data = vec![dtype.coerce(value); shape.elem_count()];
        Array { shape, dtype, data }
    }

    pub fn zeros(shape: impl Into<Shape>, dtype: DType) -> Self {
        Self::full(shape, 0.0, dtype)
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType) -> Self {
        Self::full(shape, 1.0, dtype)
    }

    /// `[0, 1, ..., n-1]` as a 1-D array.
    pub fn arange(n: usize, dtype: DType) -> Self {
        let data = (0..n).map(|i| dtype.coerce(i as f64)).collect();
        Array {
            shape: Shape::from(n),
            dtype,
            data,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }

    /// The single value of a one-element array.
    pub fn to_scalar(&self) -> Result<f64> {
        match self.data.as_slice() {
            [v] => Ok(*v),
            _ => Err(Error::msg(format!(
                "not a scalar: array has shape {}",
                self.shape
            ))),
        }
    }

    /// Whether `other` has the same shape and dtype.
    pub fn same_layout(&self, other: &Array) -> bool {
        self.shape == other.shape && self.dtype == other.dtype
    }

    pub fn cast(&self, dtype: DType) -> Self {
        Array {
            shape: self.shape.clone(),
            dtype,
            data: self.data.iter().map(|&v| dtype.coerce(v)).collect(),
        }
    }

    /// Apply `f` to every element, keeping shape and dtype.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Array {
            shape: self.shape.clone(),
            dtype: self.dtype,
            data: self.data.iter().map(|&v| self.dtype.coerce(f(v))).collect(),
        }
    }

    /// Combine two arrays elementwise with broadcasting. Both sides must share
    /// a dtype.
    pub fn zip_with(&self, rhs: &Array, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.dtype != rhs.dtype {
            return Err(Error::msg(format!(
                "dtype mismatch in elementwise op: {} vs {}",
                self.dtype, rhs.dtype
            )));
        }
        let shape = Shape::broadcast_shape(&self.shape, &rhs.shape)?;
        let data = (0..shape.elem_count())
            .map(|i| {
                let a = self.data[self.shape.broadcast_offset(&shape, i)];
                let b = rhs.data[rhs.shape.broadcast_offset(&shape, i)];
                self.dtype.coerce(f(a, b))
            })
            .collect();
        Ok(Array {
            shape,
            dtype: self.dtype,
            data,
        })
    }

    pub fn add(&self, rhs: &Array) -> Result<Self> {
        self.zip_with(rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Array) -> Result<Self> {
        self.zip_with(rhs, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Array) -> Result<Self> {
        self.zip_with(rhs, |a, b| a * b)
    }

    pub fn div(&self, rhs: &Array) -> Result<Self> {
        self.zip_with(rhs, |a, b| a / b)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    /// `self * mul + add`, elementwise.
    pub fn affine(&self, mul: f64, add: f64) -> Self {
        self.map(|v| v * mul + add)
    }

    pub fn square(&self) -> Self {
        self.map(|v| v * v)
    }

    /// Sum of all elements as a scalar array.
    pub fn sum_all(&self) -> Self {
        Self::scalar(self.data.iter().sum(), self.dtype)
    }

    /// Mean of all elements as a scalar array. Always floating point: integer
    /// inputs produce an F64 mean.
    pub fn mean_all(&self) -> Self {
        let dtype = if self.dtype.is_float() {
            self.dtype
        } else {
            DType::F64
        };
        let n = self.data.len().max(1) as f64;
        Self::scalar(self.data.iter().sum::<f64>() / n, dtype)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shape.is_scalar() {
            return write!(f, "{}({})", self.dtype, self.data[0]);
        }
        write!(f, "{}{}{:?}", self.dtype, self.shape, self.data)
    }
}
