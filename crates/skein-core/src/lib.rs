//! # skein-core
//!
//! Values that skein threads through pure calls.
//!
//! This crate provides:
//! - [`Array`] — dense n-dimensional value with a fixed shape and dtype
//! - [`Shape`] — dimensions and broadcasting
//! - [`DType`] — element types (F16, BF16, F32, F64, U8, U32, I32, I64, Bool)
//! - [`Key`] — splittable, reproducible randomness token
//! - [`Error`] / [`Result`] — the error type shared by every skein crate

pub mod array;
pub mod dtype;
pub mod error;
pub mod rng;
pub mod shape;

pub use array::Array;
pub use dtype::{DType, WithDType};
pub use error::{Error, ErrorKind, Result};
pub use rng::Key;
pub use shape::Shape;
