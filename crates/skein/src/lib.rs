//! # Skein
//!
//! Named, explicitly threaded state for pure trace-and-compile execution.
//!
//! Code reads and writes variables as if they were mutable, while every call
//! is a pure function `(state, key, args) -> (out, state)` that an external
//! engine can compile and cache.
//!
//! ## Usage
//!
//! ```rust
//! use skein::prelude::*;
//!
//! # fn main() -> skein::Result<()> {
//! let count = Variable::new(Initializer::Zeros, (), DType::I32)?;
//! let step = pure(move |ctx: &mut Context, _: &Args| {
//!     let next = count.read(ctx)?.affine(1.0, 1.0);
//!     count.write(ctx, next)
//! });
//! let (_, state) = step.call(State::new(), Key::new(0), &Args::new())?;
//! let (out, _) = step.call(state, Key::new(1), &Args::new())?;
//! assert_eq!(out.to_scalar()?, 2.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `skein-core` | Array, Shape, DType, randomness Key, Error |
//! | `skein` | Paths, State, Context, Module, Variable, pure, jit |
//!
//! ## Modules
//!
//! - [`path`] — Path segments and collision-free naming
//! - [`state`] — The State Store threaded through calls
//! - [`context`] — The per-call Context: state, key, scope
//! - [`module`] / [`variable`] — Named owners of state entries
//! - [`pure`] — The pure transform
//! - [`jit`] — The compiling wrapper
//! - [`control`] — `cond` and `scan` over stateful code

/// Re-export core types.
pub use skein_core::{bail, Array, DType, Error, ErrorKind, Key, Result, Shape, WithDType};

pub mod args;
pub mod context;
pub mod control;
pub mod init;
pub mod jit;
pub mod module;
pub mod path;
pub mod pure;
pub mod state;
pub mod variable;

pub use path::reset;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::args::{Args, Signature, Value};
    pub use crate::context::Context;
    pub use crate::control::{cond, scan};
    pub use crate::init::Initializer;
    pub use crate::jit::{jit, jit_with, CompileStats, Eager, Engine, Jit, JitConfig, Program};
    pub use crate::module::Module;
    pub use crate::path::{reset, Path};
    pub use crate::pure::{pure, run, Pure};
    pub use crate::state::State;
    pub use crate::variable::Variable;
    pub use crate::{Array, DType, Error, Key, Result, Shape};
}
