// Pure Transform — Turn a stateful function into (state, key, args) → (out, state)
//
// A stateful function reads and writes named entries through the Context it
// is handed. `pure` wraps it so that every piece of state it touches is passed
// in and returned explicitly:
//
//   let step = pure(|ctx: &mut Context, args: &Args| counter.read(ctx));
//   let (out, state) = step.call(State::new(), Key::new(0), &Args::new())?;
//   let (out, state) = step.call(state, Key::new(1), &Args::new())?;
//
// Each call owns a fresh Context. Nothing leaks between calls except what is
// in the returned State, and an error return drops the context together with
// every mutation made during the call.

use std::fmt;
use std::sync::Arc;

use skein_core::{Key, Result};

use crate::args::{Args, Signature};
use crate::context::Context;
use crate::state::State;

/// A stateful function made pure.
pub struct Pure<F> {
    func: Arc<F>,
    name: String,
    signature: Signature,
}

/// Wrap `func` as a pure function of `(state, key, args)`.
pub fn pure<F, R>(func: F) -> Pure<F>
where
    F: Fn(&mut Context, &Args) -> Result<R>,
{
    Pure {
        func: Arc::new(func),
        name: std::any::type_name::<F>().to_string(),
        signature: Signature::variadic(),
    }
}

impl<F> Clone for Pure<F> {
    fn clone(&self) -> Self {
        Pure {
            func: Arc::clone(&self.func),
            name: self.name.clone(),
            signature: self.signature.clone(),
        }
    }
}

impl<F> Pure<F> {
    /// Name used in errors and logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare the parameters the function accepts.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Run with `state` installed and return the result and the new state.
    pub fn call<R>(&self, state: State, key: Key, args: &Args) -> Result<(R, State)>
    where
        F: Fn(&mut Context, &Args) -> Result<R>,
    {
        self.call_with(state, key, args, true)
    }

    /// Like [`Pure::call`]; with `create` unset, touching an entry missing
    /// from `state` fails instead of creating it.
    pub fn call_with<R>(
        &self,
        state: State,
        key: Key,
        args: &Args,
        create: bool,
    ) -> Result<(R, State)>
    where
        F: Fn(&mut Context, &Args) -> Result<R>,
    {
        let bound = self.signature.bind(&self.name, args)?;
        let mut ctx = Context::new(state, Some(key)).with_create(create);
        let out = (self.func)(&mut ctx, &bound)?;
        Ok((out, ctx.into_state()))
    }
}

impl<F> fmt::Debug for Pure<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pure")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Run a one-off stateful closure purely.
pub fn run<R>(
    f: impl FnOnce(&mut Context) -> Result<R>,
    state: State,
    key: Key,
) -> Result<(R, State)> {
    let mut ctx = Context::new(state, Some(key));
    let out = f(&mut ctx)?;
    Ok((out, ctx.into_state()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{Array, DType, Error};

    fn counter(ctx: &mut Context, _: &Args) -> Result<f64> {
        let v = ctx.get("count", |_| Ok(Array::scalar(0.0, DType::I32)))?;
        let next = v.to_scalar()? + 1.0;
        ctx.put("count", Array::scalar(next, DType::I32))?;
        Ok(next)
    }

    #[test]
    fn test_state_threads_through_calls() {
        let step = pure(counter);
        let (a, state) = step.call(State::new(), Key::new(0), &Args::new()).unwrap();
        let (b, state) = step.call(state, Key::new(0), &Args::new()).unwrap();
        assert_eq!((a, b), (1.0, 2.0));
        assert_eq!(state["/count"].to_scalar().unwrap(), 2.0);
    }

    #[test]
    fn test_same_inputs_same_outputs() {
        let step = pure(counter);
        let start: State = [("/count", Array::scalar(7.0, DType::I32))]
            .into_iter()
            .collect();
        let first = step.call(start.clone(), Key::new(3), &Args::new()).unwrap();
        let second = step.call(start, Key::new(3), &Args::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signature_checked_before_running() {
        let step = pure(|_: &mut Context, _: &Args| -> Result<()> {
            panic!("must not run");
        })
        .with_name("train")
        .with_signature(Signature::new().param("x"));
        let err = step.call(State::new(), Key::new(0), &Args::new()).unwrap_err();
        assert!(matches!(err, Error::Call { ref function, .. } if function == "train"));
    }

    #[test]
    fn test_call_without_create() {
        let step = pure(counter);
        let err = step
            .call_with(State::new(), Key::new(0), &Args::new(), false)
            .unwrap_err();
        assert_eq!(err, Error::MissingState { path: "/count".into() });
    }

    #[test]
    fn test_run_once() {
        let (v, state) = run(
            |ctx| ctx.get("x", |_| Ok(Array::scalar(4.0, DType::F32))),
            State::new(),
            Key::new(0),
        )
        .unwrap();
        assert_eq!(v.to_scalar().unwrap(), 4.0);
        assert!(state.contains("/x"));
    }
}
