// Context — The installed state of one pure invocation
//
// A stateful function never touches global state. Everything it may read or
// write during one call lives in the Context it is handed:
//
//   state   — the State Store, owned by the context for the duration of the call
//   key     — the root randomness token, split on every consumption
//   scope   — the current Path; module methods enter their own absolute path
//   create  — whether missing entries may be materialized
//
// `pure` builds a fresh Context per call and takes the state back out when
// the function returns. Because the context owns the store, an error return
// drops every mutation made during the call: there is no partial commit.

use std::ops::{Deref, DerefMut};

use skein_core::{Array, Error, Key, Result};

use crate::path::Path;
use crate::state::State;

/// Invocation context threaded through every stateful call.
#[derive(Debug, Clone)]
pub struct Context {
    state: State,
    key: Option<Key>,
    scope: Path,
    create: bool,
}

impl Context {
    /// A root-scoped context over `state`. Without a key, any request for
    /// randomness fails with a scope error.
    pub fn new(state: State, key: Option<Key>) -> Self {
        Context {
            state,
            key,
            scope: Path::root(),
            create: true,
        }
    }

    /// Enable or disable creation of new state entries.
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    /// Whether missing entries are created on first access.
    pub fn creating(&self) -> bool {
        self.create
    }

    pub fn scope(&self) -> &Path {
        &self.scope
    }

    /// The state key of `leaf` under the current scope.
    pub fn current_path(&self, leaf: &str) -> Result<String> {
        self.scope.leaf_key(leaf)
    }

    /// Push `name` onto the scope. The segment is popped when the guard is
    /// dropped; the guard dereferences to the context.
    pub fn enter(&mut self, name: &str) -> Result<ScopeGuard<'_>> {
        let inner = self.scope.join(name)?;
        let saved = std::mem::replace(&mut self.scope, inner);
        Ok(ScopeGuard { ctx: self, saved })
    }

    /// Run `f` with `name` pushed onto the scope.
    pub fn scoped<T>(&mut self, name: &str, f: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
        let mut guard = self.enter(name)?;
        f(&mut guard)
    }

    /// Run `f` with the scope replaced by the absolute `path`.
    pub fn absolute<T>(&mut self, path: &Path, f: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.scope, path.clone());
        let mut guard = ScopeGuard { ctx: self, saved };
        f(&mut guard)
    }

    /// Read the entry at `key`, materializing it with `init` when absent.
    pub fn read_entry(
        &mut self,
        key: &str,
        init: impl FnOnce(&mut Context) -> Result<Array>,
    ) -> Result<Array> {
        if let Some(value) = self.state.get(key) {
            return Ok(value.clone());
        }
        if !self.create {
            return Err(Error::MissingState {
                path: key.to_string(),
            });
        }
        let value = init(self)?;
        tracing::trace!(path = key, shape = %value.shape(), dtype = %value.dtype(), "created state entry");
        self.state.insert(key, value.clone());
        Ok(value)
    }

    /// Write `value` at `key`. An existing entry keeps its shape and dtype.
    pub fn write_entry(&mut self, key: &str, value: Array) -> Result<Array> {
        match self.state.get(key) {
            Some(existing) => check_layout(key, existing, &value)?,
            None if !self.create => {
                return Err(Error::MissingState {
                    path: key.to_string(),
                })
            }
            None => tracing::trace!(path = key, "created state entry by write"),
        }
        self.state.insert(key, value.clone());
        Ok(value)
    }

    /// Get or create the entry `name` under the current scope.
    pub fn get(
        &mut self,
        name: &str,
        init: impl FnOnce(&mut Context) -> Result<Array>,
    ) -> Result<Array> {
        let key = self.current_path(name)?;
        self.read_entry(&key, init)
    }

    /// Write the entry `name` under the current scope.
    pub fn put(&mut self, name: &str, value: Array) -> Result<Array> {
        let key = self.current_path(name)?;
        self.write_entry(&key, value)
    }

    /// Entries whose keys match `pattern`; see [`State::find`].
    pub fn find(&self, pattern: &str, allow_empty: bool) -> Result<State> {
        self.state.find(pattern, allow_empty)
    }

    /// A fresh randomness token. The installed key is advanced, so every
    /// call returns an independent token.
    pub fn next_key(&mut self) -> Result<Key> {
        let key = self.key.ok_or_else(|| {
            Error::scope("randomness requested outside a pure call with a key")
        })?;
        let (carry, sub) = key.split2();
        self.key = Some(carry);
        Ok(sub)
    }

    /// Split off a base key for a nested construct, if a key is installed.
    pub(crate) fn split_key(&mut self) -> Option<Key> {
        let key = self.key?;
        let (carry, sub) = key.split2();
        self.key = Some(carry);
        Some(sub)
    }

    /// Run `f` with `key` installed, restoring the current key afterwards.
    pub(crate) fn with_key<T>(
        &mut self,
        key: Option<Key>,
        f: impl FnOnce(&mut Context) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.key, key);
        let out = f(self);
        self.key = saved;
        out
    }

    /// A detached copy at the same scope, used to discover entries without
    /// committing other effects.
    pub(crate) fn fork(&self, key: Option<Key>) -> Context {
        Context {
            state: self.state.clone(),
            key,
            scope: self.scope.clone(),
            create: self.create,
        }
    }
}

/// Reject a write that would change the shape or dtype of `existing`.
pub(crate) fn check_layout(key: &str, existing: &Array, value: &Array) -> Result<()> {
    if existing.shape() != value.shape() {
        return Err(Error::ShapeMismatch {
            path: key.to_string(),
            expected: existing.shape().clone(),
            got: value.shape().clone(),
        });
    }
    if existing.dtype() != value.dtype() {
        return Err(Error::DTypeMismatch {
            path: key.to_string(),
            expected: existing.dtype(),
            got: value.dtype(),
        });
    }
    Ok(())
}

/// Restores the enclosing scope when dropped.
pub struct ScopeGuard<'a> {
    ctx: &'a mut Context,
    saved: Path,
}

impl Deref for ScopeGuard<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.scope = std::mem::take(&mut self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::DType;

    fn int(v: f64) -> Array {
        Array::scalar(v, DType::I32)
    }

    #[test]
    fn test_scope_guard_pops() {
        let mut ctx = Context::new(State::new(), None);
        {
            let mut outer = ctx.enter("outer").unwrap();
            let inner = outer.enter("inner").unwrap();
            assert_eq!(inner.current_path("x").unwrap(), "/outer/inner/x");
        }
        assert!(ctx.scope().is_root());
        assert_eq!(ctx.current_path("x").unwrap(), "/x");
    }

    #[test]
    fn test_scope_restored_on_error() {
        let mut ctx = Context::new(State::new(), None);
        let result: Result<()> = ctx.scoped("layer", |_| Err(Error::msg("boom")));
        assert!(result.is_err());
        assert!(ctx.scope().is_root());
    }

    #[test]
    fn test_get_and_put() {
        let mut ctx = Context::new(State::new(), None);
        let v = ctx
            .scoped("m", |ctx| ctx.get("count", |_| Ok(int(0.0))))
            .unwrap();
        assert_eq!(v, int(0.0));
        ctx.scoped("m", |ctx| ctx.put("count", int(5.0))).unwrap();
        assert_eq!(ctx.state()["/m/count"], int(5.0));
    }

    #[test]
    fn test_write_checks_layout() {
        let mut ctx = Context::new(State::new(), None);
        ctx.write_entry("/v", int(1.0)).unwrap();
        let err = ctx.write_entry("/v", Array::zeros(3, DType::I32)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = ctx
            .write_entry("/v", Array::scalar(1.0, DType::F32))
            .unwrap_err();
        assert!(matches!(err, Error::DTypeMismatch { .. }));
    }

    #[test]
    fn test_missing_without_create() {
        let mut ctx = Context::new(State::new(), None).with_create(false);
        let err = ctx.read_entry("/v", |_| Ok(int(1.0))).unwrap_err();
        assert_eq!(err, Error::MissingState { path: "/v".into() });
        assert!(ctx.write_entry("/v", int(1.0)).is_err());
    }

    #[test]
    fn test_next_key() {
        let mut ctx = Context::new(State::new(), Some(Key::new(0)));
        let a = ctx.next_key().unwrap();
        let b = ctx.next_key().unwrap();
        assert_ne!(a, b);

        let mut keyless = Context::new(State::new(), None);
        assert!(matches!(keyless.next_key(), Err(Error::Scope { .. })));
    }

    #[test]
    fn test_with_key_restores() {
        let mut ctx = Context::new(State::new(), Some(Key::new(1)));
        let inner = ctx
            .with_key(None, |ctx| Ok(ctx.next_key().is_err()))
            .unwrap();
        assert!(inner);
        assert!(ctx.next_key().is_ok());
    }
}
