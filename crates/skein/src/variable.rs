// Variable — The primitive unit of named, persistent state
//
// A Variable is a Module holding exactly one entry, `value`, together with
// the initializer, shape and dtype that entry is created with:
//
//   Variable::new(Initializer::Ones, (), DType::I32)   → /Variable/value
//   Variable::named("step", ...)                        → /step/value
//   Variable::under(&model, "bar", ...)                 → /Model/bar/value
//
// The entry is created lazily by the first read or write against a store
// that lacks it. Afterwards its shape and dtype are fixed.

use skein_core::{Array, DType, Error, Result, Shape};

use crate::context::Context;
use crate::init::Initializer;
use crate::module::Module;
use crate::path::Path;

/// Default module name of unnamed variables.
pub const DEFAULT_NAME: &str = "Variable";

/// Name of the single entry a variable owns.
pub const ENTRY: &str = "value";

/// A lazily created state entry with a fixed shape and dtype.
#[derive(Debug, Clone)]
pub struct Variable {
    module: Module,
    key: String,
    init: Initializer,
    shape: Shape,
    dtype: DType,
}

impl Variable {
    fn from_module(
        module: Module,
        init: Initializer,
        shape: impl Into<Shape>,
        dtype: DType,
    ) -> Result<Self> {
        let key = module.key(ENTRY)?;
        Ok(Variable {
            module,
            key,
            init,
            shape: shape.into(),
            dtype,
        })
    }

    /// An unnamed top-level variable, `/Variable/value` then
    /// `/Variable2/value`, ...
    pub fn new(init: Initializer, shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        Self::named(DEFAULT_NAME, init, shape, dtype)
    }

    /// A top-level variable with an explicit (uniqued) name.
    pub fn named(
        name: &str,
        init: Initializer,
        shape: impl Into<Shape>,
        dtype: DType,
    ) -> Result<Self> {
        Self::from_module(Module::new(name)?, init, shape, dtype)
    }

    /// A variable nested under `parent`.
    pub fn under(
        parent: &Module,
        name: &str,
        init: Initializer,
        shape: impl Into<Shape>,
        dtype: DType,
    ) -> Result<Self> {
        Self::from_module(parent.child(name)?, init, shape, dtype)
    }

    /// A variable nested under the current scope of a running call.
    pub fn in_context(
        ctx: &Context,
        name: &str,
        init: Initializer,
        shape: impl Into<Shape>,
        dtype: DType,
    ) -> Result<Self> {
        Self::from_module(Module::in_context(ctx, name)?, init, shape, dtype)
    }

    /// A top-level variable whose first value is `value`.
    pub fn with_value(value: Array) -> Result<Self> {
        let (shape, dtype) = (value.shape().clone(), value.dtype());
        Self::new(Initializer::Value(value), shape, dtype)
    }

    /// The state key of the value, e.g. `/Variable/value`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.module.path()
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The current value, creating the entry with the initializer if the
    /// store does not hold it yet.
    pub fn read(&self, ctx: &mut Context) -> Result<Array> {
        ctx.read_entry(&self.key, |ctx| {
            let value = self.init.init(&self.shape, self.dtype, ctx)?;
            self.check(&value)?;
            Ok(value)
        })
    }

    /// Replace the value. Creates the entry if the store does not hold it.
    pub fn write(&self, ctx: &mut Context, value: Array) -> Result<Array> {
        self.check(&value)?;
        ctx.write_entry(&self.key, value)
    }

    fn check(&self, value: &Array) -> Result<()> {
        if value.shape() != &self.shape {
            return Err(Error::ShapeMismatch {
                path: self.key.clone(),
                expected: self.shape.clone(),
                got: value.shape().clone(),
            });
        }
        if value.dtype() != self.dtype {
            return Err(Error::DTypeMismatch {
                path: self.key.clone(),
                expected: self.dtype,
                got: value.dtype(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{with_namespace, Namespace};
    use crate::state::State;

    fn sandboxed<T>(f: impl FnOnce() -> T) -> T {
        let mut ns = Namespace::new();
        with_namespace(&mut ns, f)
    }

    #[test]
    fn test_read_creates_then_reuses() {
        sandboxed(|| {
            let v = Variable::new(Initializer::Ones, (), DType::I32).unwrap();
            assert_eq!(v.key(), "/Variable/value");
            let mut ctx = Context::new(State::new(), None);
            assert_eq!(v.read(&mut ctx).unwrap().to_scalar().unwrap(), 1.0);
            v.write(&mut ctx, Array::scalar(42.0, DType::I32)).unwrap();
            assert_eq!(v.read(&mut ctx).unwrap().to_scalar().unwrap(), 42.0);
            assert_eq!(ctx.state().len(), 1);
        });
    }

    #[test]
    fn test_write_rejects_wrong_layout() {
        sandboxed(|| {
            let v = Variable::new(Initializer::Zeros, 3, DType::F32).unwrap();
            let mut ctx = Context::new(State::new(), None);
            let err = v.write(&mut ctx, Array::zeros(2, DType::F32)).unwrap_err();
            assert!(matches!(err, Error::ShapeMismatch { .. }));
            let err = v.write(&mut ctx, Array::zeros(3, DType::F64)).unwrap_err();
            assert!(matches!(err, Error::DTypeMismatch { .. }));
            assert!(ctx.state().is_empty());
        });
    }

    #[test]
    fn test_custom_initializer_checked() {
        sandboxed(|| {
            let init = Initializer::custom(|_, _, _| Ok(Array::zeros(5, DType::F32)));
            let v = Variable::new(init, 2, DType::F32).unwrap();
            let mut ctx = Context::new(State::new(), None);
            assert!(matches!(v.read(&mut ctx), Err(Error::ShapeMismatch { .. })));
        });
    }

    #[test]
    fn test_nested_names() {
        sandboxed(|| {
            let parent = Module::new("Foo").unwrap();
            let bar = Variable::under(&parent, "bar", Initializer::Constant(5.0), (), DType::F32)
                .unwrap();
            assert_eq!(bar.key(), "/Foo/bar/value");
        });
    }
}
