// Module — A named owner of state entries
//
// A Module is nothing but a unique Path. Its path is fixed when the module
// is created, from the scope it is created in plus a uniqued name:
//
//   Module::new("Model")            → /Model        (then /Model2, ...)
//   model.child("linear")           → /Model/linear
//   Module::in_context(ctx, "head") → <ctx scope>/head
//
// Entries live directly under the module path, so a module's state can be
// selected as a whole with `getm` and replaced with `putm`. Methods of a user
// type that embeds a Module run inside the module's scope through `call`,
// which makes anything created there nest under the module.
//
// Unlike a framework layer, a Module holds no values; every read and write
// goes through the Context of the current pure call.

use std::fmt;

use skein_core::{Array, Error, Result};

use crate::context::Context;
use crate::path::{unique_path, Path};
use crate::state::State;

/// A uniquely named scope that owns state entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Module {
    path: Path,
}

impl Module {
    /// A top-level module named `name` (uniqued).
    pub fn new(name: &str) -> Result<Self> {
        Ok(Module {
            path: unique_path(&Path::root(), name)?,
        })
    }

    /// A submodule nested under this module (uniqued).
    pub fn child(&self, name: &str) -> Result<Module> {
        Ok(Module {
            path: unique_path(&self.path, name)?,
        })
    }

    /// A module nested under the current scope of `ctx` (uniqued). Use this
    /// for modules built lazily inside a pure call.
    pub fn in_context(ctx: &Context, name: &str) -> Result<Module> {
        Ok(Module {
            path: unique_path(ctx.scope(), name)?,
        })
    }

    /// A handle for an existing path, without registering a new name.
    pub fn at(path: Path) -> Self {
        Module { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name().unwrap_or("")
    }

    /// The state key of entry `name` of this module.
    pub fn key(&self, name: &str) -> Result<String> {
        self.path.leaf_key(name)
    }

    /// Run `f` inside this module's scope.
    pub fn call<T>(&self, ctx: &mut Context, f: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
        ctx.absolute(&self.path, f)
    }

    /// Get or create entry `name`, running `init` inside the module's scope
    /// when the entry is missing.
    pub fn get(
        &self,
        ctx: &mut Context,
        name: &str,
        init: impl FnOnce(&mut Context) -> Result<Array>,
    ) -> Result<Array> {
        let key = self.key(name)?;
        let path = &self.path;
        ctx.read_entry(&key, |ctx| ctx.absolute(path, init))
    }

    /// Write entry `name`.
    pub fn put(&self, ctx: &mut Context, name: &str, value: Array) -> Result<Array> {
        let key = self.key(name)?;
        ctx.write_entry(&key, value)
    }

    /// All entries under this module, including those of submodules.
    pub fn getm(&self, ctx: &Context) -> State {
        ctx.state().subtree(&self.path)
    }

    /// Write several entries at once. Every key must lie under this module.
    pub fn putm(&self, ctx: &mut Context, entries: State) -> Result<()> {
        let lead = format!("{}/", self.path);
        if let Some(outside) = entries.keys().find(|k| !k.starts_with(&lead)) {
            return Err(Error::scope(format!(
                "entry {outside} is outside module {}",
                self.path
            )));
        }
        for (key, value) in entries {
            ctx.write_entry(&key, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({})", self.path)
    }
}
