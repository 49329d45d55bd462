// Compiling Wrapper — Cache one compiled program per static-argument signature
//
// `jit` wraps a Pure function so that repeated calls reuse a program compiled
// by an Engine instead of handing the function to the engine every time.
//
// COMPONENTS:
//
//   Jit          — The wrapped callable: cache, stats and the `created` flag
//   JitConfig    — Static argument names, display name, key-set checking
//   Engine       — The external compiler seam; `Eager` is the default
//   Program      — A pure (state, key, args) → (out, state) function
//   CompileStats — Call, compilation and cache-hit counters
//
// WORKFLOW:
//
//   1. Bind:      arguments are bound to the declared signature. Mismatches
//                 fail here, before anything is compiled.
//   2. Partition: static arguments are split off and form the cache key.
//                 Their values are baked into the compiled program, so the
//                 engine only ever sees the dynamic arguments.
//   3. Compile:   on a cache miss the engine compiles a new program. The
//                 first successful compile flips `created`.
//   4. Run:       the cached program runs with the caller's state.
//   5. Check:     the state keys a program may produce are recorded on its
//                 first run. A later run under the same cache entry that
//                 creates any other key fails with StateKeysChanged.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use skein_core::{Error, Key, Result};

use crate::args::{Args, StaticKey, Value};
use crate::context::Context;
use crate::pure::Pure;
use crate::state::State;

/// A pure program as handed to and returned by an [`Engine`].
pub type Program<R> = Arc<dyn Fn(State, Key, &Args) -> Result<(R, State)> + Send + Sync>;

/// The external trace-and-compile engine.
pub trait Engine {
    /// Compile `program`. The returned program must compute the same
    /// function as its input.
    fn compile<R: 'static>(&self, name: &str, program: Program<R>) -> Result<Program<R>>;
}

/// Runs programs as they are, without compilation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eager;

impl Engine for Eager {
    fn compile<R: 'static>(&self, name: &str, program: Program<R>) -> Result<Program<R>> {
        tracing::debug!(function = name, "eager engine: program used as compiled");
        Ok(program)
    }
}

/// Configuration of a [`Jit`] wrapper.
#[derive(Debug, Clone)]
pub struct JitConfig {
    statics: BTreeSet<String>,
    name: Option<String>,
    check_state_keys: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            statics: BTreeSet::new(),
            name: None,
            check_state_keys: true,
        }
    }
}

impl JitConfig {
    /// Mark arguments as static: each distinct value gets its own program.
    pub fn with_static<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statics.extend(names.into_iter().map(Into::into));
        self
    }

    /// Override the name used in errors and logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable or disable the state key-set check.
    pub fn with_state_key_check(mut self, check: bool) -> Self {
        self.check_state_keys = check;
        self
    }

    pub fn statics(&self) -> &BTreeSet<String> {
        &self.statics
    }
}

/// Counters of a [`Jit`] wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Number of calls, successful or not.
    pub calls: usize,
    /// Number of programs compiled.
    pub compilations: usize,
    /// Number of calls served from the cache.
    pub cache_hits: usize,
    /// Total compilation time in microseconds.
    pub compile_time_us: u64,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calls, {} compilations, {} cache hits, compiled in {}μs",
            self.calls, self.compilations, self.cache_hits, self.compile_time_us,
        )
    }
}

type CacheKey = Vec<(String, StaticKey)>;

struct Entry<R> {
    program: Program<R>,
    // Keys present in the output of the first run.
    known_keys: Option<BTreeSet<String>>,
}

struct Inner<R> {
    cache: HashMap<CacheKey, Entry<R>>,
    stats: CompileStats,
}

/// A pure function with a per-signature cache of compiled programs.
pub struct Jit<F, R, E = Eager> {
    pure: Pure<F>,
    engine: E,
    name: String,
    statics: BTreeSet<String>,
    check_state_keys: bool,
    created: AtomicBool,
    inner: Mutex<Inner<R>>,
}

/// Wrap `pure` with the default engine, treating `statics` as static
/// argument names.
pub fn jit<F, R>(pure: Pure<F>, statics: &[&str]) -> Result<Jit<F, R>>
where
    F: Fn(&mut Context, &Args) -> Result<R> + Send + Sync + 'static,
    R: 'static,
{
    jit_with(pure, JitConfig::default().with_static(statics.iter().copied()), Eager)
}

/// Wrap `pure` with an explicit configuration and engine.
pub fn jit_with<F, R, E>(pure: Pure<F>, config: JitConfig, engine: E) -> Result<Jit<F, R, E>>
where
    F: Fn(&mut Context, &Args) -> Result<R> + Send + Sync + 'static,
    R: 'static,
    E: Engine,
{
    let name = config.name.unwrap_or_else(|| pure.name().to_string());
    let signature = pure.signature();
    if !signature.is_variadic() {
        if let Some(unknown) = config.statics.iter().find(|s| !signature.has_param(s)) {
            return Err(Error::config(format!(
                "static argument {unknown:?} is not a parameter of {name}"
            )));
        }
    }
    Ok(Jit {
        pure,
        engine,
        name,
        statics: config.statics,
        check_state_keys: config.check_state_keys,
        created: AtomicBool::new(false),
        inner: Mutex::new(Inner {
            cache: HashMap::new(),
            stats: CompileStats::default(),
        }),
    })
}

impl<F, R, E> Jit<F, R, E>
where
    F: Fn(&mut Context, &Args) -> Result<R> + Send + Sync + 'static,
    R: 'static,
    E: Engine,
{
    /// Call the wrapped function, compiling a program for this static
    /// signature if none is cached yet.
    pub fn call(&self, state: State, key: Key, args: &Args) -> Result<(R, State)> {
        self.inner.lock().stats.calls += 1;

        let signature = self.pure.signature();
        let bound = signature.bind(&self.name, args)?;
        let (statics, dynamic) = bound.partition(&self.statics, signature.is_variadic());
        let mut cache_key = CacheKey::with_capacity(statics.len());
        for (name, value) in &statics {
            cache_key.push((name.clone(), value.static_key()?));
        }

        let program = self.program_for(&cache_key, statics)?;

        let before = state.key_set();
        let (out, state) = program(state, key, &dynamic)?;
        self.check_keys(&cache_key, &before, &state)?;
        Ok((out, state))
    }

    fn program_for(&self, cache_key: &CacheKey, statics: Vec<(String, Value)>) -> Result<Program<R>> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.cache.get(cache_key) {
            let program = Arc::clone(&entry.program);
            inner.stats.cache_hits += 1;
            tracing::trace!(function = %self.name, "jit cache hit");
            return Ok(program);
        }

        tracing::debug!(
            function = %self.name,
            statics = ?cache_key,
            cached = inner.cache.len(),
            "jit cache miss, compiling"
        );
        let pure = self.pure.clone();
        let traced: Program<R> = Arc::new(move |state: State, key: Key, dynamic: &Args| {
            pure.call(state, key, &dynamic.with_keywords(&statics))
        });

        let start = Instant::now();
        let program = self.engine.compile(&self.name, traced)?;
        let elapsed = start.elapsed().as_micros() as u64;

        inner.stats.compilations += 1;
        inner.stats.compile_time_us += elapsed;
        inner.cache.insert(
            cache_key.clone(),
            Entry {
                program: Arc::clone(&program),
                known_keys: None,
            },
        );
        self.created.store(true, Ordering::Release);
        Ok(program)
    }

    fn check_keys(&self, cache_key: &CacheKey, before: &BTreeSet<String>, after: &State) -> Result<()> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.cache.get_mut(cache_key) else {
            // Cleared while the program ran.
            return Ok(());
        };
        let added: Vec<String> = match &entry.known_keys {
            None => {
                entry.known_keys = Some(after.key_set());
                return Ok(());
            }
            Some(_) if !self.check_state_keys => return Ok(()),
            Some(known) => after
                .keys()
                .filter(|k| !before.contains(*k) && !known.contains(*k))
                .map(str::to_string)
                .collect(),
        };
        if added.is_empty() {
            return Ok(());
        }
        tracing::debug!(function = %self.name, ?added, "state keys changed under a cached program");
        Err(Error::StateKeysChanged {
            function: self.name.clone(),
            added,
        })
    }
}

impl<F, R, E> Jit<F, R, E> {
    /// Whether at least one program has been compiled.
    pub fn created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CompileStats {
        self.inner.lock().stats.clone()
    }

    /// Number of cached programs.
    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// Drop every cached program. `created` stays set.
    pub fn clear_cache(&self) {
        self.inner.lock().cache.clear();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<F, R, E> fmt::Debug for Jit<F, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jit")
            .field("name", &self.name)
            .field("statics", &self.statics)
            .field("created", &self.created())
            .field("stats", &self.stats())
            .finish()
    }
}
