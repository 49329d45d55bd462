// Path Scope — Stable, collision-free names for stateful objects
//
// Every state entry is keyed by a slash-joined path built from the nesting
// of the modules that own it:
//
//   /Variable/value          first unnamed Variable
//   /Variable2/value         second unnamed Variable
//   /Model/linear/weight     entry "weight" of module "linear" inside "Model"
//
// Uniquing is done by a Namespace that counts how many times each candidate
// path was requested. The counters are the only naming state; reads and
// writes never touch them, so the same code run after `reset()` produces the
// same paths.
//
// The default Namespace is thread-local: execution is single-threaded and
// cooperative, and parallel test threads each get their own counters.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use skein_core::{Error, Result};

/// An ordered sequence of name segments, rendered as `/a/b/c`.
///
/// The root path has no segments and renders as the empty string, so
/// `Path::root().join("x")` renders as `/x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(Vec<String>);

/// Reason a segment cannot be part of a path, if any.
fn segment_problem(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        Some("empty name segment")
    } else if segment.contains('/') {
        Some("name segment contains '/'")
    } else {
        None
    }
}

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append one segment. Fails with a scope error on malformed segments.
    pub fn join(&self, segment: &str) -> Result<Path> {
        if let Some(problem) = segment_problem(segment) {
            return Err(Error::scope(format!("{problem}: {segment:?} under {self:?}")));
        }
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Ok(Path(segments))
    }

    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.0.split_last()?;
        Some(Path(rest.to_vec()))
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// The state key of a leaf entry directly under this path.
    pub fn leaf_key(&self, leaf: &str) -> Result<String> {
        Ok(self.join(leaf)?.to_string())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = Error;

    /// Parse an absolute path. `""` and `"/"` are the root.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "/" {
            return Ok(Path::root());
        }
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| Error::scope(format!("path {s:?} is not absolute")))?;
        rest.split('/')
            .try_fold(Path::root(), |path, segment| path.join(segment))
    }
}

/// Registry of generated names.
///
/// `unique(parent, "Foo")` returns `parent/Foo` the first time, then
/// `parent/Foo2`, `parent/Foo3`, ... A generated candidate that is already
/// registered (for example a module explicitly named `Foo2`) is skipped.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    counters: HashMap<Path, usize>,
    taken: HashSet<Path>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a unique path for a new stateful object named `name` under
    /// `parent`. Malformed names are a config error.
    pub fn unique(&mut self, parent: &Path, name: &str) -> Result<Path> {
        if let Some(problem) = segment_problem(name) {
            return Err(Error::config(format!(
                "invalid module name {name:?}: {problem}"
            )));
        }
        let base = parent.join(name)?;
        let count = self.counters.entry(base).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                name.to_string()
            } else {
                format!("{name}{count}")
            };
            let path = parent.join(&candidate)?;
            if self.taken.insert(path.clone()) {
                return Ok(path);
            }
        }
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.taken.contains(path)
    }

    /// Number of paths handed out since the last reset.
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
        self.taken.clear();
    }
}

thread_local! {
    static NAMESPACE: RefCell<Namespace> = RefCell::new(Namespace::new());
}

/// Clear all naming counters and registered paths of the current thread.
///
/// Call this before building a fresh set of modules so that path uniquing
/// does not carry over from an unrelated program.
pub fn reset() {
    NAMESPACE.with(|ns| ns.borrow_mut().clear());
    tracing::trace!("namespace reset");
}

/// Reserve a unique path in the current thread's namespace.
pub(crate) fn unique_path(parent: &Path, name: &str) -> Result<Path> {
    NAMESPACE.with(|ns| ns.borrow_mut().unique(parent, name))
}

/// Run `f` with `namespace` installed as the current thread's namespace,
/// then put the previous one back. Names generated inside `f` are recorded
/// in `namespace`.
pub fn with_namespace<T>(namespace: &mut Namespace, f: impl FnOnce() -> T) -> T {
    struct Restore<'a> {
        target: &'a mut Namespace,
        previous: Option<Namespace>,
    }

    impl Drop for Restore<'_> {
        fn drop(&mut self) {
            if let Some(previous) = self.previous.take() {
                let used = NAMESPACE.with(|ns| ns.replace(previous));
                *self.target = used;
            }
        }
    }

    let installed = std::mem::take(namespace);
    let previous = NAMESPACE.with(|ns| ns.replace(installed));
    let _restore = Restore {
        target: namespace,
        previous: Some(previous),
    };
    f()
}
