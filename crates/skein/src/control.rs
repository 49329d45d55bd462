// Control flow — Branches and loops over stateful code
//
//   cond(ctx, pred, on_true, on_false) — run one of two branches
//   scan(ctx, f, init, xs)             — fold f over xs with a carry
//
// Both thread the same Context through the user function, so the branches
// and the loop body read and write entries exactly as straight-line code
// would. Randomness is split per branch and per step.

use skein_core::{Key, Result};

use crate::context::Context;

/// Run `on_true` if `pred` holds, `on_false` otherwise.
///
/// The branches draw randomness from different keys. While entries may be
/// created, the branch not taken also runs on a scratch copy of the state
/// after the taken one, and only the entries it creates are kept. The set
/// of keys after the first call therefore does not depend on `pred`.
///
/// Only the taken branch decides the result. If the branch not taken fails
/// on its scratch run, its entries are dropped and `cond` still returns the
/// taken branch's value.
pub fn cond<T>(
    ctx: &mut Context,
    pred: bool,
    on_true: impl FnOnce(&mut Context) -> Result<T>,
    on_false: impl FnOnce(&mut Context) -> Result<T>,
) -> Result<T> {
    let base = ctx.split_key();
    let branch_key = |taken: bool| base.map(|k| k.fold_in(u32::from(taken)));
    if pred {
        let out = ctx.with_key(branch_key(true), on_true)?;
        discover(ctx, branch_key(false), on_false);
        Ok(out)
    } else {
        let out = ctx.with_key(branch_key(false), on_false)?;
        discover(ctx, branch_key(true), on_true);
        Ok(out)
    }
}

// Run a branch that was not taken on a scratch copy and keep only the
// entries it creates. A failing run contributes nothing.
fn discover<T>(
    ctx: &mut Context,
    key: Option<Key>,
    branch: impl FnOnce(&mut Context) -> Result<T>,
) {
    if !ctx.creating() {
        return;
    }
    let mut scratch = ctx.fork(key);
    if let Err(error) = branch(&mut scratch) {
        tracing::trace!(%error, "branch not taken failed; its entries are dropped");
        return;
    }
    let created = ctx.state_mut().merge_missing(scratch.into_state());
    if !created.is_empty() {
        tracing::trace!(?created, "cond created entries of the branch not taken");
    }
}

/// Fold `f` over `xs`, returning the final carry and the per-step outputs.
pub fn scan<C, X, Y>(
    ctx: &mut Context,
    mut f: impl FnMut(&mut Context, C, X) -> Result<(C, Y)>,
    init: C,
    xs: impl IntoIterator<Item = X>,
) -> Result<(C, Vec<Y>)> {
    let base = ctx.split_key();
    let mut carry = init;
    let mut ys = Vec::new();
    for (step, x) in xs.into_iter().enumerate() {
        let key: Option<Key> = base.map(|k| k.fold_in(step as u32));
        let (next, y) = ctx.with_key(key, |ctx| f(ctx, carry, x))?;
        carry = next;
        ys.push(y);
    }
    Ok((carry, ys))
}
