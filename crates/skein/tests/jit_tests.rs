// JIT Tests — Verifies per-signature caching, the created flag and state checks

use std::sync::atomic::{AtomicUsize, Ordering};

use skein::prelude::*;

// Helpers

fn int(v: f64) -> Array {
    Array::scalar(v, DType::I32)
}

fn constant(_: &mut Context, _: &Args) -> Result<Array> {
    Ok(int(42.0))
}

fn program(_: &mut Context, args: &Args) -> Result<Array> {
    let x = args.kw_array("x")?;
    match args.kw_str("mode")? {
        "train" => Ok(x.clone()),
        _ => Ok(x.scale(2.0)),
    }
}

fn program_signature() -> Signature {
    Signature::new().param("x").param_default("mode", "train")
}

/// Engine that counts compilations and program executions.
#[derive(Default)]
struct Counting {
    compiled: AtomicUsize,
    executed: std::sync::Arc<AtomicUsize>,
}

impl Engine for Counting {
    fn compile<R: 'static>(&self, _: &str, program: Program<R>) -> Result<Program<R>> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        let executed = self.executed.clone();
        Ok(std::sync::Arc::new(move |state: State, key: Key, args: &Args| {
            executed.fetch_add(1, Ordering::SeqCst);
            program(state, key, args)
        }))
    }
}

struct Failing;

impl Engine for Failing {
    fn compile<R: 'static>(&self, name: &str, _: Program<R>) -> Result<Program<R>> {
        Err(Error::msg(format!("cannot compile {name}")))
    }
}

// The created flag

#[test]
fn test_created_flag() {
    reset();
    let fun = jit(pure(constant), &[]).unwrap();
    assert!(!fun.created());
    let (out, _) = fun.call(State::new(), Key::new(0), &Args::new()).unwrap();
    assert_eq!(out, int(42.0));
    assert!(fun.created());
    let (out, _) = fun.call(State::new(), Key::new(0), &Args::new()).unwrap();
    assert_eq!(out, int(42.0));
    assert!(fun.created());
    assert_eq!(fun.stats().compilations, 1);
}

#[test]
fn test_failed_compile_leaves_uncreated() {
    reset();
    let fun = jit_with(pure(constant), JitConfig::default(), Failing).unwrap();
    assert!(fun.call(State::new(), Key::new(0), &Args::new()).is_err());
    assert!(!fun.created());
    assert_eq!(fun.cache_len(), 0);
}

// Static arguments

#[test]
fn test_static_args() {
    reset();
    let fun = jit(pure(program).with_signature(program_signature()), &["mode"]).unwrap();
    let call = |mode: &str| {
        let args = Args::new().arg(int(1.0)).kwarg("mode", mode);
        fun.call(State::new(), Key::new(0), &args).unwrap().0
    };
    assert_eq!(call("train"), int(1.0));
    assert_eq!(call("train"), int(1.0));
    assert_eq!(fun.stats().compilations, 1);

    assert_eq!(call("eval"), int(2.0));
    assert_eq!(call("eval"), int(2.0));
    assert_eq!(fun.stats().compilations, 2);

    // The eval program did not disturb the cached train program.
    assert_eq!(call("train"), int(1.0));
    let stats = fun.stats();
    assert_eq!(stats.compilations, 2);
    assert_eq!(stats.cache_hits, 3);
    assert_eq!(fun.cache_len(), 2);
}

#[test]
fn test_static_default_shares_program() {
    reset();
    let fun = jit(pure(program).with_signature(program_signature()), &["mode"]).unwrap();
    let defaulted = Args::new().arg(int(3.0));
    let explicit = Args::new().kwarg("x", int(3.0)).kwarg("mode", "train");
    assert_eq!(fun.call(State::new(), Key::new(0), &defaulted).unwrap().0, int(3.0));
    assert_eq!(fun.call(State::new(), Key::new(0), &explicit).unwrap().0, int(3.0));
    assert_eq!(fun.stats().compilations, 1);
}

#[test]
fn test_equal_float_statics_share_program() {
    reset();
    let scaled = |_: &mut Context, args: &Args| -> Result<Array> {
        Ok(args.kw_array("x")?.scale(args.kw_float("factor")?))
    };
    let fun = jit(
        pure(scaled).with_signature(Signature::new().param("x").param("factor")),
        &["factor"],
    )
    .unwrap();
    let call = |factor: f64| {
        let args = Args::new().arg(int(1.0)).kwarg("factor", factor);
        fun.call(State::new(), Key::new(0), &args).unwrap();
    };
    call(0.0);
    call(-0.0);
    assert_eq!(fun.stats().compilations, 1);
    call(f64::NAN);
    call(f64::from_bits(f64::NAN.to_bits() | 1));
    assert_eq!(fun.stats().compilations, 2);
    call(-1.0);
    assert_eq!(fun.stats().compilations, 3);
    assert_eq!(fun.cache_len(), 3);
}

#[test]
fn test_unhashable_static_is_config_error() {
    reset();
    let fun = jit(pure(program).with_signature(program_signature()), &["mode"]).unwrap();
    let args = Args::new().arg(int(1.0)).kwarg("mode", int(0.0));
    let err = fun.call(State::new(), Key::new(0), &args).unwrap_err();
    assert_eq!(err.kind(), skein::ErrorKind::Config);
    assert!(!fun.created());
}

#[test]
fn test_call_error_before_compile() {
    reset();
    let fun = jit(pure(program).with_signature(program_signature()), &["mode"]).unwrap();
    let args = Args::new().kwarg("y", int(1.0));
    let err = fun.call(State::new(), Key::new(0), &args).unwrap_err();
    assert_eq!(err.kind(), skein::ErrorKind::Call);
    assert!(!fun.created());
    assert_eq!(fun.stats().compilations, 0);
    assert_eq!(fun.stats().calls, 1);
}

#[test]
fn test_engine_sees_dynamic_args_only() {
    reset();
    let engine = Counting::default();
    let fun = jit_with(
        pure(program).with_signature(program_signature()),
        JitConfig::default().with_static(["mode"]).with_name("program"),
        engine,
    )
    .unwrap();
    for mode in ["train", "eval", "train"] {
        let args = Args::new().arg(int(1.0)).kwarg("mode", mode);
        fun.call(State::new(), Key::new(0), &args).unwrap();
    }
    assert_eq!(fun.engine().compiled.load(Ordering::SeqCst), 2);
    assert_eq!(fun.engine().executed.load(Ordering::SeqCst), 3);
    assert_eq!(fun.name(), "program");
}

// State

#[test]
fn test_variables() {
    reset();
    let v = Variable::new(Initializer::Ones, (), DType::I32).unwrap();
    let reader = v.clone();
    let read = jit(pure(move |ctx: &mut Context, _: &Args| reader.read(ctx)), &[]).unwrap();
    let writer = v.clone();
    let write = jit(
        pure(move |ctx: &mut Context, args: &Args| writer.write(ctx, args.array(0)?.clone())),
        &[],
    )
    .unwrap();

    let (_, state) = read.call(State::new(), Key::new(0), &Args::new()).unwrap();
    assert_eq!(state["/Variable/value"], int(1.0));
    assert_eq!(state.len(), 1);

    let (_, state) = write
        .call(state, Key::new(0), &Args::new().arg(int(42.0)))
        .unwrap();
    let (out, state) = read.call(state, Key::new(0), &Args::new()).unwrap();
    assert_eq!(out, int(42.0));
    assert_eq!(state["/Variable/value"], int(42.0));
    assert_eq!(state.len(), 1);
}

fn grow(ctx: &mut Context, args: &Args) -> Result<()> {
    let n = args.array(0)?.to_scalar()? as usize;
    for i in 0..n {
        ctx.get(&format!("v{i}"), |_| Ok(Array::scalar(0.0, DType::F32)))?;
    }
    Ok(())
}

#[test]
fn test_state_keys_changed() {
    reset();
    let fun = jit(pure(grow).with_name("grow"), &[]).unwrap();
    let one = Args::new().arg(int(1.0));
    let two = Args::new().arg(int(2.0));

    let (_, state) = fun.call(State::new(), Key::new(0), &one).unwrap();
    // Recreating the known entries from scratch is fine.
    fun.call(State::new(), Key::new(0), &one).unwrap();

    let err = fun.call(state.clone(), Key::new(0), &two).unwrap_err();
    assert_eq!(
        err,
        Error::StateKeysChanged {
            function: "grow".into(),
            added: vec!["/v1".into()],
        }
    );
    assert_eq!(err.kind(), skein::ErrorKind::State);
}

#[test]
fn test_state_key_check_disabled() {
    reset();
    let fun = jit_with(
        pure(grow),
        JitConfig::default().with_state_key_check(false),
        Eager,
    )
    .unwrap();
    let (_, state) = fun
        .call(State::new(), Key::new(0), &Args::new().arg(int(1.0)))
        .unwrap();
    let (_, state) = fun
        .call(state, Key::new(0), &Args::new().arg(int(3.0)))
        .unwrap();
    assert_eq!(state.len(), 3);
}

#[test]
fn test_shared_across_threads() {
    reset();
    let fun = jit(pure(program).with_signature(program_signature()), &["mode"]).unwrap();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let args = Args::new().arg(int(2.0)).kwarg("mode", "eval");
                let (out, _) = fun.call(State::new(), Key::new(0), &args).unwrap();
                assert_eq!(out, int(4.0));
            });
        }
    });
    let stats = fun.stats();
    assert_eq!(stats.calls, 4);
    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.cache_hits, 3);
}
