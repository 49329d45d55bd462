// Demo: Linear Regression with named state and a compiled train step
//
// The model keeps its weight and bias in Variables. The training step is an
// ordinary stateful function that reads and writes them; `pure` turns it into
// (state, key, args) → (loss, state) and `jit` caches one program per mode:
//
//   mode = "train"  — compute the loss, update w and b by gradient descent
//   mode = "eval"   — compute the loss only
//
// Gradients are derived by hand. We're learning y = 2*x + 1.
//
// Run with RUST_LOG=skein=debug to see compilations and state creation.

use skein::prelude::*;
use tracing_subscriber::EnvFilter;

struct Linear {
    w: Variable,
    b: Variable,
}

impl Linear {
    fn new(name: &str) -> Result<Self> {
        let module = Module::new(name)?;
        let w = Variable::under(
            &module,
            "w",
            Initializer::Normal { mean: 0.0, std: 0.1 },
            (),
            DType::F64,
        )?;
        let b = Variable::under(&module, "b", Initializer::Zeros, (), DType::F64)?;
        Ok(Linear { w, b })
    }

    fn predict(&self, ctx: &mut Context, x: &Array) -> Result<Array> {
        let w = self.w.read(ctx)?;
        let b = self.b.read(ctx)?;
        x.mul(&w)?.add(&b)
    }

    fn loss(&self, ctx: &mut Context, x: &Array, y: &Array) -> Result<(Array, Array)> {
        let diff = self.predict(ctx, x)?.sub(y)?;
        let loss = diff.square().mean_all();
        Ok((loss, diff))
    }

    fn train(&self, ctx: &mut Context, x: &Array, y: &Array, lr: f64) -> Result<Array> {
        let (loss, diff) = self.loss(ctx, x, y)?;
        let n = x.elem_count() as f64;

        // d/dw mean((wx + b - y)^2) = 2/n * sum(diff * x), d/db = 2/n * sum(diff)
        let grad_w = diff.mul(x)?.sum_all().scale(2.0 / n);
        let grad_b = diff.sum_all().scale(2.0 / n);

        let w = self.w.read(ctx)?.sub(&grad_w.scale(lr))?;
        let b = self.b.read(ctx)?.sub(&grad_b.scale(lr))?;
        self.w.write(ctx, w)?;
        self.b.write(ctx, b)?;
        Ok(loss)
    }
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();

    println!(" Skein Linear Regression \n");

    //  Step 1: Create synthetic data
    let x_data: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let y_data: Vec<f64> = x_data.iter().map(|&x| 2.0 * x + 1.0).collect();
    let x = Array::from_vec(x_data, 10, DType::F64)?;
    let y = Array::from_vec(y_data, 10, DType::F64)?;

    //  Step 2: Build the model and the compiled step
    let model = Linear::new("Linear")?;
    let signature = Signature::new()
        .param("x")
        .param("y")
        .param_default("lr", 0.01)
        .param_default("mode", "train");
    let step = pure(move |ctx: &mut Context, args: &Args| {
        let x = args.kw_array("x")?;
        let y = args.kw_array("y")?;
        match args.kw_str("mode")? {
            "train" => model.train(ctx, x, y, args.kw_float("lr")?),
            "eval" => Ok(model.loss(ctx, x, y)?.0),
            other => Err(Error::call("step", format!("unknown mode {other:?}"))),
        }
    })
    .with_name("step")
    .with_signature(signature);
    let step = jit(step, &["mode"])?;

    //  Step 3: Training loop; the state is threaded by hand
    let mut state = State::new();
    let mut key = Key::new(0);
    for epoch in 0..2000 {
        let (next, sub) = key.split2();
        key = next;
        let args = Args::new().arg(x.clone()).arg(y.clone());
        let (loss, new_state) = step.call(state, sub, &args)?;
        state = new_state;
        if epoch % 200 == 0 {
            println!("Epoch {:3}: loss = {:.6}", epoch, loss.to_scalar()?);
        }
    }

    //  Step 4: Evaluate with the second cached program
    let args = Args::new().arg(x).arg(y).kwarg("mode", "eval");
    let (loss, state) = step.call(state, key, &args)?;
    println!("\nEval loss = {:.6}", loss.to_scalar()?);
    println!(
        "Final: w = {:.4} (expected 2.0), b = {:.4} (expected 1.0)",
        state["/Linear/w/value"].to_scalar()?,
        state["/Linear/b/value"].to_scalar()?,
    );
    tracing::info!(stats = %step.stats(), "done");

    Ok(())
}
