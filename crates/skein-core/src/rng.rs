// Key — Splittable randomness token
//
// A Key is an opaque pair of 32-bit words. It is never used as a stateful
// generator: every consumer derives fresh keys from it instead.
//
//   split(n)     — n child keys, deterministic in the parent
//   split2()     — (carry, sub): keep `carry`, hand `sub` to a consumer
//   fold_in(d)   — a key tagged with an integer (branch index, step, ...)
//   uniform/normal — sample an array from the key
//
// All derivations seed a ChaCha20 stream from the key words, so the same key
// always yields the same children and the same samples, and distinct keys
// give unrelated streams.

use std::fmt;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::array::Array;
use crate::dtype::DType;
use crate::shape::Shape;

/// Purposes mixed into the ChaCha seed so that splitting, folding and
/// sampling from one key never share a stream.
const PURPOSE_SPLIT: u8 = 1;
const PURPOSE_FOLD: u8 = 2;
const PURPOSE_SAMPLE: u8 = 3;

/// An opaque, splittable randomness token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key([u32; 2]);

impl Key {
    /// Root key from an integer seed.
    pub fn new(seed: u64) -> Self {
        Key([(seed >> 32) as u32, seed as u32])
    }

    pub fn from_words(words: [u32; 2]) -> Self {
        Key(words)
    }

    pub fn words(&self) -> [u32; 2] {
        self.0
    }

    fn stream(&self, purpose: u8, data: u32) -> ChaCha20Rng {
        let mut seed = [0u8; 32];
        seed[0..4].copy_from_slice(&self.0[0].to_le_bytes());
        seed[4..8].copy_from_slice(&self.0[1].to_le_bytes());
        seed[8..12].copy_from_slice(&data.to_le_bytes());
        seed[12] = purpose;
        ChaCha20Rng::from_seed(seed)
    }

    /// Derive `n` independent child keys.
    pub fn split(&self, n: usize) -> Vec<Key> {
        let mut rng = self.stream(PURPOSE_SPLIT, 0);
        (0..n)
            .map(|_| Key([rng.next_u32(), rng.next_u32()]))
            .collect()
    }

    /// Split into a carry key and a key to consume.
    pub fn split2(&self) -> (Key, Key) {
        let mut rng = self.stream(PURPOSE_SPLIT, 0);
        let carry = Key([rng.next_u32(), rng.next_u32()]);
        let sub = Key([rng.next_u32(), rng.next_u32()]);
        (carry, sub)
    }

    /// Derive a key tagged with `data`.
    pub fn fold_in(&self, data: u32) -> Key {
        let mut rng = self.stream(PURPOSE_FOLD, data);
        Key([rng.next_u32(), rng.next_u32()])
    }

    /// Sample U(low, high) into a new array.
    pub fn uniform(&self, shape: impl Into<Shape>, dtype: DType, low: f64, high: f64) -> Array {
        let shape = shape.into();
        let mut rng = self.stream(PURPOSE_SAMPLE, 0);
        let data: Vec<f64> = (0..shape.elem_count())
            .map(|_| low + (high - low) * rng.gen::<f64>())
            .collect();
        Array::from_parts(shape, dtype, data)
    }

    /// Sample N(mean, std) into a new array (Box-Muller).
    pub fn normal(&self, shape: impl Into<Shape>, dtype: DType, mean: f64, std: f64) -> Array {
        let shape = shape.into();
        let mut rng = self.stream(PURPOSE_SAMPLE, 0);
        let data: Vec<f64> = (0..shape.elem_count())
            .map(|_| {
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                mean + std * z
            })
            .collect();
        Array::from_parts(shape, dtype, data)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:08x}{:08x})", self.0[0], self.0[1])
    }
}
