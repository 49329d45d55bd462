use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// Shape — Dimensions of a state value
//
//   Scalar: Shape([])      — 0 dimensions, 1 element
//   Vector: Shape([5])     — 1 dimension, 5 elements
//   Matrix: Shape([3, 4])  — 2 dimensions, 12 elements
//
// A state entry's shape is fixed once the entry exists, so shapes are
// compared on every write.

/// N-dimensional shape of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The 0-dimensional shape.
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of elements. A scalar shape has 1 element and any zero
    /// dimension gives 0.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major strides: for [2, 3, 4] this is [12, 4, 1].
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        strides
    }

    /// NumPy-style broadcast of two shapes: align from the right, dims must
    /// be equal or one of them 1, missing leading dims count as 1.
    pub fn broadcast_shape(lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        let (l, r) = (lhs.dims(), rhs.dims());
        let rank = l.len().max(r.len());
        let mut out = Vec::with_capacity(rank);
        for i in 0..rank {
            let ld = if i < l.len() { l[l.len() - 1 - i] } else { 1 };
            let rd = if i < r.len() { r[r.len() - 1 - i] } else { 1 };
            let d = match (ld, rd) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => {
                    return Err(Error::Broadcast {
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                    })
                }
            };
            out.push(d);
        }
        out.reverse();
        Ok(Shape(out))
    }

    /// Map a flat row-major index of `target` onto the flat index of `self`,
    /// where `self` broadcasts to `target`.
    pub fn broadcast_offset(&self, target: &Shape, mut flat: usize) -> usize {
        let own = self.dims();
        let strides = self.stride_contiguous();
        let lead = target.rank() - own.len();
        let mut offset = 0;
        for axis in (0..target.rank()).rev() {
            let extent = target.0[axis];
            let coord = if extent == 0 { 0 } else { flat % extent };
            flat = if extent == 0 { 0 } else { flat / extent };
            if axis >= lead {
                let own_axis = axis - lead;
                if own[own_axis] != 1 {
                    offset += coord * strides[own_axis];
                }
            }
        }
        offset
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from(d: (usize,)) -> Self {
        Shape(vec![d.0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}
