//! Dense row-major tensors used by the execution engine
//!
//! The engine only ever needs three things from a tensor: its shape, its
//! contiguous data, and cheap sub-views along axis 0. [`Tensor`] owns its
//! buffer, [`TensorView`] borrows one without copying, and [`TensorData`]
//! tags a tensor with its element precision so that callers can hand
//! either an fp16 or an fp32 signal to the same handler.
//!
//! ## Example
//!
//! ```
//! use pacbench::tensor::Tensor;
//!
//! let t = Tensor::from_vec(vec![2, 3], vec![0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! let row = t.view().index_axis0(1).unwrap();
//! assert_eq!(row.shape(), &[3]);
//! assert_eq!(row.data(), &[3.0, 4.0, 5.0]);
//! ```

use std::fmt;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Floating point precision of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    /// IEEE 754 half precision (`half::f16`)
    #[serde(rename = "fp16")]
    F16,
    /// IEEE 754 single precision
    #[default]
    #[serde(rename = "fp32")]
    F32,
}

impl Precision {
    /// `F16` if `fp16` is set, else `F32`
    #[must_use]
    pub const fn from_fp16(fp16: bool) -> Self {
        if fp16 {
            Self::F16
        } else {
            Self::F32
        }
    }

    /// Short name (`fp16` / `fp32`)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::F16 => "fp16",
            Self::F32 => "fp32",
        }
    }

    /// Size of one element in bytes
    #[must_use]
    pub const fn bytes(&self) -> usize {
        match self {
            Self::F16 => 2,
            Self::F32 => 4,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scalar element stored in a [`Tensor`]
pub trait Element: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// Precision tag for this element type
    const PRECISION: Precision;

    /// Narrow/convert from f32
    fn from_f32(value: f32) -> Self;

    /// Widen/convert to f32
    fn to_f32(self) -> f32;

    /// Reborrow as an f32 view without copying, when `Self` is f32
    fn as_f32_view<'a>(view: &TensorView<'a, Self>) -> Option<TensorView<'a, f32>> {
        let _ = view;
        None
    }

    /// Convert an f32 tensor into this precision
    fn from_f32_tensor(tensor: Tensor<f32>) -> Tensor<Self> {
        tensor.cast()
    }
}

impl Element for f32 {
    const PRECISION: Precision = Precision::F32;

    fn as_f32_view<'a>(view: &TensorView<'a, Self>) -> Option<TensorView<'a, f32>> {
        Some(view.clone())
    }

    fn from_f32_tensor(tensor: Tensor<f32>) -> Tensor<Self> {
        tensor
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Element for f16 {
    const PRECISION: Precision = Precision::F16;

    #[inline]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
}

fn checked_len(shape: &[usize], data_len: usize) -> Result<()> {
    if shape.is_empty() {
        return Err(BenchError::Shape {
            reason: "tensor rank must be at least 1".to_string(),
        });
    }
    let expected: usize = shape.iter().product();
    if expected != data_len {
        return Err(BenchError::Shape {
            reason: format!(
                "shape {:?} implies {} elements but data has {}",
                shape, expected, data_len
            ),
        });
    }
    Ok(())
}

/// Owned N-dimensional tensor, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Create a tensor from a shape and row-major data
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Shape`] if the shape is rank 0 or its element
    /// count does not match `data.len()`
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        checked_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    /// Shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major data
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consume the tensor and return its data
    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Number of axes
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the tensor as a view
    #[must_use]
    pub fn view(&self) -> TensorView<'_, T> {
        TensorView {
            shape: self.shape.clone(),
            data: &self.data,
        }
    }

    /// Reinterpret the tensor with a new shape (no data movement)
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Shape`] if the element counts differ
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        checked_len(&shape, self.data.len())?;
        Ok(Self {
            shape,
            data: self.data,
        })
    }
}

impl<T: Element> Tensor<T> {
    /// Convert every element to another precision
    #[must_use]
    pub fn cast<U: Element>(&self) -> Tensor<U> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| U::from_f32(v.to_f32())).collect(),
        }
    }
}

/// Borrowed, zero-copy view into row-major data
#[derive(Debug, Clone, PartialEq)]
pub struct TensorView<'a, T> {
    shape: Vec<usize>,
    data: &'a [T],
}

impl<'a, T> TensorView<'a, T> {
    /// Create a view over `data` with the given shape
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Shape`] if the shape does not describe `data`
    pub fn new(shape: Vec<usize>, data: &'a [T]) -> Result<Self> {
        checked_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    /// Shape of the view
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Underlying data
    #[must_use]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Number of axes
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Elements per step along axis 0
    fn axis0_stride(&self) -> usize {
        self.shape[1..].iter().product()
    }

    /// Rows `[start, end)` along axis 0, keeping the axis
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Shape`] if the range is empty or out of bounds
    pub fn slice_axis0(&self, start: usize, end: usize) -> Result<TensorView<'a, T>> {
        if start >= end || end > self.shape[0] {
            return Err(BenchError::Shape {
                reason: format!(
                    "axis-0 range [{}, {}) invalid for length {}",
                    start, end, self.shape[0]
                ),
            });
        }
        let stride = self.axis0_stride();
        let mut shape = self.shape.clone();
        shape[0] = end - start;
        Ok(TensorView {
            shape,
            data: &self.data[start * stride..end * stride],
        })
    }

    /// Row `index` along axis 0, dropping the axis
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Shape`] if the view is rank 1 or the index is
    /// out of bounds
    pub fn index_axis0(&self, index: usize) -> Result<TensorView<'a, T>> {
        if self.rank() < 2 {
            return Err(BenchError::Shape {
                reason: "cannot drop axis 0 of a rank-1 view".to_string(),
            });
        }
        if index >= self.shape[0] {
            return Err(BenchError::Shape {
                reason: format!("index {} out of bounds for length {}", index, self.shape[0]),
            });
        }
        let stride = self.axis0_stride();
        Ok(TensorView {
            shape: self.shape[1..].to_vec(),
            data: &self.data[index * stride..(index + 1) * stride],
        })
    }
}

impl<T: Clone> TensorView<'_, T> {
    /// Copy the view into an owned tensor
    #[must_use]
    pub fn to_tensor(&self) -> Tensor<T> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.to_vec(),
        }
    }
}

impl<T: Element> TensorView<'_, T> {
    /// Copy the view into an owned f32 tensor
    #[must_use]
    pub fn to_f32(&self) -> Tensor<f32> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| v.to_f32()).collect(),
        }
    }
}

/// Concatenate tensors along axis 0
///
/// # Errors
///
/// Returns [`BenchError::Shape`] if `parts` is empty, any part is rank 0,
/// or trailing shapes disagree
pub fn concat_axis0<T>(parts: Vec<Tensor<T>>) -> Result<Tensor<T>> {
    let Some(first) = parts.first() else {
        return Err(BenchError::Shape {
            reason: "cannot concatenate zero tensors".to_string(),
        });
    };
    let trailing = first.shape[1..].to_vec();
    let mut rows = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.shape[1..] != trailing[..] {
            return Err(BenchError::Shape {
                reason: format!(
                    "part {} has trailing shape {:?}, expected {:?}",
                    i,
                    &part.shape[1..],
                    trailing
                ),
            });
        }
        rows += part.shape[0];
    }

    let total: usize = parts.iter().map(Tensor::len).sum();
    let mut data = Vec::with_capacity(total);
    for part in parts {
        data.extend(part.data);
    }

    let mut shape = Vec::with_capacity(trailing.len() + 1);
    shape.push(rows);
    shape.extend(trailing);
    Tensor::from_vec(shape, data)
}

/// Precision-tagged tensor exchanged with the benchmark driver
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// Half precision tensor
    F16(Tensor<f16>),
    /// Single precision tensor
    F32(Tensor<f32>),
}

impl TensorData {
    /// Precision of the stored elements
    #[must_use]
    pub const fn precision(&self) -> Precision {
        match self {
            Self::F16(_) => Precision::F16,
            Self::F32(_) => Precision::F32,
        }
    }

    /// Shape of the stored tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F16(t) => t.shape(),
            Self::F32(t) => t.shape(),
        }
    }

    /// Number of axes
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Widen to an f32 tensor (copies)
    #[must_use]
    pub fn to_f32(&self) -> Tensor<f32> {
        match self {
            Self::F16(t) => t.cast(),
            Self::F32(t) => t.clone(),
        }
    }

    /// Store an f32 tensor at the requested precision
    #[must_use]
    pub fn from_f32(tensor: Tensor<f32>, precision: Precision) -> Self {
        match precision {
            Precision::F16 => Self::F16(tensor.cast()),
            Precision::F32 => Self::F32(tensor),
        }
    }
}

impl From<Tensor<f32>> for TensorData {
    fn from(tensor: Tensor<f32>) -> Self {
        Self::F32(tensor)
    }
}

impl From<Tensor<f16>> for TensorData {
    fn from(tensor: Tensor<f16>) -> Self {
        Self::F16(tensor)
    }
}
