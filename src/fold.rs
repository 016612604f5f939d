//! Dimension folding
//!
//! Collapses every leading ("batch-like") axis of a tensor into a single
//! folded batch axis so that backends always see the same canonical
//! layout `(folded_length, *kept_dims)`, then restores the leading axes on
//! the way out.
//!
//! ```text
//! (B, C, S, T) --fold(keep_last_n = 2)--> (B*C, S, T)
//! (B*C, S, P, A) --unfold--> (B, C, S, P, A)
//! ```
//!
//! Folding is a pure reinterpretation of row-major data: [`fold`] returns a
//! borrowed view and [`unfold`] only rewrites shape metadata. Only axis 0 of
//! the result is reinterpreted, so the unit computation is free to change
//! the trailing rank and sizes between the two calls.

use crate::error::{BenchError, Result};
use crate::tensor::{Tensor, TensorView};

/// Everything needed to undo a [`fold`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPlan {
    original_leading_shape: Vec<usize>,
    kept_axes_count: usize,
    folded_length: usize,
}

impl FoldPlan {
    /// Leading shape that was collapsed
    #[must_use]
    pub fn original_leading_shape(&self) -> &[usize] {
        &self.original_leading_shape
    }

    /// Number of trailing axes left untouched
    #[must_use]
    pub fn kept_axes_count(&self) -> usize {
        self.kept_axes_count
    }

    /// Product of the leading shape
    #[must_use]
    pub fn folded_length(&self) -> usize {
        self.folded_length
    }

    /// Shape produced by unfolding a result with the given trailing axes
    #[must_use]
    pub fn unfolded_shape(&self, trailing: &[usize]) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.original_leading_shape.len() + trailing.len());
        shape.extend_from_slice(&self.original_leading_shape);
        shape.extend_from_slice(trailing);
        shape
    }
}

/// Fold all but the last `keep_last_n` axes into one
///
/// # Errors
///
/// Returns [`BenchError::Shape`] if `keep_last_n` is zero, the tensor has
/// fewer than `keep_last_n + 1` axes, or any leading axis is empty
pub fn fold<T>(tensor: &Tensor<T>, keep_last_n: usize) -> Result<(TensorView<'_, T>, FoldPlan)> {
    if keep_last_n == 0 {
        return Err(BenchError::Shape {
            reason: "keep_last_n must be at least 1".to_string(),
        });
    }
    let shape = tensor.shape();
    if shape.len() < keep_last_n + 1 {
        return Err(BenchError::Shape {
            reason: format!(
                "cannot keep last {} axes of a rank-{} tensor (need rank >= {})",
                keep_last_n,
                shape.len(),
                keep_last_n + 1
            ),
        });
    }

    let split = shape.len() - keep_last_n;
    let leading = &shape[..split];
    let folded_length: usize = leading.iter().product();
    if folded_length == 0 {
        return Err(BenchError::Shape {
            reason: format!("leading shape {:?} contains an empty axis", leading),
        });
    }

    let mut folded_shape = Vec::with_capacity(keep_last_n + 1);
    folded_shape.push(folded_length);
    folded_shape.extend_from_slice(&shape[split..]);

    let view = TensorView::new(folded_shape, tensor.data())?;
    let plan = FoldPlan {
        original_leading_shape: leading.to_vec(),
        kept_axes_count: keep_last_n,
        folded_length,
    };
    Ok((view, plan))
}

/// Restore the leading axes recorded in `plan`
///
/// Axis 0 of `result` is expanded back into the original leading shape;
/// every other axis is appended unchanged.
///
/// # Errors
///
/// Returns [`BenchError::Shape`] if `result.shape()[0]` differs from the
/// plan's folded length
pub fn unfold<T>(result: Tensor<T>, plan: &FoldPlan) -> Result<Tensor<T>> {
    let shape = result.shape();
    if shape[0] != plan.folded_length {
        return Err(BenchError::Shape {
            reason: format!(
                "result axis 0 has length {}, fold plan expects {}",
                shape[0], plan.folded_length
            ),
        });
    }
    let new_shape = plan.unfolded_shape(&shape[1..]);
    result.reshape(new_shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: Vec<usize>) -> Tensor<f32> {
        let n = shape.iter().product();
        Tensor::from_vec(shape, (0..n).map(|i| i as f32).collect()).expect("test")
    }

    #[test]
    fn test_fold_keep_two() {
        let t = iota(vec![2, 3, 4, 16]);
        let (view, plan) = fold(&t, 2).expect("test");
        assert_eq!(view.shape(), &[6, 4, 16]);
        assert_eq!(plan.original_leading_shape(), &[2, 3]);
        assert_eq!(plan.folded_length(), 6);
        assert_eq!(plan.kept_axes_count(), 2);
        // Zero-copy: same data
        assert_eq!(view.data().as_ptr(), t.data().as_ptr());
    }

    #[test]
    fn test_fold_keep_one() {
        let t = iota(vec![2, 3, 4, 16]);
        let (view, plan) = fold(&t, 1).expect("test");
        assert_eq!(view.shape(), &[24, 16]);
        assert_eq!(plan.original_leading_shape(), &[2, 3, 4]);
    }

    #[test]
    fn test_fold_rank_too_small() {
        let t = iota(vec![4, 16]);
        assert!(matches!(fold(&t, 2), Err(BenchError::Shape { .. })));
        assert!(fold(&t, 1).is_ok());
        assert!(fold(&t, 0).is_err());
    }

    #[test]
    fn test_fold_empty_leading_axis() {
        let t = Tensor::<f32>::from_vec(vec![2, 0, 4, 16], vec![]).expect("test");
        assert!(matches!(fold(&t, 2), Err(BenchError::Shape { .. })));
    }

    #[test]
    fn test_unfold_with_new_trailing_axes() {
        let t = iota(vec![2, 3, 4, 16]);
        let (_, plan) = fold(&t, 2).expect("test");
        // Unit stage replaced (4, 16) with (4, 5, 3)
        let result = iota(vec![6, 4, 5, 3]);
        let restored = unfold(result, &plan).expect("test");
        assert_eq!(restored.shape(), &[2, 3, 4, 5, 3]);
    }

    #[test]
    fn test_unfold_rejects_wrong_length() {
        let t = iota(vec![2, 3, 4, 16]);
        let (_, plan) = fold(&t, 2).expect("test");
        let result = iota(vec![5, 7]);
        assert!(matches!(unfold(result, &plan), Err(BenchError::Shape { .. })));
    }

    #[test]
    fn test_fold_unfold_identity() {
        let t = iota(vec![3, 2, 5]);
        let (view, plan) = fold(&t, 1).expect("test");
        let restored = unfold(view.to_tensor(), &plan).expect("test");
        assert_eq!(restored, t);
    }
}
