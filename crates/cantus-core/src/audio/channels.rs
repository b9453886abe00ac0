//! Channel shape normalization

use ndarray::{Array2, ArrayD};

/// Duplicate a mono buffer `(N,)` into a stereo buffer `(N, 2)`.
///
/// Buffers of any other rank are handed back untouched, without checking
/// that they really are stereo or in which order their axes are.
pub fn to_stereo<T: Clone>(buffer: ArrayD<T>) -> ArrayD<T> {
    if buffer.ndim() != 1 {
        return buffer;
    }
    let mono: Vec<T> = buffer.into_iter().collect();
    Array2::from_shape_fn((mono.len(), 2), |(frame, _)| mono[frame].clone()).into_dyn()
}
