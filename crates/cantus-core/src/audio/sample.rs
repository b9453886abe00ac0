//! Sample element types and model-produced sample buffers

use ndarray::{ArrayD, ArrayView, Axis, CowArray, Dimension};
use serde::{Deserialize, Serialize};

/// A numeric element type the waveform writer accepts.
///
/// Every buffer is brought to `f32` before encoding. For `f32` itself the
/// conversion only borrows, so converting twice is the same as converting once.
pub trait AudioSample: Copy + Send + Sync + 'static {
    /// Name reported in logs and by the model bridge (`float32`, `float64`).
    const DTYPE: &'static str;

    fn to_f32(self) -> f32;

    fn to_f32_array<'a, D: Dimension>(view: ArrayView<'a, Self, D>) -> CowArray<'a, f32, D> {
        CowArray::from(view.mapv(Self::to_f32))
    }
}

impl AudioSample for f32 {
    const DTYPE: &'static str = "float32";

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    fn to_f32_array<'a, D: Dimension>(view: ArrayView<'a, Self, D>) -> CowArray<'a, f32, D> {
        CowArray::from(view)
    }
}

impl AudioSample for f64 {
    const DTYPE: &'static str = "float64";

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}

/// How a two-dimensional buffer stores its channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// Shape `(frames, channels)`, one row per frame.
    #[default]
    FramesFirst,
    /// Shape `(channels, frames)`, one row per channel.
    ChannelsFirst,
}

/// Host-resident model output whose element type is only known at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl RawSamples {
    pub fn dtype(&self) -> &'static str {
        match self {
            RawSamples::F32(_) => f32::DTYPE,
            RawSamples::F64(_) => f64::DTYPE,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            RawSamples::F32(a) => a.shape(),
            RawSamples::F64(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements across all axes.
    pub fn len(&self) -> usize {
        match self {
            RawSamples::F32(a) => a.len(),
            RawSamples::F64(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to the canonical `f32` array, moving it when it already is one.
    pub fn into_f32(self) -> ArrayD<f32> {
        match self {
            RawSamples::F32(a) => a,
            RawSamples::F64(a) => a.mapv(AudioSample::to_f32),
        }
    }

    /// Drop the leading axis by keeping its first entry.
    ///
    /// Returns `None` for scalars and for an empty leading axis.
    pub fn take_first(self) -> Option<Self> {
        if self.ndim() == 0 || self.shape()[0] == 0 {
            return None;
        }
        Some(match self {
            RawSamples::F32(a) => RawSamples::F32(a.index_axis_move(Axis(0), 0)),
            RawSamples::F64(a) => RawSamples::F64(a.index_axis_move(Axis(0), 0)),
        })
    }
}

impl From<ArrayD<f32>> for RawSamples {
    fn from(a: ArrayD<f32>) -> Self {
        RawSamples::F32(a)
    }
}

impl From<ArrayD<f64>> for RawSamples {
    fn from(a: ArrayD<f64>) -> Self {
        RawSamples::F64(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, IxDyn};

    #[test]
    fn f32_conversion_borrows() {
        let a = arr1(&[0.0f32, 0.5, -0.5]);
        let cow = f32::to_f32_array(a.view());
        assert!(cow.is_view());
        assert_eq!(cow, a);
    }

    #[test]
    fn f64_conversion_narrows() {
        let a = arr2(&[[0.25f64, -1.0], [0.1, 2.0]]);
        let cow = f64::to_f32_array(a.view());
        assert!(cow.is_owned());
        assert_eq!(cow.shape(), &[2, 2]);
        assert_eq!(cow[[0, 0]], 0.25f32);
        assert_eq!(cow[[1, 0]], 0.1f64 as f32);
    }

    #[test]
    fn raw_samples_report_dtype_and_shape() {
        let raw = RawSamples::from(ArrayD::<f64>::zeros(IxDyn(&[2, 5])));
        assert_eq!(raw.dtype(), "float64");
        assert_eq!(raw.shape(), &[2, 5]);
        assert_eq!(raw.len(), 10);
        assert_eq!(raw.into_f32().shape(), &[2, 5]);
    }

    #[test]
    fn take_first_drops_batch_axis() {
        let batch = ArrayD::from_shape_vec(IxDyn(&[2, 1, 3]), (0..6).map(|v| v as f32).collect())
            .unwrap();
        let first = RawSamples::F32(batch).take_first().unwrap();
        assert_eq!(first.shape(), &[1, 3]);
        let values: Vec<f32> = first.into_f32().iter().copied().collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn take_first_rejects_empty_leading_axis() {
        let empty = RawSamples::F32(ArrayD::zeros(IxDyn(&[0, 4])));
        assert!(empty.take_first().is_none());
    }
}
