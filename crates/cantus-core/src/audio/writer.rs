//! Writes sample buffers to temporary PCM16 WAV files
//!
//! Every call reserves a fresh, randomly named `.wav` file in the temp
//! directory, streams the quantized samples through the reserved handle and
//! closes it before handing the path back. The file belongs to the caller
//! from then on; nothing here deletes it.

use ndarray::{ArrayView, Dimension};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::encoder::AudioEncoder;
use super::sample::{AudioSample, ChannelLayout, RawSamples};
use crate::config::StudioConfig;
use crate::error::{Error, Result};

const DEFAULT_PREFIX: &str = "cantus-";

/// Turns in-memory sample buffers into WAV files on disk.
#[derive(Debug, Clone)]
pub struct WaveformWriter {
    dir: Option<PathBuf>,
    prefix: String,
}

impl WaveformWriter {
    /// Writer targeting the OS temp directory
    pub fn new() -> Self {
        Self {
            dir: None,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Build a writer from the studio configuration
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            dir: config.output_dir.clone(),
            prefix: config.file_prefix.clone(),
        }
    }

    /// Place files in `dir` instead of the OS temp directory
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Directory new files are created in
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Write a 1-D (mono) or 2-D `(frames, channels)` buffer.
    pub fn write<T, D>(&self, buffer: ArrayView<'_, T, D>, sample_rate: u32) -> Result<PathBuf>
    where
        T: AudioSample,
        D: Dimension,
    {
        self.write_with_layout(buffer, sample_rate, ChannelLayout::FramesFirst)
    }

    /// Write a buffer whose 2-D layout is given explicitly.
    ///
    /// The layout is ignored for 1-D buffers. Any other rank is an
    /// `EncodingError`.
    pub fn write_with_layout<T, D>(
        &self,
        buffer: ArrayView<'_, T, D>,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> Result<PathBuf>
    where
        T: AudioSample,
        D: Dimension,
    {
        let samples = T::to_f32_array(buffer).into_dyn();

        let (frames, channels) = match (samples.shape(), layout) {
            (&[n], _) => (n, 1),
            (&[frames, channels], ChannelLayout::FramesFirst) => (frames, channels),
            (&[channels, frames], ChannelLayout::ChannelsFirst) => (frames, channels),
            (shape, _) => {
                return Err(Error::EncodingError(format!(
                    "unsupported buffer shape {:?}, expected 1 or 2 dimensions",
                    shape
                )))
            }
        };
        let channels = channel_count(channels)?;
        let encoder = AudioEncoder::new(sample_rate, channels)?;

        if let Some(idx) = samples.iter().position(|s| s.is_nan()) {
            return Err(Error::EncodingError(format!(
                "sample {} of {} buffer is not a number",
                idx,
                T::DTYPE
            )));
        }

        let path = match layout {
            ChannelLayout::ChannelsFirst if samples.ndim() == 2 => {
                self.persist(&encoder, samples.t().iter().copied())?
            }
            _ => self.persist(&encoder, samples.iter().copied())?,
        };

        debug!(
            "Wrote {} frames x {} channels at {} Hz to {:?}",
            frames, channels, sample_rate, path
        );
        Ok(path)
    }

    /// Write a model output whose element type is known only at run time.
    pub fn write_raw(
        &self,
        raw: &RawSamples,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> Result<PathBuf> {
        match raw {
            RawSamples::F32(a) => self.write_with_layout(a.view(), sample_rate, layout),
            RawSamples::F64(a) => self.write_with_layout(a.view(), sample_rate, layout),
        }
    }

    /// Write an interleaved buffer of `channels` channels.
    pub fn write_interleaved(
        &self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<PathBuf> {
        let encoder = AudioEncoder::new(sample_rate, channels)?;
        encoder.validate(samples)?;
        let path = self.persist(&encoder, samples.iter().copied())?;

        debug!(
            "Wrote {} interleaved samples ({} channels) at {} Hz to {:?}",
            samples.len(),
            channels,
            sample_rate,
            path
        );
        Ok(path)
    }

    /// Reserve a unique `.wav` path, encode into it, then release the handle.
    ///
    /// The reservation is deleted again if encoding fails, so an error never
    /// leaves a half-written file behind.
    fn persist<I>(&self, encoder: &AudioEncoder, samples: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix).suffix(".wav");
        let mut reserved = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        encoder.write_wav(BufWriter::new(reserved.as_file_mut()), samples)?;

        let (file, path) = reserved.keep()?;
        drop(file);
        absolute(path)
    }
}

impl Default for WaveformWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `buffer` to a new temp file with a default writer.
pub fn write<T, D>(buffer: ArrayView<'_, T, D>, sample_rate: u32) -> Result<PathBuf>
where
    T: AudioSample,
    D: Dimension,
{
    WaveformWriter::default().write(buffer, sample_rate)
}

fn channel_count(channels: usize) -> Result<u16> {
    u16::try_from(channels).map_err(|_| {
        Error::EncodingError(format!("{} channels exceed the WAV limit", channels))
    })
}

/// Anchor a relative path at the working directory.
///
/// An unreadable working directory is a `FilesystemError`; the file itself
/// has already been written and is left in place.
fn absolute(path: PathBuf) -> Result<PathBuf> {
    absolute_from(path, std::env::current_dir)
}

fn absolute_from<F>(path: PathBuf, cwd: F) -> Result<PathBuf>
where
    F: FnOnce() -> std::io::Result<PathBuf>,
{
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(cwd()?.join(path))
}

/// True when `path` names a file this writer layout would produce.
pub fn is_wav_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("wav")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array1, Array2, ArrayD, IxDyn};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn read_i16(path: &Path) -> (hound::WavSpec, Vec<i16>) {
        let mut reader = hound::WavReader::open(path).expect("open wav");
        let spec = reader.spec();
        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .expect("read samples");
        (spec, samples)
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).expect("read dir").count()
    }

    #[test]
    fn writes_mono_example() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let buffer = arr1(&[0.0f32, 0.5, -0.5, 1.0]);

        let path = writer.write(buffer.view(), 48000).expect("write");
        assert!(path.is_absolute());
        assert!(is_wav_path(&path));
        assert!(path.starts_with(dir.path()));

        let (spec, samples) = read_i16(&path);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(samples, vec![0, 16384, -16384, i16::MAX]);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let buffer = arr1(&[2.0f32, -3.0, 0.0]);

        let path = writer.write(buffer.view(), 32000).expect("write");
        let (_, samples) = read_i16(&path);
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn f64_buffer_matches_f32_output() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let wide: Array1<f64> = Array1::linspace(-1.0, 1.0, 257);
        let narrow = wide.mapv(|v| v as f32);

        let a = writer.write(wide.view(), 48000).expect("write f64");
        let b = writer.write(narrow.view(), 48000).expect("write f32");
        assert_ne!(a, b);
        assert_eq!(
            std::fs::read(&a).expect("read a"),
            std::fs::read(&b).expect("read b")
        );
    }

    #[test]
    fn stereo_frames_first_is_interleaved_by_row() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let buffer = arr2(&[[0.0f32, 1.0], [0.5, -0.5], [-1.0, 0.0]]);

        let path = writer.write(buffer.view(), 48000).expect("write");
        let (spec, samples) = read_i16(&path);
        assert_eq!(spec.channels, 2);
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[..2], [0, i16::MAX]);
        assert_eq!(samples[4..], [-i16::MAX, 0]);
    }

    #[test]
    fn channels_first_layout_is_transposed() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let frames_first = arr2(&[[0.1f32, 0.2], [0.3, 0.4], [0.5, 0.6]]);
        let channels_first = frames_first.t().to_owned();

        let a = writer.write(frames_first.view(), 32000).expect("write");
        let b = writer
            .write_with_layout(channels_first.view(), 32000, ChannelLayout::ChannelsFirst)
            .expect("write channels first");
        assert_eq!(read_i16(&a).1, read_i16(&b).1);
        assert_eq!(read_i16(&b).0.channels, 2);
    }

    #[test]
    fn empty_buffer_writes_zero_length_audio() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let buffer = Array1::<f32>::zeros(0);

        let path = writer.write(buffer.view(), 48000).expect("write");
        let reader = hound::WavReader::open(&path).expect("open wav");
        assert_eq!(reader.duration(), 0);
        assert_eq!(reader.spec().sample_rate, 48000);
    }

    #[test]
    fn three_dimensional_buffer_is_an_encoding_error() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());
        let buffer = ArrayD::<f32>::zeros(IxDyn(&[1, 2, 4]));

        let err = writer.write(buffer.view(), 32000).unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn wide_buffers_keep_every_channel() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());

        let path = writer
            .write(Array2::<f32>::zeros((100, 20)).view(), 48000)
            .expect("write 20 channels");
        let reader = hound::WavReader::open(&path).expect("open wav");
        assert_eq!(reader.spec().channels, 20);
        assert_eq!(reader.duration(), 100);

        let row = ArrayD::<f32>::zeros(IxDyn(&[1, 4800]));
        let path = writer.write(row.view(), 48000).expect("one wide frame");
        let reader = hound::WavReader::open(&path).expect("open wav");
        assert_eq!(reader.spec().channels, 4800);
        assert_eq!(reader.duration(), 1);

        let path = writer
            .write_with_layout(row.view(), 48000, ChannelLayout::ChannelsFirst)
            .expect("channels-first row vector is mono");
        assert_eq!(read_i16(&path).0.channels, 1);
    }

    #[test]
    fn channel_count_beyond_header_is_an_encoding_error() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());

        let too_wide = Array2::<f32>::zeros((1, 40000));
        let err = writer.write(too_wide.view(), 8000).unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn relative_paths_are_anchored_or_fail() {
        let anchored = absolute_from(PathBuf::from("out.wav"), || Ok(PathBuf::from("/work")))
            .expect("anchored");
        assert_eq!(anchored, PathBuf::from("/work/out.wav"));

        let err = absolute_from(PathBuf::from("out.wav"), || {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "cwd removed"))
        })
        .unwrap_err();
        assert!(err.is_filesystem());

        let kept = absolute_from(PathBuf::from("/tmp/a.wav"), || unreachable!()).expect("kept");
        assert_eq!(kept, PathBuf::from("/tmp/a.wav"));
    }

    #[test]
    fn zero_sample_rate_and_nan_leave_no_file() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());

        let err = writer.write(arr1(&[0.0f32]).view(), 0).unwrap_err();
        assert!(err.is_encoding());

        let err = writer
            .write(arr1(&[0.0f32, f32::NAN]).view(), 48000)
            .unwrap_err();
        assert!(err.is_encoding());
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn interleaved_count_must_divide_channels() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());

        let err = writer
            .write_interleaved(&[0.0, 0.1, 0.2], 2, 48000)
            .unwrap_err();
        assert!(err.is_encoding());

        let path = writer
            .write_interleaved(&[0.0, 0.1, 0.2, 0.3], 2, 48000)
            .expect("write");
        assert_eq!(read_i16(&path).1.len(), 4);
    }

    #[test]
    fn missing_directory_is_a_filesystem_error() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path().join("missing"));

        let err = writer.write(arr1(&[0.0f32]).view(), 48000).unwrap_err();
        assert!(err.is_filesystem());
    }

    #[test]
    fn raw_f64_samples_are_written() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path()).with_prefix("raw-");
        let raw = RawSamples::from(ArrayD::<f64>::from_elem(IxDyn(&[1, 8]), 0.25));

        let path = writer
            .write_raw(&raw, 32000, ChannelLayout::ChannelsFirst)
            .expect("write");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("raw-"));
        let (spec, samples) = read_i16(&path);
        assert_eq!(spec.channels, 1);
        assert_eq!(samples.len(), 8);
    }

    #[test]
    fn concurrent_writes_get_distinct_paths() {
        let dir = tempdir().expect("tempdir");
        let writer = WaveformWriter::new().in_dir(dir.path());

        let paths: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..50)
                .map(|t| {
                    let writer = &writer;
                    s.spawn(move || {
                        (0..20)
                            .map(|i| {
                                let value = ((t * 20 + i) as f32) / 1000.0;
                                let buffer = Array1::from_elem(16, value);
                                writer.write(buffer.view(), 48000).expect("write")
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().expect("writer thread"))
                .collect()
        });

        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 1000);
        for path in &paths {
            let (spec, samples) = read_i16(path);
            assert_eq!(spec.sample_rate, 48000);
            assert_eq!(samples.len(), 16);
        }
    }
}
