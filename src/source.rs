use ndarray::{Array2, Axis};

use crate::error::DetectError;

/// Filtered samples for one chunk request: the owned core range plus the
/// overlap margins that were actually available inside the recording.
#[derive(Clone, Debug)]
pub struct FilteredChunk {
    /// time x channel, rows covering `[data_start, data_start + nrows)`.
    /// Columns follow the channel order of the request.
    pub samples: Array2<f32>,
    /// Absolute sample time of row 0.
    pub data_start: usize,
    /// Start of the range this chunk owns for output purposes.
    pub core_start: usize,
    /// End (exclusive) of the owned range.
    pub core_end: usize,
}

impl FilteredChunk {
    pub fn data_end(&self) -> usize {
        self.data_start + self.samples.nrows()
    }

    /// Value at an absolute sample time and a column of this chunk's grid.
    pub fn value(&self, time: usize, col: usize) -> f32 {
        self.samples[[time - self.data_start, col]]
    }
}

/// Deterministic access to the filtered recording, one chunk at a time.
///
/// Implementations must return identical values for identical sample ranges
/// no matter how requests overlap; the boundary reconciliation in this crate
/// relies on that. Filtering itself (and its edge handling) lives behind this
/// trait — see [`crate::filter::FilteredRecording`] for the provided one.
pub trait ChunkSource {
    /// Total number of samples in the recording.
    fn n_samples(&self) -> usize;

    /// Fetch `[start - margin, end + margin)` clipped to the recording, for
    /// the given channels. The returned chunk owns `[start, end)`.
    fn fetch(
        &mut self,
        channels: &[usize],
        start: usize,
        end: usize,
        margin: usize,
    ) -> Result<FilteredChunk, DetectError>;
}

/// In-memory source serving slices of a prefiltered recording. Used for
/// tests and deterministic playback.
#[derive(Clone, Debug)]
pub struct MemorySource {
    data: Array2<f32>,
}

impl MemorySource {
    /// `data` is time x channel; column index is the channel id.
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Convenience for per-channel sample vectors of equal length.
    pub fn from_channels(channels: &[Vec<f32>]) -> Self {
        let nchannels = channels.len();
        let nsamples = channels.first().map(|c| c.len()).unwrap_or(0);
        let mut data = Array2::zeros((nsamples, nchannels));
        for (col, samples) in channels.iter().enumerate() {
            for (row, &v) in samples.iter().take(nsamples).enumerate() {
                data[[row, col]] = v;
            }
        }
        Self { data }
    }
}

impl ChunkSource for MemorySource {
    fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    fn fetch(
        &mut self,
        channels: &[usize],
        start: usize,
        end: usize,
        margin: usize,
    ) -> Result<FilteredChunk, DetectError> {
        slice_grid(&self.data, channels, start, end, margin)
    }
}

/// Shared fetch implementation for sources backed by a dense grid.
pub(crate) fn slice_grid(
    data: &Array2<f32>,
    channels: &[usize],
    start: usize,
    end: usize,
    margin: usize,
) -> Result<FilteredChunk, DetectError> {
    let n = data.nrows();
    if start > end || end > n {
        return Err(DetectError::data_source(format!(
            "requested range {start}..{end} outside recording of {n} samples"
        )));
    }
    let data_start = start.saturating_sub(margin);
    let data_end = (end + margin).min(n);
    let mut samples = Array2::zeros((data_end - data_start, channels.len()));
    for (col, &channel) in channels.iter().enumerate() {
        if channel >= data.ncols() {
            return Err(DetectError::data_source(format!(
                "channel {channel} outside recording of {} channels",
                data.ncols()
            )));
        }
        let column = data.index_axis(Axis(1), channel);
        for (row, time) in (data_start..data_end).enumerate() {
            samples[[row, col]] = column[time];
        }
    }
    Ok(FilteredChunk {
        samples,
        data_start,
        core_start: start,
        core_end: end,
    })
}

/// Start/end pairs of `nexcerpts` excerpts of `excerpt_size` samples spread
/// uniformly over the recording: first at 0, last flush with the end.
pub fn excerpt_ranges(n_samples: usize, nexcerpts: usize, excerpt_size: usize) -> Vec<(usize, usize)> {
    if n_samples == 0 || nexcerpts == 0 || excerpt_size == 0 {
        return Vec::new();
    }
    if excerpt_size >= n_samples || nexcerpts == 1 {
        return vec![(0, n_samples.min(excerpt_size))];
    }
    let span = n_samples - excerpt_size;
    let mut ranges = Vec::with_capacity(nexcerpts);
    let mut last = None;
    for i in 0..nexcerpts {
        let start = i * span / (nexcerpts - 1);
        // Short recordings round several starts to the same offset; keeping
        // them would count the same samples twice in the threshold median.
        if last == Some(start) {
            continue;
        }
        last = Some(start);
        ranges.push((start, start + excerpt_size));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fetch_clips_margins_at_recording_edges() {
        let mut source = MemorySource::from_channels(&[(0..10).map(|v| v as f32).collect()]);
        let chunk = source.fetch(&[0], 0, 4, 2).unwrap();
        assert_eq!(chunk.data_start, 0);
        assert_eq!(chunk.data_end(), 6);
        let chunk = source.fetch(&[0], 8, 10, 3).unwrap();
        assert_eq!(chunk.data_start, 5);
        assert_eq!(chunk.data_end(), 10);
        assert_eq!(chunk.value(9, 0), 9.0);
    }

    #[test]
    fn fetch_selects_requested_channels_in_order() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut source = MemorySource::new(data);
        let chunk = source.fetch(&[2, 0], 0, 2, 0).unwrap();
        assert_eq!(chunk.value(0, 0), 3.0);
        assert_eq!(chunk.value(1, 1), 4.0);
    }

    #[test]
    fn fetch_is_deterministic_across_overlapping_requests() {
        let mut source = MemorySource::from_channels(&[(0..20).map(|v| (v as f32).sin()).collect()]);
        let a = source.fetch(&[0], 5, 10, 3).unwrap();
        let b = source.fetch(&[0], 7, 12, 3).unwrap();
        for time in 7..10 {
            assert_eq!(a.value(time, 0), b.value(time, 0));
        }
    }

    #[test]
    fn out_of_range_fetch_is_a_data_source_error() {
        let mut source = MemorySource::from_channels(&[vec![0.0; 5]]);
        assert!(source.fetch(&[0], 0, 9, 0).is_err());
        assert!(source.fetch(&[3], 0, 5, 0).is_err());
    }

    #[test]
    fn excerpts_cover_start_and_end_uniformly() {
        let ranges = excerpt_ranges(100, 5, 10);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0], (0, 10));
        assert_eq!(ranges[4], (90, 100));
        for window in ranges.windows(2) {
            assert!(window[0].0 < window[1].0);
        }
    }

    #[test]
    fn duplicate_excerpt_starts_are_collapsed() {
        // span (2) smaller than nexcerpts - 1 (9): starts round to 0, 1, 2.
        let ranges = excerpt_ranges(12, 10, 10);
        assert_eq!(ranges, vec![(0, 10), (1, 11), (2, 12)]);
        for window in ranges.windows(2) {
            assert!(window[0].0 < window[1].0);
        }
    }

    #[test]
    fn short_recording_collapses_to_one_excerpt() {
        assert_eq!(excerpt_ranges(8, 10, 20), vec![(0, 8)]);
        assert!(excerpt_ranges(0, 10, 20).is_empty());
    }
}
