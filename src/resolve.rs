use log::debug;
use ndarray::Array2;

use crate::config::{EdgePolicy, Polarity, RunConfig};
use crate::detect::{Cell, Component};
use crate::error::DetectError;
use crate::probe::ChannelGroup;
use crate::source::ChunkSource;
use crate::threshold::Thresholds;

/// One resolved spike, ready for the sink. Ownership passes downstream on
/// emission; the detector keeps no state about it.
#[derive(Clone, Debug)]
pub struct SpikeEvent {
    pub channel_group: usize,
    /// Anchor sample time (integer part).
    pub time: usize,
    /// Sub-sample offset past `time`, in `[0, 1)`.
    pub frac: f32,
    /// Per-channel confidence weights in `[0, 1]`, aligned with the group's
    /// channel order. Channels the component never touched are exactly 0.
    pub masks: Vec<f32>,
    /// Member cells of the finalized component.
    pub cells: Vec<Cell>,
    /// Extracted waveform, window x group channels.
    pub waveform: Array2<f32>,
}

impl SpikeEvent {
    /// Anchor rounded to the nearest whole sample.
    pub fn rounded_time(&self) -> usize {
        if self.frac >= 0.5 {
            self.time + 1
        } else {
            self.time
        }
    }
}

/// Signed sample value mapped to detection amplitude for the polarity.
fn amplitude(polarity: Polarity, value: f32) -> f32 {
    match polarity {
        Polarity::Positive => value,
        Polarity::Negative => -value,
        Polarity::Both => value.abs(),
    }
}

/// Reduce one finalized component to a spike event.
///
/// Never fails on component shape: degenerate extrema (single sample, flat
/// neighborhood, recording edge) resolve with a sub-sample fraction of 0.
pub fn resolve_spike<S: ChunkSource>(
    component: Component,
    group: &ChannelGroup,
    thresholds: &Thresholds,
    config: &RunConfig,
    source: &mut S,
) -> Result<SpikeEvent, DetectError> {
    let polarity = config.detect_polarity;

    // Peak: the member cell with the largest amplitude; earliest time, then
    // lowest channel, wins ties (cells are sorted that way).
    let peak = component
        .cells()
        .iter()
        .fold(None::<&Cell>, |best, cell| match best {
            Some(b) if amplitude(polarity, b.value) >= amplitude(polarity, cell.value) => Some(b),
            _ => Some(cell),
        })
        .copied()
        .ok_or_else(|| DetectError::data_source("component with no cells"))?;

    let (time, frac) = refine_anchor(&peak, group, polarity, source)?;

    // Per-channel mask: linear interpolation of the channel's extremum
    // between the two thresholds.
    let mut masks = vec![0.0_f32; group.len()];
    for cell in component.cells() {
        if let Some(col) = group.column(cell.channel) {
            let m = amplitude(polarity, cell.value);
            masks[col] = masks[col].max(mask_value(m, thresholds));
        }
    }

    let waveform = extract_waveform(time, group, config, source)?;

    Ok(SpikeEvent {
        channel_group: group.id(),
        time,
        frac,
        masks,
        cells: component.cells().to_vec(),
        waveform,
    })
}

fn mask_value(m: f32, thresholds: &Thresholds) -> f32 {
    if m <= thresholds.weak {
        0.0
    } else if m >= thresholds.strong {
        1.0
    } else {
        // strong > weak here, so the denominator is positive.
        (m - thresholds.weak) / (thresholds.strong - thresholds.weak)
    }
}

/// Sub-sample anchor from the filtered trace around the peak cell: the zero
/// crossing of the linearly interpolated slope between the two samples
/// straddling the extremum. Falls back to a fraction of 0 whenever the
/// neighborhood is unavailable or flat.
fn refine_anchor<S: ChunkSource>(
    peak: &Cell,
    group: &ChannelGroup,
    polarity: Polarity,
    source: &mut S,
) -> Result<(usize, f32), DetectError> {
    let n = source.n_samples();
    if peak.time == 0 || peak.time + 1 >= n {
        debug!("anchor at recording edge (t={}), fraction 0", peak.time);
        return Ok((peak.time, 0.0));
    }
    let trace = source.fetch(&[peak.channel], peak.time - 1, peak.time + 2, 0)?;
    let a = amplitude(polarity, trace.value(peak.time - 1, 0));
    let b = amplitude(polarity, trace.value(peak.time, 0));
    let c = amplitude(polarity, trace.value(peak.time + 1, 0));
    let slope_left = b - a;
    let slope_right = c - b;
    let denom = slope_left - slope_right;
    if denom <= f32::EPSILON {
        debug!("flat extremum at t={}, fraction 0", peak.time);
        return Ok((peak.time, 0.0));
    }
    let offset = (slope_left / denom - 0.5).clamp(-0.5, 0.499_999);
    if offset < 0.0 {
        Ok((peak.time - 1, 1.0 + offset))
    } else {
        Ok((peak.time, offset))
    }
}

fn extract_waveform<S: ChunkSource>(
    anchor: usize,
    group: &ChannelGroup,
    config: &RunConfig,
    source: &mut S,
) -> Result<Array2<f32>, DetectError> {
    let n = source.n_samples();
    let want_lo = anchor as i64 - config.waveform_before as i64;
    let want_hi = anchor as i64 + config.waveform_after as i64;
    let avail_lo = want_lo.clamp(0, n as i64) as usize;
    let avail_hi = want_hi.clamp(0, n as i64) as usize;
    let fetched = source.fetch(group.channels(), avail_lo, avail_hi, 0)?;
    match config.edge_policy {
        EdgePolicy::Clip => Ok(fetched.samples),
        EdgePolicy::ZeroPad => {
            let window = config.waveform_before + config.waveform_after;
            let mut out = Array2::zeros((window, group.len()));
            let offset = (fetched.data_start as i64 - want_lo) as usize;
            for (row, fetched_row) in fetched.samples.rows().into_iter().enumerate() {
                for (col, &v) in fetched_row.iter().enumerate() {
                    out[[offset + row, col]] = v;
                }
            }
            Ok(out)
        }
    }
}
