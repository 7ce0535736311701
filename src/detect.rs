use std::collections::BTreeMap;

use crate::config::Polarity;
use crate::probe::ChannelGroup;
use crate::source::FilteredChunk;
use crate::threshold::Thresholds;

/// One weak-threshold-crossing sample, in absolute coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub time: usize,
    pub channel: usize,
    pub value: f32,
}

/// A maximal connected set of weak-crossing cells under temporal adjacency
/// (consecutive samples on one channel) and spatial adjacency (probe graph
/// neighbors within one sample). Only components seeded by at least one
/// strong-crossing cell survive detection.
#[derive(Clone, Debug)]
pub struct Component {
    cells: Vec<Cell>,
    min_time: usize,
    max_time: usize,
}

impl Component {
    pub(crate) fn from_cells(mut cells: Vec<Cell>) -> Self {
        debug_assert!(!cells.is_empty());
        cells.sort_unstable_by_key(|c| (c.time, c.channel));
        let min_time = cells.first().map(|c| c.time).unwrap_or(0);
        let max_time = cells.last().map(|c| c.time).unwrap_or(0);
        Self {
            cells,
            min_time,
            max_time,
        }
    }

    /// Member cells, sorted by (time, channel).
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn min_time(&self) -> usize {
        self.min_time
    }

    pub fn max_time(&self) -> usize {
        self.max_time
    }

    /// True if the two components contain adjacent (or shared) cells under
    /// the group's spatio-temporal relation, evaluated in absolute
    /// coordinates.
    pub fn is_adjacent_to(&self, other: &Component, group: &ChannelGroup) -> bool {
        // Time ranges further than one sample apart can never touch.
        if self.min_time > other.max_time + 1 || other.min_time > self.max_time + 1 {
            return false;
        }
        let (small, large) = if self.cells.len() <= other.cells.len() {
            (self, other)
        } else {
            (other, self)
        };
        let occupied: std::collections::HashSet<(usize, usize)> =
            large.cells.iter().map(|c| (c.time, c.channel)).collect();
        for cell in &small.cells {
            let t_lo = cell.time.saturating_sub(1);
            for t in t_lo..=cell.time + 1 {
                if occupied.contains(&(t, cell.channel)) {
                    return true;
                }
                for &nb in group.neighbors(cell.channel) {
                    if occupied.contains(&(t, nb)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Union of member cells; shared cells are kept once (their values are
    /// identical because the chunk source is deterministic).
    pub fn merge(self, other: Component) -> Component {
        let mut merged: BTreeMap<(usize, usize), Cell> = BTreeMap::new();
        for cell in self.cells.into_iter().chain(other.cells) {
            merged.insert((cell.time, cell.channel), cell);
        }
        Component::from_cells(merged.into_values().collect())
    }
}

fn crosses(polarity: Polarity, value: f32, threshold: f32) -> bool {
    match polarity {
        Polarity::Positive => value > threshold,
        Polarity::Negative => value < -threshold,
        Polarity::Both => value.abs() > threshold,
    }
}

/// Find all strong-seeded connected components of weak-threshold crossings
/// in one chunk.
///
/// Components keep their full shape even when they extend into the margins,
/// so the reconciler can merge across chunk boundaries; components that never
/// reach the core range `[core_start, core_end)` belong to a neighboring
/// chunk and are dropped here.
pub fn detect_components(
    chunk: &FilteredChunk,
    group: &ChannelGroup,
    thresholds: &Thresholds,
    polarity: Polarity,
) -> Vec<Component> {
    let ntimes = chunk.samples.nrows();
    let ncols = chunk.samples.ncols();
    if ntimes == 0 || ncols == 0 {
        return Vec::new();
    }
    debug_assert_eq!(ncols, group.len());

    // Column neighbors under the probe graph, resolved once per chunk.
    let neighbor_cols: Vec<Vec<usize>> = group
        .channels()
        .iter()
        .map(|&ch| {
            group
                .neighbors(ch)
                .iter()
                .filter_map(|&nb| group.column(nb))
                .collect()
        })
        .collect();

    let idx = |t: usize, c: usize| t * ncols + c;
    let mut weak = vec![false; ntimes * ncols];
    for t in 0..ntimes {
        for c in 0..ncols {
            weak[idx(t, c)] = crosses(polarity, chunk.samples[[t, c]], thresholds.weak);
        }
    }

    let mut visited = vec![false; ntimes * ncols];
    let mut components = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for t0 in 0..ntimes {
        for c0 in 0..ncols {
            if !weak[idx(t0, c0)] || visited[idx(t0, c0)] {
                continue;
            }
            // Flood fill one component.
            let mut cells = Vec::new();
            let mut has_strong = false;
            visited[idx(t0, c0)] = true;
            stack.push((t0, c0));
            while let Some((t, c)) = stack.pop() {
                let value = chunk.samples[[t, c]];
                has_strong |= crosses(polarity, value, thresholds.strong);
                cells.push(Cell {
                    time: chunk.data_start + t,
                    channel: group.channels()[c],
                    value,
                });
                let t_lo = t.saturating_sub(1);
                let t_hi = (t + 1).min(ntimes - 1);
                for tn in t_lo..=t_hi {
                    let mut visit = |cn: usize| {
                        if weak[idx(tn, cn)] && !visited[idx(tn, cn)] {
                            visited[idx(tn, cn)] = true;
                            stack.push((tn, cn));
                        }
                    };
                    visit(c);
                    for &cn in &neighbor_cols[c] {
                        visit(cn);
                    }
                }
            }
            if !has_strong {
                continue;
            }
            let component = Component::from_cells(cells);
            // Margin-only components belong to the neighboring chunk.
            if component.max_time() >= chunk.core_start && component.min_time() < chunk.core_end {
                components.push(component);
            }
        }
    }
    components.sort_by_key(Component::min_time);
    components
}
