use log::debug;

use crate::detect::Component;
use crate::probe::ChannelGroup;

/// Carry-over state between consecutive chunks of one channel group.
///
/// Components that touch a chunk's trailing margin may continue into the next
/// chunk; they are held here until the next chunk's leading edge has been
/// compared against them. Exclusively owned by the in-order chunk loop of one
/// group — chunks must be absorbed in recording order.
#[derive(Debug, Default)]
pub struct Reconciler {
    held: Vec<Component>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.held.len()
    }

    /// Fold one chunk's components into the carried state and return every
    /// component that is now complete, ordered by minimal time index.
    ///
    /// `core_end` is the absorbed chunk's owned end; components reaching it
    /// (or beyond, into the trailing margin) are held for the next chunk.
    /// Held-over components not adjacent to anything new ended at the
    /// previous boundary and finalize now. Each physical spike comes out of
    /// exactly one `absorb`/`flush` call.
    pub fn absorb(
        &mut self,
        group: &ChannelGroup,
        core_end: usize,
        new: Vec<Component>,
    ) -> Vec<Component> {
        let n_held = self.held.len();
        let mut pool: Vec<Component> = self.held.drain(..).chain(new).collect();

        // Merge until no two components are adjacent. A new component can
        // bridge two held-over ones, so a single pass is not enough; the
        // pool at any one boundary is small.
        loop {
            let mut merged_at = None;
            'scan: for i in 0..pool.len() {
                for j in i + 1..pool.len() {
                    if pool[i].is_adjacent_to(&pool[j], group) {
                        merged_at = Some((i, j));
                        break 'scan;
                    }
                }
            }
            match merged_at {
                Some((i, j)) => {
                    let b = pool.swap_remove(j);
                    let a = pool.swap_remove(i);
                    pool.push(a.merge(b));
                }
                None => break,
            }
        }

        let mut finalized = Vec::new();
        for component in pool {
            if component.max_time() >= core_end {
                // A weak cell just past the boundary could still connect.
                self.held.push(component);
            } else {
                finalized.push(component);
            }
        }
        finalized.sort_by_key(Component::min_time);
        debug!(
            "group {}: absorbed chunk ending {}: {} held over ({} before), {} finalized",
            group.id(),
            core_end,
            self.held.len(),
            n_held,
            finalized.len()
        );
        finalized
    }

    /// End of recording: everything still held is complete by definition.
    pub fn flush(&mut self) -> Vec<Component> {
        let mut finalized: Vec<Component> = self.held.drain(..).collect();
        finalized.sort_by_key(Component::min_time);
        finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Cell, Component};
    use crate::probe::{ChannelGroup, ChannelGroupSpec};

    fn group() -> ChannelGroup {
        // Chain 0 - 1 - 2: channels 0 and 2 are not neighbors.
        ChannelGroup::from_spec(
            0,
            &ChannelGroupSpec {
                channels: vec![0, 1, 2],
                graph: vec![(0, 1), (1, 2)],
            },
        )
        .unwrap()
    }

    fn comp(channel: usize, times: &[usize]) -> Component {
        Component::from_cells(
            times
                .iter()
                .map(|&time| Cell {
                    time,
                    channel,
                    value: -2.5,
                })
                .collect(),
        )
    }

    #[test]
    fn component_inside_core_finalizes_immediately() {
        let g = group();
        let mut reconciler = Reconciler::new();
        let out = reconciler.absorb(&g, 10, vec![comp(0, &[3, 4])]);
        assert_eq!(out.len(), 1);
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn straddling_component_is_held_then_merged_once() {
        let g = group();
        let mut reconciler = Reconciler::new();
        // Chunk 0 owns [0, 5), sees the spike at 4..=6 in its trailing margin.
        let out = reconciler.absorb(&g, 5, vec![comp(0, &[4, 5, 6])]);
        assert!(out.is_empty());
        assert_eq!(reconciler.pending(), 1);
        // Chunk 1 owns [5, 10) and re-detects the same cells from its leading
        // margin onward.
        let out = reconciler.absorb(&g, 10, vec![comp(0, &[4, 5, 6])]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cells().len(), 3);
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn held_component_without_continuation_finalizes() {
        let g = group();
        let mut reconciler = Reconciler::new();
        reconciler.absorb(&g, 5, vec![comp(0, &[4, 5])]);
        // Next chunk has a distant component only.
        let out = reconciler.absorb(&g, 10, vec![comp(0, &[8])]);
        assert_eq!(out.len(), 2);
        // Ordered by minimal time index.
        assert!(out[0].min_time() <= out[1].min_time());
    }

    #[test]
    fn new_component_bridges_two_held_components() {
        let g = group();
        let mut reconciler = Reconciler::new();
        // Channels 0 and 2 are two edges apart, so these stay separate.
        reconciler.absorb(&g, 5, vec![comp(0, &[4, 5]), comp(2, &[4, 5])]);
        assert_eq!(reconciler.pending(), 2);
        // A continuation on the middle channel is adjacent to both.
        let bridge = Component::from_cells(vec![Cell {
            time: 6,
            channel: 1,
            value: -2.5,
        }]);
        let out = reconciler.absorb(&g, 10, vec![bridge]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cells().len(), 5);
        assert_eq!(reconciler.pending(), 0);
    }

    #[test]
    fn flush_finalizes_everything_left() {
        let g = group();
        let mut reconciler = Reconciler::new();
        reconciler.absorb(&g, 5, vec![comp(0, &[4, 5, 6])]);
        let out = reconciler.flush();
        assert_eq!(out.len(), 1);
        assert_eq!(reconciler.pending(), 0);
        assert!(reconciler.flush().is_empty());
    }
}
