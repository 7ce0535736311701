use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Probe description as supplied by the user: a list of channel groups, each
/// with its channel ids and explicit neighbor pairs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub channel_groups: Vec<ChannelGroupSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelGroupSpec {
    pub channels: Vec<usize>,
    #[serde(default)]
    pub graph: Vec<(usize, usize)>,
}

/// Validated channel group: ordered channel list plus a symmetric adjacency
/// relation. Built once at setup; immutable for the duration of a run.
#[derive(Clone, Debug)]
pub struct ChannelGroup {
    id: usize,
    channels: Vec<usize>,
    col_of: HashMap<usize, usize>,
    neighbors: HashMap<usize, Vec<usize>>,
}

impl ChannelGroup {
    pub fn from_spec(id: usize, spec: &ChannelGroupSpec) -> Result<Self, ConfigError> {
        if spec.channels.is_empty() {
            return Err(ConfigError::EmptyGroup { group: id });
        }
        let mut col_of = HashMap::with_capacity(spec.channels.len());
        for (col, &channel) in spec.channels.iter().enumerate() {
            if col_of.insert(channel, col).is_some() {
                return Err(ConfigError::DuplicateChannel { group: id, channel });
            }
        }
        let mut sets: HashMap<usize, HashSet<usize>> = HashMap::new();
        for &(a, b) in &spec.graph {
            for channel in [a, b] {
                if !col_of.contains_key(&channel) {
                    return Err(ConfigError::UnknownChannel { group: id, channel });
                }
            }
            if a == b {
                continue;
            }
            sets.entry(a).or_default().insert(b);
            sets.entry(b).or_default().insert(a);
        }
        let neighbors = sets
            .into_iter()
            .map(|(channel, set)| {
                let mut list: Vec<usize> = set.into_iter().collect();
                list.sort_unstable();
                (channel, list)
            })
            .collect();
        Ok(Self {
            id,
            channels: spec.channels.clone(),
            col_of,
            neighbors,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Channel ids in grid column order.
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Grid column of a channel id, if it belongs to this group.
    pub fn column(&self, channel: usize) -> Option<usize> {
        self.col_of.get(&channel).copied()
    }

    pub fn neighbors(&self, channel: usize) -> &[usize] {
        self.neighbors
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn are_neighbors(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }
}

/// All channel groups of a probe. Groups are fully independent: each has its
/// own adjacency graph and components never span two groups.
#[derive(Clone, Debug)]
pub struct Probe {
    groups: Vec<ChannelGroup>,
}

impl Probe {
    pub fn from_spec(spec: &ProbeSpec) -> Result<Self, ConfigError> {
        if spec.channel_groups.is_empty() {
            return Err(ConfigError::EmptyProbe);
        }
        let groups = spec
            .channel_groups
            .iter()
            .enumerate()
            .map(|(id, group)| ChannelGroup::from_spec(id, group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let spec: ProbeSpec =
            serde_json::from_str(json).map_err(|e| ConfigError::Probe(e.to_string()))?;
        Self::from_spec(&spec)
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    /// Every channel id of every group, in group then column order.
    pub fn all_channels(&self) -> Vec<usize> {
        self.groups
            .iter()
            .flat_map(|g| g.channels().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_spec(n: usize) -> ChannelGroupSpec {
        ChannelGroupSpec {
            channels: (0..n).collect(),
            graph: (0..n - 1).map(|i| (i, i + 1)).collect(),
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        let group = ChannelGroup::from_spec(0, &linear_spec(4)).unwrap();
        for a in 0..4 {
            for b in 0..4 {
                assert_eq!(group.are_neighbors(a, b), group.are_neighbors(b, a));
            }
        }
        assert_eq!(group.neighbors(1), &[0, 2]);
        assert_eq!(group.neighbors(3), &[2]);
    }

    #[test]
    fn unknown_channel_in_edge_is_rejected() {
        let spec = ChannelGroupSpec {
            channels: vec![0, 1],
            graph: vec![(0, 7)],
        };
        assert!(matches!(
            ChannelGroup::from_spec(0, &spec),
            Err(ConfigError::UnknownChannel {
                group: 0,
                channel: 7
            })
        ));
    }

    #[test]
    fn isolated_channels_are_valid() {
        let spec = ChannelGroupSpec {
            channels: vec![3, 8],
            graph: vec![],
        };
        let group = ChannelGroup::from_spec(0, &spec).unwrap();
        assert!(group.neighbors(3).is_empty());
        assert_eq!(group.column(8), Some(1));
    }

    #[test]
    fn probe_parses_from_json() {
        let probe = Probe::from_json(
            r#"{"channel_groups": [
                {"channels": [0, 1, 2], "graph": [[0, 1], [1, 2]]},
                {"channels": [10, 11], "graph": [[10, 11]]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(probe.groups().len(), 2);
        assert!(probe.groups()[1].are_neighbors(10, 11));
        assert_eq!(probe.all_channels(), vec![0, 1, 2, 10, 11]);
    }

    #[test]
    fn probe_without_groups_is_rejected() {
        assert!(matches!(
            Probe::from_json(r#"{"channel_groups": []}"#),
            Err(ConfigError::EmptyProbe)
        ));
    }

    #[test]
    fn malformed_probe_json_is_a_config_error() {
        assert!(matches!(
            Probe::from_json("{\"channel_groups\": 3}"),
            Err(ConfigError::Probe(_))
        ));
    }
}
