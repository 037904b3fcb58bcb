//! Chain topology
//!
//! The chain is always derived from settings as an explicit list of stage descriptors:
//! five EQ bands, then whichever of compressor, reverb and bitcrusher are enabled, then
//! the master gain. Disabled effects are left out entirely and their neighbours are
//! wired straight to each other.

use mastering_core::{Effect, EffectsEnabled, EqBand};
use std::fmt;

/// One stage in the processing chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// One of the five equalizer bands
    Eq(EqBand),
    /// Fixed-setting dynamics compressor
    Compressor,
    /// Convolution reverb with a synthetic impulse response
    Reverb,
    /// Quantizer plus sample-and-hold
    Bitcrusher,
    /// Master volume, always last
    Gain,
}

impl StageKind {
    /// Short machine-friendly name, used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Eq(EqBand::Bass) => "eq-bass",
            StageKind::Eq(EqBand::LowMid) => "eq-low-mid",
            StageKind::Eq(EqBand::Mid) => "eq-mid",
            StageKind::Eq(EqBand::HighMid) => "eq-high-mid",
            StageKind::Eq(EqBand::Treble) => "eq-treble",
            StageKind::Compressor => "compressor",
            StageKind::Reverb => "reverb",
            StageKind::Bitcrusher => "bitcrusher",
            StageKind::Gain => "gain",
        }
    }

    /// The switchable effect this stage implements, if any
    pub fn effect(self) -> Option<Effect> {
        match self {
            StageKind::Compressor => Some(Effect::Compressor),
            StageKind::Reverb => Some(Effect::Reverb),
            StageKind::Bitcrusher => Some(Effect::Bitcrusher),
            StageKind::Eq(_) | StageKind::Gain => None,
        }
    }
}

impl From<Effect> for StageKind {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Compressor => StageKind::Compressor,
            Effect::Reverb => StageKind::Reverb,
            Effect::Bitcrusher => StageKind::Bitcrusher,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Endpoint of a connection in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    /// The decoded buffer being played or rendered
    Source,
    /// A processing stage
    Stage(StageKind),
    /// The context output
    Destination,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Source => f.write_str("source"),
            GraphNode::Stage(kind) => kind.fmt(f),
            GraphNode::Destination => f.write_str("destination"),
        }
    }
}

/// Ordered stage list for a set of enabled effects
///
/// The order never depends on which flags are set or in what order they were toggled.
pub fn describe_chain(effects: &EffectsEnabled) -> Vec<StageKind> {
    let mut stages: Vec<StageKind> = EqBand::ALL.iter().copied().map(StageKind::Eq).collect();
    stages.extend(
        Effect::ALL
            .iter()
            .copied()
            .filter(|&effect| effects.is_enabled(effect))
            .map(StageKind::from),
    );
    stages.push(StageKind::Gain);
    stages
}

/// Pairwise connections `source -> stage... -> destination` for a stage list
pub fn connections(stages: &[StageKind]) -> Vec<(GraphNode, GraphNode)> {
    let nodes: Vec<GraphNode> = std::iter::once(GraphNode::Source)
        .chain(stages.iter().copied().map(GraphNode::Stage))
        .chain(std::iter::once(GraphNode::Destination))
        .collect();

    nodes.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Render a stage list as `source -> eq-bass -> ... -> destination`
pub fn format_route(stages: &[StageKind]) -> String {
    let mut route = String::from("source");
    for stage in stages {
        route.push_str(" -> ");
        route.push_str(stage.name());
    }
    route.push_str(" -> destination");
    route
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_chain_is_eq_then_gain() {
        let stages = describe_chain(&EffectsEnabled::default());
        assert_eq!(stages.len(), 6);
        assert_eq!(stages[0], StageKind::Eq(EqBand::Bass));
        assert_eq!(stages[4], StageKind::Eq(EqBand::Treble));
        assert_eq!(stages[5], StageKind::Gain);
    }

    #[test]
    fn full_chain_order() {
        let effects = EffectsEnabled {
            compressor: true,
            reverb: true,
            bitcrusher: true,
        };
        assert_eq!(
            format_route(&describe_chain(&effects)),
            "source -> eq-bass -> eq-low-mid -> eq-mid -> eq-high-mid -> eq-treble \
             -> compressor -> reverb -> bitcrusher -> gain -> destination"
        );
    }

    #[test]
    fn disabled_stage_is_bridged() {
        let effects = EffectsEnabled {
            compressor: true,
            reverb: false,
            bitcrusher: true,
        };
        let links = connections(&describe_chain(&effects));

        assert!(links.contains(&(
            GraphNode::Stage(StageKind::Compressor),
            GraphNode::Stage(StageKind::Bitcrusher)
        )));
        assert_eq!(links.first(), Some(&(GraphNode::Source, GraphNode::Stage(StageKind::Eq(EqBand::Bass)))));
        assert_eq!(links.last(), Some(&(GraphNode::Stage(StageKind::Gain), GraphNode::Destination)));
    }

    #[test]
    fn stage_effect_mapping() {
        for effect in Effect::ALL {
            assert_eq!(StageKind::from(effect).effect(), Some(effect));
        }
        assert_eq!(StageKind::Gain.effect(), None);
    }
}
