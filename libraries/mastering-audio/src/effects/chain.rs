/// Effect chain for processing audio
///
/// A chain is an ordered list of stages built against one processing context. Each
/// stage processes interleaved f32 samples in place; the chain feeds them through in
/// order, exactly like wiring source -> stage -> ... -> destination.
use crate::graph::{self, GraphNode, StageKind};

/// Trait for audio stages that can be chained together
///
/// # Safety
/// - Must NOT allocate memory in `process()` (real-time constraint)
/// - Must be Send so the chain can move to the render thread
pub trait AudioEffect: Send {
    /// Process an interleaved buffer in place
    ///
    /// # Arguments
    /// * `buffer` - Interleaved samples, `channels` per frame
    /// * `channels` - Number of channels in the buffer
    ///
    /// The sample rate is fixed when the stage is built against its context.
    fn process(&mut self, buffer: &mut [f32], channels: usize);

    /// Reset stage state (filter history, envelopes, hold values)
    fn reset(&mut self);

    /// Get stage name (for debugging)
    fn name(&self) -> &str;
}

struct ChainStage {
    kind: StageKind,
    effect: Box<dyn AudioEffect>,
}

/// Ordered chain of stages
pub struct EffectChain {
    stages: Vec<ChainStage>,
    connected: bool,
}

impl EffectChain {
    /// Create a new empty, connected chain
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            connected: true,
        }
    }

    /// Append a stage to the end of the chain
    pub fn push(&mut self, kind: StageKind, effect: Box<dyn AudioEffect>) {
        self.stages.push(ChainStage { kind, effect });
    }

    /// Process audio through every stage in order
    ///
    /// A disconnected chain no longer routes anything to the destination and
    /// outputs silence.
    ///
    /// # Real-Time Safety
    /// - No allocations after setup
    pub fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if !self.connected {
            buffer.fill(0.0);
            return;
        }

        for stage in &mut self.stages {
            stage.effect.process(buffer, channels);
        }
    }

    /// Disconnect every stage
    ///
    /// Returns the number of stages that were disconnected; disconnecting an already
    /// disconnected chain is a no-op that returns 0.
    pub fn disconnect_all(&mut self) -> usize {
        if !self.connected {
            return 0;
        }
        self.connected = false;
        self.stages.len()
    }

    /// Check if the chain still routes to the destination
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Reset all stages in the chain
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.effect.reset();
        }
    }

    /// Stage kinds in processing order
    pub fn topology(&self) -> Vec<StageKind> {
        self.stages.iter().map(|stage| stage.kind).collect()
    }

    /// Connection list from the source through every stage to the destination
    pub fn connections(&self) -> Vec<(GraphNode, GraphNode)> {
        if !self.connected {
            return Vec::new();
        }
        graph::connections(&self.topology())
    }

    /// Get number of stages in chain
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if chain is empty
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Get stage at index
    pub fn get_effect(&self, index: usize) -> Option<&dyn AudioEffect> {
        self.stages.get(index).map(|stage| stage.effect.as_ref())
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectChain")
            .field("stages", &self.topology())
            .field("connected", &self.connected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastering_core::EqBand;

    // Mock stage for testing
    struct Scale {
        gain: f32,
    }

    impl AudioEffect for Scale {
        fn process(&mut self, buffer: &mut [f32], _channels: usize) {
            for sample in buffer.iter_mut() {
                *sample *= self.gain;
            }
        }

        fn reset(&mut self) {}

        fn name(&self) -> &str {
            "Scale"
        }
    }

    #[test]
    fn empty_chain() {
        let chain = EffectChain::new();
        assert_eq!(chain.len(), 0);
        assert!(chain.is_empty());
        assert!(chain.is_connected());
    }

    #[test]
    fn process_chain_in_order() {
        let mut chain = EffectChain::new();
        chain.push(StageKind::Eq(EqBand::Bass), Box::new(Scale { gain: 0.5 }));
        chain.push(StageKind::Gain, Box::new(Scale { gain: 2.0 }));

        let mut buffer = vec![1.0; 100];
        chain.process(&mut buffer, 2);

        for sample in &buffer {
            assert!((sample - 1.0).abs() < 0.0001);
        }
        assert_eq!(chain.topology(), vec![StageKind::Eq(EqBand::Bass), StageKind::Gain]);
    }

    #[test]
    fn disconnected_chain_is_silent() {
        let mut chain = EffectChain::new();
        chain.push(StageKind::Gain, Box::new(Scale { gain: 1.0 }));

        assert_eq!(chain.disconnect_all(), 1);
        assert_eq!(chain.disconnect_all(), 0);
        assert!(chain.connections().is_empty());

        let mut buffer = vec![0.7; 8];
        chain.process(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn connections_span_source_to_destination() {
        let mut chain = EffectChain::new();
        chain.push(StageKind::Gain, Box::new(Scale { gain: 1.0 }));

        let links = chain.connections();
        assert_eq!(
            links,
            vec![
                (GraphNode::Source, GraphNode::Stage(StageKind::Gain)),
                (GraphNode::Stage(StageKind::Gain), GraphNode::Destination),
            ]
        );
    }

    #[test]
    fn get_effect() {
        let mut chain = EffectChain::new();
        chain.push(StageKind::Gain, Box::new(Scale { gain: 0.5 }));

        assert_eq!(chain.get_effect(0).map(|e| e.name().to_string()), Some("Scale".to_string()));
        assert!(chain.get_effect(1).is_none());
    }
}
