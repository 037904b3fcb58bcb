/// Master gain stage
use super::chain::AudioEffect;
use crate::context::AudioParam;

/// Multiplies every sample by the shared volume parameter
pub struct GainStage {
    gain: AudioParam,
}

impl GainStage {
    /// Create a gain stage bound to a volume parameter
    pub fn new(gain: AudioParam) -> Self {
        Self { gain }
    }

    /// Gain that will be applied to the next block
    pub fn gain(&self) -> f32 {
        self.gain.get()
    }
}

impl AudioEffect for GainStage {
    fn process(&mut self, buffer: &mut [f32], _channels: usize) {
        let gain = self.gain.get();
        if gain == 1.0 {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Gain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_shared_volume() {
        let volume = AudioParam::new(1.0);
        let mut stage = GainStage::new(volume.clone());

        let mut buffer = vec![0.5; 4];
        stage.process(&mut buffer, 2);
        assert_eq!(buffer, vec![0.5; 4]);

        volume.set(2.0);
        stage.process(&mut buffer, 2);
        assert_eq!(buffer, vec![1.0; 4]);
        assert_eq!(stage.gain(), 2.0);
    }
}
