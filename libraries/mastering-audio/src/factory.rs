//! Stage construction
//!
//! [`EffectStageFactory`] builds each stage against a processing context, and whole
//! chains from a settings snapshot. Live and offline rendering use the same factory,
//! so an export always runs exactly the stages playback does.

use crate::context::{AudioParam, ProcessingContext};
use crate::effects::{
    AudioEffect, BitcrusherProcessor, Compressor, ConvolutionReverb, EffectChain, EqStage, GainStage,
};
use crate::error::{AudioError, Result};
use crate::graph::{self, StageKind};
use crate::impulse::ImpulseResponseSynthesizer;
use mastering_core::{BitcrusherSettings, EqBand, MasteringSettings};
use tracing::debug;

/// Shared parameters that live stages read every block
///
/// Cloning shares the underlying atomics.
#[derive(Debug, Clone)]
pub struct ChainParams {
    eq: [AudioParam; 5],
    volume: AudioParam,
}

impl ChainParams {
    /// Parameters initialised from a settings snapshot
    pub fn from_settings(settings: &MasteringSettings) -> Self {
        Self {
            eq: EqBand::ALL.map(|band| AudioParam::new(settings.eq.gain_db(band) as f32)),
            volume: AudioParam::new(settings.volume.gain() as f32),
        }
    }

    /// Gain parameter of one band (dB)
    pub fn eq_gain(&self, band: EqBand) -> &AudioParam {
        &self.eq[band.index()]
    }

    /// Master volume parameter (linear)
    pub fn volume(&self) -> &AudioParam {
        &self.volume
    }

    /// Write every value from a settings snapshot
    pub fn sync(&self, settings: &MasteringSettings) {
        for band in EqBand::ALL {
            self.eq_gain(band).set(settings.eq.gain_db(band) as f32);
        }
        self.volume.set(settings.volume.gain() as f32);
    }
}

/// Builds stages and chains against a processing context
#[derive(Debug, Clone, Default)]
pub struct EffectStageFactory {
    synthesizer: ImpulseResponseSynthesizer,
}

impl EffectStageFactory {
    /// Factory with the default three-second reverb
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with a custom impulse response synthesizer
    pub fn with_synthesizer(synthesizer: ImpulseResponseSynthesizer) -> Self {
        Self { synthesizer }
    }

    /// One EQ band bound to its gain parameter
    pub fn eq_band(&self, ctx: &ProcessingContext, band: EqBand, gain: &AudioParam) -> EqStage {
        EqStage::new(band, gain.clone(), ctx.sample_rate(), usize::from(ctx.channels()))
    }

    /// The fixed-setting compressor
    pub fn compressor(&self, ctx: &ProcessingContext) -> Compressor {
        Compressor::mastering(ctx.sample_rate())
    }

    /// Convolution reverb with a freshly synthesized impulse response
    ///
    /// # Errors
    /// Fails with `StageConstruction` if the context is closed
    pub fn reverb(&self, ctx: &ProcessingContext) -> Result<ConvolutionReverb> {
        ensure_open(ctx, StageKind::Reverb)?;
        let ir = self.synthesizer.synthesize(ctx.sample_rate());
        ConvolutionReverb::new(&ir, usize::from(ctx.channels()), ctx.max_block(), true)
    }

    /// Bitcrusher with fresh state
    ///
    /// # Errors
    /// Fails with `StageConstruction` if the context is closed
    pub fn bitcrusher(&self, ctx: &ProcessingContext, settings: BitcrusherSettings) -> Result<BitcrusherProcessor> {
        ensure_open(ctx, StageKind::Bitcrusher)?;
        Ok(BitcrusherProcessor::new(settings))
    }

    /// Master gain bound to the volume parameter
    pub fn gain(&self, _ctx: &ProcessingContext, volume: &AudioParam) -> GainStage {
        GainStage::new(volume.clone())
    }

    /// Build one stage of a chain
    ///
    /// # Errors
    /// Fails with `StageConstruction` if the stage cannot be built against `ctx`
    pub fn stage(
        &self,
        ctx: &ProcessingContext,
        kind: StageKind,
        settings: &MasteringSettings,
        params: &ChainParams,
    ) -> Result<Box<dyn AudioEffect>> {
        Ok(match kind {
            StageKind::Eq(band) => Box::new(self.eq_band(ctx, band, params.eq_gain(band))),
            StageKind::Compressor => Box::new(self.compressor(ctx)),
            StageKind::Reverb => Box::new(self.reverb(ctx)?),
            StageKind::Bitcrusher => Box::new(self.bitcrusher(ctx, settings.bitcrusher)?),
            StageKind::Gain => Box::new(self.gain(ctx, params.volume())),
        })
    }

    /// Build the full ordered chain for a settings snapshot
    ///
    /// Either every stage is built or nothing is returned.
    ///
    /// # Errors
    /// Fails with the first stage construction error
    pub fn build_chain(
        &self,
        ctx: &ProcessingContext,
        settings: &MasteringSettings,
        params: &ChainParams,
    ) -> Result<EffectChain> {
        let mut chain = EffectChain::new();
        for kind in graph::describe_chain(&settings.effects) {
            chain.push(kind, self.stage(ctx, kind, settings, params)?);
        }

        debug!(
            route = %graph::format_route(&chain.topology()),
            sample_rate = ctx.sample_rate(),
            channels = ctx.channels(),
            "Built effect chain"
        );
        Ok(chain)
    }
}

fn ensure_open(ctx: &ProcessingContext, kind: StageKind) -> Result<()> {
    ctx.ensure_open()
        .map_err(|_| AudioError::stage(kind.name(), "processing context is closed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastering_core::{DecodedAudio, Effect, EffectsEnabled, SampleRate};

    fn small_factory() -> EffectStageFactory {
        EffectStageFactory::with_synthesizer(ImpulseResponseSynthesizer::new().with_seconds(1))
    }

    #[test]
    fn chain_follows_settings_order() {
        let ctx = ProcessingContext::offline(2, 100, 8_000);
        let settings = MasteringSettings {
            effects: EffectsEnabled {
                compressor: true,
                reverb: true,
                bitcrusher: true,
            },
            ..MasteringSettings::default()
        };
        let chain = small_factory()
            .build_chain(&ctx, &settings, &ChainParams::from_settings(&settings))
            .unwrap();

        assert_eq!(chain.topology(), graph::describe_chain(&settings.effects));
        assert_eq!(chain.len(), 9);
    }

    #[test]
    fn closed_context_rejects_reverb_and_bitcrusher() {
        let ctx = ProcessingContext::realtime(8_000);
        ctx.close();
        let factory = small_factory();

        let reverb = factory.reverb(&ctx);
        assert!(matches!(reverb, Err(AudioError::StageConstruction { stage: "reverb", .. })));

        let crusher = factory.bitcrusher(&ctx, BitcrusherSettings::default());
        assert!(matches!(crusher, Err(AudioError::StageConstruction { stage: "bitcrusher", .. })));

        // Stateless stages still build
        let _ = factory.compressor(&ctx);
    }

    #[test]
    fn closed_context_fails_whole_chain() {
        let ctx = ProcessingContext::offline(2, 100, 8_000);
        ctx.close();
        let mut settings = MasteringSettings::default();
        settings.effects.set_enabled(Effect::Bitcrusher, true);

        let result = small_factory().build_chain(&ctx, &settings, &ChainParams::from_settings(&settings));
        assert!(result.unwrap_err().is_stage_construction());
    }

    #[test]
    fn params_drive_built_stages() {
        let ctx = ProcessingContext::offline(1, 4, 8_000);
        let settings = MasteringSettings::default();
        let params = ChainParams::from_settings(&settings);
        let mut chain = small_factory().build_chain(&ctx, &settings, &params).unwrap();

        params.volume().set(0.5);
        let audio = DecodedAudio::new(vec![vec![0.5, 0.5, 0.5, 0.5]], SampleRate::new(8_000)).unwrap();
        let mut buffer = vec![0.0; 4];
        audio.write_interleaved(0, &mut buffer, 1);
        chain.process(&mut buffer, 1);

        assert_eq!(buffer, vec![0.25; 4]);
    }

    #[test]
    fn sync_updates_every_param() {
        let params = ChainParams::from_settings(&MasteringSettings::default());
        let mut settings = MasteringSettings::default();
        settings.eq.set_gain_db(EqBand::HighMid, -4.0);
        settings.volume = mastering_core::VolumeLevel::new(1.5);

        params.sync(&settings);

        assert_eq!(params.eq_gain(EqBand::HighMid).get(), -4.0);
        assert_eq!(params.volume().get(), 1.5);
    }
}
