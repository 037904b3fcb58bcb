//! Live effect graph
//!
//! [`AudioGraphManager`] owns the real-time context, the loaded source and the render
//! thread. Parameter-only changes (volume, EQ gains) are written straight into the
//! shared [`AudioParam`](crate::context::AudioParam)s the stages read; structural
//! changes (enabling an effect, changing bitcrusher settings) build a fresh chain and
//! swap it into the render thread.
//!
//! A rebuild either fully succeeds or leaves the previous chain and the previous
//! setting in place.

use crate::context::{ContextState, ProcessingContext, REALTIME_CHANNELS};
use crate::error::{AudioError, Result};
use crate::factory::{ChainParams, EffectStageFactory};
use crate::graph;
use crate::render::{LiveRenderer, RenderEvent, RenderHandle, BLOCK_QUEUE_DEPTH};
use crossbeam_channel::{bounded, Receiver};
use mastering_core::{
    BitcrusherSettings, BitcrusherUpdate, DecodedAudio, Effect, EqBand, MasteringSettings, SampleRate, VolumeLevel,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Where the graph is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// No source loaded
    Empty,
    /// Source loaded and chain connected, not playing
    Ready,
    /// Rendering blocks
    Playing,
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GraphState::Empty => "empty",
            GraphState::Ready => "ready",
            GraphState::Playing => "playing",
        })
    }
}

/// Snapshot for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStatus {
    pub context: ContextState,
    pub graph: GraphState,
    pub sample_rate: u32,
    pub channels: u16,
}

struct LiveGraph {
    ctx: ProcessingContext,
    source: DecodedAudio,
    renderer: RenderHandle,
}

/// Owns the live effect chain and routes setting changes into it
pub struct AudioGraphManager {
    settings: MasteringSettings,
    params: ChainParams,
    factory: EffectStageFactory,
    live: Option<LiveGraph>,
    playing: bool,
}

impl AudioGraphManager {
    /// Manager with default settings
    pub fn new() -> Self {
        Self::with_settings(MasteringSettings::default())
    }

    /// Manager starting from a settings snapshot
    pub fn with_settings(settings: MasteringSettings) -> Self {
        Self::with_factory(settings, EffectStageFactory::new())
    }

    /// Manager using a custom stage factory
    pub fn with_factory(settings: MasteringSettings, factory: EffectStageFactory) -> Self {
        let settings = settings.validated();
        Self {
            params: ChainParams::from_settings(&settings),
            settings,
            factory,
            live: None,
            playing: false,
        }
    }

    /// Load a new source, replacing whatever was loaded
    ///
    /// Tears down the previous context, creates a suspended real-time context at the
    /// source's sample rate, builds the chain and starts the render thread. Returns
    /// the receiving end of the rendered block stream (interleaved stereo).
    ///
    /// # Errors
    /// Fails if the chain cannot be built or the render thread cannot start; the
    /// manager is then empty.
    pub fn load_buffer(&mut self, source: DecodedAudio) -> Result<Receiver<Vec<f32>>> {
        self.teardown();

        let sample_rate = source.sample_rate().as_hz();
        let ctx = ProcessingContext::realtime(sample_rate);
        let chain = match self.factory.build_chain(&ctx, &self.settings, &self.params) {
            Ok(chain) => chain,
            Err(e) => {
                ctx.close();
                return Err(e);
            }
        };

        let (block_tx, block_rx) = bounded(BLOCK_QUEUE_DEPTH);
        let renderer = LiveRenderer::new(source.clone(), chain, &ctx);
        let handle = match RenderHandle::spawn(renderer, sample_rate, block_tx) {
            Ok(handle) => handle,
            Err(e) => {
                ctx.close();
                return Err(e);
            }
        };

        info!(
            channels = source.channel_count(),
            frames = source.frames(),
            sample_rate,
            "Loaded source"
        );

        self.live = Some(LiveGraph {
            ctx,
            source,
            renderer: handle,
        });
        Ok(block_rx)
    }

    /// Rebuild the chain from the current settings and swap it in
    ///
    /// A no-op when nothing is loaded. The render thread disconnects the previous
    /// chain once the new one is installed.
    ///
    /// # Errors
    /// Stage construction errors; the previous chain stays connected
    pub fn rebuild_chain(&mut self) -> Result<()> {
        let Some(live) = &self.live else {
            return Ok(());
        };

        let chain = self.factory.build_chain(&live.ctx, &self.settings, &self.params)?;
        debug!(route = %graph::format_route(&chain.topology()), "Rebuilt chain");
        live.renderer.swap_chain(chain)
    }

    /// Start or continue playback
    ///
    /// Resumes the context if it is suspended. After the source has played to its end,
    /// playback restarts from the beginning.
    ///
    /// # Errors
    /// `NoBufferLoaded` when empty, `ContextClosed` if the context was closed
    pub fn play(&mut self) -> Result<()> {
        self.poll_events();
        let live = self.live.as_ref().ok_or(AudioError::NoBufferLoaded)?;

        live.ctx.resume()?;
        live.renderer.start()?;
        self.playing = true;
        info!("Playback started");
        Ok(())
    }

    /// Pause playback, keeping the position
    ///
    /// # Errors
    /// `NoBufferLoaded` when empty, `ContextClosed` if the context was closed
    pub fn pause(&mut self) -> Result<()> {
        self.poll_events();
        let live = self.live.as_ref().ok_or(AudioError::NoBufferLoaded)?;

        live.renderer.stop()?;
        live.ctx.suspend()?;
        self.playing = false;
        info!("Playback paused");
        Ok(())
    }

    /// Play if paused, pause if playing; returns whether playback is now running
    pub fn toggle_playback(&mut self) -> Result<bool> {
        self.poll_events();
        if self.playing {
            self.pause()?;
        } else {
            self.play()?;
        }
        Ok(self.playing)
    }

    /// Set the master volume (clamped to [0, 2])
    pub fn set_volume(&mut self, gain: f64) {
        self.settings.volume = VolumeLevel::new(gain);
        self.params.volume().set(self.settings.volume.gain() as f32);
        debug!(percent = self.settings.volume.percent(), "Volume changed");
    }

    /// Set one EQ band's gain (clamped to [-30, 30] dB)
    pub fn update_eq_band(&mut self, band: EqBand, gain_db: f64) {
        self.settings.eq.set_gain_db(band, gain_db);
        let applied = self.settings.eq.gain_db(band);
        self.params.eq_gain(band).set(applied as f32);
        debug!(%band, gain_db = applied, "EQ band changed");
    }

    /// Flip one effect on or off and rebuild
    ///
    /// Returns the new enabled state.
    ///
    /// # Errors
    /// On a failed rebuild the flag is restored and the previous chain stays live
    pub fn toggle_effect(&mut self, effect: Effect) -> Result<bool> {
        let previous = self.settings.effects;
        let enabled = self.settings.effects.toggle(effect);

        if let Err(e) = self.rebuild_chain() {
            warn!(%effect, error = %e, "Effect toggle failed; keeping previous chain");
            self.settings.effects = previous;
            return Err(e);
        }

        info!(%effect, enabled, "Effect toggled");
        Ok(enabled)
    }

    /// Change bitcrusher settings
    ///
    /// Rebuilds only when the bitcrusher is enabled and something actually changed.
    /// Returns the settings now in effect.
    ///
    /// # Errors
    /// On a failed rebuild the previous settings are restored
    pub fn update_bitcrusher_settings(&mut self, update: BitcrusherUpdate) -> Result<BitcrusherSettings> {
        let previous = self.settings.bitcrusher;
        let changed = self.settings.bitcrusher.apply(update);

        if changed && self.settings.effects.bitcrusher {
            if let Err(e) = self.rebuild_chain() {
                warn!(error = %e, "Bitcrusher update failed; keeping previous chain");
                self.settings.bitcrusher = previous;
                return Err(e);
            }
        }

        Ok(self.settings.bitcrusher)
    }

    /// Replace every setting at once
    ///
    /// Rebuilds if the structure changed, otherwise only pokes parameters.
    ///
    /// # Errors
    /// On a failed rebuild the previous settings are restored
    pub fn apply_settings(&mut self, settings: MasteringSettings) -> Result<()> {
        let settings = settings.validated();
        let previous = self.settings;
        let structural = settings.effects != previous.effects
            || (settings.effects.bitcrusher && settings.bitcrusher != previous.bitcrusher);

        self.settings = settings;
        self.params.sync(&self.settings);

        if structural {
            if let Err(e) = self.rebuild_chain() {
                self.settings = previous;
                self.params.sync(&previous);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Current settings
    pub fn settings(&self) -> &MasteringSettings {
        &self.settings
    }

    /// Shared parameters the live stages read
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Stage factory
    pub fn factory(&self) -> &EffectStageFactory {
        &self.factory
    }

    /// Loaded source, if any
    pub fn source(&self) -> Option<&DecodedAudio> {
        self.live.as_ref().map(|live| &live.source)
    }

    /// Live processing context, if any
    pub fn context(&self) -> Option<&ProcessingContext> {
        self.live.as_ref().map(|live| &live.ctx)
    }

    /// Lifecycle state
    pub fn graph_state(&mut self) -> GraphState {
        self.poll_events();
        match (&self.live, self.playing) {
            (None, _) => GraphState::Empty,
            (Some(_), false) => GraphState::Ready,
            (Some(_), true) => GraphState::Playing,
        }
    }

    /// Context and graph state for status displays
    pub fn status(&mut self) -> ManagerStatus {
        let graph = self.graph_state();
        match &self.live {
            Some(live) => ManagerStatus {
                context: live.ctx.state(),
                graph,
                sample_rate: live.ctx.sample_rate(),
                channels: live.ctx.channels(),
            },
            None => ManagerStatus {
                context: ContextState::Uninitialized,
                graph,
                sample_rate: SampleRate::CD_QUALITY.as_hz(),
                channels: REALTIME_CHANNELS,
            },
        }
    }

    /// Close the context and stop the render thread
    ///
    /// Safe to call when nothing is loaded.
    pub fn teardown(&mut self) {
        self.playing = false;
        if let Some(live) = self.live.take() {
            live.ctx.close();
            // Dropping the handle joins the render thread
            drop(live.renderer);
            info!("Tore down live graph");
        }
    }

    fn poll_events(&mut self) {
        let Some(live) = &self.live else {
            return;
        };

        while let Some(event) = live.renderer.try_event() {
            match event {
                RenderEvent::Ended => {
                    self.playing = false;
                    if let Err(e) = live.ctx.suspend() {
                        debug!(error = %e, "Could not suspend after end of source");
                    }
                    info!("Playback reached end of source");
                }
                RenderEvent::ChainSwapped { stages } => debug!(stages, "Chain swap acknowledged"),
            }
        }
    }
}

impl Default for AudioGraphManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioGraphManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impulse::ImpulseResponseSynthesizer;

    fn manager() -> AudioGraphManager {
        AudioGraphManager::with_factory(
            MasteringSettings::default(),
            EffectStageFactory::with_synthesizer(ImpulseResponseSynthesizer::new().with_seconds(1)),
        )
    }

    fn tone(frames: usize) -> DecodedAudio {
        let samples = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        DecodedAudio::new(vec![samples], SampleRate::new(8_000)).unwrap()
    }

    #[test]
    fn empty_manager_reports_defaults() {
        let mut manager = manager();
        let status = manager.status();

        assert_eq!(status.graph, GraphState::Empty);
        assert_eq!(status.context, ContextState::Uninitialized);
        assert_eq!(status.sample_rate, 44_100);
        assert_eq!(status.channels, 2);
    }

    #[test]
    fn play_without_buffer_fails() {
        let mut manager = manager();
        assert!(matches!(manager.play(), Err(AudioError::NoBufferLoaded)));
        assert!(matches!(manager.pause(), Err(AudioError::NoBufferLoaded)));
    }

    #[test]
    fn load_enters_ready_with_suspended_context() {
        let mut manager = manager();
        let _blocks = manager.load_buffer(tone(100)).unwrap();
        let status = manager.status();

        assert_eq!(status.graph, GraphState::Ready);
        assert_eq!(status.context, ContextState::Suspended);
        assert_eq!(status.sample_rate, 8_000);
    }

    #[test]
    fn play_and_pause_drive_context_state() {
        let mut manager = manager();
        let _blocks = manager.load_buffer(tone(100_000)).unwrap();

        manager.play().unwrap();
        assert_eq!(manager.status().context, ContextState::Running);

        manager.pause().unwrap();
        assert_eq!(manager.status().context, ContextState::Suspended);
        assert_eq!(manager.graph_state(), GraphState::Ready);
    }

    #[test]
    fn parameter_updates_do_not_touch_structure() {
        let mut manager = manager();
        manager.update_eq_band(EqBand::Treble, 45.0);
        manager.set_volume(-1.0);

        assert_eq!(manager.settings().eq.gain_db(EqBand::Treble), 30.0);
        assert_eq!(manager.params().eq_gain(EqBand::Treble).get(), 30.0);
        assert_eq!(manager.params().volume().get(), 0.0);
    }

    #[test]
    fn toggle_without_buffer_only_changes_settings() {
        let mut manager = manager();
        assert!(manager.toggle_effect(Effect::Reverb).unwrap());
        assert!(manager.settings().effects.reverb);
        assert!(!manager.toggle_effect(Effect::Reverb).unwrap());
    }

    #[test]
    fn bitcrusher_update_is_clamped() {
        let mut manager = manager();
        let applied = manager
            .update_bitcrusher_settings(BitcrusherUpdate::frequency_reduction(50))
            .unwrap();
        assert_eq!(applied.frequency_reduction, 20);
    }

    #[test]
    fn teardown_returns_to_empty() {
        let mut manager = manager();
        let _blocks = manager.load_buffer(tone(100)).unwrap();
        let ctx = manager.context().cloned().unwrap();

        manager.teardown();

        assert!(ctx.is_closed());
        assert_eq!(manager.graph_state(), GraphState::Empty);
        manager.teardown();
    }
}
