//! End-to-end export tests
//!
//! Renders through the offline chain, writes real files, and checks them with an
//! independent WAV reader (hound).

use mastering_audio::{
    AudioError, AudioGraphManager, EffectStageFactory, ImpulseResponseSynthesizer, MasteringSession,
    OfflineRenderer, WavEncoder,
};
use mastering_core::{DecodedAudio, EqBand, MasteringSettings, SampleRate, VolumeLevel};
use std::io::Cursor;

fn small_factory() -> EffectStageFactory {
    EffectStageFactory::with_synthesizer(ImpulseResponseSynthesizer::new().with_seconds(1))
}

fn session(settings: MasteringSettings) -> MasteringSession {
    MasteringSession::from_parts(
        AudioGraphManager::with_factory(settings, small_factory()),
        OfflineRenderer::with_factory(small_factory()),
    )
}

fn sweep(frames: usize, sample_rate: u32) -> DecodedAudio {
    let left: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * (100.0 + 2_000.0 * t) * t).sin() * 0.7
        })
        .collect();
    let right = left.iter().map(|s| -s * 0.5).collect();
    DecodedAudio::new(vec![left, right], SampleRate::new(sample_rate)).unwrap()
}

#[test]
fn exported_file_reads_back_with_hound() {
    let source = sweep(4_000, 16_000);
    let mut settings = MasteringSettings::default();
    settings.eq.set_gain_db(EqBand::Treble, 6.0);
    settings.effects.compressor = true;

    let file = OfflineRenderer::with_factory(small_factory())
        .export(&source, &settings)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = file.save_in(dir.path()).unwrap();
    assert!(path.ends_with("mastered-audio.wav"));

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.duration(), 4_000);
}

#[test]
fn neutral_export_equals_encoded_source() {
    let source = sweep(3_000, 22_050);
    let exported = OfflineRenderer::with_factory(small_factory())
        .render_wav(&source, &MasteringSettings::default())
        .unwrap();

    assert_eq!(exported, WavEncoder::new().encode(&source));
}

#[test]
fn reverb_export_keeps_source_length() {
    let source = sweep(2_000, 8_000);
    let mut settings = MasteringSettings::default();
    settings.effects.reverb = true;
    settings.volume = VolumeLevel::new(0.8);

    let rendered = OfflineRenderer::with_factory(small_factory())
        .render(&source, &settings)
        .unwrap();

    assert_eq!(rendered.frames(), 2_000);
    assert!(rendered.channels().flatten().all(|s| s.is_finite()));
    // The wet signal differs from the dry one
    assert_ne!(rendered.channel(0), source.channel(0));
}

#[test]
fn mono_source_exports_mono() {
    let source = DecodedAudio::new(vec![vec![0.25; 500]], SampleRate::new(8_000)).unwrap();
    let wav = OfflineRenderer::with_factory(small_factory())
        .render_wav(&source, &MasteringSettings::default())
        .unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.spec().channels, 1);
    let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
    assert!(samples.iter().all(|&s| s == 8192));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_exports_reject_the_second() {
    let mut session = session(MasteringSettings::default());
    let _blocks = session.load_audio(sweep(50_000, 8_000)).unwrap();

    let first = session.start_export().unwrap();
    let second = session.start_export();

    assert!(matches!(second, Err(AudioError::ExportInProgress)));
    let file = first.await.unwrap().unwrap();
    assert_eq!(file.bytes.len(), 44 + 50_000 * 4);

    // The lock is released once the first export finishes
    let third = session.export().await.unwrap();
    assert_eq!(third, file);
}

#[tokio::test]
async fn export_snapshots_settings_at_start() {
    let mut session = session(MasteringSettings::default());
    let source = sweep(1_000, 8_000);
    let _blocks = session.load_audio(source.clone()).unwrap();

    let handle = session.start_export().unwrap();
    session.manager_mut().set_volume(0.0);
    let file = handle.await.unwrap().unwrap();

    assert_eq!(file.bytes, WavEncoder::new().encode(&source));
}

#[tokio::test]
async fn load_bytes_decodes_wav() {
    let source = sweep(2_000, 16_000);
    let wav = WavEncoder::new().encode(&source);
    let mut session = session(MasteringSettings::default());

    let _blocks = session.load_bytes(wav, Some("wav".to_string())).await.unwrap();

    let loaded = session.manager().source().unwrap();
    assert_eq!(loaded.channel_count(), 2);
    assert_eq!(loaded.frames(), 2_000);
    assert_eq!(loaded.sample_rate(), SampleRate::new(16_000));
}

#[tokio::test]
async fn neutral_export_of_loaded_wav_is_byte_identical() {
    let source = DecodedAudio::new(
        vec![vec![0.9, 0.6, -0.9, 0.25], vec![1.0, -1.0, 0.5, -0.125]],
        SampleRate::new(44_100),
    )
    .unwrap();
    let wav = WavEncoder::new().encode(&source);
    let mut session = session(MasteringSettings::default());

    let _blocks = session.load_bytes(wav.clone(), Some("wav".to_string())).await.unwrap();
    let file = session.export().await.unwrap();

    assert_eq!(file.bytes, wav);
}

#[tokio::test]
async fn load_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.wav");
    std::fs::write(&path, WavEncoder::new().encode(&sweep(800, 8_000))).unwrap();

    let mut session = session(MasteringSettings::default());
    let _blocks = session.load_file(&path).await.unwrap();

    assert_eq!(session.manager().source().unwrap().frames(), 800);
}
