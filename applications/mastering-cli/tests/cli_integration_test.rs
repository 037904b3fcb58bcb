//! End-to-end tests for configuration layering and export

use mastering_audio::WavEncoder;
use mastering_cli::{commands, Cli, CliConfig, Command};
use mastering_core::{DecodedAudio, SampleRate};
use clap::Parser;
use std::io::Write;

#[test]
fn flags_override_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
volume = 0.5

[eq]
mid = 3.0

[effects]
compressor = true
"#
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "soul-master",
        "--config",
        file.path().to_str().unwrap(),
        "info",
        "song.wav",
        "--mid",
        "-2",
        "--compressor=false",
    ])
    .unwrap();
    let config = CliConfig::load(cli.config.as_deref()).unwrap();
    let Command::Info { settings: args, .. } = cli.command else {
        panic!("expected info");
    };

    let mut settings = config.mastering();
    args.apply(&mut settings);

    assert_eq!(settings.volume.gain(), 0.5);
    assert_eq!(settings.eq.mid, -2.0);
    assert!(!settings.effects.compressor);
}

#[tokio::test]
async fn export_with_effects_produces_valid_wav() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.wav");
    let audio = DecodedAudio::new(
        vec![
            (0..4_000).map(|i| (i as f32 * 0.01).sin() * 0.6).collect(),
            (0..4_000).map(|i| (i as f32 * 0.02).cos() * 0.6).collect(),
        ],
        SampleRate::new(8_000),
    )
    .unwrap();
    std::fs::write(&input, WavEncoder::new().encode(&audio)).unwrap();

    let mut settings = CliConfig::default().mastering();
    settings.effects.compressor = true;
    settings.effects.bitcrusher = true;
    let output = dir.path().join("mastered.wav");

    let report = commands::export(&input, &output, settings).await.unwrap();

    assert_eq!(report.bytes, 44 + 4_000 * 4);
    let decoded = mastering_audio::decode_pcm16(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(decoded.channel_count(), 2);
    assert_eq!(decoded.frames(), 4_000);
}
