/// Subcommand implementations
use crate::error::Result;
use mastering_audio::graph::{self, StageKind};
use mastering_audio::{AudioGraphManager, MasteringSession, OfflineRenderer};
use mastering_core::MasteringSettings;
use std::path::{Path, PathBuf};
use tracing::info;

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub bytes: usize,
    pub route: String,
}

/// Decode `input`, render it with `settings` and write the WAV to `output`
pub async fn export(input: &Path, output: &Path, settings: MasteringSettings) -> Result<ExportReport> {
    let mut session = MasteringSession::from_parts(
        AudioGraphManager::with_settings(settings),
        OfflineRenderer::new(),
    );
    session.load_file(input).await?;

    let route = graph::format_route(&graph::describe_chain(&settings.effects));
    info!(%route, "Rendering");

    let file = session.export().await?;
    file.save(output)?;

    Ok(ExportReport {
        path: output.to_path_buf(),
        bytes: file.bytes.len(),
        route,
    })
}

/// Describe `input` and the chain `settings` would build
pub async fn info(input: &Path, settings: &MasteringSettings) -> Result<String> {
    let mut session = MasteringSession::with_settings(*settings);
    session.load_file(input).await?;
    let mut lines = Vec::new();

    if let Some(source) = session.manager().source() {
        lines.push(format!("File:        {}", input.display()));
        lines.push(format!("Channels:    {}", source.channel_count()));
        lines.push(format!("Sample rate: {} Hz", source.sample_rate().as_hz()));
        lines.push(format!("Frames:      {}", source.frames()));
        lines.push(format!("Duration:    {:.2} s", source.duration_secs()));
    }
    lines.push(format!("Volume:      {}%", settings.volume.percent()));
    lines.push(format!("Chain:       {}", graph::format_route(&graph::describe_chain(&settings.effects))));
    for stage in graph::describe_chain(&settings.effects) {
        if let Some(detail) = stage_detail(stage, settings) {
            lines.push(format!("  {:<12} {}", stage.name(), detail));
        }
    }

    Ok(lines.join("\n"))
}

fn stage_detail(stage: StageKind, settings: &MasteringSettings) -> Option<String> {
    match stage {
        StageKind::Eq(band) => Some(format!(
            "{} Hz {:+.1} dB",
            band.frequency_hz(),
            settings.eq.gain_db(band)
        )),
        StageKind::Bitcrusher => Some(format!(
            "{} bits, hold {}",
            settings.bitcrusher.bit_depth, settings.bitcrusher.frequency_reduction
        )),
        StageKind::Compressor | StageKind::Reverb | StageKind::Gain => None,
    }
}

/// Play `input` on the default device until it ends or Ctrl-C
#[cfg(feature = "desktop")]
pub async fn play(input: &Path, settings: MasteringSettings) -> Result<()> {
    use mastering_audio::{DeviceOutput, GraphState};
    use std::time::Duration;

    let mut session = MasteringSession::with_settings(settings);
    let blocks = session.load_file(input).await?;
    let sample_rate = session
        .manager()
        .source()
        .map_or(44_100, |source| source.sample_rate().as_hz());

    let _output = DeviceOutput::start(blocks, sample_rate)?;
    session.manager_mut().play()?;
    info!(path = %input.display(), "Playing");

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.manager_mut().pause()?;
                info!("Stopped");
                break;
            }
            _ = ticker.tick() => {
                if session.manager_mut().graph_state() != GraphState::Playing {
                    info!("Finished");
                    break;
                }
            }
        }
    }

    session.manager_mut().teardown();
    Ok(())
}

/// Play `input` on the default device until it ends or Ctrl-C
#[cfg(not(feature = "desktop"))]
pub async fn play(_input: &Path, _settings: MasteringSettings) -> Result<()> {
    Err(crate::error::CliError::PlaybackUnavailable)
}
