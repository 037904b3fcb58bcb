/// Command-line interface definition
use clap::{Args, Parser, Subcommand};
use mastering_core::{EqBand, MasteringSettings, VolumeLevel};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "soul-master")]
#[command(about = "Master an audio file through EQ, compression, reverb and bitcrushing", long_about = None)]
pub struct Cli {
    /// Configuration file path (defaults to ./mastering.toml if present)
    #[arg(short, long, global = true, env = "MASTERING_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a file through the chain and write a PCM16 WAV
    Export {
        /// Input audio file
        input: PathBuf,

        /// Output path (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Play a file through the chain on the default output device
    Play {
        /// Input audio file
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Show file properties and the chain that would be built
    Info {
        /// Input audio file
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Per-invocation overrides of the configured settings
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Master volume (0.0 to 2.0)
    #[arg(long)]
    pub volume: Option<f64>,

    /// Bass gain in dB (60 Hz low shelf)
    #[arg(long, allow_hyphen_values = true)]
    pub bass: Option<f64>,

    /// Low-mid gain in dB (250 Hz peaking)
    #[arg(long, allow_hyphen_values = true)]
    pub low_mid: Option<f64>,

    /// Mid gain in dB (1 kHz peaking)
    #[arg(long, allow_hyphen_values = true)]
    pub mid: Option<f64>,

    /// High-mid gain in dB (4 kHz peaking)
    #[arg(long, allow_hyphen_values = true)]
    pub high_mid: Option<f64>,

    /// Treble gain in dB (10 kHz high shelf)
    #[arg(long, allow_hyphen_values = true)]
    pub treble: Option<f64>,

    /// Enable or disable the compressor
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub compressor: Option<bool>,

    /// Enable or disable the reverb
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub reverb: Option<bool>,

    /// Enable or disable the bitcrusher
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub bitcrusher: Option<bool>,

    /// Bitcrusher depth in bits (1 to 16)
    #[arg(long)]
    pub bit_depth: Option<u32>,

    /// Bitcrusher sample-and-hold factor (1 to 20)
    #[arg(long)]
    pub frequency_reduction: Option<u32>,
}

impl SettingsArgs {
    /// Apply every given flag on top of `settings`, then clamp
    pub fn apply(&self, settings: &mut MasteringSettings) {
        if let Some(volume) = self.volume {
            settings.volume = VolumeLevel::new(volume);
        }

        let bands = [
            (EqBand::Bass, self.bass),
            (EqBand::LowMid, self.low_mid),
            (EqBand::Mid, self.mid),
            (EqBand::HighMid, self.high_mid),
            (EqBand::Treble, self.treble),
        ];
        for (band, gain) in bands {
            if let Some(gain) = gain {
                settings.eq.set_gain_db(band, gain);
            }
        }

        if let Some(enabled) = self.compressor {
            settings.effects.compressor = enabled;
        }
        if let Some(enabled) = self.reverb {
            settings.effects.reverb = enabled;
        }
        if let Some(enabled) = self.bitcrusher {
            settings.effects.bitcrusher = enabled;
        }
        if let Some(bit_depth) = self.bit_depth {
            settings.bitcrusher.bit_depth = bit_depth;
        }
        if let Some(reduction) = self.frequency_reduction {
            settings.bitcrusher.frequency_reduction = reduction;
        }

        settings.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_with_overrides() {
        let cli = Cli::try_parse_from([
            "soul-master",
            "export",
            "song.flac",
            "--bass",
            "-3.5",
            "--reverb",
            "--compressor=false",
            "--bit-depth",
            "6",
            "-o",
            "out.wav",
        ])
        .unwrap();

        let Command::Export { input, output, settings } = cli.command else {
            panic!("expected export");
        };
        assert_eq!(input, PathBuf::from("song.flac"));
        assert_eq!(output, Some(PathBuf::from("out.wav")));
        assert_eq!(settings.bass, Some(-3.5));
        assert_eq!(settings.reverb, Some(true));
        assert_eq!(settings.compressor, Some(false));
        assert_eq!(settings.bit_depth, Some(6));
    }

    #[test]
    fn overrides_are_clamped() {
        let args = SettingsArgs {
            volume: Some(5.0),
            treble: Some(99.0),
            bitcrusher: Some(true),
            bit_depth: Some(0),
            frequency_reduction: Some(100),
            ..SettingsArgs::default()
        };
        let mut settings = MasteringSettings::default();

        args.apply(&mut settings);

        assert_eq!(settings.volume.gain(), 2.0);
        assert_eq!(settings.eq.treble, 30.0);
        assert!(settings.effects.bitcrusher);
        assert_eq!(settings.bitcrusher.bit_depth, 1);
        assert_eq!(settings.bitcrusher.frequency_reduction, 20);
    }

    #[test]
    fn absent_flags_leave_settings_alone() {
        let mut settings = MasteringSettings::default();
        settings.eq.mid = 2.0;
        settings.effects.reverb = true;

        SettingsArgs::default().apply(&mut settings);

        assert_eq!(settings.eq.mid, 2.0);
        assert!(settings.effects.reverb);
    }
}
