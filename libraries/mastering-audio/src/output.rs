//! Desktop audio output via CPAL
//!
//! Plays the block stream produced by the render thread on the default output device.
//! The CPAL stream lives on its own thread because it is not `Send` on every platform.
//! There is no resampling: the device is opened at the source rate.

use crate::context::REALTIME_CHANNELS;
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

enum OutputCommand {
    Shutdown,
}

/// Pulls rendered blocks into device-sized callback buffers
struct BlockFeeder {
    blocks: Receiver<Vec<f32>>,
    current: Vec<f32>,
    position: usize,
}

impl BlockFeeder {
    fn new(blocks: Receiver<Vec<f32>>) -> Self {
        Self {
            blocks,
            current: Vec::new(),
            position: 0,
        }
    }

    /// Fill `out`, padding with silence when the renderer is behind or idle
    fn fill(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.position >= self.current.len() {
                match self.blocks.try_recv() {
                    Ok(block) => {
                        self.current = block;
                        self.position = 0;
                        continue;
                    }
                    Err(_) => {
                        out[written..].fill(0.0);
                        return;
                    }
                }
            }

            let n = (self.current.len() - self.position).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.current[self.position..self.position + n]);
            self.position += n;
            written += n;
        }
    }
}

/// Default-device playback of a rendered block stream
pub struct DeviceOutput {
    command_tx: Sender<OutputCommand>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl DeviceOutput {
    /// Open the default output device and start consuming `blocks`
    ///
    /// # Errors
    /// Returns `Output` if there is no device or the stream cannot be built
    pub fn start(blocks: Receiver<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Output("No output device found".to_string()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::Output(e.to_string()))?;
        if default_config.sample_rate() != sample_rate {
            warn!(
                device_rate = default_config.sample_rate(),
                source_rate = sample_rate,
                "Device default rate differs from source; requesting source rate"
            );
        }

        let config = StreamConfig {
            channels: REALTIME_CHANNELS,
            sample_rate,
            buffer_size: BufferSize::Default,
        };

        let (command_tx, command_rx) = bounded::<OutputCommand>(4);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let thread = thread::Builder::new()
            .name("mastering-output".into())
            .spawn(move || output_thread_run(device, config, blocks, command_rx, ready_tx))
            .map_err(|e| AudioError::Output(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Output("Output thread exited during setup".to_string()))??;

        info!(sample_rate, "Output stream started");
        Ok(Self {
            command_tx,
            sample_rate,
            thread: Some(thread),
        })
    }

    /// Rate the stream was opened at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn output_thread_run(
    device: Device,
    config: StreamConfig,
    blocks: Receiver<Vec<f32>>,
    command_rx: Receiver<OutputCommand>,
    ready_tx: Sender<Result<()>>,
) {
    let mut feeder = BlockFeeder::new(blocks);
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feeder.fill(data),
        |err| error!(error = %err, "Audio stream error"),
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::Output(format!("Failed to build stream: {}", e))));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::Output(format!("Failed to start stream: {}", e))));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while let Ok(cmd) = command_rx.recv() {
        match cmd {
            OutputCommand::Shutdown => break,
        }
    }
    drop(stream);
}
