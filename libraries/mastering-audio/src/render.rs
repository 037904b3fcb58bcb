//! Real-time rendering
//!
//! A dedicated render thread owns the source cursor and the current chain. The
//! controlling side talks to it only through a command channel: it swaps in freshly
//! built chains, starts and stops playback, and shuts it down. Rendered blocks go out
//! on a bounded channel to whatever plays them (an output device, a test, nothing).

use crate::context::ProcessingContext;
use crate::effects::EffectChain;
use crate::error::{AudioError, Result};
use crate::graph;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use mastering_core::DecodedAudio;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Rendered blocks buffered ahead of the consumer
pub const BLOCK_QUEUE_DEPTH: usize = 4;

/// How long the render thread waits on a full block queue before checking commands
const SEND_POLL: Duration = Duration::from_millis(10);

/// Commands from the controller to the render thread
pub enum RenderCommand {
    /// Replace the chain; the previous one is disconnected and dropped
    SwapChain(EffectChain),
    /// Start (or continue) rendering from the cursor
    Start,
    /// Stop rendering, keeping the cursor
    Stop,
    /// Exit the render thread
    Shutdown,
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderCommand::SwapChain(chain) => f.debug_tuple("SwapChain").field(chain).finish(),
            RenderCommand::Start => f.write_str("Start"),
            RenderCommand::Stop => f.write_str("Stop"),
            RenderCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Notifications from the render thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// A new chain is live
    ChainSwapped { stages: usize },
    /// The source played to its end; the cursor is back at the start
    Ended,
}

/// Render-side state: source, cursor and the live chain
pub struct LiveRenderer {
    source: DecodedAudio,
    chain: EffectChain,
    channels: usize,
    quantum: usize,
    cursor: usize,
    playing: bool,
}

impl LiveRenderer {
    /// Renderer for a source, rendering through `chain` with `ctx`'s block size
    pub fn new(source: DecodedAudio, chain: EffectChain, ctx: &ProcessingContext) -> Self {
        Self {
            source,
            chain,
            channels: usize::from(ctx.channels()),
            quantum: ctx.quantum(),
            cursor: 0,
            playing: false,
        }
    }

    /// Check whether blocks are being rendered
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Next source frame to render
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Samples per rendered block (interleaved)
    pub fn block_len(&self) -> usize {
        self.quantum * self.channels
    }

    /// The live chain
    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    /// Install a new chain, returning the old one disconnected
    pub fn swap_chain(&mut self, chain: EffectChain) -> EffectChain {
        let mut old = std::mem::replace(&mut self.chain, chain);
        old.disconnect_all();
        old
    }

    /// Render one block into `out`
    ///
    /// Returns `true` if the source ran out during this block. Playback then stops
    /// and the cursor rewinds so the next start plays from the beginning.
    pub fn render_block(&mut self, out: &mut [f32]) -> bool {
        if !self.playing {
            out.fill(0.0);
            return false;
        }

        let copied = self.source.write_interleaved(self.cursor, out, self.channels);
        self.chain.process(out, self.channels);
        self.cursor += copied;

        if self.cursor >= self.source.frames() {
            self.playing = false;
            self.cursor = 0;
            return true;
        }
        false
    }

    /// Apply a command; returns `false` on shutdown
    pub fn apply(&mut self, command: RenderCommand, events: &Sender<RenderEvent>) -> bool {
        match command {
            RenderCommand::SwapChain(chain) => {
                let stages = chain.len();
                let old = self.swap_chain(chain);
                debug!(
                    route = %graph::format_route(&self.chain.topology()),
                    replaced = old.len(),
                    "Swapped live chain"
                );
                let _ = events.send(RenderEvent::ChainSwapped { stages });
            }
            RenderCommand::Start => {
                if self.source.is_empty() {
                    let _ = events.send(RenderEvent::Ended);
                } else {
                    self.playing = true;
                }
            }
            RenderCommand::Stop => self.playing = false,
            RenderCommand::Shutdown => return false,
        }
        true
    }
}

/// Controller-side handle to the render thread
///
/// Dropping the handle shuts the thread down and joins it.
pub struct RenderHandle {
    commands: Sender<RenderCommand>,
    events: Receiver<RenderEvent>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    /// Spawn the render thread
    ///
    /// # Errors
    /// Returns `RenderThread` if the OS refuses to spawn a thread
    pub fn spawn(renderer: LiveRenderer, sample_rate: u32, sink: Sender<Vec<f32>>) -> Result<Self> {
        let (command_tx, command_rx) = unbounded::<RenderCommand>();
        let (event_tx, event_rx) = unbounded::<RenderEvent>();
        let block_duration =
            Duration::from_secs_f64(renderer.quantum as f64 / f64::from(sample_rate.max(1)));

        let thread = thread::Builder::new()
            .name("mastering-render".into())
            .spawn(move || render_thread_run(renderer, command_rx, event_tx, sink, block_duration))
            .map_err(|e| AudioError::RenderThread(e.to_string()))?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Send a command to the render thread
    ///
    /// # Errors
    /// Returns `RenderThread` if the thread has exited
    pub fn send(&self, command: RenderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| AudioError::RenderThread(format!("Failed to send {:?}", e.0)))
    }

    /// Replace the live chain
    pub fn swap_chain(&self, chain: EffectChain) -> Result<()> {
        self.send(RenderCommand::SwapChain(chain))
    }

    /// Start rendering
    pub fn start(&self) -> Result<()> {
        self.send(RenderCommand::Start)
    }

    /// Stop rendering
    pub fn stop(&self) -> Result<()> {
        self.send(RenderCommand::Stop)
    }

    /// Next pending event, if any
    pub fn try_event(&self) -> Option<RenderEvent> {
        self.events.try_recv().ok()
    }

    /// Event stream
    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.events
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(RenderCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Render thread panicked");
            }
        }
    }
}

fn render_thread_run(
    mut renderer: LiveRenderer,
    commands: Receiver<RenderCommand>,
    events: Sender<RenderEvent>,
    sink: Sender<Vec<f32>>,
    block_duration: Duration,
) {
    let mut sink = Some(sink);

    loop {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if !renderer.apply(command, &events) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if !renderer.is_playing() {
            // Idle until told otherwise
            match commands.recv() {
                Ok(command) => {
                    if !renderer.apply(command, &events) {
                        return;
                    }
                }
                Err(_) => return,
            }
            continue;
        }

        let mut block = vec![0.0; renderer.block_len()];
        let ended = renderer.render_block(&mut block);

        if !publish(block, &mut sink, &mut renderer, &commands, &events, block_duration) {
            return;
        }
        if ended {
            debug!("Source ended");
            let _ = events.send(RenderEvent::Ended);
        }
    }
}

/// Hand a block to the consumer, serving commands while the queue is full
///
/// Without a consumer the thread sleeps one block length instead, so it keeps
/// real-time pace. Returns `false` when the thread should exit.
fn publish(
    block: Vec<f32>,
    sink: &mut Option<Sender<Vec<f32>>>,
    renderer: &mut LiveRenderer,
    commands: &Receiver<RenderCommand>,
    events: &Sender<RenderEvent>,
    block_duration: Duration,
) -> bool {
    let mut pending = block;

    loop {
        let Some(tx) = sink.as_ref() else {
            return match commands.recv_timeout(block_duration) {
                Ok(command) => renderer.apply(command, events),
                Err(RecvTimeoutError::Timeout) => true,
                Err(RecvTimeoutError::Disconnected) => false,
            };
        };

        match tx.send_timeout(pending, SEND_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(block)) => pending = block,
            Err(SendTimeoutError::Disconnected(block)) => {
                pending = block;
                debug!("Block consumer went away; rendering unpaced by output");
                *sink = None;
                continue;
            }
        }

        match commands.try_recv() {
            Ok(command) => {
                if !renderer.apply(command, events) {
                    return false;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}
