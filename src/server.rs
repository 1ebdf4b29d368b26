//! Server loop
//!
//! One thread, one loop. Each tick polls the channel briefly, applies any
//! decoded messages, and renders either the computed status line or the
//! payload of the active override. The loop ends on a terminate message or
//! when the shutdown flag (set by the signal handler) is raised; both paths
//! go through [`Server::stop`], which removes the channel and the pid record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::channel::{ReadOutcome, ServerChannel};
use crate::codec::{self, Command, FrameBuffer, Message, MAX_FRAME_LEN};
use crate::config::{Config, OverrideMode};
use crate::display::DisplaySink;
use crate::error::{DstatError, Result};
use crate::metrics::MetricsProvider;
use crate::registry::{self, Acquisition, InstanceLock};
use crate::status::{Availability, StatusCollector};

/// Longest override honoured, whatever the client asked for
pub const MAX_OVERRIDE: Duration = Duration::from_secs(24 * 60 * 60);

/// What the server is rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Computed status line
    Normal,
    /// Client payload until the deadline
    Override { until: Instant },
}

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next tick boundary
    Continue,
    /// Keep the override on screen this long before ticking again
    Hold(Duration),
    /// Leave the loop and clean up
    Terminate,
}

/// The long-running status server
pub struct Server<P, S> {
    config: Config,
    channel: ServerChannel,
    lock: InstanceLock,
    frames: FrameBuffer,
    read_buf: Vec<u8>,
    state: ServerState,
    override_secs: u64,
    collector: StatusCollector<P>,
    sink: S,
    health: Availability,
    shutdown: Arc<AtomicBool>,
}

impl<P: MetricsProvider, S: DisplaySink> Server<P, S> {
    /// Claim the pid record and the channel
    ///
    /// Refuses to start when the display sink is unusable or another live
    /// server holds the record.
    pub fn start(config: Config, provider: P, sink: S, shutdown: Arc<AtomicBool>) -> Result<Self> {
        sink.check()?;

        let pid_path = config.pid_path();
        let lock = match registry::acquire(&pid_path)? {
            Acquisition::Acquired(lock) => lock,
            Acquisition::AlreadyRunning(pid) => {
                return Err(DstatError::AlreadyRunning {
                    pid,
                    path: pid_path,
                })
            }
        };

        // on failure the lock drops here and the record is released
        let channel = ServerChannel::create(&config.channel_path())?;

        Ok(Self {
            collector: StatusCollector::new(provider, &config),
            override_secs: config.default_idle,
            channel,
            lock,
            frames: FrameBuffer::new(),
            read_buf: vec![0u8; MAX_FRAME_LEN],
            state: ServerState::Normal,
            sink,
            health: Availability::default(),
            shutdown,
            config,
        })
    }

    /// Run until terminated, then clean up
    pub fn run(mut self) -> Result<()> {
        info!(
            "Server running (pid {}, tick {:?}, {:?} overrides)",
            std::process::id(),
            self.config.tick_interval,
            self.config.override_mode
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Interrupted, shutting down");
                break;
            }

            let started = Instant::now();
            match self.tick() {
                Flow::Continue => {
                    self.pause(self.config.tick_interval.saturating_sub(started.elapsed()))
                }
                Flow::Hold(duration) => self.pause(duration),
                Flow::Terminate => break,
            }
        }

        self.stop();
        Ok(())
    }

    /// One poll/apply/render cycle
    pub fn tick(&mut self) -> Flow {
        self.expire_override(Instant::now());
        self.poll_channel();

        while let Some(frame) = self.frames.next_frame() {
            match codec::decode(&frame) {
                Ok(message) => match self.apply(message) {
                    Flow::Continue => {}
                    flow => return flow,
                },
                Err(e) => warn!("Discarding malformed frame: {}", e),
            }
        }

        if self.state == ServerState::Normal {
            let line = self.collector.snapshot().to_string();
            self.render(&line);
        }
        Flow::Continue
    }

    /// Current rendering state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Remove the channel and the pid record
    pub fn stop(self) {
        let Server { channel, lock, .. } = self;
        let channel_path = channel.path().to_path_buf();
        drop(channel);
        let pid_path = lock.path().to_path_buf();
        drop(lock);
        info!(
            "Server stopped, removed {} and {}",
            channel_path.display(),
            pid_path.display()
        );
    }

    fn expire_override(&mut self, now: Instant) {
        if let ServerState::Override { until } = self.state {
            if now >= until {
                debug!("Override expired");
                self.state = ServerState::Normal;
            }
        }
    }

    fn poll_channel(&mut self) {
        // buffered frames are handled without waiting
        let timeout = if self.frames.has_frame() {
            Duration::ZERO
        } else {
            self.config.poll_timeout
        };

        match self.channel.poll_read(&mut self.read_buf, timeout) {
            Ok(ReadOutcome::Data(n)) => {
                debug!("Read {} bytes from channel", n);
                self.health.observe("channel", true, &"");
                if let Err(e) = self.frames.extend(&self.read_buf[..n]) {
                    warn!("Discarding channel data: {}", e);
                }
            }
            Ok(ReadOutcome::Empty) => self.health.observe("channel", true, &""),
            Err(e) => self.health.observe("channel", false, &e),
        }
    }

    fn apply(&mut self, message: Message) -> Flow {
        match message.command() {
            Command::Terminate => {
                info!("Terminate requested by client");
                Flow::Terminate
            }
            Command::DisplayMessage => {
                if let Some(secs) = message.delay_seconds() {
                    self.override_secs = secs;
                }
                let hold = Duration::from_secs(self.override_secs).min(MAX_OVERRIDE);
                self.state = ServerState::Override {
                    until: Instant::now() + hold,
                };
                info!("Showing client message for {:?}", hold);
                self.render(message.payload());

                match self.config.override_mode {
                    OverrideMode::Blocking => Flow::Hold(hold),
                    OverrideMode::Interruptible => Flow::Continue,
                }
            }
        }
    }

    fn render(&mut self, text: &str) {
        match self.sink.show(text) {
            Ok(()) => self.health.observe("display", true, &""),
            Err(e) => self.health.observe("display", false, &e),
        }
    }

    /// Sleep up to `duration`, waking early on shutdown
    fn pause(&self, duration: Duration) {
        let now = Instant::now();
        let deadline = now.checked_add(duration).unwrap_or(now + MAX_OVERRIDE);
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(self.config.poll_timeout));
        }
    }
}

/// Render one snapshot and return (the `--stdout` mode)
pub fn render_once<P: MetricsProvider, S: DisplaySink>(
    config: &Config,
    provider: P,
    mut sink: S,
) -> Result<()> {
    let mut collector = StatusCollector::new(provider, config);
    let line = collector.snapshot().to_string();
    sink.show(&line)
}
