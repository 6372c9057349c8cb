// Playback service - Drives a loaded simulation through the playback cursor
use crate::application::background::TaskHandle;
use crate::domain::channel::Channel;
use crate::domain::playback::{clock_cursor, EndBehavior, PlaybackDriver, PlaybackStatus};
use crate::domain::rig::{CoordinateMapper, RigGeometry, RigPose};
use crate::domain::sample::{Sample, SampleSequence};
use crate::domain::trace::{ColorRanges, ColorScale, PathTrace, TraceStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub tick_interval: Duration,
    pub geometry: RigGeometry,
    pub ranges: ColorRanges,
    pub trace_lift: f64,
    pub trace_channel: Channel,
    /// Wall-clock seeks past the end wrap or clamp
    pub end: EndBehavior,
}

/// What a renderer needs to draw the rig at the current cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackFrame {
    pub simulation_id: Option<i64>,
    pub status: PlaybackStatus,
    pub len: usize,
    pub cursor: Option<usize>,
    pub time_ms: Option<i64>,
    pub pose: Option<RigPose>,
    pub mesh_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceView {
    pub channel: Channel,
    pub scale: ColorScale,
    pub trace: PathTrace,
}

struct Session {
    simulation_id: Option<i64>,
    sequence: SampleSequence,
    /// Pose per sample, folded front to back so gaps hold the last good value
    poses: Vec<RigPose>,
    driver: PlaybackDriver,
    trace: TraceView,
}

impl Session {
    fn frame(&self) -> PlaybackFrame {
        let cursor = self.driver.cursor();
        let sample = cursor.and_then(|c| self.sequence.get(c));
        PlaybackFrame {
            simulation_id: self.simulation_id,
            status: self.driver.status(),
            len: self.sequence.len(),
            cursor,
            time_ms: sample.map(|s| s.time_ms),
            pose: cursor.and_then(|c| self.poses.get(c).copied()),
            mesh_path: cursor.and_then(|c| self.mesh_path_at(c)),
        }
    }

    /// Most recent mesh fragment at or before `index`.
    fn mesh_path_at(&self, index: usize) -> Option<String> {
        (0..=index)
            .rev()
            .filter_map(|i| self.sequence.get(i))
            .find_map(|s| s.mesh_path.clone())
    }
}

pub struct PlaybackService {
    options: PlaybackOptions,
    session: Mutex<Session>,
    timer: Mutex<Option<TaskHandle>>,
    frames: watch::Sender<PlaybackFrame>,
}

impl PlaybackService {
    pub fn new(options: PlaybackOptions) -> Self {
        let session = Session {
            simulation_id: None,
            sequence: SampleSequence::default(),
            poses: Vec::new(),
            driver: PlaybackDriver::new(options.tick_interval),
            trace: TraceView {
                channel: options.trace_channel,
                scale: ColorScale::new(0.0, 1.0),
                trace: PathTrace::default(),
            },
        };
        let (frames, _) = watch::channel(session.frame());
        Self {
            options,
            session: Mutex::new(session),
            timer: Mutex::new(None),
            frames,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, session: &Session) -> PlaybackFrame {
        let frame = session.frame();
        self.frames.send_replace(frame.clone());
        frame
    }

    fn cancel_timer(&self) {
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(previous);
    }

    /// Replace the loaded sequence. Stops playback and rewinds to 0.
    pub fn load(&self, simulation_id: i64, samples: Vec<Sample>) -> PlaybackFrame {
        self.cancel_timer();

        let geometry = self.options.geometry;
        let mut previous = RigPose::neutral(&geometry);
        let poses = samples
            .iter()
            .map(|s| {
                previous = CoordinateMapper::map(&geometry, s, previous);
                previous
            })
            .collect();

        let mut session = self.lock();
        session.simulation_id = Some(simulation_id);
        session.sequence = SampleSequence::fixed(samples);
        session.poses = poses;
        let len = session.sequence.len();
        session.driver.load(len);
        let channel = session.trace.channel;
        session.trace = self.build_trace(&session.sequence, channel);

        tracing::info!(
            "Loaded simulation {} with {} samples",
            simulation_id,
            session.sequence.len()
        );
        self.publish(&session)
    }

    fn style(&self, sequence: &SampleSequence, channel: Channel) -> TraceStyle {
        TraceStyle {
            channel,
            scale: self.options.ranges.scale_for(channel, sequence),
            lift: self.options.trace_lift,
        }
    }

    fn build_trace(&self, sequence: &SampleSequence, channel: Channel) -> TraceView {
        let style = self.style(sequence, channel);
        TraceView {
            channel,
            scale: style.scale,
            trace: PathTrace::build(sequence, &style),
        }
    }

    /// Start the tick loop. Any earlier loop is cancelled first, so rapid
    /// play/pause never leaves two timers running.
    pub fn play(self: &Arc<Self>) -> PlaybackFrame {
        let frame = {
            let mut session = self.lock();
            if !session.driver.play() {
                return session.frame();
            }
            self.publish(&session)
        };

        self.cancel_timer();
        let service = Arc::clone(self);
        let interval = self.options.tick_interval;
        let handle = TaskHandle::spawn("playback-timer", async move {
            service.run_timer(interval).await;
        });
        *self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        frame
    }

    async fn run_timer(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut last = Instant::now();
        loop {
            ticker.tick().await;
            let now = Instant::now();
            let dt = now - last;
            last = now;

            let mut session = self.lock();
            if session.driver.advance(dt) {
                self.publish(&session);
            }
            if session.driver.status() == PlaybackStatus::Stopped {
                tracing::debug!("Playback reached a stop at {:?}", session.driver.cursor());
                break;
            }
        }
    }

    pub fn pause(&self) -> PlaybackFrame {
        self.cancel_timer();
        let mut session = self.lock();
        session.driver.pause();
        self.publish(&session)
    }

    /// Jump to a position. Out-of-range positions clamp; playback state is
    /// left alone.
    pub fn scrub(&self, position: i64) -> PlaybackFrame {
        let mut session = self.lock();
        session.driver.scrub(position);
        self.publish(&session)
    }

    /// Advance by host time without the internal timer.
    #[cfg(test)]
    pub fn advance(&self, dt: Duration) -> PlaybackFrame {
        let mut session = self.lock();
        session.driver.advance(dt);
        self.publish(&session)
    }

    /// Position the cursor from elapsed wall-clock time, one sample per tick
    /// interval.
    pub fn seek_clock(&self, elapsed: Duration) -> PlaybackFrame {
        let mut session = self.lock();
        let len = session.driver.len();
        let period = session.driver.tick_interval();
        if let Some(index) = clock_cursor(elapsed, period, len, self.options.end) {
            session.driver.scrub(index as i64);
        }
        self.publish(&session)
    }

    pub fn frame(&self) -> PlaybackFrame {
        self.lock().frame()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackFrame> {
        self.frames.subscribe()
    }

    /// Trace coloured by `channel`; rebuilt only when the channel changes.
    pub fn trace(&self, channel: Option<Channel>) -> TraceView {
        let mut session = self.lock();
        if let Some(channel) = channel {
            if channel != session.trace.channel {
                session.trace = self.build_trace(&session.sequence, channel);
            }
        }
        session.trace.clone()
    }

    /// Trace of the samples played so far, up to and including the cursor.
    pub fn trace_to_cursor(&self, channel: Option<Channel>) -> TraceView {
        let session = self.lock();
        let channel = channel.unwrap_or(session.trace.channel);
        let end = session.driver.cursor().map_or(0, |c| c + 1);
        let style = self.style(&session.sequence, channel);
        TraceView {
            channel,
            scale: style.scale,
            trace: PathTrace::build_until(&session.sequence, &style, end),
        }
    }

    pub fn sample_at(&self, index: usize) -> Option<Sample> {
        self.lock().sequence.get(index).cloned()
    }

    /// `(time since the first sample, value)` of one column over the loaded
    /// run. Samples without the column are skipped. Any column name works,
    /// not just catalogue channels.
    pub fn series(&self, column: &str) -> Vec<(i64, f64)> {
        let session = self.lock();
        let Some(t0) = session.sequence.first().map(|s| s.time_ms) else {
            return Vec::new();
        };
        session
            .sequence
            .iter()
            .filter_map(|s| s.get_raw(column).map(|v| (s.time_ms - t0, v)))
            .collect()
    }
}
