// Playback index driver
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
}

/// What a clock-driven cursor does once elapsed time runs past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndBehavior {
    #[default]
    Loop,
    Clamp,
}

/// Cursor for a wall-clock driven replay:
/// `floor(elapsed / period)` wrapped or clamped into `[0, len-1]`.
/// Returns `None` for an empty sequence or a zero period.
pub fn clock_cursor(
    elapsed: Duration,
    sample_period: Duration,
    len: usize,
    end: EndBehavior,
) -> Option<usize> {
    if len == 0 || sample_period.is_zero() {
        return None;
    }
    let steps = elapsed.as_nanos() / sample_period.as_nanos();
    let index = match end {
        EndBehavior::Loop => steps % len as u128,
        EndBehavior::Clamp => steps.min(len as u128 - 1),
    };
    Some(index as usize)
}

/// Converts ticks of a host loop into cursor moves over a finite sequence.
///
/// The cursor always stays in `[0, len-1]` while the sequence is non-empty.
/// Running one past the last sample stops playback and rewinds to 0.
#[derive(Debug, Clone)]
pub struct PlaybackDriver {
    len: usize,
    cursor: usize,
    status: PlaybackStatus,
    tick_interval: Duration,
    accumulated: Duration,
}

impl PlaybackDriver {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            len: 0,
            cursor: 0,
            status: PlaybackStatus::Stopped,
            tick_interval,
            accumulated: Duration::ZERO,
        }
    }

    /// Point the driver at a new sequence. Stops playback and resets the cursor.
    pub fn load(&mut self, len: usize) {
        self.len = len;
        self.cursor = 0;
        self.status = PlaybackStatus::Stopped;
        self.accumulated = Duration::ZERO;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Current cursor, or `None` when there is nothing to render.
    pub fn cursor(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.cursor)
    }

    /// Returns `true` if the driver transitioned to `Playing`.
    pub fn play(&mut self) -> bool {
        if self.is_empty() || self.status == PlaybackStatus::Playing {
            return false;
        }
        self.status = PlaybackStatus::Playing;
        self.accumulated = Duration::ZERO;
        true
    }

    /// Stops playback, keeping the cursor where it is.
    pub fn pause(&mut self) {
        self.status = PlaybackStatus::Stopped;
        self.accumulated = Duration::ZERO;
    }

    /// Move the cursor to a user-chosen position. Out-of-range positions clamp.
    pub fn scrub(&mut self, position: i64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let max = (self.len - 1) as i64;
        self.cursor = position.clamp(0, max) as usize;
        Some(self.cursor)
    }

    /// Single play tick. Returns the new cursor.
    pub fn step(&mut self) -> Option<usize> {
        if self.status != PlaybackStatus::Playing || self.is_empty() {
            return self.cursor();
        }
        let next = self.cursor + 1;
        if next >= self.len {
            self.status = PlaybackStatus::Stopped;
            self.accumulated = Duration::ZERO;
            self.cursor = 0;
        } else {
            self.cursor = next;
        }
        self.cursor()
    }

    /// Feed elapsed host time. Every whole tick interval moves the cursor by
    /// one. A stopped driver ignores the call. Returns `true` if the cursor or
    /// status changed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.status != PlaybackStatus::Playing || self.tick_interval.is_zero() {
            return false;
        }
        self.accumulated += dt;
        let mut changed = false;
        while self.status == PlaybackStatus::Playing && self.accumulated >= self.tick_interval {
            self.accumulated -= self.tick_interval;
            self.step();
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(40);

    #[test]
    fn test_three_ticks_wrap_to_start_and_stop() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(3);
        assert!(driver.play());

        let mut seen = vec![driver.cursor().unwrap()];
        for _ in 0..3 {
            driver.advance(TICK);
            seen.push(driver.cursor().unwrap());
        }

        assert_eq!(seen, vec![0, 1, 2, 0]);
        assert_eq!(driver.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        for len in 1..12 {
            let mut driver = PlaybackDriver::new(TICK);
            driver.load(len);
            driver.play();
            for _ in 0..50 {
                driver.advance(Duration::from_millis(17));
                let cursor = driver.cursor().unwrap();
                assert!(cursor < len, "cursor {} out of bounds for len {}", cursor, len);
                if driver.status() == PlaybackStatus::Stopped {
                    driver.play();
                }
            }
        }
    }

    #[test]
    fn test_empty_sequence_has_no_cursor() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(0);
        assert_eq!(driver.cursor(), None);
        assert!(!driver.play());
        assert_eq!(driver.scrub(4), None);
    }

    #[test]
    fn test_scrub_clamps() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(10);
        assert_eq!(driver.scrub(25), Some(9));
        assert_eq!(driver.scrub(-3), Some(0));
        assert_eq!(driver.scrub(4), Some(4));
    }

    #[test]
    fn test_pause_cancels_further_ticks() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(10);
        driver.play();
        driver.advance(TICK * 2);
        assert_eq!(driver.cursor(), Some(2));

        driver.pause();
        assert!(!driver.advance(TICK * 5));
        assert_eq!(driver.cursor(), Some(2));
    }

    #[test]
    fn test_partial_ticks_accumulate() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(10);
        driver.play();
        assert!(!driver.advance(Duration::from_millis(25)));
        assert!(driver.advance(Duration::from_millis(25)));
        assert_eq!(driver.cursor(), Some(1));
    }

    #[test]
    fn test_load_resets_cursor() {
        let mut driver = PlaybackDriver::new(TICK);
        driver.load(10);
        driver.scrub(7);
        driver.play();
        driver.load(4);
        assert_eq!(driver.cursor(), Some(0));
        assert_eq!(driver.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_clock_cursor_loop_and_clamp() {
        let period = Duration::from_secs(1);
        assert_eq!(
            clock_cursor(Duration::from_millis(7_500), period, 5, EndBehavior::Loop),
            Some(2)
        );
        assert_eq!(
            clock_cursor(Duration::from_millis(7_500), period, 5, EndBehavior::Clamp),
            Some(4)
        );
        assert_eq!(clock_cursor(Duration::from_secs(3), period, 0, EndBehavior::Loop), None);
        assert_eq!(clock_cursor(Duration::from_secs(3), Duration::ZERO, 3, EndBehavior::Loop), None);
    }
}
