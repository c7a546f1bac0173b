use std::time::{Duration, Instant};

/// Frames-per-second over fixed sampling windows.
///
/// The reported value changes at most once per window, which keeps an on-screen
/// readout stable.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: Duration,
    window_start: Option<Instant>,
    frames: u32,
    fps: f32,
}

impl FpsMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Records one frame at `now`; returns the current estimate.
    pub fn record(&mut self, now: Instant) -> f32 {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return self.fps;
        };
        self.frames += 1;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= self.window {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = Some(now);
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
