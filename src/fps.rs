use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frames-per-second over a one second averaging window.
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame at `now` and return the current estimate.
    pub fn update(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= WINDOW {
            self.fps = f64::from(self.frames) / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_until_first_window_closes() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        for i in 1..10 {
            assert_eq!(counter.update(start + Duration::from_millis(i * 50)), 0.0);
        }
    }

    #[test]
    fn averages_over_the_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        let mut fps = 0.0;
        for i in 1..=20 {
            fps = counter.update(start + Duration::from_millis(i * 50));
        }
        assert!((fps - 20.0).abs() < 0.01, "fps = {fps}");
        assert_eq!(counter.fps(), fps);
    }
}
