/// Format seconds as `MM:SS`. Negative or NaN input renders as `00:00`.
pub fn format_time(seconds: f32) -> String {
    if seconds.is_nan() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let mins = (seconds / 60.0).floor() as u32;
    let secs = (seconds % 60.0).floor() as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Position as a percentage of duration, 0 while the duration is unknown
pub fn progress_percent(position: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        position / duration * 100.0
    } else {
        0.0
    }
}

/// Clamp a requested volume into `[0, 1]`. NaN maps to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Observer-side debounce for `timeUpdate`.
///
/// Reports a change only when progress moved by more than `threshold`
/// percentage points or the duration label changed.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    threshold: f32,
    last_progress: Option<f32>,
    last_duration_label: String,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ProgressThrottle {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            last_progress: None,
            last_duration_label: String::new(),
        }
    }

    /// Returns true if the observer should re-render
    pub fn should_render(&mut self, progress: f32, duration: f32) -> bool {
        let label = format_time(duration);
        let moved = match self.last_progress {
            Some(last) => (progress - last).abs() > self.threshold,
            None => true,
        };

        if moved || label != self.last_duration_label {
            self.last_progress = Some(progress);
            self.last_duration_label = label;
            true
        } else {
            false
        }
    }

    /// Forget the last render, e.g. after a track change or stop
    pub fn reset(&mut self) {
        self.last_progress = None;
        self.last_duration_label.clear();
    }
}
