use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

use super::ClipId;

/// Short decaying sine tone, optionally pulsed.
pub struct Chime {
    freq: f32,
    amplitude: f32,
    pulses: u32,
    sample_rate: u32,
    total_samples: usize,
    num_sample: usize,
}

impl Chime {
    pub fn new(freq: f32, duration: Duration, amplitude: f32, pulses: u32) -> Self {
        let sample_rate = 44100;
        Self {
            freq,
            amplitude,
            pulses: pulses.max(1),
            sample_rate,
            total_samples: (duration.as_secs_f32() * sample_rate as f32) as usize,
            num_sample: 0,
        }
    }

    pub fn for_clip(clip: ClipId) -> Self {
        let amplitude = clip.volume() * 0.3;
        match clip {
            ClipId::Connected => Self::new(880.0, Duration::from_millis(180), amplitude, 1),
            ClipId::Disconnected => Self::new(440.0, Duration::from_millis(220), amplitude, 1),
            ClipId::LowAlarm => Self::new(660.0, Duration::from_millis(700), amplitude, 2),
            ClipId::HighAlarm => Self::new(990.0, Duration::from_millis(1400), amplitude, 4),
        }
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / self.sample_rate as f32;

        // Each pulse decays linearly to silence before the next one starts.
        let pulse_len = (self.total_samples / self.pulses as usize).max(1);
        let within = (self.num_sample % pulse_len) as f32 / pulse_len as f32;
        let envelope = 1.0 - within;

        self.num_sample += 1;
        Some((2.0 * PI * self.freq * t).sin() * envelope * self.amplitude)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples.saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / self.sample_rate as f32,
        ))
    }
}
