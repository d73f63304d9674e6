use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{DogDoorError, Result};

const ONSET_GAIN: f32 = 12.0;
const ONSET_THRESHOLD: f32 = 0.6;
const MIN_ONSET_INTERVAL: f32 = 0.2;
const MAX_ONSET_HISTORY: usize = 64;

/// Loudness and brightness of one rendered cue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueProfile {
    pub duration_seconds: f32,
    pub peak: f32,
    pub rms: f32,
    /// Magnitude-weighted mean frequency of the Hann-windowed spectrum.
    pub spectral_centroid_hz: f32,
}

/// Spectral analysis of finished cues. Keeps its FFT plan between calls so
/// repeated clips of the same length do not re-plan.
pub struct CueAnalyser {
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl Default for CueAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl CueAnalyser {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn analyse(&mut self, samples: &[f32], sample_rate: u32) -> Result<CueProfile> {
        if samples.len() < 2 {
            return Err(DogDoorError::InvalidInput(
                "cue analysis requires at least two samples",
            ));
        }
        if sample_rate == 0 {
            return Err(DogDoorError::InvalidInput("sample rate must be positive"));
        }

        Ok(CueProfile {
            duration_seconds: samples.len() as f32 / sample_rate as f32,
            peak: samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs())),
            rms: compute_rms(samples),
            spectral_centroid_hz: self.spectral_centroid(samples, sample_rate)?,
        })
    }

    fn spectral_centroid(&mut self, samples: &[f32], sample_rate: u32) -> Result<f32> {
        let len = samples.len();
        let fft = self.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let bin_hz = sample_rate as f32 / len as f32;
        let (weighted_sum, magnitude_sum) = fft.spectrum.iter().enumerate().fold(
            (0.0_f32, 0.0_f32),
            |(weighted, total), (i, bin)| {
                let magnitude = bin.norm();
                (weighted + magnitude * i as f32 * bin_hz, total + magnitude)
            },
        );

        if magnitude_sum <= f32::EPSILON {
            Ok(0.0)
        } else {
            Ok(weighted_sum / magnitude_sum)
        }
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        if self.fft.as_ref().is_some_and(|fft| fft.size != size) {
            self.fft = None;
        }
        let planner = &mut self.planner;
        self.fft.get_or_insert_with(|| {
            let plan = planner.plan_fft_forward(size);
            FftResources {
                size,
                scratch: plan.make_scratch_vec(),
                spectrum: plan.make_output_vec(),
                input: plan.make_input_vec(),
                plan,
            }
        })
    }
}

/// One-off [`CueAnalyser::analyse`].
pub fn analyse_cue(samples: &[f32], sample_rate: u32) -> Result<CueProfile> {
    CueAnalyser::new().analyse(samples, sample_rate)
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for CueAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CueAnalyser")
            .field("fft_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

/// Detects percussive onsets in a mixed stream from block-to-block rises in
/// RMS energy. Used to check the footstep cadence of a rendered session.
#[derive(Debug, Clone)]
pub struct OnsetTracker {
    sample_rate: u32,
    processed_samples: usize,
    last_rms: f32,
    onsets: Vec<f32>,
}

impl OnsetTracker {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            processed_samples: 0,
            last_rms: 0.0,
            onsets: Vec::new(),
        }
    }

    /// Consumes the next block. Returns the block's midpoint time when it
    /// starts a new onset.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<Option<f32>> {
        if samples.is_empty() {
            return Err(DogDoorError::InvalidInput(
                "onset tracking requires at least one sample",
            ));
        }

        let sample_rate = self.sample_rate as f32;
        let start = self.processed_samples as f32 / sample_rate;
        let end = (self.processed_samples + samples.len()) as f32 / sample_rate;
        self.processed_samples += samples.len();
        let timestamp = (start + end) * 0.5;

        let rms = compute_rms(samples);
        let rise = (rms - self.last_rms).max(0.0);
        self.last_rms = rms;
        let confidence = (rise * ONSET_GAIN).clamp(0.0, 1.0);

        let spaced = self
            .onsets
            .last()
            .map_or(true, |last| timestamp - last >= MIN_ONSET_INTERVAL);
        if confidence < ONSET_THRESHOLD || !spaced {
            return Ok(None);
        }

        self.onsets.push(timestamp);
        if self.onsets.len() > MAX_ONSET_HISTORY {
            let overflow = self.onsets.len() - MAX_ONSET_HISTORY;
            self.onsets.drain(0..overflow);
        }
        Ok(Some(timestamp))
    }

    pub fn onsets(&self) -> &[f32] {
        &self.onsets
    }

    /// Mean spacing of consecutive onsets no further apart than `max_gap`,
    /// which keeps the pauses between walking windows out of the estimate.
    pub fn mean_interval(&self, max_gap: f32) -> Option<f32> {
        let intervals: Vec<f32> = self
            .onsets
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|interval| *interval > f32::EPSILON && *interval <= max_gap)
            .collect();
        if intervals.is_empty() {
            return None;
        }
        Some(intervals.iter().sum::<f32>() / intervals.len() as f32)
    }
}

pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
