//! Self-contained sound voices built from oscillators, noise buffers and gain
//! envelopes, plus the cue recipes that assemble them.

use std::{f32::consts::TAU, fmt, sync::Arc};

use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    /// `phase` is in cycles, `[0, 1)`.
    fn sample(self, phase: f32) -> f32 {
        match self {
            Self::Sine => (phase * TAU).sin(),
            Self::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Self::Sawtooth => 2.0 * phase - 1.0,
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Frequency ramp applied from the start of the voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sweep {
    Hold,
    Linear { to: f32, over: f32 },
    Exponential { to: f32, over: f32 },
}

impl Sweep {
    fn frequency(self, start: f32, t: f32) -> f32 {
        match self {
            Self::Hold => start,
            Self::Linear { to, over } => {
                let u = (t / over.max(f32::EPSILON)).clamp(0.0, 1.0);
                start + (to - start) * u
            }
            Self::Exponential { to, over } => {
                let u = (t / over.max(f32::EPSILON)).clamp(0.0, 1.0);
                start.max(f32::EPSILON) * (to.max(f32::EPSILON) / start.max(f32::EPSILON)).powf(u)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decay {
    Linear,
    Exponential,
}

/// Attack ramp from `initial` to `peak`, then a decay ramp to `floor`, then
/// silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub initial: f32,
    pub peak: f32,
    pub attack: f32,
    pub floor: f32,
    pub decay: f32,
    pub curve: Decay,
}

impl Envelope {
    /// Linear attack to `peak`, exponential decay to -60 dB at `end`.
    pub fn percussive(peak: f32, attack: f32, end: f32) -> Self {
        Self {
            initial: 0.0,
            peak,
            attack,
            floor: 0.001,
            decay: (end - attack).max(0.0),
            curve: Decay::Exponential,
        }
    }

    /// Starts at `peak` and fades linearly to zero at `end`.
    pub fn fade(peak: f32, end: f32) -> Self {
        Self {
            initial: peak,
            peak,
            attack: 0.0,
            floor: 0.0,
            decay: end,
            curve: Decay::Linear,
        }
    }

    /// Constant gain for `length` seconds.
    pub fn flat(gain: f32, length: f32) -> Self {
        Self {
            initial: gain,
            peak: gain,
            attack: 0.0,
            floor: gain,
            decay: length,
            curve: Decay::Linear,
        }
    }

    pub fn duration(&self) -> f32 {
        self.attack + self.decay
    }

    pub fn gain(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.duration() {
            return 0.0;
        }
        if t < self.attack {
            return self.initial + (self.peak - self.initial) * (t / self.attack);
        }
        let u = ((t - self.attack) / self.decay.max(f32::EPSILON)).clamp(0.0, 1.0);
        match self.curve {
            Decay::Linear => self.peak + (self.floor - self.peak) * u,
            Decay::Exponential => {
                let peak = self.peak.max(1e-4);
                peak * (self.floor.max(1e-4) / peak).powf(u)
            }
        }
    }
}

/// Signal generator feeding one layer of a voice.
#[derive(Clone)]
pub enum Source {
    Oscillator {
        waveform: Waveform,
        frequency: f32,
        sweep: Sweep,
    },
    /// Pre-computed samples at the voice's sample rate (noise or a clip).
    Buffer(Arc<[f32]>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oscillator {
                waveform,
                frequency,
                sweep,
            } => f
                .debug_struct("Oscillator")
                .field("waveform", waveform)
                .field("frequency", frequency)
                .field("sweep", sweep)
                .finish(),
            Self::Buffer(samples) => f.debug_tuple("Buffer").field(&samples.len()).finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct Layer {
    source: Source,
    envelope: Envelope,
    phase: f32,
}

impl Layer {
    fn next(&mut self, t: f32, dt: f32, index: usize) -> f32 {
        let raw = match &self.source {
            Source::Oscillator {
                waveform,
                frequency,
                sweep,
            } => {
                let value = waveform.sample(self.phase);
                self.phase = (self.phase + sweep.frequency(*frequency, t) * dt).fract();
                value
            }
            Source::Buffer(samples) => samples.get(index).copied().unwrap_or(0.0),
        };
        raw * self.envelope.gain(t)
    }
}

/// One transient sound: independent layers mixed additively. A voice owns all
/// of its state and finishes on its own once every envelope has run out.
#[derive(Debug, Clone)]
pub struct Voice {
    sample_rate: u32,
    layers: Vec<Layer>,
    cursor: usize,
}

impl Voice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            layers: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_layer(mut self, source: Source, envelope: Envelope) -> Self {
        self.layers.push(Layer {
            source,
            envelope,
            phase: 0.0,
        });
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds until the longest envelope has finished.
    pub fn duration(&self) -> f32 {
        self.layers
            .iter()
            .map(|layer| layer.envelope.duration())
            .fold(0.0, f32::max)
    }

    pub fn len_samples(&self) -> usize {
        (self.duration() * self.sample_rate as f32).ceil() as usize
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.len_samples()
    }

    pub fn next_sample(&mut self) -> f32 {
        let rate = self.sample_rate as f32;
        let index = self.cursor;
        let t = index as f32 / rate;
        let dt = 1.0 / rate;
        let mixed: f32 = self
            .layers
            .iter_mut()
            .map(|layer| layer.next(t, dt, index))
            .sum();
        self.cursor += 1;
        mixed
    }

    /// Plays the remainder of the voice into a fresh buffer.
    pub fn render(mut self) -> Vec<f32> {
        let remaining = self.len_samples().saturating_sub(self.cursor);
        (0..remaining).map(|_| self.next_sample()).collect()
    }
}

/// White noise through a one-pole low-pass.
pub fn noise_buffer<R: Rng>(rng: &mut R, sample_rate: u32, seconds: f32, cutoff_hz: f32) -> Arc<[f32]> {
    let len = (seconds * sample_rate as f32).ceil() as usize;
    let alpha = 1.0 - (-TAU * cutoff_hz / sample_rate.max(1) as f32).exp();
    let mut state = 0.0_f32;
    (0..len)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..=1.0);
            state += alpha * (white - state);
            state
        })
        .collect()
}

/// Footstep: an 80 Hz thump with a short scuff of filtered noise.
pub fn footstep<R: Rng>(rng: &mut R, sample_rate: u32) -> Voice {
    Voice::new(sample_rate)
        .with_layer(
            Source::Oscillator {
                waveform: Waveform::Sine,
                frequency: 80.0,
                sweep: Sweep::Hold,
            },
            Envelope::percussive(0.3, 0.05, 0.2),
        )
        .with_layer(
            Source::Buffer(noise_buffer(rng, sample_rate, 0.06, 600.0)),
            Envelope::percussive(0.08, 0.004, 0.06),
        )
}

/// Door creak: a falling 200→100 Hz tone, a rasping overtone and hiss.
pub fn door_creak<R: Rng>(rng: &mut R, sample_rate: u32) -> Voice {
    Voice::new(sample_rate)
        .with_layer(
            Source::Oscillator {
                waveform: Waveform::Sine,
                frequency: 200.0,
                sweep: Sweep::Exponential {
                    to: 100.0,
                    over: 0.5,
                },
            },
            Envelope::fade(0.2, 0.5),
        )
        .with_layer(
            Source::Oscillator {
                waveform: Waveform::Sawtooth,
                frequency: 410.0,
                sweep: Sweep::Exponential {
                    to: 170.0,
                    over: 0.5,
                },
            },
            Envelope::fade(0.04, 0.5),
        )
        .with_layer(
            Source::Buffer(noise_buffer(rng, sample_rate, 0.5, 1200.0)),
            Envelope::fade(0.02, 0.5),
        )
}

/// Where the engine gets its voices from.
pub trait CueSource {
    fn name(&self) -> &'static str;
    /// Voice re-triggered by the footstep loop.
    fn loop_voice(&mut self, sample_rate: u32) -> Voice;
    /// Voice played once when the door starts to open.
    fn one_shot_voice(&mut self, sample_rate: u32) -> Voice;
}

/// Synthesises every voice from scratch.
#[derive(Debug, Clone)]
pub struct Synthesized {
    rng: StdRng,
}

impl Synthesized {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl CueSource for Synthesized {
    fn name(&self) -> &'static str {
        "synthesized"
    }

    fn loop_voice(&mut self, sample_rate: u32) -> Voice {
        footstep(&mut self.rng, sample_rate)
    }

    fn one_shot_voice(&mut self, sample_rate: u32) -> Voice {
        door_creak(&mut self.rng, sample_rate)
    }
}

/// A mono PCM clip.
#[derive(Clone)]
pub struct SampleClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl fmt::Debug for SampleClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleClip")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SampleClip {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Renders `voice` once and keeps the result.
    pub fn bake(voice: Voice) -> Self {
        let sample_rate = voice.sample_rate();
        Self::new(voice.render(), sample_rate)
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Linear-interpolated copy at `sample_rate`; shares the buffer when the
    /// rates already match.
    fn samples_at(&self, sample_rate: u32) -> Arc<[f32]> {
        if sample_rate == self.sample_rate || self.samples.is_empty() {
            return self.samples.clone();
        }
        let ratio = self.sample_rate as f32 / sample_rate.max(1) as f32;
        let len = (self.duration() * sample_rate as f32).ceil() as usize;
        let last = self.samples.len() - 1;
        (0..len)
            .map(|i| {
                let pos = i as f32 * ratio;
                let index = (pos.floor() as usize).min(last);
                let next = (index + 1).min(last);
                let frac = pos - index as f32;
                self.samples[index] + (self.samples[next] - self.samples[index]) * frac
            })
            .collect()
    }

    fn voice(&self, sample_rate: u32) -> Voice {
        Voice::new(sample_rate).with_layer(
            Source::Buffer(self.samples_at(sample_rate)),
            Envelope::flat(1.0, self.duration()),
        )
    }
}

/// Plays pre-recorded clips instead of synthesising.
#[derive(Debug, Clone)]
pub struct Sampled {
    step: SampleClip,
    door: SampleClip,
}

impl Sampled {
    pub fn new(step: SampleClip, door: SampleClip) -> Self {
        Self { step, door }
    }

    /// Clips rendered once from the procedural recipes.
    pub fn baked(seed: u64, sample_rate: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            step: SampleClip::bake(footstep(&mut rng, sample_rate)),
            door: SampleClip::bake(door_creak(&mut rng, sample_rate)),
        }
    }
}

impl CueSource for Sampled {
    fn name(&self) -> &'static str {
        "sampled"
    }

    fn loop_voice(&mut self, sample_rate: u32) -> Voice {
        self.step.voice(sample_rate)
    }

    fn one_shot_voice(&mut self, sample_rate: u32) -> Voice {
        self.door.voice(sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn percussive_envelope_shape() {
        let env = Envelope::percussive(0.3, 0.05, 0.2);
        assert_eq!(env.gain(0.0), 0.0);
        assert!((env.gain(0.025) - 0.15).abs() < 1e-5);
        assert!((env.gain(0.05) - 0.3).abs() < 1e-5);
        assert!(env.gain(0.199) < 0.0012);
        assert_eq!(env.gain(0.2), 0.0);
    }

    #[test]
    fn fade_envelope_is_linear() {
        let env = Envelope::fade(0.2, 0.5);
        assert!((env.gain(0.0) - 0.2).abs() < 1e-6);
        assert!((env.gain(0.25) - 0.1).abs() < 1e-5);
        assert_eq!(env.gain(0.5), 0.0);
    }

    #[test]
    fn exponential_sweep_lands_on_target() {
        let sweep = Sweep::Exponential {
            to: 100.0,
            over: 0.5,
        };
        assert!((sweep.frequency(200.0, 0.0) - 200.0).abs() < 1e-3);
        assert!((sweep.frequency(200.0, 0.25) - 141.421).abs() < 1e-2);
        assert!((sweep.frequency(200.0, 0.9) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn footstep_is_short_and_bounded() {
        let mut rng = StdRng::seed_from_u64(1);
        let voice = footstep(&mut rng, 8_000);
        assert!((voice.duration() - 0.2).abs() < 1e-6);
        let samples = voice.render();
        assert!((1_600..=1_601).contains(&samples.len()));
        let loudest = peak(&samples);
        assert!(loudest > 0.1 && loudest <= 0.38 + 1e-3);
    }

    #[test]
    fn voice_finishes_by_itself() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut voice = door_creak(&mut rng, 1_000);
        assert_eq!(voice.len_samples(), 500);
        for _ in 0..500 {
            assert!(!voice.is_finished());
            voice.next_sample();
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn same_seed_same_noise() {
        let a = noise_buffer(&mut StdRng::seed_from_u64(9), 8_000, 0.01, 600.0);
        let b = noise_buffer(&mut StdRng::seed_from_u64(9), 8_000, 0.01, 600.0);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn clip_resamples_to_context_rate() {
        let clip = SampleClip::new(vec![0.0, 1.0, 0.0, -1.0], 4);
        assert_eq!(clip.duration(), 1.0);
        let voice = clip.voice(8);
        let samples = voice.render();
        assert_eq!(samples.len(), 8);
        assert!((samples[1] - 0.5).abs() < 1e-6);
        assert_eq!(samples[2], 1.0);
    }

    #[test]
    fn baked_clips_match_synthesis_length() {
        let mut sampled = Sampled::baked(3, 8_000);
        assert_eq!(sampled.name(), "sampled");
        assert!((sampled.loop_voice(8_000).duration() - 0.2).abs() < 1e-3);
        assert!((sampled.one_shot_voice(8_000).duration() - 0.5).abs() < 1e-3);
    }
}
