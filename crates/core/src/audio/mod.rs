//! Procedural sound cues: footstep loop and door creak.
//!
//! The director only sees the [`SoundCues`] capability. Behind it an
//! [`AudioEngine`] pairs an [`OutputContext`] (where sound goes) with a
//! [`CueSource`] (how each voice is produced), so synthesised and sampled
//! variants are interchangeable.

mod context;
#[cfg(feature = "rodio")]
mod rodio_output;
mod synth;

use std::collections::BTreeMap;

use serde::Serialize;

pub use context::{ContextState, MixTap, OfflineContext, OutputContext, VoiceId};
#[cfg(feature = "rodio")]
pub use rodio_output::{RodioContext, VoiceSource};
pub use synth::{
    door_creak, footstep, noise_buffer, CueSource, Decay, Envelope, SampleClip, Sampled, Source,
    Sweep, Synthesized, Voice, Waveform,
};

use crate::{config::AudioConfig, DogDoorError, Result};

/// Running totals of what an engine actually played.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CueCounters {
    /// Times the footstep loop went from stopped to playing.
    pub loop_starts: u64,
    pub footsteps: u64,
    pub one_shots: u64,
}

/// Sound capability driven by the animation director.
pub trait SoundCues {
    /// Starts the periodic footstep loop, firing the first step immediately.
    /// Does nothing if the loop is already playing.
    fn start_loop_cue(&mut self, now: f64) -> Result<()>;
    /// Cancels the re-trigger. Steps already sounding play out.
    fn stop_loop_cue(&mut self);
    /// Plays the door creak once.
    fn play_one_shot_cue(&mut self, now: f64) -> Result<()>;
    /// Cancels the loop and cuts every live voice.
    fn stop_all(&mut self);
    /// Advances the re-trigger timer and forgets voices that have finished.
    fn pump(&mut self, now: f64) -> Result<()>;
    fn is_loop_cue_playing(&self) -> bool;
    fn live_voices(&self) -> usize;
    fn counters(&self) -> CueCounters;
    /// Stops everything and closes the output. Later calls do nothing.
    fn shutdown(&mut self) -> Vec<DogDoorError>;
}

/// Fixed-interval timer with `setInterval` semantics: missed periods are
/// coalesced into a single firing.
#[derive(Debug, Clone, Copy)]
struct RetriggerTimer {
    interval: f64,
    next_due: f64,
}

impl RetriggerTimer {
    fn new(now: f64, interval: f64) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    fn poll(&mut self, now: f64) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.interval;
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CueKind {
    Footstep,
    Door,
}

/// Cue engine over an output context and a voice source.
#[derive(Debug)]
pub struct AudioEngine<C, S> {
    context: C,
    source: S,
    interval: f64,
    timer: Option<RetriggerTimer>,
    /// Live voices and the instant each one ends on its own.
    live: BTreeMap<VoiceId, f64>,
    counters: CueCounters,
    closed: bool,
}

/// Engine that synthesises every cue from oscillators and noise.
pub type ProceduralAudio<C> = AudioEngine<C, Synthesized>;
/// Engine that plays pre-rendered clips.
pub type SampledAudio<C> = AudioEngine<C, Sampled>;

impl<C: OutputContext> ProceduralAudio<C> {
    pub fn procedural(context: C, config: &AudioConfig) -> Self {
        Self::new(context, Synthesized::new(config.noise_seed), config)
    }
}

impl<C: OutputContext, S: CueSource> AudioEngine<C, S> {
    pub fn new(context: C, source: S, config: &AudioConfig) -> Self {
        Self {
            context,
            source,
            interval: config.loop_interval_seconds(),
            timer: None,
            live: BTreeMap::new(),
            counters: CueCounters::default(),
            closed: false,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Whether sound can be heard right now. Re-attempts a resume every time
    /// the context is still suspended; a refusal is logged and leaves the cue
    /// silent.
    fn ensure_running(&mut self) -> Result<bool> {
        match self.context.state() {
            ContextState::Running => Ok(true),
            ContextState::Suspended => match self.context.resume() {
                Ok(()) => {
                    tracing::debug!("audio output resumed");
                    Ok(true)
                }
                Err(err) => {
                    tracing::warn!(%err, "audio output still suspended; cue is silent");
                    Ok(false)
                }
            },
            ContextState::Closed => Err(DogDoorError::Audio("output context is closed".into())),
        }
    }

    fn trigger(&mut self, now: f64, kind: CueKind) -> Result<()> {
        if !self.ensure_running()? {
            return Ok(());
        }
        let sample_rate = self.context.sample_rate();
        let voice = match kind {
            CueKind::Footstep => self.source.loop_voice(sample_rate),
            CueKind::Door => self.source.one_shot_voice(sample_rate),
        };
        let ends = now + f64::from(voice.duration());
        let id = self.context.start_voice(voice)?;
        self.live.insert(id, ends);

        match kind {
            CueKind::Footstep => self.counters.footsteps += 1,
            CueKind::Door => self.counters.one_shots += 1,
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DogDoorError::Audio("audio engine has been shut down".into()));
        }
        Ok(())
    }
}

impl<C: OutputContext, S: CueSource> SoundCues for AudioEngine<C, S> {
    fn start_loop_cue(&mut self, now: f64) -> Result<()> {
        self.ensure_open()?;
        if self.timer.is_some() {
            return Ok(());
        }
        self.timer = Some(RetriggerTimer::new(now, self.interval));
        self.counters.loop_starts += 1;
        self.trigger(now, CueKind::Footstep)
    }

    fn stop_loop_cue(&mut self) {
        self.timer = None;
    }

    fn play_one_shot_cue(&mut self, now: f64) -> Result<()> {
        self.ensure_open()?;
        self.trigger(now, CueKind::Door)
    }

    fn stop_all(&mut self) {
        self.timer = None;
        for id in std::mem::take(&mut self.live).into_keys() {
            if let Err(err) = self.context.stop_voice(id) {
                tracing::debug!(%err, voice = id.0, "voice already gone");
            }
        }
        match self.context.stop_all() {
            Ok(0) => {}
            Ok(stragglers) => tracing::debug!(stragglers, "cut voices past their scheduled end"),
            Err(err) => tracing::warn!(%err, "could not silence the audio output"),
        }
    }

    fn pump(&mut self, now: f64) -> Result<()> {
        self.live.retain(|_, ends| *ends > now);
        let due = self.timer.as_mut().is_some_and(|timer| timer.poll(now));
        if due {
            self.trigger(now, CueKind::Footstep)?;
        }
        Ok(())
    }

    fn is_loop_cue_playing(&self) -> bool {
        self.timer.is_some()
    }

    fn live_voices(&self) -> usize {
        self.live.len()
    }

    fn counters(&self) -> CueCounters {
        self.counters
    }

    fn shutdown(&mut self) -> Vec<DogDoorError> {
        if self.closed {
            return Vec::new();
        }
        self.stop_all();
        self.closed = true;
        match self.context.close() {
            Ok(()) => Vec::new(),
            Err(err) => vec![DogDoorError::Cleanup(format!("closing audio output: {err}"))],
        }
    }
}
