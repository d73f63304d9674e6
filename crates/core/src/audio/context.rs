use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{audio::synth::Voice, DogDoorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet allowed to play (autoplay policy).
    Suspended,
    Running,
    Closed,
}

/// Handle to a voice playing on an [`OutputContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

/// The audio output graph a cue engine plays into. One per session.
pub trait OutputContext {
    fn state(&self) -> ContextState;
    /// Leaves the suspended state. Fails while no user gesture has happened.
    fn resume(&mut self) -> Result<()>;
    fn sample_rate(&self) -> u32;
    fn start_voice(&mut self, voice: Voice) -> Result<VoiceId>;
    /// Hard-stops a voice. Fails if it already finished on its own.
    fn stop_voice(&mut self, id: VoiceId) -> Result<()>;
    /// Hard-stops every voice the output still holds, tracked or not.
    /// Returns how many were cut.
    fn stop_all(&mut self) -> Result<usize>;
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct Mixer {
    state: ContextState,
    sample_rate: u32,
    master_gain: f32,
    gesture_granted: bool,
    voices: BTreeMap<VoiceId, Voice>,
    next_id: u64,
    voices_started: u64,
}

/// Output context that mixes voices into memory instead of a sound card.
///
/// The mixer lives behind a shared lock so a [`MixTap`] can pull rendered
/// blocks while the cue engine owns the context itself.
#[derive(Debug)]
pub struct OfflineContext {
    shared: Arc<Mutex<Mixer>>,
}

impl OfflineContext {
    /// A suspended context that resumes on the first request.
    pub fn new(sample_rate: u32, master_gain: f32) -> Self {
        Self::build(sample_rate, master_gain, true)
    }

    /// A suspended context whose resume fails until
    /// [`MixTap::grant_gesture`] is called.
    pub fn awaiting_gesture(sample_rate: u32, master_gain: f32) -> Self {
        Self::build(sample_rate, master_gain, false)
    }

    fn build(sample_rate: u32, master_gain: f32, gesture_granted: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Mixer {
                state: ContextState::Suspended,
                sample_rate: sample_rate.max(1),
                master_gain,
                gesture_granted,
                voices: BTreeMap::new(),
                next_id: 0,
                voices_started: 0,
            })),
        }
    }

    pub fn tap(&self) -> MixTap {
        MixTap {
            shared: self.shared.clone(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Mixer>> {
        lock_mixer(&self.shared)
    }
}

fn lock_mixer(shared: &Mutex<Mixer>) -> Result<MutexGuard<'_, Mixer>> {
    shared
        .lock()
        .map_err(|_| DogDoorError::Audio("offline mixer has been poisoned".into()))
}

impl OutputContext for OfflineContext {
    fn state(&self) -> ContextState {
        self.lock()
            .map(|mixer| mixer.state)
            .unwrap_or(ContextState::Closed)
    }

    fn resume(&mut self) -> Result<()> {
        let mut mixer = self.lock()?;
        let state = mixer.state;
        match state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(DogDoorError::AudioResume("context is closed".into())),
            ContextState::Suspended if mixer.gesture_granted => {
                mixer.state = ContextState::Running;
                Ok(())
            }
            ContextState::Suspended => Err(DogDoorError::AudioResume(
                "waiting for a user gesture".into(),
            )),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.lock().map(|mixer| mixer.sample_rate).unwrap_or(1)
    }

    fn start_voice(&mut self, voice: Voice) -> Result<VoiceId> {
        let mut mixer = self.lock()?;
        let state = mixer.state;
        if state != ContextState::Running {
            return Err(DogDoorError::Audio(format!(
                "cannot start a voice while {state:?}"
            )));
        }
        let id = VoiceId(mixer.next_id);
        mixer.next_id += 1;
        mixer.voices_started += 1;
        mixer.voices.insert(id, voice);
        Ok(id)
    }

    fn stop_voice(&mut self, id: VoiceId) -> Result<()> {
        let mut mixer = self.lock()?;
        mixer
            .voices
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DogDoorError::Cleanup(format!("voice {} already finished", id.0)))
    }

    fn stop_all(&mut self) -> Result<usize> {
        let mut mixer = self.lock()?;
        let stopped = mixer.voices.len();
        mixer.voices.clear();
        Ok(stopped)
    }

    fn close(&mut self) -> Result<()> {
        let mut mixer = self.lock()?;
        mixer.state = ContextState::Closed;
        mixer.voices.clear();
        Ok(())
    }
}

/// Read side of an [`OfflineContext`].
#[derive(Clone)]
pub struct MixTap {
    shared: Arc<Mutex<Mixer>>,
}

impl MixTap {
    /// Mixes the next `frames` samples. A context that is not running is
    /// silent and does not advance its voices.
    pub fn render(&self, frames: usize) -> Result<Vec<f32>> {
        let mut mixer = lock_mixer(&self.shared)?;
        let mut out = vec![0.0; frames];
        if mixer.state != ContextState::Running {
            return Ok(out);
        }

        let gain = mixer.master_gain;
        for voice in mixer.voices.values_mut() {
            for sample in out.iter_mut() {
                if voice.is_finished() {
                    break;
                }
                *sample += voice.next_sample() * gain;
            }
        }
        mixer.voices.retain(|_, voice| !voice.is_finished());
        Ok(out)
    }

    pub fn state(&self) -> Result<ContextState> {
        Ok(lock_mixer(&self.shared)?.state)
    }

    /// Voices still sounding in the mixer.
    pub fn live_voices(&self) -> Result<usize> {
        Ok(lock_mixer(&self.shared)?.voices.len())
    }

    pub fn voices_started(&self) -> Result<u64> {
        Ok(lock_mixer(&self.shared)?.voices_started)
    }

    /// Simulates the click that lets a suspended context resume.
    pub fn grant_gesture(&self) -> Result<()> {
        lock_mixer(&self.shared)?.gesture_granted = true;
        Ok(())
    }
}

impl std::fmt::Debug for MixTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixTap").finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::audio::synth::footstep;

    #[test]
    fn suspended_context_refuses_voices_until_resumed() {
        let mut context = OfflineContext::new(8_000, 1.0);
        let voice = footstep(&mut StdRng::seed_from_u64(1), 8_000);
        assert!(context.start_voice(voice.clone()).is_err());

        context.resume().unwrap();
        assert_eq!(context.state(), ContextState::Running);
        context.start_voice(voice).unwrap();
        assert_eq!(context.tap().voices_started().unwrap(), 1);
    }

    #[test]
    fn gesture_gate_blocks_resume() {
        let mut context = OfflineContext::awaiting_gesture(8_000, 1.0);
        assert!(matches!(
            context.resume(),
            Err(DogDoorError::AudioResume(_))
        ));
        context.tap().grant_gesture().unwrap();
        context.resume().unwrap();
    }

    #[test]
    fn finished_voices_leave_the_mixer() {
        let mut context = OfflineContext::new(8_000, 1.0);
        context.resume().unwrap();
        let tap = context.tap();
        let id = context
            .start_voice(footstep(&mut StdRng::seed_from_u64(1), 8_000))
            .unwrap();

        let block = tap.render(800).unwrap();
        assert!(block.iter().any(|s| s.abs() > 0.01));
        assert_eq!(tap.live_voices().unwrap(), 1);

        tap.render(1_000).unwrap();
        assert_eq!(tap.live_voices().unwrap(), 0);
        assert!(matches!(
            context.stop_voice(id),
            Err(DogDoorError::Cleanup(_))
        ));
    }

    #[test]
    fn stop_all_cuts_voices_nobody_tracks() {
        let mut context = OfflineContext::new(8_000, 1.0);
        context.resume().unwrap();
        let tap = context.tap();
        for seed in 0..3 {
            context
                .start_voice(footstep(&mut StdRng::seed_from_u64(seed), 8_000))
                .unwrap();
        }
        assert_eq!(context.stop_all().unwrap(), 3);
        assert_eq!(tap.live_voices().unwrap(), 0);
        assert!(tap.render(64).unwrap().iter().all(|s| *s == 0.0));
        assert_eq!(context.stop_all().unwrap(), 0);
    }

    #[test]
    fn close_silences_everything() {
        let mut context = OfflineContext::new(8_000, 1.0);
        context.resume().unwrap();
        context
            .start_voice(footstep(&mut StdRng::seed_from_u64(1), 8_000))
            .unwrap();
        context.close().unwrap();
        context.close().unwrap();

        let tap = context.tap();
        assert_eq!(tap.live_voices().unwrap(), 0);
        assert!(tap.render(64).unwrap().iter().all(|s| *s == 0.0));
        assert!(context.resume().is_err());
    }
}
