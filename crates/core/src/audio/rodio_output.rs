//! Sound-card output through rodio.

use std::{collections::BTreeMap, time::Duration};

use rodio::{OutputStream, OutputStreamHandle, Sink};

use crate::{
    audio::{
        context::{ContextState, OutputContext, VoiceId},
        synth::Voice,
    },
    DogDoorError, Result,
};

/// Streams a [`Voice`] to rodio as mono `f32` samples.
#[derive(Debug)]
pub struct VoiceSource {
    voice: Voice,
}

impl VoiceSource {
    pub fn new(voice: Voice) -> Self {
        Self { voice }
    }
}

impl Iterator for VoiceSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.voice.is_finished() {
            return None;
        }
        Some(self.voice.next_sample())
    }
}

impl rodio::Source for VoiceSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.voice.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(self.voice.duration()))
    }
}

/// Output context backed by the default audio device. One sink per voice so
/// each can be cut on its own.
pub struct RodioContext {
    state: ContextState,
    sample_rate: u32,
    master_gain: f32,
    /// Dropping the stream silences every sink, so it lives as long as the
    /// context is open.
    stream: Option<(OutputStream, OutputStreamHandle)>,
    sinks: BTreeMap<VoiceId, Sink>,
    next_id: u64,
}

impl RodioContext {
    /// A suspended context. The device is opened on the first resume.
    pub fn new(sample_rate: u32, master_gain: f32) -> Self {
        Self {
            state: ContextState::Suspended,
            sample_rate: sample_rate.max(1),
            master_gain,
            stream: None,
            sinks: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn live_voices(&self) -> usize {
        self.sinks.values().filter(|sink| !sink.empty()).count()
    }
}

impl OutputContext for RodioContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(DogDoorError::AudioResume("context is closed".into())),
            ContextState::Suspended => {
                let stream = OutputStream::try_default().map_err(|err| {
                    DogDoorError::AudioResume(format!("no audio output device: {err}"))
                })?;
                self.stream = Some(stream);
                self.state = ContextState::Running;
                tracing::info!(sample_rate = self.sample_rate, "audio device opened");
                Ok(())
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start_voice(&mut self, voice: Voice) -> Result<VoiceId> {
        let handle = match (&self.state, &self.stream) {
            (ContextState::Running, Some((_, handle))) => handle,
            (state, _) => {
                return Err(DogDoorError::Audio(format!(
                    "cannot start a voice while {state:?}"
                )))
            }
        };
        let sink = Sink::try_new(handle)
            .map_err(|err| DogDoorError::Audio(format!("failed to create sink: {err}")))?;
        sink.set_volume(self.master_gain);
        sink.append(VoiceSource::new(voice));

        self.sinks.retain(|_, sink| !sink.empty());
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.sinks.insert(id, sink);
        Ok(id)
    }

    fn stop_voice(&mut self, id: VoiceId) -> Result<()> {
        match self.sinks.remove(&id) {
            Some(sink) if !sink.empty() => {
                sink.stop();
                Ok(())
            }
            _ => Err(DogDoorError::Cleanup(format!(
                "voice {} already finished",
                id.0
            ))),
        }
    }

    fn stop_all(&mut self) -> Result<usize> {
        let mut stopped = 0;
        for sink in std::mem::take(&mut self.sinks).into_values() {
            if !sink.empty() {
                stopped += 1;
            }
            sink.stop();
        }
        Ok(stopped)
    }

    fn close(&mut self) -> Result<()> {
        self.stop_all()?;
        self.stream = None;
        self.state = ContextState::Closed;
        Ok(())
    }
}

impl std::fmt::Debug for RodioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioContext")
            .field("state", &self.state)
            .field("sample_rate", &self.sample_rate)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};
    use rodio::Source as _;

    use super::*;
    use crate::audio::synth::footstep;

    #[test]
    fn voice_source_is_mono_and_ends_with_the_voice() {
        let voice = footstep(&mut StdRng::seed_from_u64(3), 8_000);
        let expected = voice.clone().render();
        let source = VoiceSource::new(voice);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), 8_000);

        let streamed: Vec<f32> = source.collect();
        assert_eq!(streamed, expected);
    }

    #[test]
    fn suspended_context_refuses_voices() {
        let mut context = RodioContext::new(48_000, 0.5);
        let voice = footstep(&mut StdRng::seed_from_u64(3), 48_000);
        assert!(matches!(
            context.start_voice(voice),
            Err(DogDoorError::Audio(_))
        ));
    }

    #[test]
    fn plays_and_stops_on_a_real_device() {
        let mut context = RodioContext::new(48_000, 0.5);
        // Machines without an output device stay suspended.
        if context.resume().is_err() {
            assert_eq!(context.state(), ContextState::Suspended);
            return;
        }
        let id = context
            .start_voice(footstep(&mut StdRng::seed_from_u64(3), 48_000))
            .unwrap();
        context.stop_voice(id).unwrap();
        assert!(context.stop_voice(id).is_err());

        context
            .start_voice(footstep(&mut StdRng::seed_from_u64(4), 48_000))
            .unwrap();
        context.close().unwrap();
        assert_eq!(context.live_voices(), 0);
        assert_eq!(context.state(), ContextState::Closed);
        assert!(context.resume().is_err());
    }
}
