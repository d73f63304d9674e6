//! The animation director: one clock fanned out to the dog, the door and the
//! sound cues.

use serde::{Deserialize, Serialize};

use crate::{
    actors::{DogRig, DoorRig},
    audio::SoundCues,
    config::ResumePolicy,
    timeline::{ClockReading, LoopClock, PhaseWindow, OPENING_START, RETURN_START},
};

/// Explicit loop state. Each tick maps the sampled window onto a stage and
/// runs the entry action only when the stage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Before the first tick of a loop, after a reset, or while paused.
    Idle,
    Approaching,
    AtDoor,
    Opening,
    Holding,
    Returning,
}

impl Stage {
    pub fn for_window(window: PhaseWindow) -> Self {
        match window {
            PhaseWindow::Approach => Self::Approaching,
            PhaseWindow::Arrival => Self::AtDoor,
            PhaseWindow::Opening => Self::Opening,
            PhaseWindow::Hold => Self::Holding,
            PhaseWindow::Return => Self::Returning,
        }
    }

    /// Whether the footstep loop should be sounding in this stage.
    pub fn is_walking(self) -> bool {
        matches!(self, Self::Approaching | Self::Returning)
    }
}

/// What a single [`AnimationDirector::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Playback is off; nothing moved and all sound was cut.
    Paused,
    /// The loop completed and was re-based. Actors were not updated.
    Reset,
    Advanced {
        elapsed: f32,
        phase: f32,
        window: PhaseWindow,
        /// The door cue fired on this tick.
        door_cue: bool,
    },
}

/// Single authority for loop time. Owns both actors and the sound cues.
pub struct AnimationDirector {
    clock: LoopClock,
    stage: Stage,
    playing: bool,
    resume: ResumePolicy,
    previous_elapsed: f32,
    door_cue_fired: bool,
    dog: DogRig,
    door: DoorRig,
    audio: Box<dyn SoundCues>,
}

impl AnimationDirector {
    /// A director that starts playing on its first tick.
    pub fn new(dog: DogRig, door: DoorRig, audio: Box<dyn SoundCues>, resume: ResumePolicy) -> Self {
        Self {
            clock: LoopClock::new(),
            stage: Stage::Idle,
            playing: true,
            resume,
            previous_elapsed: 0.0,
            door_cue_fired: false,
            dog,
            door,
            audio,
        }
    }

    pub fn dog(&self) -> &DogRig {
        &self.dog
    }

    pub fn door(&self) -> &DoorRig {
        &self.door
    }

    /// Both actors, for resource upload and release by the host.
    pub fn cast_mut(&mut self) -> (&mut DogRig, &mut DoorRig) {
        (&mut self.dog, &mut self.door)
    }

    pub fn audio(&self) -> &dyn SoundCues {
        self.audio.as_ref()
    }

    pub fn audio_mut(&mut self) -> &mut dyn SoundCues {
        self.audio.as_mut()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn clock(&self) -> &LoopClock {
        &self.clock
    }

    /// Toggles playback. Turning it off cuts all sound at once and freezes
    /// the pose. Turning it on continues from the existing baseline unless
    /// the resume policy asks for a fresh loop.
    pub fn set_playing(&mut self, now: f64, playing: bool) {
        if playing == self.playing {
            return;
        }
        self.playing = playing;

        if !playing {
            self.audio.stop_all();
            self.stage = Stage::Idle;
            tracing::debug!("playback paused");
            return;
        }

        if self.resume == ResumePolicy::Restart {
            self.clock.rebase(now);
            self.restart_loop();
        }
        tracing::debug!(policy = ?self.resume, "playback resumed");
    }

    /// Advances one rendered frame. Audio failures are logged here and never
    /// leave this call.
    pub fn tick(&mut self, now: f64) -> TickOutcome {
        if !self.playing {
            self.audio.stop_all();
            return TickOutcome::Paused;
        }

        let (elapsed, phase) = match self.clock.read(now) {
            ClockReading::Wrapped => {
                self.restart_loop();
                tracing::info!(now, "loop reset");
                return TickOutcome::Reset;
            }
            ClockReading::Running { elapsed, phase } => (elapsed, phase),
        };
        let Some(window) = PhaseWindow::at(elapsed) else {
            return TickOutcome::Reset;
        };

        let stage = Stage::for_window(window);
        if stage != self.stage {
            tracing::debug!(from = ?self.stage, to = ?stage, elapsed, "stage change");
            self.enter(now, stage);
        }

        let door_cue = self.previous_elapsed < OPENING_START
            && elapsed >= OPENING_START
            && elapsed < RETURN_START
            && !self.door_cue_fired;
        if door_cue {
            self.door_cue_fired = true;
            if let Err(err) = self.audio.play_one_shot_cue(now) {
                tracing::warn!(%err, "door cue failed");
            }
        }
        self.previous_elapsed = elapsed;

        self.dog.update_pose(now, elapsed, phase);
        self.door.update_rotation(elapsed);

        TickOutcome::Advanced {
            elapsed,
            phase,
            window,
            door_cue,
        }
    }

    fn enter(&mut self, now: f64, stage: Stage) {
        self.stage = stage;
        if stage.is_walking() {
            if let Err(err) = self.audio.start_loop_cue(now) {
                tracing::warn!(%err, "footstep loop failed to start");
            }
        } else {
            self.audio.stop_loop_cue();
        }
    }

    /// Clears per-loop state. The clock must already be re-based.
    fn restart_loop(&mut self) {
        self.previous_elapsed = 0.0;
        self.door_cue_fired = false;
        self.stage = Stage::Idle;
        self.audio.stop_loop_cue();
        self.door.close();
    }
}

impl std::fmt::Debug for AnimationDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationDirector")
            .field("clock", &self.clock)
            .field("stage", &self.stage)
            .field("playing", &self.playing)
            .field("resume", &self.resume)
            .field("door_cue_fired", &self.door_cue_fired)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{actors::OPEN_YAW, audio::CueCounters, timeline::LOOP_DURATION, DogDoorError, Result};

    #[derive(Debug, Default)]
    struct Calls {
        loop_starts: u64,
        loop_stops: u64,
        one_shots: u64,
        stop_alls: u64,
        looping: bool,
    }

    /// Records every call instead of making sound.
    #[derive(Clone, Default)]
    struct CountingCues(Rc<RefCell<Calls>>);

    impl SoundCues for CountingCues {
        fn start_loop_cue(&mut self, _now: f64) -> Result<()> {
            let mut calls = self.0.borrow_mut();
            if !calls.looping {
                calls.looping = true;
                calls.loop_starts += 1;
            }
            Ok(())
        }

        fn stop_loop_cue(&mut self) {
            let mut calls = self.0.borrow_mut();
            calls.looping = false;
            calls.loop_stops += 1;
        }

        fn play_one_shot_cue(&mut self, _now: f64) -> Result<()> {
            self.0.borrow_mut().one_shots += 1;
            Ok(())
        }

        fn stop_all(&mut self) {
            let mut calls = self.0.borrow_mut();
            calls.looping = false;
            calls.stop_alls += 1;
        }

        fn pump(&mut self, _now: f64) -> Result<()> {
            Ok(())
        }

        fn is_loop_cue_playing(&self) -> bool {
            self.0.borrow().looping
        }

        fn live_voices(&self) -> usize {
            0
        }

        fn counters(&self) -> CueCounters {
            let calls = self.0.borrow();
            CueCounters {
                loop_starts: calls.loop_starts,
                footsteps: calls.loop_starts,
                one_shots: calls.one_shots,
            }
        }

        fn shutdown(&mut self) -> Vec<DogDoorError> {
            Vec::new()
        }
    }

    fn director(resume: ResumePolicy) -> (AnimationDirector, CountingCues) {
        let cues = CountingCues::default();
        let director = AnimationDirector::new(
            DogRig::spawn(),
            DoorRig::spawn(),
            Box::new(cues.clone()),
            resume,
        );
        (director, cues)
    }

    /// Ticks every 16 ms from `from` up to (not including) `to`.
    fn run(director: &mut AnimationDirector, from: f64, to: f64) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        let mut now = from;
        while now < to {
            outcomes.push(director.tick(now));
            now += 0.016;
        }
        outcomes
    }

    #[test]
    fn one_second_in_the_dog_is_halfway_and_walking() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        director.tick(100.0);
        let outcome = director.tick(101.0);

        assert!(matches!(
            outcome,
            TickOutcome::Advanced { window: PhaseWindow::Approach, .. }
        ));
        assert!((director.dog().position().x - -0.5).abs() < 1e-4);
        assert!(cues.is_loop_cue_playing());
        assert_eq!(director.door().yaw(), 0.0);
        assert_eq!(director.stage(), Stage::Approaching);
    }

    #[test]
    fn door_cue_fires_once_per_loop_at_frame_rate() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        let outcomes = run(&mut director, 0.0, 3.5);
        assert_eq!(cues.0.borrow().one_shots, 1);
        let fired = outcomes
            .iter()
            .filter(|o| matches!(o, TickOutcome::Advanced { door_cue: true, .. }))
            .count();
        assert_eq!(fired, 1);

        run(&mut director, 3.5, 7.0 * 3.0);
        assert_eq!(cues.0.borrow().one_shots, 3);
    }

    #[test]
    fn footstep_loop_follows_walking_windows() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        director.tick(0.0);
        assert!(cues.is_loop_cue_playing());
        director.tick(2.5);
        assert!(!cues.is_loop_cue_playing());
        assert_eq!(cues.0.borrow().loop_stops, 1);
        director.tick(4.5);
        assert!(!cues.is_loop_cue_playing());
        director.tick(5.5);
        assert!(cues.is_loop_cue_playing());
        assert_eq!(cues.0.borrow().loop_starts, 2);
    }

    #[test]
    fn ticks_never_see_a_full_loop() {
        let (mut director, _cues) = director(ResumePolicy::KeepBaseline);
        let outcomes = run(&mut director, 50.0, 50.0 + 30.0);
        let mut resets = 0;
        for outcome in outcomes {
            match outcome {
                TickOutcome::Advanced { elapsed, phase, .. } => {
                    assert!(elapsed < LOOP_DURATION);
                    assert!(phase < 1.0);
                }
                TickOutcome::Reset => resets += 1,
                TickOutcome::Paused => unreachable!(),
            }
        }
        assert_eq!(resets, 4);
    }

    #[test]
    fn reset_closes_the_door_and_stops_the_loop() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        director.tick(0.0);
        director.tick(6.0);
        assert!(director.door().yaw() > 0.0);
        assert_eq!(director.tick(7.0), TickOutcome::Reset);
        assert_eq!(director.door().yaw(), 0.0);
        assert!(!cues.is_loop_cue_playing());
        assert_eq!(director.stage(), Stage::Idle);
        // The actor keeps its last pose on the reset frame.
        let before = director.dog().position();
        director.tick(7.0);
        assert!((director.dog().position() - before).length() > 0.1);
    }

    #[test]
    fn pausing_mid_opening_freezes_and_silences() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        run(&mut director, 0.0, 3.4);
        let yaw = director.door().yaw();
        let position = director.dog().position();
        assert!(yaw > 0.0);

        director.set_playing(3.4, false);
        assert!(cues.0.borrow().stop_alls >= 1);
        for outcome in run(&mut director, 3.4, 4.8) {
            assert_eq!(outcome, TickOutcome::Paused);
        }
        assert_eq!(director.door().yaw(), yaw);
        assert_eq!(director.dog().position(), position);
        assert!(!cues.is_loop_cue_playing());

        director.set_playing(4.8, true);
        director.tick(4.8);
        assert_eq!(director.door().yaw(), OPEN_YAW);
        assert_eq!(cues.0.borrow().one_shots, 1);
    }

    #[test]
    fn resuming_mid_walk_restarts_footsteps() {
        let (mut director, cues) = director(ResumePolicy::KeepBaseline);
        director.tick(0.0);
        director.set_playing(0.5, false);
        director.tick(0.6);
        assert!(!cues.is_loop_cue_playing());
        director.set_playing(0.7, true);
        director.tick(0.8);
        assert!(cues.is_loop_cue_playing());
    }

    #[test]
    fn restart_policy_begins_a_fresh_loop() {
        let (mut director, _cues) = director(ResumePolicy::Restart);
        director.tick(10.0);
        director.tick(14.5);
        assert!(director.door().yaw() > 0.0);

        director.set_playing(14.5, false);
        director.set_playing(20.0, true);
        assert_eq!(director.door().yaw(), 0.0);
        match director.tick(20.5) {
            TickOutcome::Advanced { elapsed, window, .. } => {
                assert!((elapsed - 0.5).abs() < 1e-5);
                assert_eq!(window, PhaseWindow::Approach);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn keep_baseline_counts_paused_time() {
        let (mut director, _cues) = director(ResumePolicy::KeepBaseline);
        director.tick(10.0);
        director.set_playing(11.0, false);
        director.set_playing(13.0, true);
        match director.tick(13.0) {
            TickOutcome::Advanced { window, .. } => assert_eq!(window, PhaseWindow::Opening),
            other => panic!("unexpected {other:?}"),
        }
    }
}
