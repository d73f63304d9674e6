use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand, ValueEnum};
use dogdoor_core::{
    audio::{CueSource, Synthesized},
    AppConfig, CueAnalyser, DogDoorError, FrameSample, HeadlessRenderer, MixTap, OfflineContext,
    OnsetTracker, ProceduralAudio, SceneHost, SoundCues, TraceRecorder, Viewport,
};
use tracing_subscriber::EnvFilter;

fn main() -> dogdoor_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            seconds,
            fps,
            config,
            trace,
            pause_at,
            resume_at,
            speakers,
        } => {
            let config = match config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            let toggle = pause_at.map(|pause| (pause, resume_at.unwrap_or(f64::INFINITY)));
            run_simulate(&config, seconds, fps, trace.as_deref(), toggle, speakers)
        }
        Commands::Audition { cue, sample_rate } => run_audition(cue, sample_rate),
        Commands::Config => {
            println!("{}", AppConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn run_simulate(
    config: &AppConfig,
    seconds: f64,
    fps: u32,
    trace: Option<&Path>,
    toggle: Option<(f64, f64)>,
    speakers: bool,
) -> dogdoor_core::Result<()> {
    if fps == 0 || seconds <= 0.0 {
        return Err(DogDoorError::InvalidInput(
            "simulation needs a positive duration and frame rate",
        ));
    }
    tracing::info!(seconds, fps, speakers, "starting headless simulation");

    let sample_rate = config.audio.sample_rate;
    let (audio, tap) = open_output(config, speakers)?;
    let mut host = SceneHost::mount(
        config,
        HeadlessRenderer::new(),
        Viewport::new(config.viewport.width, config.viewport.height),
        audio,
    )?;

    let mut recorder = TraceRecorder::new();
    if trace.is_some() {
        recorder.start();
    }
    let mut onsets = OnsetTracker::new(sample_rate);

    let frame_time = 1.0 / f64::from(fps);
    let block = (f64::from(sample_rate) * frame_time).round().max(1.0) as usize;
    let frames = (seconds * f64::from(fps)).ceil() as u64;
    let mut paused = false;

    for frame in 0..frames {
        let now = frame as f64 * frame_time;
        if let Some((pause, resume)) = toggle {
            let should_pause = now >= pause && now < resume;
            if should_pause != paused {
                paused = should_pause;
                tracing::info!(now, playing = !paused, "toggling playback");
                host.set_playing(now, !paused);
            }
        }

        let outcome = host.frame(now)?;
        recorder.push(FrameSample::capture(now, &outcome, host.director()));
        match &tap {
            Some(tap) => {
                onsets.process_block(&tap.render(block)?)?;
            }
            // The device plays in real time, so the clock has to as well.
            None => thread::sleep(Duration::from_secs_f64(frame_time)),
        }
    }

    let counters = host.director().audio().counters();
    let summary = serde_json::json!({
        "frames": frames,
        "frames_drawn": host.renderer().frames_drawn(),
        "loops_started": counters.loop_starts,
        "footsteps": counters.footsteps,
        "door_cues": counters.one_shots,
        "detected_onsets": onsets.onsets().len(),
        "footstep_interval_seconds": onsets.mean_interval(0.6),
        "final_stage": host.director().stage(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = trace {
        recorder.write_json(path)?;
        tracing::info!(?path, samples = recorder.samples().len(), "trace written");
    }

    for warning in host.unmount() {
        tracing::warn!(%warning, "teardown");
    }
    Ok(())
}

/// Offline mixing returns a tap to analyse; speaker output has none.
fn open_output(
    config: &AppConfig,
    speakers: bool,
) -> dogdoor_core::Result<(Box<dyn SoundCues>, Option<MixTap>)> {
    if speakers {
        return speaker_output(config).map(|audio| (audio, None));
    }
    let context = OfflineContext::new(config.audio.sample_rate, config.audio.master_gain);
    let tap = context.tap();
    Ok((
        Box::new(ProceduralAudio::procedural(context, &config.audio)),
        Some(tap),
    ))
}

#[cfg(feature = "rodio")]
fn speaker_output(config: &AppConfig) -> dogdoor_core::Result<Box<dyn SoundCues>> {
    let context =
        dogdoor_core::RodioContext::new(config.audio.sample_rate, config.audio.master_gain);
    Ok(Box::new(ProceduralAudio::procedural(context, &config.audio)))
}

#[cfg(not(feature = "rodio"))]
fn speaker_output(_config: &AppConfig) -> dogdoor_core::Result<Box<dyn SoundCues>> {
    Err(DogDoorError::InvalidInput(
        "speaker output needs a build with the `rodio` feature",
    ))
}

fn run_audition(cue: Cue, sample_rate: u32) -> dogdoor_core::Result<()> {
    tracing::info!(?cue, sample_rate, "rendering cue");
    let mut source = Synthesized::new(0x5eed);
    let voice = match cue {
        Cue::Footstep => source.loop_voice(sample_rate),
        Cue::Door => source.one_shot_voice(sample_rate),
    };
    let samples = voice.render();
    let profile = CueAnalyser::new().analyse(&samples, sample_rate)?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Dog-and-door vignette driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scene headless on a simulated clock and report what played.
    Simulate {
        /// Length of the run in seconds.
        #[arg(short, long, default_value_t = 14.0)]
        seconds: f64,
        /// Simulated display refresh rate.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// JSON configuration file; missing fields use defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write a per-frame JSON trace here.
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Switch playback off at this time.
        #[arg(long)]
        pause_at: Option<f64>,
        /// Switch playback back on at this time.
        #[arg(long, requires = "pause_at")]
        resume_at: Option<f64>,
        /// Play the cues on the default sound device in real time.
        #[arg(long)]
        speakers: bool,
    },
    /// Render one cue offline and print its profile.
    Audition {
        #[arg(value_enum)]
        cue: Cue,
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
    },
    /// Print the default configuration as JSON.
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Cue {
    Footstep,
    Door,
}
