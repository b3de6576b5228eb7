use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const MASTER_GAIN: f32 = 0.25;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),
    #[error("audio output could not be resumed: {0}")]
    ResumeFailed(String),
}

/// Closed set of sound cues a script can request through `sfx:play(name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Shoot,
    Hit,
    Explosion,
    Jump,
    Collect,
    Blip,
}

impl Cue {
    pub const ALL: [Cue; 6] = [
        Cue::Shoot,
        Cue::Hit,
        Cue::Explosion,
        Cue::Jump,
        Cue::Collect,
        Cue::Blip,
    ];

    /// Unknown names fall back to [`Cue::Blip`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "shoot" | "laser" => Cue::Shoot,
            "hit" => Cue::Hit,
            "explosion" => Cue::Explosion,
            "jump" => Cue::Jump,
            "collect" | "coin" => Cue::Collect,
            _ => Cue::Blip,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Cue::Shoot => "shoot",
            Cue::Hit => "hit",
            Cue::Explosion => "explosion",
            Cue::Jump => "jump",
            Cue::Collect => "collect",
            Cue::Blip => "blip",
        }
    }

    pub fn recipe(self) -> CueRecipe {
        match self {
            Cue::Shoot => CueRecipe {
                waveform: Waveform::Triangle,
                frequency: Envelope::new(800.0, 100.0, Ramp::Exponential),
                gain: Envelope::new(0.8, 0.01, Ramp::Exponential),
                duration_seconds: 0.15,
            },
            Cue::Hit | Cue::Explosion => CueRecipe {
                waveform: Waveform::Sawtooth,
                frequency: Envelope::new(100.0, 10.0, Ramp::Exponential),
                gain: Envelope::new(1.0, 0.01, Ramp::Exponential),
                duration_seconds: 0.2,
            },
            Cue::Jump => CueRecipe {
                waveform: Waveform::Square,
                frequency: Envelope::new(150.0, 300.0, Ramp::Linear),
                gain: Envelope::new(0.5, 0.01, Ramp::Linear),
                duration_seconds: 0.1,
            },
            Cue::Collect => CueRecipe {
                waveform: Waveform::Sine,
                frequency: Envelope::new(1200.0, 1600.0, Ramp::StepAt(0.05)),
                gain: Envelope::new(0.5, 0.01, Ramp::Linear),
                duration_seconds: 0.1,
            },
            Cue::Blip => CueRecipe {
                waveform: Waveform::Sine,
                frequency: Envelope::new(440.0, 440.0, Ramp::Linear),
                gain: Envelope::new(0.1, 0.01, Ramp::Exponential),
                duration_seconds: 0.05,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// `phase` is in cycles, `[0, 1)`.
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ramp {
    Exponential,
    Linear,
    /// Holds the start value, then jumps to the end value at the given second.
    StepAt(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub start: f32,
    pub end: f32,
    pub ramp: Ramp,
}

impl Envelope {
    pub const fn new(start: f32, end: f32, ramp: Ramp) -> Self {
        Self { start, end, ramp }
    }

    fn value_at(&self, t: f32, duration: f32) -> f32 {
        let progress = if duration > 0.0 {
            (t / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        match self.ramp {
            Ramp::Exponential if self.start > 0.0 && self.end > 0.0 => {
                self.start * (self.end / self.start).powf(progress)
            }
            Ramp::Exponential | Ramp::Linear => self.start + (self.end - self.start) * progress,
            Ramp::StepAt(at) => {
                if t < at {
                    self.start
                } else {
                    self.end
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueRecipe {
    pub waveform: Waveform,
    pub frequency: Envelope,
    pub gain: Envelope,
    pub duration_seconds: f32,
}

/// Mono `f32` sample stream for one cue.
#[derive(Debug, Clone)]
pub struct CueVoice {
    recipe: CueRecipe,
    sample_rate: u32,
    master_gain: f32,
    index: u32,
    total: u32,
    phase: f32,
}

impl CueVoice {
    pub fn new(cue: Cue, sample_rate: u32, master_gain: f32) -> Self {
        let recipe = cue.recipe();
        let sample_rate = sample_rate.max(1);
        let total = (recipe.duration_seconds * sample_rate as f32).ceil() as u32;
        Self {
            recipe,
            sample_rate,
            master_gain,
            index: 0,
            total,
            phase: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_samples(&self) -> u32 {
        self.total
    }

    pub fn duration_seconds(&self) -> f32 {
        self.recipe.duration_seconds
    }
}

impl Iterator for CueVoice {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.index >= self.total {
            return None;
        }
        let t = self.index as f32 / self.sample_rate as f32;
        let duration = self.recipe.duration_seconds;
        let frequency = self.recipe.frequency.value_at(t, duration);
        let gain = self.recipe.gain.value_at(t, duration) * self.master_gain;
        let sample = self.recipe.waveform.sample(self.phase) * gain;

        self.phase += frequency / self.sample_rate as f32;
        self.phase -= self.phase.floor();
        self.index += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.saturating_sub(self.index) as usize;
        (remaining, Some(remaining))
    }
}

/// Device side of the audio engine. Opened at most once per engine.
pub trait AudioOutput {
    fn resume(&mut self) -> Result<(), AudioError>;
    fn play(&mut self, voice: CueVoice);
}

pub type AudioOpener = Box<dyn FnMut() -> Result<Box<dyn AudioOutput>, AudioError>>;

/// Output that accepts and discards every voice. Used headless.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, _voice: CueVoice) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Suspended,
    Running,
    Unavailable,
}

pub struct AudioEngine {
    opener: Option<AudioOpener>,
    output: Option<Box<dyn AudioOutput>>,
    state: AudioState,
    sample_rate: u32,
    master_gain: f32,
    outputs_opened: u32,
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state)
            .field("sample_rate", &self.sample_rate)
            .field("master_gain", &self.master_gain)
            .field("outputs_opened", &self.outputs_opened)
            .finish()
    }
}

impl AudioEngine {
    pub fn new(opener: AudioOpener) -> Self {
        Self {
            opener: Some(opener),
            output: None,
            state: AudioState::Suspended,
            sample_rate: DEFAULT_SAMPLE_RATE,
            master_gain: MASTER_GAIN,
            outputs_opened: 0,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(|| Ok(Box::new(SilentOutput) as Box<dyn AudioOutput>)))
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn outputs_opened(&self) -> u32 {
        self.outputs_opened
    }

    /// Opens the output on first use and resumes it. Safe to call any number
    /// of times; failures leave the engine quiet instead of erroring.
    pub fn resume(&mut self) -> AudioState {
        if self.state != AudioState::Suspended {
            return self.state;
        }

        if self.output.is_none() {
            let Some(mut opener) = self.opener.take() else {
                self.state = AudioState::Unavailable;
                return self.state;
            };
            match opener() {
                Ok(output) => {
                    self.output = Some(output);
                    self.outputs_opened = self.outputs_opened.saturating_add(1);
                }
                Err(error) => {
                    warn!(error = %error, "audio_output_unavailable");
                    self.state = AudioState::Unavailable;
                    return self.state;
                }
            }
        }

        if let Some(output) = self.output.as_mut() {
            match output.resume() {
                Ok(()) => {
                    self.state = AudioState::Running;
                    debug!(sample_rate = self.sample_rate, "audio_resumed");
                }
                Err(error) => warn!(error = %error, "audio_resume_failed"),
            }
        }
        self.state
    }

    /// Returns whether the cue reached the output. Quiet no-op until resumed.
    pub fn play(&mut self, cue: Cue) -> bool {
        if self.state != AudioState::Running {
            return false;
        }
        let Some(output) = self.output.as_mut() else {
            return false;
        };
        output.play(CueVoice::new(cue, self.sample_rate, self.master_gain));
        true
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct DeviceLog {
        opened: u32,
        resumes: u32,
        played: Vec<u32>,
        fail_resumes_remaining: u32,
    }

    struct RecordedOutput(Rc<RefCell<DeviceLog>>);

    impl AudioOutput for RecordedOutput {
        fn resume(&mut self) -> Result<(), AudioError> {
            let mut log = self.0.borrow_mut();
            log.resumes += 1;
            if log.fail_resumes_remaining > 0 {
                log.fail_resumes_remaining -= 1;
                return Err(AudioError::ResumeFailed("device busy".to_string()));
            }
            Ok(())
        }

        fn play(&mut self, voice: CueVoice) {
            self.0.borrow_mut().played.push(voice.total_samples());
        }
    }

    fn logged_engine(log: &Rc<RefCell<DeviceLog>>) -> AudioEngine {
        let log = Rc::clone(log);
        AudioEngine::new(Box::new(move || {
            log.borrow_mut().opened += 1;
            Ok(Box::new(RecordedOutput(Rc::clone(&log))) as Box<dyn AudioOutput>)
        }))
    }

    #[test]
    fn resume_is_idempotent_and_opens_one_output() {
        let log = Rc::new(RefCell::new(DeviceLog::default()));
        let mut engine = logged_engine(&log);

        for _ in 0..5 {
            assert_eq!(engine.resume(), AudioState::Running);
        }

        assert_eq!(log.borrow().opened, 1);
        assert_eq!(log.borrow().resumes, 1);
        assert_eq!(engine.outputs_opened(), 1);
    }

    #[test]
    fn failed_resume_retries_without_reopening() {
        let log = Rc::new(RefCell::new(DeviceLog {
            fail_resumes_remaining: 2,
            ..DeviceLog::default()
        }));
        let mut engine = logged_engine(&log);

        assert_eq!(engine.resume(), AudioState::Suspended);
        assert_eq!(engine.resume(), AudioState::Suspended);
        assert_eq!(engine.resume(), AudioState::Running);
        assert_eq!(log.borrow().opened, 1);
    }

    #[test]
    fn unavailable_output_makes_play_a_quiet_no_op() {
        let mut engine = AudioEngine::new(Box::new(|| {
            Err(AudioError::OutputUnavailable("no device".to_string()))
        }));

        assert_eq!(engine.resume(), AudioState::Unavailable);
        assert_eq!(engine.resume(), AudioState::Unavailable);
        assert!(!engine.play(Cue::Shoot));
    }

    #[test]
    fn play_before_resume_is_silent() {
        let log = Rc::new(RefCell::new(DeviceLog::default()));
        let mut engine = logged_engine(&log);

        assert!(!engine.play(Cue::Jump));
        assert_eq!(log.borrow().opened, 0);

        engine.resume();
        assert!(engine.play(Cue::Jump));
        assert_eq!(log.borrow().played, vec![4410]);
    }

    #[test]
    fn cue_names_cover_aliases_and_default() {
        assert_eq!(Cue::from_name("laser"), Cue::Shoot);
        assert_eq!(Cue::from_name("COIN"), Cue::Collect);
        assert_eq!(Cue::from_name("explosion"), Cue::Explosion);
        assert_eq!(Cue::from_name("kazoo"), Cue::Blip);
        for cue in Cue::ALL {
            assert_eq!(Cue::from_name(cue.name()), cue);
        }
    }

    #[test]
    fn voices_are_bounded_and_finite() {
        for cue in Cue::ALL {
            let voice = CueVoice::new(cue, DEFAULT_SAMPLE_RATE, MASTER_GAIN);
            let expected = voice.total_samples() as usize;
            let samples = voice.collect::<Vec<_>>();
            assert_eq!(samples.len(), expected);
            assert!(samples
                .iter()
                .all(|sample| sample.is_finite() && sample.abs() <= MASTER_GAIN + 1e-6));
        }
    }

    #[test]
    fn collect_cue_steps_frequency_midway() {
        let recipe = Cue::Collect.recipe();
        assert_eq!(recipe.frequency.value_at(0.01, 0.1), 1200.0);
        assert_eq!(recipe.frequency.value_at(0.06, 0.1), 1600.0);
    }

    #[test]
    fn exponential_sweep_hits_both_endpoints() {
        let envelope = Envelope::new(800.0, 100.0, Ramp::Exponential);
        assert!((envelope.value_at(0.0, 0.15) - 800.0).abs() < 1e-3);
        assert!((envelope.value_at(0.15, 0.15) - 100.0).abs() < 1e-3);
    }
}
