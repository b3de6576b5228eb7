//! The frame scheduler: owns the active script and drives its hooks once
//! per tick behind a fault barrier.

mod clock;
mod diagnostics;
mod viewport;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::capability::{AudioEngine, AudioState, Capabilities, Palette};
use crate::config::{FaultPolicy, HostConfig};
use crate::draw::DrawSurface;
use crate::input::{EventDisposition, InputEvent, InputNormalizer, VirtualPad};
use crate::script::{
    validate_script, LoadError, LoadStrategy, LoadedScript, ScriptFault, ScriptInstance,
    ScriptLoader, ValidationIssue,
};

pub use clock::{FrameClock, DEFAULT_MAX_FRAME_DELTA};
pub(crate) use clock::normalize_non_zero_duration;
pub use diagnostics::{Diagnostics, Fault, FaultKind};
pub use viewport::{Viewport, ViewportGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Running,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    /// The surface was degenerate; nothing ran but the loop keeps going.
    Skipped,
    /// No runnable script.
    Idle,
    /// A hook raised under [`FaultPolicy::Halt`]; no further ticks run.
    Halted,
    /// A hook raised under [`FaultPolicy::Continue`].
    Faulted,
}

impl TickOutcome {
    /// Whether the next frame should be requested.
    pub fn continue_scheduling(self) -> bool {
        matches!(
            self,
            TickOutcome::Ran | TickOutcome::Skipped | TickOutcome::Faulted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSummary {
    Started {
        generation: u64,
        strategy: LoadStrategy,
        /// `init` raised; the fault is on display but the loop runs anyway.
        init_fault: Option<ScriptFault>,
    },
    /// Legacy HTML was received and kept aside; the previous script, if
    /// any, keeps running.
    LegacyDocument { bytes: usize },
}

pub struct Runtime {
    fault_policy: FaultPolicy,
    loader: ScriptLoader,
    audio: Rc<RefCell<AudioEngine>>,
    active: Option<ScriptInstance>,
    phase: Phase,
    generation: u64,
    ticks: u64,
    clock: FrameClock,
    viewport: ViewportGuard,
    input: InputNormalizer,
    diagnostics: Diagnostics,
    legacy_document: Option<String>,
}

impl Runtime {
    pub fn new(config: &HostConfig, audio: AudioEngine) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let audio = Rc::new(RefCell::new(audio));
        let capabilities = Capabilities::new(
            Rc::clone(&audio),
            Rc::new(RefCell::new(rng)),
            Palette::default(),
        );
        info!(
            fault_policy = config.fault_policy.as_str(),
            max_frame_delta_ms = config.max_frame_delta_ms,
            instruction_budget = config.instruction_budget,
            memory_limit_bytes = config.memory_limit_bytes,
            seeded = config.rng_seed.is_some(),
            "runtime_config"
        );
        Self {
            fault_policy: config.fault_policy,
            loader: ScriptLoader::new(config.sandbox_limits(), capabilities),
            audio,
            active: None,
            phase: Phase::Uninitialized,
            generation: 0,
            ticks: 0,
            clock: FrameClock::new(config.max_frame_delta()),
            viewport: ViewportGuard::new(config.default_viewport),
            input: InputNormalizer::new(VirtualPad::new(config.virtual_pad.clone())),
            diagnostics: Diagnostics::default(),
            legacy_document: None,
        }
    }

    /// Loads `text` and, on success, replaces the running script. On failure
    /// the previous script and its state are left exactly as they were.
    pub fn load_script(&mut self, text: &str) -> Result<LoadSummary, LoadError> {
        let loaded = match self.loader.try_load(text) {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(error = %error, line = error.line(), "script_load_failed");
                self.diagnostics.report(Fault::from_load_error(&error));
                return Err(error);
            }
        };

        let instance = match loaded {
            LoadedScript::Logic(instance) => instance,
            LoadedScript::LegacyDocument(document) => {
                let bytes = document.len();
                self.legacy_document = Some(document);
                self.diagnostics.report(Fault::new(
                    FaultKind::Notice,
                    "legacy HTML document received; only Lua scripts can run here",
                    None,
                ));
                return Ok(LoadSummary::LegacyDocument { bytes });
            }
        };

        // Dropping the previous instance tears its VM down, which is what
        // cancels the old loop.
        self.generation = self.generation.saturating_add(1);
        let strategy = instance.strategy();
        self.active = Some(instance);
        self.legacy_document = None;
        self.phase = Phase::Initialized;
        self.diagnostics.clear();

        let size = self.viewport.safe_size();
        let init_fault = self
            .active
            .as_ref()
            .and_then(|instance| instance.call_init(size.width, size.height).err());
        if let Some(fault) = &init_fault {
            self.diagnostics.report(Fault::from_script_fault(fault));
        }

        self.phase = Phase::Running;
        self.clock.reset();
        info!(
            generation = self.generation,
            strategy = %strategy,
            init_failed = init_fault.is_some(),
            "script_loaded"
        );
        Ok(LoadSummary::Started {
            generation: self.generation,
            strategy,
            init_fault,
        })
    }

    /// Runs one frame: `update` then `draw`, then replays the recorded
    /// display list onto `surface`.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn DrawSurface) -> TickOutcome {
        if self.phase != Phase::Running {
            return TickOutcome::Idle;
        }
        let Some(instance) = self.active.as_ref() else {
            return TickOutcome::Idle;
        };

        let dt = self.clock.advance_seconds(now);
        let Some(viewport) = self.viewport.current() else {
            return TickOutcome::Skipped;
        };
        let input = self.input.snapshot_for_tick(viewport.as_tuple());
        let (width, height) = viewport.as_tuple();

        let result = instance
            .call_update(&input, dt, width, height)
            .and_then(|()| {
                let drawn = instance.call_draw(width, height);
                instance.replay(surface);
                drawn
            });

        match result {
            Ok(()) => {
                self.ticks = self.ticks.saturating_add(1);
                TickOutcome::Ran
            }
            Err(fault) => self.handle_fault(fault),
        }
    }

    fn handle_fault(&mut self, fault: ScriptFault) -> TickOutcome {
        self.diagnostics.report(Fault::from_script_fault(&fault));
        match self.fault_policy {
            FaultPolicy::Halt => {
                self.phase = Phase::Faulted;
                info!(generation = self.generation, hook = %fault.hook, "script_halted");
                TickOutcome::Halted
            }
            FaultPolicy::Continue => {
                debug!(generation = self.generation, hook = %fault.hook, "script_fault_continued");
                TickOutcome::Faulted
            }
        }
    }

    /// Runs the static checks and logs what they find.
    pub fn validate(&self, text: &str) -> Vec<ValidationIssue> {
        let issues = validate_script(text);
        for issue in &issues {
            warn!(code = issue.code.as_str(), line = issue.line, message = %issue.message, "script_validation_issue");
        }
        issues
    }

    pub fn handle_input(&mut self, event: InputEvent) -> EventDisposition {
        let surface = self.viewport.safe_size().as_tuple();
        self.input.handle_event(event, surface)
    }

    pub fn observe_viewport(&mut self, width: f64, height: f64) {
        self.viewport.observe(width, height);
    }

    /// Audio may only start from a user gesture; safe to call on every one.
    pub fn on_user_gesture(&mut self) -> AudioState {
        self.audio.borrow_mut().resume()
    }

    pub fn report_fault(&mut self, fault: Fault) {
        self.diagnostics.report(fault);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn viewport(&self) -> &ViewportGuard {
        &self.viewport
    }

    pub fn input(&self) -> &InputNormalizer {
        &self.input
    }

    pub fn instance(&self) -> Option<&ScriptInstance> {
        self.active.as_ref()
    }

    pub fn audio_state(&self) -> AudioState {
        self.audio.borrow().state()
    }

    pub fn legacy_document(&self) -> Option<&str> {
        self.legacy_document.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::draw::{RecordingSurface, SurfaceCall};

    const COUNTER: &str = r#"
return {
  init = function(state, w, h)
    state.count = 0
    state.w = w
  end,
  update = function(state, input, dt)
    state.count = state.count + 1
  end,
  draw = function(state, ctx)
    ctx:fillText("count=" .. state.count, 0, 10)
  end,
}
"#;

    const FAULTY_UPDATE: &str = r#"
return {
  init = function(state) state.frames = 0 end,
  update = function(state)
    state.frames = state.frames + 1
    if state.frames == 2 then
      local missing = nil
      return missing.field
    end
  end,
  draw = function(state, ctx)
    ctx:fillText("frame " .. state.frames, 0, 10)
  end,
}
"#;

    fn config(policy: FaultPolicy) -> HostConfig {
        HostConfig {
            fault_policy: policy,
            instruction_budget: 1_000_000,
            memory_limit_bytes: 16 * 1024 * 1024,
            rng_seed: Some(11),
            ..HostConfig::default()
        }
    }

    fn runtime() -> Runtime {
        Runtime::new(&config(FaultPolicy::Halt), AudioEngine::silent())
    }

    fn texts(surface: &mut RecordingSurface) -> Vec<String> {
        surface
            .take_calls()
            .into_iter()
            .filter_map(|call| match call {
                SurfaceCall::FillText(text, ..) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn frames(runtime: &mut Runtime, count: u32) -> Vec<TickOutcome> {
        let start = Instant::now();
        let mut surface = RecordingSurface::new(800, 600);
        (0..count)
            .map(|frame| runtime.tick(start + Duration::from_millis(16 * u64::from(frame)), &mut surface))
            .collect()
    }

    #[test]
    fn idle_until_a_script_loads() {
        let mut runtime = runtime();
        assert_eq!(runtime.phase(), Phase::Uninitialized);
        assert_eq!(frames(&mut runtime, 1), [TickOutcome::Idle]);
        assert!(!TickOutcome::Idle.continue_scheduling());
    }

    #[test]
    fn loaded_script_runs_update_then_draw() {
        let mut runtime = runtime();
        let summary = runtime.load_script(COUNTER).expect("load");
        assert!(matches!(
            summary,
            LoadSummary::Started { generation: 1, strategy: LoadStrategy::ChunkReturn, init_fault: None }
        ));
        assert_eq!(runtime.phase(), Phase::Running);

        let mut surface = RecordingSurface::new(800, 600);
        let now = Instant::now();
        assert_eq!(runtime.tick(now, &mut surface), TickOutcome::Ran);
        assert_eq!(texts(&mut surface), ["count=1"]);
        assert_eq!(runtime.tick(now + Duration::from_millis(16), &mut surface), TickOutcome::Ran);
        assert_eq!(texts(&mut surface), ["count=2"]);
        assert_eq!(runtime.ticks(), 2);
    }

    #[test]
    fn init_receives_safe_viewport_size() {
        let mut runtime = runtime();
        runtime.observe_viewport(1024.0, 768.0);
        runtime.observe_viewport(0.0, 0.0);
        runtime.load_script(COUNTER).expect("load");
        let w = runtime
            .instance()
            .expect("instance")
            .state()
            .get::<i64>("w")
            .expect("w");
        assert_eq!(w, 1024);
    }

    #[test]
    fn failed_reload_keeps_previous_logic() {
        let mut runtime = runtime();
        runtime.load_script(COUNTER).expect("load");
        frames(&mut runtime, 3);

        let error = runtime
            .load_script("return {\n  update = function(state) state.count = = 0 end\n}")
            .expect_err("syntax error");
        assert!(error.is_syntax());
        assert_eq!(runtime.generation(), 1);
        assert_eq!(
            runtime.diagnostics().current().map(|fault| fault.kind),
            Some(FaultKind::Syntax)
        );
        assert_eq!(runtime.diagnostics().current().and_then(|fault| fault.line), Some(2));

        let mut surface = RecordingSurface::new(800, 600);
        assert_eq!(runtime.tick(Instant::now(), &mut surface), TickOutcome::Ran);
        assert_eq!(texts(&mut surface), ["count=4"]);
    }

    #[test]
    fn reload_replaces_state() {
        let mut runtime = runtime();
        runtime.load_script(COUNTER).expect("first load");
        frames(&mut runtime, 5);

        let summary = runtime.load_script(COUNTER).expect("second load");
        assert!(matches!(summary, LoadSummary::Started { generation: 2, .. }));
        let mut surface = RecordingSurface::new(800, 600);
        runtime.tick(Instant::now(), &mut surface);
        assert_eq!(texts(&mut surface), ["count=1"]);
    }

    #[test]
    fn zero_viewport_skips_then_resumes() {
        let mut runtime = runtime();
        runtime.load_script(COUNTER).expect("load");
        let mut surface = RecordingSurface::new(800, 600);
        let now = Instant::now();

        runtime.observe_viewport(0.0, 600.0);
        let outcome = runtime.tick(now, &mut surface);
        assert_eq!(outcome, TickOutcome::Skipped);
        assert!(outcome.continue_scheduling());
        assert!(surface.calls().is_empty());

        runtime.observe_viewport(640.0, 480.0);
        assert_eq!(runtime.tick(now + Duration::from_millis(16), &mut surface), TickOutcome::Ran);
        assert_eq!(texts(&mut surface), ["count=1"]);
    }

    #[test]
    fn first_update_after_load_sees_zero_dt() {
        let mut runtime = runtime();
        runtime
            .load_script(
                "return { update = function(state, input, dt) state.dt = dt end, \
                 draw = function(state, ctx) ctx:fillText(tostring(state.dt), 0, 0) end }",
            )
            .expect("load");
        let mut surface = RecordingSurface::new(800, 600);
        let start = Instant::now();
        runtime.tick(start, &mut surface);
        runtime.tick(start + Duration::from_secs(5), &mut surface);
        assert_eq!(texts(&mut surface), ["0.0", "0.05"]);
    }

    #[test]
    fn halt_policy_stops_after_runtime_fault() {
        let mut runtime = runtime();
        runtime.load_script(FAULTY_UPDATE).expect("load");
        let outcomes = frames(&mut runtime, 4);
        assert_eq!(
            outcomes,
            [TickOutcome::Ran, TickOutcome::Halted, TickOutcome::Idle, TickOutcome::Idle]
        );
        assert_eq!(runtime.phase(), Phase::Faulted);
        let rendered = runtime.diagnostics().rendered().expect("fault shown");
        assert!(rendered.starts_with("RUNTIME ERROR: "), "{rendered}");
        assert!(rendered.ends_with("(Line 8)"), "{rendered}");

        // a fresh load recovers
        runtime.load_script(COUNTER).expect("reload");
        assert_eq!(runtime.phase(), Phase::Running);
        assert!(runtime.diagnostics().current().is_none());
    }

    #[test]
    fn continue_policy_keeps_ticking_after_fault() {
        let mut runtime = Runtime::new(&config(FaultPolicy::Continue), AudioEngine::silent());
        runtime.load_script(FAULTY_UPDATE).expect("load");
        let outcomes = frames(&mut runtime, 4);
        assert_eq!(
            outcomes,
            [TickOutcome::Ran, TickOutcome::Faulted, TickOutcome::Ran, TickOutcome::Ran]
        );
        assert!(TickOutcome::Faulted.continue_scheduling());
        assert_eq!(runtime.phase(), Phase::Running);
        assert_eq!(runtime.diagnostics().report_count(), 1);
    }

    #[test]
    fn init_fault_is_reported_but_loop_runs() {
        let mut runtime = runtime();
        let summary = runtime
            .load_script(
                "return { init = function() error('bad init') end, \
                 draw = function(state, ctx) ctx:fillRect(0, 0, 1, 1) end }",
            )
            .expect("load");
        let LoadSummary::Started { init_fault: Some(fault), .. } = summary else {
            panic!("expected init fault, got {summary:?}");
        };
        assert_eq!(fault.message, "bad init");
        assert_eq!(
            runtime.diagnostics().rendered().as_deref(),
            Some("INIT ERROR: bad init (Line 1)")
        );
        assert_eq!(frames(&mut runtime, 1), [TickOutcome::Ran]);
    }

    #[test]
    fn state_written_before_an_init_error_is_kept() {
        let mut runtime = runtime();
        let summary = runtime
            .load_script(
                "return { init = function(state) state.a = 1 error('boom') end, \
                 update = function(state) state.seen = state.a end, \
                 draw = function(state, ctx) ctx:fillText('a=' .. tostring(state.seen), 0, 10) end }",
            )
            .expect("load");
        assert!(matches!(summary, LoadSummary::Started { init_fault: Some(_), .. }));

        let mut surface = RecordingSurface::new(800, 600);
        assert_eq!(runtime.tick(Instant::now(), &mut surface), TickOutcome::Ran);
        assert_eq!(texts(&mut surface), ["a=1"]);
    }

    #[test]
    fn oversized_text_does_not_break_the_tick() {
        let mut runtime = Runtime::new(
            &HostConfig {
                memory_limit_bytes: 64 * 1024 * 1024,
                ..config(FaultPolicy::Halt)
            },
            AudioEngine::silent(),
        );
        runtime
            .load_script(
                "return { draw = function(state, ctx) \
                   local long = string.rep('A', 9000000) \
                   ctx.font = '448px monospace' \
                   state.width = ctx:measureText(long).width \
                   ctx.textAlign = 'right' \
                   ctx:fillText(long, 0, 10) \
                 end }",
            )
            .expect("load");

        let mut surface = RecordingSurface::new(800, 600);
        assert_eq!(runtime.tick(Instant::now(), &mut surface), TickOutcome::Ran);
        let width = runtime
            .instance()
            .expect("instance")
            .state()
            .get::<i64>("width")
            .expect("width");
        assert_eq!(width, i64::from(i32::MAX));
        let recorded = texts(&mut surface);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), crate::draw::font::MAX_TEXT_CHARS);
    }

    #[test]
    fn draw_fault_keeps_commands_recorded_before_it() {
        let mut runtime = runtime();
        runtime
            .load_script(
                "return { draw = function(state, ctx)\n  ctx:fillText('before', 0, 0)\n  error('late')\nend }",
            )
            .expect("load");
        let mut surface = RecordingSurface::new(800, 600);
        assert_eq!(runtime.tick(Instant::now(), &mut surface), TickOutcome::Halted);
        assert_eq!(texts(&mut surface), ["before"]);
    }

    #[test]
    fn legacy_document_keeps_running_script() {
        let mut runtime = runtime();
        runtime.load_script(COUNTER).expect("load");
        let summary = runtime
            .load_script("<!DOCTYPE html><html></html>")
            .expect("passthrough");
        assert_eq!(summary, LoadSummary::LegacyDocument { bytes: 28 });
        assert_eq!(runtime.legacy_document(), Some("<!DOCTYPE html><html></html>"));
        assert_eq!(
            runtime.diagnostics().current().map(|fault| fault.kind),
            Some(FaultKind::Notice)
        );
        assert_eq!(frames(&mut runtime, 1), [TickOutcome::Ran]);
    }

    #[test]
    fn input_reaches_update_repaired() {
        let mut runtime = runtime();
        runtime
            .load_script(
                "return { update = function(state, input) state.p = input.x .. ',' .. input.y end, \
                 draw = function(state, ctx) ctx:fillText(state.p, 0, 0) end }",
            )
            .expect("load");
        runtime.handle_input(InputEvent::PointerMoved { x: 5000.0, y: f64::NAN });
        let mut surface = RecordingSurface::new(800, 600);
        runtime.tick(Instant::now(), &mut surface);
        assert_eq!(texts(&mut surface), ["800.0,300.0"]);
    }

    #[test]
    fn user_gesture_resumes_audio_once() {
        let mut runtime = runtime();
        assert_eq!(runtime.audio_state(), AudioState::Suspended);
        assert_eq!(runtime.on_user_gesture(), AudioState::Running);
        assert_eq!(runtime.on_user_gesture(), AudioState::Running);
    }
}
