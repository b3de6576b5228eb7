use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, TouchPhase as WinitTouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, KeyCode, NamedKey, PhysicalKey};
use winit::window::WindowBuilder;

use crate::input::{EventDisposition, InputEvent, TouchPhase};
use crate::runtime::{normalize_non_zero_duration, Fault, Runtime};

use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::overlay::OverlayData;
use super::renderer::Renderer;
use super::watch::{ScriptWatcher, WatchError};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub metrics_log_interval: Duration,
    /// How often the script file is checked for changes.
    pub watch_interval: Duration,
    pub max_render_fps: Option<u32>,
    /// Refuse scripts that fail the static checks instead of only warning.
    pub strict_validation: bool,
    pub show_perf_overlay: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Sandbox Player".to_string(),
            window_width: 800,
            window_height: 600,
            metrics_log_interval: Duration::from_secs(1),
            watch_interval: Duration::from_millis(500),
            max_render_fps: None,
            strict_validation: false,
            show_perf_overlay: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not create the event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("could not open the player window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("could not set up the pixel surface: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error(transparent)]
    ReadScript(#[from] WatchError),
    #[error("event loop stopped with an error: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, runtime: Runtime, script_path: PathBuf) -> Result<(), AppError> {
    run_app_with_metrics(config, runtime, script_path, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut runtime: Runtime,
    script_path: PathBuf,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let watch_interval = normalize_non_zero_duration(config.watch_interval, Duration::from_millis(500));
    let mut watcher = ScriptWatcher::new(script_path, watch_interval);
    let script_label = watcher
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| watcher.path().display().to_string());
    let initial_text = watcher.read_now()?;
    info!(
        script = %watcher.path().display(),
        fingerprint = watcher.fingerprint().unwrap_or_default(),
        "startup"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("{} - {}", config.window_title, script_label))
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;
    let (surface_width, surface_height) = renderer.size();
    runtime.observe_viewport(f64::from(surface_width), f64::from(surface_height));
    load_script_text(&mut runtime, &initial_text, config.strict_validation);

    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let frame_cap = FrameCap::new(config.max_render_fps);
    info!(
        window_width = surface_width,
        window_height = surface_height,
        watch_interval_ms = watch_interval.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        render_fps_cap = %frame_cap,
        strict_validation = config.strict_validation,
        "loop_config"
    );

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut host_keys = HostKeys::default();
    let mut perf_visible = config.show_perf_overlay;
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut previous_redraw = Instant::now();
    let mut previous_present = Instant::now();
    let mut keep_scheduling = true;
    let mut next_idle_redraw = Instant::now();
    let mut watch_error_reported = false;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(generation = runtime.generation(), "window_closed");
                    window_target.exit();
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if !apply_surface_size(&mut runtime, &mut renderer, size.width, size.height) {
                        window_target.exit();
                    }
                    window.request_redraw();
                }
                WindowEvent::Focused(false) => {
                    runtime.handle_input(InputEvent::FocusLost);
                }
                WindowEvent::CursorMoved { position, .. } => {
                    runtime.handle_input(InputEvent::PointerMoved {
                        x: position.x,
                        y: position.y,
                    });
                }
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => {
                    let pressed = state == ElementState::Pressed;
                    if pressed {
                        resume_audio(&mut runtime);
                    }
                    let disposition = runtime.handle_input(InputEvent::PointerButton { pressed });
                    if disposition == EventDisposition::Consumed {
                        debug!(pressed, "pointer_consumed_by_virtual_pad");
                    }
                }
                WindowEvent::Touch(touch) => {
                    let phase = map_touch_phase(touch.phase);
                    if phase == TouchPhase::Started {
                        resume_audio(&mut runtime);
                    }
                    runtime.handle_input(InputEvent::Touch {
                        phase,
                        x: touch.location.x,
                        y: touch.location.y,
                        surface_origin: (0.0, 0.0),
                    });
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let pressed = event.state == ElementState::Pressed;
                    if host_keys.handle(event.physical_key, event.state) {
                        return;
                    }
                    if pressed {
                        resume_audio(&mut runtime);
                    }
                    runtime.handle_input(InputEvent::Key {
                        key: key_value_name(&event.logical_key),
                        code: key_code_name(event.physical_key),
                        pressed,
                    });
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();

                    if host_keys.take_overlay_toggle_pressed() {
                        perf_visible = !perf_visible;
                        info!(overlay_visible = perf_visible, "overlay_toggled");
                    }
                    if host_keys.take_reload_pressed() {
                        match watcher.read_now() {
                            Ok(text) => {
                                info!(reason = "reload_key", "script_reload_requested");
                                load_script_text(&mut runtime, &text, config.strict_validation);
                            }
                            Err(error) => warn!(error = %error, "script_reload_failed"),
                        }
                    }
                    match watcher.poll(now) {
                        Ok(Some(text)) => {
                            info!(
                                fingerprint = watcher.fingerprint().unwrap_or_default(),
                                "script_changed"
                            );
                            load_script_text(&mut runtime, &text, config.strict_validation);
                            watch_error_reported = false;
                        }
                        Ok(None) => watch_error_reported = false,
                        Err(error) => {
                            // editors often replace the file in two steps
                            if !watch_error_reported {
                                warn!(error = %error, "script_watch_failed");
                                watch_error_reported = true;
                            }
                        }
                    }

                    let frame_dt = now.saturating_duration_since(previous_redraw);
                    previous_redraw = now;
                    if let Some(pause) = frame_cap.remaining(previous_present.elapsed()) {
                        thread::sleep(pause);
                    }

                    let perf = perf_visible.then(|| OverlayData {
                        metrics: metrics_handle.snapshot(),
                        phase: runtime.phase(),
                        generation: runtime.generation(),
                        fault_policy: runtime.fault_policy(),
                        audio: runtime.audio_state(),
                        script_label: script_label.clone(),
                    });
                    let outcome = match renderer.render_frame(&mut runtime, Instant::now(), perf.as_ref()) {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            warn!(error = %error, "frame_present_failed");
                            window_target.exit();
                            return;
                        }
                    };
                    previous_present = Instant::now();
                    if keep_scheduling && !outcome.continue_scheduling() {
                        debug!(outcome = ?outcome, generation = runtime.generation(), "script_scheduling_paused");
                    }
                    keep_scheduling = outcome.continue_scheduling();

                    metrics_accumulator.record_frame(frame_dt, outcome);
                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            generation = runtime.generation(),
                            fps = snapshot.fps,
                            script_fps = snapshot.script_fps,
                            avg_frame_ms = snapshot.frame_time_ms,
                            skipped = snapshot.skipped_frames,
                            faulted = snapshot.faulted_frames,
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if keep_scheduling {
                    window_target.set_control_flow(ControlFlow::Poll);
                    window.request_redraw();
                } else {
                    // idle or halted: keep the overlay and file watcher alive
                    // at the watch cadence only
                    let now = Instant::now();
                    if now >= next_idle_redraw {
                        next_idle_redraw = now + watch_interval;
                        window.request_redraw();
                    }
                    window_target.set_control_flow(ControlFlow::WaitUntil(next_idle_redraw));
                }
            }
            Event::LoopExiting => {
                info!(generation = runtime.generation(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Pushes a new surface size to both the runtime and the renderer. Returns
/// false when the renderer cannot follow.
fn apply_surface_size(runtime: &mut Runtime, renderer: &mut Renderer, width: u32, height: u32) -> bool {
    runtime.observe_viewport(f64::from(width), f64::from(height));
    match renderer.resize(width, height) {
        Ok(()) => true,
        Err(error) => {
            warn!(error = %error, width, height, "surface_resize_failed");
            false
        }
    }
}

/// Validates, then loads. Failures are already on the diagnostic overlay.
fn load_script_text(runtime: &mut Runtime, text: &str, strict_validation: bool) {
    let issues = runtime.validate(text);
    if strict_validation && !issues.is_empty() {
        warn!(issue_count = issues.len(), "script_rejected_by_validation");
        runtime.report_fault(Fault::from_validation(&issues));
        return;
    }
    let _ = runtime.load_script(text);
}

fn resume_audio(runtime: &mut Runtime) {
    let before = runtime.audio_state();
    let after = runtime.on_user_gesture();
    if before != after {
        info!(state = ?after, "audio_state_changed");
    }
}

/// Edge detection for the keys the host keeps for itself (F3 overlay,
/// F5 reload). These never reach the script.
#[derive(Debug, Default)]
struct HostKeys {
    overlay: EdgeKey,
    reload: EdgeKey,
}

/// Latches one press per physical down-stroke; key repeat is ignored.
#[derive(Debug, Default)]
struct EdgeKey {
    held: bool,
    latched: bool,
}

impl EdgeKey {
    fn update(&mut self, pressed: bool) {
        self.latched |= pressed && !self.held;
        self.held = pressed;
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.latched)
    }
}

impl HostKeys {
    /// Returns whether the key belongs to the host.
    fn handle(&mut self, key: PhysicalKey, state: ElementState) -> bool {
        let slot = match key {
            PhysicalKey::Code(KeyCode::F3) => &mut self.overlay,
            PhysicalKey::Code(KeyCode::F5) => &mut self.reload,
            _ => return false,
        };
        slot.update(state == ElementState::Pressed);
        true
    }

    fn take_overlay_toggle_pressed(&mut self) -> bool {
        self.overlay.take()
    }

    fn take_reload_pressed(&mut self) -> bool {
        self.reload.take()
    }
}

/// Web-style key value: the produced character, or the key's name.
fn key_value_name(key: &Key) -> String {
    match key {
        Key::Character(text) => text.to_string(),
        Key::Named(NamedKey::Space) => " ".to_string(),
        Key::Named(named) => format!("{named:?}"),
        _ => String::new(),
    }
}

/// Web-style positional code (`KeyW`, `ArrowUp`, `Space`).
fn key_code_name(key: PhysicalKey) -> String {
    match key {
        PhysicalKey::Code(code) => format!("{code:?}"),
        PhysicalKey::Unidentified(_) => String::new(),
    }
}

fn map_touch_phase(phase: WinitTouchPhase) -> TouchPhase {
    match phase {
        WinitTouchPhase::Started => TouchPhase::Started,
        WinitTouchPhase::Moved => TouchPhase::Moved,
        WinitTouchPhase::Ended => TouchPhase::Ended,
        WinitTouchPhase::Cancelled => TouchPhase::Cancelled,
    }
}

/// Optional presentation rate limit. A cap of zero means uncapped.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameCap {
    fps: Option<u32>,
}

impl FrameCap {
    fn new(max_render_fps: Option<u32>) -> Self {
        Self {
            fps: max_render_fps.filter(|fps| *fps > 0),
        }
    }

    fn period(self) -> Option<Duration> {
        self.fps.map(|fps| Duration::from_secs(1) / fps)
    }

    /// Time left to wait when the last present was less than one period ago.
    fn remaining(self, since_present: Duration) -> Option<Duration> {
        self.period()
            .and_then(|period| period.checked_sub(since_present))
            .filter(|left| !left.is_zero())
    }
}

impl std::fmt::Display for FrameCap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fps {
            Some(fps) => write!(f, "{fps}"),
            None => f.write_str("off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_key_latches_once_per_press() {
        let mut keys = HostKeys::default();
        assert!(keys.handle(PhysicalKey::Code(KeyCode::F3), ElementState::Pressed));
        assert!(keys.handle(PhysicalKey::Code(KeyCode::F3), ElementState::Pressed));
        assert!(keys.take_overlay_toggle_pressed());
        assert!(!keys.take_overlay_toggle_pressed());

        keys.handle(PhysicalKey::Code(KeyCode::F3), ElementState::Released);
        keys.handle(PhysicalKey::Code(KeyCode::F3), ElementState::Pressed);
        assert!(keys.take_overlay_toggle_pressed());
    }

    #[test]
    fn f5_reload_is_edge_triggered_and_separate() {
        let mut keys = HostKeys::default();
        keys.handle(PhysicalKey::Code(KeyCode::F5), ElementState::Pressed);
        assert!(!keys.take_overlay_toggle_pressed());
        assert!(keys.take_reload_pressed());
        assert!(!keys.take_reload_pressed());
    }

    #[test]
    fn script_keys_are_not_claimed_by_host() {
        let mut keys = HostKeys::default();
        assert!(!keys.handle(PhysicalKey::Code(KeyCode::KeyW), ElementState::Pressed));
        assert!(!keys.handle(PhysicalKey::Code(KeyCode::Escape), ElementState::Pressed));
    }

    #[test]
    fn key_names_follow_web_conventions() {
        assert_eq!(key_value_name(&Key::Character("a".into())), "a");
        assert_eq!(key_value_name(&Key::Named(NamedKey::Space)), " ");
        assert_eq!(key_value_name(&Key::Named(NamedKey::ArrowUp)), "ArrowUp");
        assert_eq!(key_value_name(&Key::Named(NamedKey::Enter)), "Enter");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::KeyW)), "KeyW");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::Space)), "Space");
        assert_eq!(key_code_name(PhysicalKey::Code(KeyCode::ArrowLeft)), "ArrowLeft");
    }

    #[test]
    fn frame_cap_waits_only_when_ahead_of_period() {
        let cap = FrameCap::new(Some(50));
        assert_eq!(cap.period(), Some(Duration::from_millis(20)));
        assert_eq!(cap.remaining(Duration::from_millis(5)), Some(Duration::from_millis(15)));
        assert_eq!(cap.remaining(Duration::from_millis(20)), None);
        assert_eq!(cap.remaining(Duration::from_millis(25)), None);
        assert_eq!(cap.to_string(), "50");

        let uncapped = FrameCap::new(Some(0));
        assert_eq!(uncapped.remaining(Duration::ZERO), None);
        assert_eq!(uncapped.to_string(), "off");
    }

    #[test]
    fn touch_phases_map_one_to_one() {
        assert_eq!(map_touch_phase(WinitTouchPhase::Started), TouchPhase::Started);
        assert_eq!(map_touch_phase(WinitTouchPhase::Cancelled), TouchPhase::Cancelled);
    }
}
