use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use host::{FaultPolicy, HostConfig, LoopConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const SCRIPT_ENV_VAR: &str = "SANDBOX_SCRIPT";
pub(crate) const MAX_DT_ENV_VAR: &str = "SANDBOX_MAX_DT_MS";
pub(crate) const FAULT_POLICY_ENV_VAR: &str = "SANDBOX_FAULT_POLICY";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("{0}\n\n{usage}", usage = usage_text())]
    Usage(String),
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path} at {field}: {source}")]
    ParseFile {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no script given; pass a path or set {SCRIPT_ENV_VAR}")]
    MissingScript,
}

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) host_config: HostConfig,
    pub(crate) script_path: PathBuf,
}

/// `None` when the invocation only asked for help.
pub(crate) fn build_app(args: &[String]) -> Result<Option<AppWiring>, ConfigError> {
    init_tracing();
    info!("=== Sandbox Player Startup ===");

    let cli = parse_args(args)?;
    if cli.help {
        println!("{}", usage_text());
        return Ok(None);
    }
    let wiring = resolve_settings(cli, &|name| env::var(name))?;
    info!(
        script = %wiring.script_path.display(),
        fault_policy = wiring.host_config.fault_policy.as_str(),
        max_frame_delta_ms = wiring.host_config.max_frame_delta_ms,
        strict_validation = wiring.loop_config.strict_validation,
        "player_config"
    );
    Ok(Some(wiring))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct CliArgs {
    config_path: Option<PathBuf>,
    policy: Option<FaultPolicy>,
    strict: bool,
    perf_overlay: bool,
    script: Option<PathBuf>,
    help: bool,
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliArgs, ConfigError> {
    let mut cli = CliArgs::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cli.help = true;
                index += 1;
            }
            "--config" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| ConfigError::Usage("missing value for --config".to_string()))?;
                cli.config_path = Some(PathBuf::from(value));
                index += 2;
            }
            "--policy" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| ConfigError::Usage("missing value for --policy".to_string()))?;
                cli.policy = Some(FaultPolicy::parse(value).ok_or_else(|| {
                    ConfigError::Usage(format!(
                        "invalid --policy value '{value}' (expected halt or continue)"
                    ))
                })?);
                index += 2;
            }
            "--strict" => {
                cli.strict = true;
                index += 1;
            }
            "--perf" => {
                cli.perf_overlay = true;
                index += 1;
            }
            flag if flag.starts_with("--") => {
                return Err(ConfigError::Usage(format!("unknown option '{flag}'")));
            }
            path => {
                if cli.script.is_some() {
                    return Err(ConfigError::Usage(format!(
                        "unexpected extra argument '{path}'"
                    )));
                }
                cli.script = Some(PathBuf::from(path));
                index += 1;
            }
        }
    }
    Ok(cli)
}

/// JSON config file layout. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PlayerFile {
    script: Option<PathBuf>,
    host: HostConfig,
    window: WindowFile,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WindowFile {
    title: String,
    width: u32,
    height: u32,
    max_render_fps: Option<u32>,
    watch_interval_ms: u64,
    metrics_log_interval_ms: u64,
    strict_validation: bool,
    show_perf_overlay: bool,
}

impl Default for WindowFile {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            title: defaults.window_title,
            width: defaults.window_width,
            height: defaults.window_height,
            max_render_fps: defaults.max_render_fps,
            watch_interval_ms: defaults.watch_interval.as_millis() as u64,
            metrics_log_interval_ms: defaults.metrics_log_interval.as_millis() as u64,
            strict_validation: defaults.strict_validation,
            show_perf_overlay: defaults.show_perf_overlay,
        }
    }
}

impl From<WindowFile> for LoopConfig {
    fn from(window: WindowFile) -> Self {
        LoopConfig {
            window_title: window.title,
            window_width: window.width,
            window_height: window.height,
            metrics_log_interval: Duration::from_millis(window.metrics_log_interval_ms),
            watch_interval: Duration::from_millis(window.watch_interval_ms),
            max_render_fps: window.max_render_fps,
            strict_validation: window.strict_validation,
            show_perf_overlay: window.show_perf_overlay,
        }
    }
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Result<String, env::VarError>;

/// Layers defaults, the config file, the environment and the command line,
/// later layers winning.
pub(crate) fn resolve_settings(cli: CliArgs, env_lookup: EnvLookup<'_>) -> Result<AppWiring, ConfigError> {
    let file = match &cli.config_path {
        Some(path) => load_player_file(path)?,
        None => PlayerFile::default(),
    };

    let mut host_config = file.host;
    let mut loop_config = LoopConfig::from(file.window);
    let mut script_path = file.script;

    if let Some(path) = read_env(env_lookup, SCRIPT_ENV_VAR) {
        script_path = Some(PathBuf::from(path));
    }
    host_config.max_frame_delta_ms = resolve_max_dt_ms(env_lookup, host_config.max_frame_delta_ms);
    host_config.fault_policy = resolve_fault_policy(env_lookup, host_config.fault_policy);

    if let Some(policy) = cli.policy {
        host_config.fault_policy = policy;
    }
    if cli.strict {
        loop_config.strict_validation = true;
    }
    if cli.perf_overlay {
        loop_config.show_perf_overlay = true;
    }
    if let Some(path) = cli.script {
        script_path = Some(path);
    }

    Ok(AppWiring {
        loop_config,
        host_config,
        script_path: script_path.ok_or(ConfigError::MissingScript)?,
    })
}

fn load_player_file(path: &Path) -> Result<PlayerFile, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize::<_, PlayerFile>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::ParseFile {
            path: path.to_path_buf(),
            field: if field.is_empty() { ".".to_string() } else { field },
            source: error.into_inner(),
        }
    })
}

fn read_env(env_lookup: EnvLookup<'_>, var: &'static str) -> Option<String> {
    match env_lookup(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) | Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = var, error = %err, "unable to read env var; falling back to config");
            None
        }
    }
}

fn resolve_max_dt_ms(env_lookup: EnvLookup<'_>, config_ms: u64) -> u64 {
    let Some(value) = read_env(env_lookup, MAX_DT_ENV_VAR) else {
        return config_ms;
    };
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => ms,
        _ => {
            warn!(
                env_var = MAX_DT_ENV_VAR,
                value = value.as_str(),
                "invalid max-dt env var value; falling back to config"
            );
            config_ms
        }
    }
}

fn resolve_fault_policy(env_lookup: EnvLookup<'_>, config_policy: FaultPolicy) -> FaultPolicy {
    let Some(value) = read_env(env_lookup, FAULT_POLICY_ENV_VAR) else {
        return config_policy;
    };
    FaultPolicy::parse(&value).unwrap_or_else(|| {
        warn!(
            env_var = FAULT_POLICY_ENV_VAR,
            value = value.as_str(),
            "invalid fault-policy env var value; falling back to config"
        );
        config_policy
    })
}

fn usage_text() -> String {
    [
        "player - run a sandboxed game-logic script in a window",
        "",
        "Usage:",
        "  player [--config <file.json>] [--policy halt|continue] [--strict] [--perf] [<script.lua>]",
        "",
        "Environment:",
        "  SANDBOX_SCRIPT        script path when none is given on the command line",
        "  SANDBOX_MAX_DT_MS     cap on the per-tick delta in milliseconds",
        "  SANDBOX_FAULT_POLICY  halt | continue",
        "",
        "Keys: F3 toggles the performance overlay, F5 reloads the script.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn parse_args_reads_flags_and_script() {
        let cli = parse_args(&args(&["--policy", "Continue", "--strict", "game.lua"])).expect("cli");
        assert_eq!(cli.policy, Some(FaultPolicy::Continue));
        assert!(cli.strict);
        assert_eq!(cli.script, Some(PathBuf::from("game.lua")));
        assert!(!cli.help);
    }

    #[test]
    fn parse_args_rejects_bad_input() {
        assert!(matches!(
            parse_args(&args(&["--policy", "retry"])),
            Err(ConfigError::Usage(_))
        ));
        assert!(matches!(parse_args(&args(&["--config"])), Err(ConfigError::Usage(_))));
        assert!(matches!(parse_args(&args(&["--fast"])), Err(ConfigError::Usage(_))));
        assert!(matches!(
            parse_args(&args(&["a.lua", "b.lua"])),
            Err(ConfigError::Usage(_))
        ));
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let cli = parse_args(&args(&["game.lua"])).expect("cli");
        let wiring = resolve_settings(cli, &env_from(&[])).expect("wiring");
        assert_eq!(wiring.host_config, HostConfig::default());
        assert_eq!(wiring.script_path, PathBuf::from("game.lua"));
        assert!(!wiring.loop_config.strict_validation);
    }

    #[test]
    fn missing_script_is_an_error() {
        let result = resolve_settings(CliArgs::default(), &env_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingScript)));
    }

    #[test]
    fn env_overrides_file_and_args_override_env() {
        let temp = TempDir::new().expect("tempdir");
        let config_path = temp.path().join("player.json");
        fs::write(
            &config_path,
            r#"{
                "script": "from_file.lua",
                "host": { "fault_policy": "continue", "max_frame_delta_ms": 40 },
                "window": { "title": "Arcade", "strict_validation": true }
            }"#,
        )
        .expect("write config");

        let env = env_from(&[
            (SCRIPT_ENV_VAR, "from_env.lua"),
            (MAX_DT_ENV_VAR, "25"),
            (FAULT_POLICY_ENV_VAR, "halt"),
        ]);
        let cli = CliArgs {
            config_path: Some(config_path.clone()),
            ..CliArgs::default()
        };
        let wiring = resolve_settings(cli, &env).expect("wiring");
        assert_eq!(wiring.script_path, PathBuf::from("from_env.lua"));
        assert_eq!(wiring.host_config.max_frame_delta_ms, 25);
        assert_eq!(wiring.host_config.fault_policy, FaultPolicy::Halt);
        assert_eq!(wiring.loop_config.window_title, "Arcade");
        assert!(wiring.loop_config.strict_validation);

        let cli = CliArgs {
            config_path: Some(config_path),
            policy: Some(FaultPolicy::Continue),
            script: Some(PathBuf::from("from_args.lua")),
            ..CliArgs::default()
        };
        let wiring = resolve_settings(cli, &env).expect("wiring");
        assert_eq!(wiring.script_path, PathBuf::from("from_args.lua"));
        assert_eq!(wiring.host_config.fault_policy, FaultPolicy::Continue);
    }

    #[test]
    fn invalid_env_values_fall_back_to_config() {
        let env = env_from(&[(MAX_DT_ENV_VAR, "fast"), (FAULT_POLICY_ENV_VAR, "retry")]);
        assert_eq!(resolve_max_dt_ms(&env, 50), 50);
        assert_eq!(resolve_fault_policy(&env, FaultPolicy::Continue), FaultPolicy::Continue);

        let zero = env_from(&[(MAX_DT_ENV_VAR, "0")]);
        assert_eq!(resolve_max_dt_ms(&zero, 50), 50);
    }

    #[test]
    fn config_parse_errors_name_the_field_path() {
        let temp = TempDir::new().expect("tempdir");
        let config_path = temp.path().join("player.json");
        fs::write(&config_path, r#"{ "host": { "fault_policy": "sometimes" } }"#)
            .expect("write config");

        match load_player_file(&config_path) {
            Err(ConfigError::ParseFile { field, .. }) => assert_eq!(field, "host.fault_policy"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let temp = TempDir::new().expect("tempdir");
        assert!(matches!(
            load_player_file(&temp.path().join("absent.json")),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
