use std::cell::Cell;

use mlua::{
    FromLuaMulti, Function, HookTriggers, IntoLuaMulti, Lua, LuaOptions, StdLib, Table, Value,
    Variadic, VmState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::capability::{with_script_rng, Capabilities, InstalledCapabilities};

pub(crate) const CHUNK_NAME: &str = "game";
pub(crate) const INSTRUCTION_BUDGET_EXCEEDED: &str = "instruction budget exceeded";
const BUDGET_CHECK_INTERVAL: u32 = 10_000;

/// Base functions a script may call. Everything else (`load`, `require`,
/// `dofile`, `collectgarbage`, `io`, `os`, `debug`, `package`) is absent.
const SAFE_GLOBALS: [&str; 19] = [
    "assert",
    "error",
    "getmetatable",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "rawequal",
    "rawget",
    "rawlen",
    "rawset",
    "select",
    "setmetatable",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
    "_VERSION",
    "coroutine",
];

const SAFE_LIBRARIES: [&str; 4] = ["math", "string", "table", "utf8"];

/// Resource caps applied to every VM the loader creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// VM instructions per call into script code; `0` disables the budget.
    pub instruction_budget: u64,
    /// `0` leaves the allocator unlimited.
    pub memory_limit_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            instruction_budget: 50_000_000,
            memory_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

/// One fresh Lua VM plus the environment table scripts run against.
pub(crate) struct Sandbox {
    lua: Lua,
    env: Table,
    installed: InstalledCapabilities,
    limits: SandboxLimits,
}

impl Sandbox {
    pub(crate) fn new(limits: SandboxLimits, capabilities: &Capabilities) -> mlua::Result<Self> {
        let lua = Lua::new_with(
            StdLib::MATH | StdLib::STRING | StdLib::TABLE | StdLib::UTF8 | StdLib::COROUTINE,
            LuaOptions::default(),
        )?;
        if limits.memory_limit_bytes > 0 {
            lua.set_memory_limit(limits.memory_limit_bytes)?;
        }

        let env = lua.create_table()?;
        let globals = lua.globals();
        for name in SAFE_GLOBALS.iter().chain(SAFE_LIBRARIES.iter()) {
            env.raw_set(*name, globals.raw_get::<Value>(*name)?)?;
        }
        if let Ok(table) = globals.raw_get::<Table>("table") {
            env.raw_set("unpack", table.raw_get::<Value>("unpack")?)?;
        }
        env.raw_set("_G", env.clone())?;
        env.raw_set("print", create_print(&lua)?)?;
        install_script_random(&lua, &env)?;

        let installed = capabilities.install(&lua, &env)?;
        Ok(Self {
            lua,
            env,
            installed,
            limits,
        })
    }

    pub(crate) fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Compiles `source` as the `game` chunk and runs it under the budget.
    pub(crate) fn evaluate(&self, source: &str) -> mlua::Result<Value> {
        let chunk = self
            .lua
            .load(source)
            .set_name(CHUNK_NAME)
            .set_environment(self.env.clone())
            .into_function()?;
        self.call(&chunk, ())
    }

    pub(crate) fn call<R: FromLuaMulti>(
        &self,
        function: &Function,
        args: impl IntoLuaMulti,
    ) -> mlua::Result<R> {
        self.with_budget(|| function.call::<R>(args))
    }

    /// Runs `f` with an instruction-count hook installed, so runaway loops
    /// raise an ordinary Lua error instead of hanging the host.
    pub(crate) fn with_budget<T>(&self, f: impl FnOnce() -> mlua::Result<T>) -> mlua::Result<T> {
        let budget = self.limits.instruction_budget;
        if budget == 0 {
            return f();
        }

        let executed = Cell::new(0u64);
        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(BUDGET_CHECK_INTERVAL),
            move |_, _| {
                let total = executed.get().saturating_add(u64::from(BUDGET_CHECK_INTERVAL));
                executed.set(total);
                if total > budget {
                    return Err(mlua::Error::runtime(INSTRUCTION_BUDGET_EXCEEDED));
                }
                Ok(VmState::Continue)
            },
        );
        let result = f();
        self.lua.remove_hook();
        result
    }

    /// Capability names the script replaced with its own globals.
    pub(crate) fn shadowed_capabilities(&self) -> mlua::Result<Vec<&'static str>> {
        self.installed.shadowed_in(&self.env)
    }
}

fn create_print(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|_, args: Variadic<Value>| {
        let line = args.iter().map(display_value).collect::<Vec<_>>().join("\t");
        info!(target: "script", message = %line, "script_print");
        Ok(())
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(value) => value.to_string(),
        Value::Integer(value) => value.to_string(),
        Value::Number(value) => value.to_string(),
        Value::String(value) => value.to_string_lossy().to_string(),
        other => other.type_name().to_string(),
    }
}

/// Replaces `math.random`/`math.randomseed` with versions backed by the
/// runtime RNG, so seeded runs replay identically.
fn install_script_random(lua: &Lua, env: &Table) -> mlua::Result<()> {
    let math = lua.create_table()?;
    if let Ok(builtin) = env.raw_get::<Table>("math") {
        for pair in builtin.pairs::<Value, Value>() {
            let (key, value) = pair?;
            math.raw_set(key, value)?;
        }
    }

    let random = lua.create_function(|lua, (low, high): (Option<i64>, Option<i64>)| {
        let (low, high) = match (low, high) {
            (None, _) => {
                let value: f64 = with_script_rng(lua, |rng| rng.gen::<f64>());
                return Ok(Value::Number(value));
            }
            (Some(high), None) => (1, high),
            (Some(low), Some(high)) => (low, high),
        };
        if low > high {
            return Err(mlua::Error::runtime("bad argument to 'random' (interval is empty)"));
        }
        let value = with_script_rng(lua, |rng| rng.gen_range(low..=high));
        Ok(Value::Integer(value))
    })?;
    let randomseed = lua.create_function(|lua, seed: Option<f64>| {
        let seed = seed.filter(|seed| seed.is_finite()).unwrap_or(0.0);
        with_script_rng(lua, |rng| *rng = StdRng::seed_from_u64(seed.to_bits()));
        Ok(())
    })?;
    math.raw_set("random", random)?;
    math.raw_set("randomseed", randomseed)?;
    env.raw_set("math", math)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::capability::{AudioEngine, Palette};

    fn sandbox_with(limits: SandboxLimits) -> Sandbox {
        let capabilities = Capabilities::new(
            Rc::new(RefCell::new(AudioEngine::silent())),
            Rc::new(RefCell::new(StdRng::seed_from_u64(3))),
            Palette::default(),
        );
        Sandbox::new(limits, &capabilities).expect("sandbox")
    }

    fn sandbox() -> Sandbox {
        sandbox_with(SandboxLimits::default())
    }

    #[test]
    fn dangerous_globals_are_absent() {
        let sandbox = sandbox();
        let value = sandbox
            .evaluate(
                "return io == nil and os == nil and debug == nil and require == nil \
                 and load == nil and dofile == nil and loadfile == nil \
                 and collectgarbage == nil and package == nil",
            )
            .expect("evaluate");
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn safe_subset_is_usable() {
        let sandbox = sandbox();
        let value = sandbox
            .evaluate(
                r#"
                local t = { 3, 1, 2 }
                table.sort(t)
                local a, b = unpack(t)
                return string.format("%d-%d-%s", a, b, tostring(math.floor(2.7)))
                "#,
            )
            .expect("evaluate");
        let Value::String(text) = value else {
            panic!("expected a string, got {value:?}");
        };
        assert_eq!(text.to_str().expect("utf8"), "1-2-2");
    }

    #[test]
    fn globals_stay_inside_the_environment() {
        let sandbox = sandbox();
        sandbox.evaluate("leaked = 1").expect("evaluate");
        assert!(sandbox.lua().globals().raw_get::<Value>("leaked").expect("get").is_nil());
        assert_eq!(
            sandbox.env.raw_get::<Value>("leaked").expect("get"),
            Value::Integer(1)
        );
    }

    #[test]
    fn runaway_loop_hits_instruction_budget() {
        let sandbox = sandbox_with(SandboxLimits {
            instruction_budget: 200_000,
            memory_limit_bytes: 0,
        });
        let error = sandbox.evaluate("while true do end").expect_err("budget");
        assert!(error.to_string().contains(INSTRUCTION_BUDGET_EXCEEDED), "{error}");

        // the hook is removed again, so a cheap call afterwards succeeds
        assert_eq!(sandbox.evaluate("return 1").expect("evaluate"), Value::Integer(1));
    }

    #[test]
    fn memory_limit_stops_unbounded_allocation() {
        let sandbox = sandbox_with(SandboxLimits {
            instruction_budget: 0,
            memory_limit_bytes: 4 * 1024 * 1024,
        });
        let result = sandbox.evaluate(
            "local t = {} for i = 1, 10000000 do t[i] = string.rep('x', 64) .. i end return #t",
        );
        assert!(result.is_err());
    }

    #[test]
    fn math_random_follows_lua_argument_forms() {
        let sandbox = sandbox();
        let value = sandbox
            .evaluate(
                r#"
                for _ = 1, 200 do
                  local f = math.random()
                  local a = math.random(6)
                  local b = math.random(-2, 2)
                  if f < 0 or f >= 1 or a < 1 or a > 6 or b < -2 or b > 2 then
                    return false
                  end
                end
                return not pcall(math.random, 5, 1)
                "#,
            )
            .expect("evaluate");
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn chunk_errors_name_the_game_chunk() {
        let sandbox = sandbox();
        let error = sandbox.evaluate("local x = nil\nreturn x.y").expect_err("runtime error");
        assert!(error.to_string().contains("[string \"game\"]:2:"), "{error}");
    }
}
