use mlua::{AnyUserData, Function, Lua, Table, Value};

use super::loader::{LoadError, LoadStrategy};
use super::sandbox::Sandbox;
use super::{Hook, ScriptFault};
use crate::draw::{DrawContext, DrawSurface};
use crate::input::InputSnapshot;

/// The three optional lifecycle slots of a loaded script.
#[derive(Debug, Clone, Default)]
pub struct LogicObject {
    init: Option<Function>,
    update: Option<Function>,
    draw: Option<Function>,
}

impl LogicObject {
    /// Reads each hook through normal indexing (so metatable-backed objects
    /// work). A slot that holds anything but a function or nil rejects the
    /// whole object.
    pub(crate) fn from_table(sandbox: &Sandbox, table: &Table) -> Result<Self, LoadError> {
        let mut logic = LogicObject::default();
        for hook in Hook::ALL {
            let value = sandbox
                .with_budget(|| table.get::<Value>(hook.name()))
                .map_err(|error| LoadError::from_evaluation(&error))?;
            let slot = match value {
                Value::Nil => None,
                Value::Function(function) => Some(function),
                other => {
                    return Err(LoadError::InvalidHook {
                        hook: hook.name(),
                        found: other.type_name().to_string(),
                    })
                }
            };
            match hook {
                Hook::Init => logic.init = slot,
                Hook::Update => logic.update = slot,
                Hook::Draw => logic.draw = slot,
            }
        }
        Ok(logic)
    }

    pub fn has(&self, hook: Hook) -> bool {
        self.slot(hook).is_some()
    }

    pub fn is_inert(&self) -> bool {
        Hook::ALL.iter().all(|hook| !self.has(*hook))
    }

    fn slot(&self, hook: Hook) -> Option<&Function> {
        match hook {
            Hook::Init => self.init.as_ref(),
            Hook::Update => self.update.as_ref(),
            Hook::Draw => self.draw.as_ref(),
        }
    }
}

/// A successfully loaded script: its private VM, logic object, state table
/// and drawing context. Dropping it tears the VM down.
pub struct ScriptInstance {
    sandbox: Sandbox,
    logic: LogicObject,
    state: Table,
    ctx: DrawContext,
    ctx_handle: AnyUserData,
    strategy: LoadStrategy,
}

impl ScriptInstance {
    pub(crate) fn new(
        sandbox: Sandbox,
        logic: LogicObject,
        strategy: LoadStrategy,
    ) -> mlua::Result<Self> {
        let state = sandbox.lua().create_table()?;
        let ctx = DrawContext::new();
        let ctx_handle = sandbox.lua().create_userdata(ctx.clone())?;
        Ok(Self {
            sandbox,
            logic,
            state,
            ctx,
            ctx_handle,
            strategy,
        })
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    pub fn logic(&self) -> &LogicObject {
        &self.logic
    }

    pub fn state(&self) -> &Table {
        &self.state
    }

    pub fn draw_context(&self) -> &DrawContext {
        &self.ctx
    }

    pub fn lua(&self) -> &Lua {
        self.sandbox.lua()
    }

    pub fn call_init(&self, width: f64, height: f64) -> Result<(), ScriptFault> {
        let Some(init) = self.logic.slot(Hook::Init) else {
            return Ok(());
        };
        let args = (
            self.state.clone(),
            lua_number(width),
            lua_number(height),
        );
        self.sandbox
            .call::<()>(init, args)
            .map_err(|error| ScriptFault::from_lua(Hook::Init, &error))
    }

    pub fn call_update(
        &self,
        input: &InputSnapshot,
        dt: f64,
        width: f64,
        height: f64,
    ) -> Result<(), ScriptFault> {
        let Some(update) = self.logic.slot(Hook::Update) else {
            return Ok(());
        };
        let fault = |error: mlua::Error| ScriptFault::from_lua(Hook::Update, &error);
        let input = input_table(self.sandbox.lua(), input).map_err(fault)?;
        let args = (
            self.state.clone(),
            input,
            dt,
            lua_number(width),
            lua_number(height),
        );
        self.sandbox.call::<()>(update, args).map_err(fault)
    }

    /// Records a fresh display list. Commands issued before a fault are kept
    /// and can still be replayed.
    pub fn call_draw(&self, width: f64, height: f64) -> Result<(), ScriptFault> {
        self.ctx.begin_frame();
        let Some(draw) = self.logic.slot(Hook::Draw) else {
            return Ok(());
        };
        let args = (
            self.state.clone(),
            self.ctx_handle.clone(),
            lua_number(width),
            lua_number(height),
        );
        self.sandbox
            .call::<()>(draw, args)
            .map_err(|error| ScriptFault::from_lua(Hook::Draw, &error))
    }

    pub fn replay(&self, surface: &mut dyn DrawSurface) {
        self.ctx.replay(surface);
    }

    pub(crate) fn shadowed_capabilities(&self) -> mlua::Result<Vec<&'static str>> {
        self.sandbox.shadowed_capabilities()
    }
}

/// Whole numbers cross into Lua as integers so `"w=" .. w` reads `w=800`.
fn lua_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::Integer(value as i64)
    } else {
        Value::Number(value)
    }
}

/// Builds the per-tick `input` table. `pointer` and `mouse` alias the table
/// itself, and only held keys appear in `keys`.
fn input_table(lua: &Lua, snapshot: &InputSnapshot) -> mlua::Result<Table> {
    let input = lua.create_table()?;
    input.raw_set("x", snapshot.x)?;
    input.raw_set("y", snapshot.y)?;
    input.raw_set("isDown", snapshot.is_down)?;

    let keys = lua.create_table()?;
    for key in &snapshot.keys {
        keys.raw_set(key.as_str(), true)?;
    }
    input.raw_set("keys", keys)?;
    input.raw_set("pointer", input.clone())?;
    input.raw_set("mouse", input.clone())?;
    Ok(input)
}
