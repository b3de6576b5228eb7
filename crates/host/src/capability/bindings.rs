use std::cell::RefCell;
use std::rc::Rc;

use mlua::{
    AnyUserData, FromLua, Lua, MetaMethod, Table, UserData, UserDataFields, UserDataMethods,
    Value, Variadic,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::audio::{AudioEngine, Cue};
use super::palette::Palette;
use super::vector::Vector;

/// Global names the loader binds into every script environment.
pub const CAPABILITY_MANIFEST: [&str; 3] = ["Vector", "COLORS", "sfx"];

/// Either a number or a vector; lets `v:add(2)` and `v:add(w)` share one method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Vector(Vector),
}

impl Operand {
    fn add_to(self, base: Vector) -> Vector {
        match self {
            Operand::Scalar(value) => base.add_scalar(value),
            Operand::Vector(other) => base.add(other),
        }
    }

    fn sub_from(self, base: Vector) -> Vector {
        match self {
            Operand::Scalar(value) => base.sub_scalar(value),
            Operand::Vector(other) => base.sub(other),
        }
    }
}

impl FromLua for Operand {
    fn from_lua(value: Value, lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::Integer(value) => Ok(Operand::Scalar(value as f64)),
            Value::Number(value) => Ok(Operand::Scalar(value)),
            other => Vector::from_lua(other, lua).map(Operand::Vector),
        }
    }
}

/// Accepts vector userdata or any table with numeric `x`/`y` fields.
impl FromLua for Vector {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::UserData(data) => {
                let vector = data.borrow::<Vector>()?;
                Ok(*vector)
            }
            Value::Table(table) => {
                let x = table.get::<Option<f64>>("x")?.unwrap_or(0.0);
                let y = table.get::<Option<f64>>("y")?.unwrap_or(0.0);
                Ok(Vector::new(x, y))
            }
            other => Err(mlua::Error::runtime(format!(
                "expected a Vector, got {}",
                other.type_name()
            ))),
        }
    }
}

impl UserData for Vector {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("x", |_, this| Ok(this.x));
        fields.add_field_method_get("y", |_, this| Ok(this.y));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("add", |_, this, other: Operand| Ok(other.add_to(*this)));
        methods.add_method("sub", |_, this, other: Operand| Ok(other.sub_from(*this)));
        for name in ["mult", "multiply", "scale"] {
            methods.add_method(name, |_, this, factor: f64| Ok(this.scale(factor)));
        }
        for name in ["div", "divide"] {
            methods.add_method(name, |_, this, divisor: f64| Ok(this.div(divisor)));
        }
        methods.add_method("mag", |_, this, ()| Ok(this.mag()));
        methods.add_method("magSq", |_, this, ()| Ok(this.mag_sq()));
        methods.add_method("normalize", |_, this, ()| Ok(this.normalize()));
        methods.add_method("limit", |_, this, max: f64| Ok(this.limit(max)));
        methods.add_method("setMag", |_, this, length: f64| Ok(this.set_mag(length)));
        methods.add_method("heading", |_, this, ()| Ok(this.heading()));
        methods.add_method("rotate", |_, this, angle: f64| Ok(this.rotate(angle)));
        methods.add_method("lerp", |_, this, (target, amount): (Vector, f64)| {
            Ok(this.lerp(target, amount))
        });
        methods.add_method("dot", |_, this, other: Vector| Ok(this.dot(other)));
        methods.add_method("cross", |_, this, other: Vector| Ok(this.cross(other)));
        methods.add_method("dist", |_, this, other: Vector| Ok(this.dist(other)));
        methods.add_method("distSq", |_, this, other: Vector| Ok(this.dist_sq(other)));
        methods.add_method("copy", |_, this, ()| Ok(*this));

        methods.add_meta_function(MetaMethod::Add, |_, (a, b): (Operand, Operand)| {
            Ok(combine(a, b, |base, other| other.add_to(base)))
        });
        methods.add_meta_function(MetaMethod::Sub, |_, (a, b): (Operand, Operand)| {
            Ok(match (a, b) {
                (Operand::Vector(base), other) => other.sub_from(base),
                (Operand::Scalar(value), Operand::Vector(other)) => {
                    Vector::new(value - other.x, value - other.y)
                }
                (Operand::Scalar(_), Operand::Scalar(_)) => Vector::ZERO,
            })
        });
        methods.add_meta_function(MetaMethod::Mul, |_, (a, b): (Operand, Operand)| {
            Ok(match (a, b) {
                (Operand::Vector(v), Operand::Scalar(s)) | (Operand::Scalar(s), Operand::Vector(v)) => {
                    v.scale(s)
                }
                (Operand::Vector(a), Operand::Vector(b)) => Vector::new(a.x * b.x, a.y * b.y),
                (Operand::Scalar(_), Operand::Scalar(_)) => Vector::ZERO,
            })
        });
        methods.add_meta_function(MetaMethod::Div, |_, (a, b): (Operand, Operand)| {
            Ok(match (a, b) {
                (Operand::Vector(v), Operand::Scalar(s)) => v.div(s),
                _ => Vector::ZERO,
            })
        });
        methods.add_meta_method(MetaMethod::Unm, |_, this, ()| Ok(-*this));
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Vector| Ok(*this == other));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("Vector({}, {})", this.x, this.y))
        });
    }
}

fn combine(a: Operand, b: Operand, op: impl Fn(Vector, Operand) -> Vector) -> Vector {
    match (a, b) {
        (Operand::Vector(base), other) => op(base, other),
        (scalar @ Operand::Scalar(_), Operand::Vector(base)) => op(base, scalar),
        (Operand::Scalar(_), Operand::Scalar(_)) => Vector::ZERO,
    }
}

/// The global `Vector` namespace: constructors plus static forms of the
/// binary operations. Also callable, `Vector(x, y)`.
struct VectorLibrary;

impl UserData for VectorLibrary {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_function("new", |_, (x, y): (Option<f64>, Option<f64>)| {
            Ok(Vector::new(x.unwrap_or(0.0), y.unwrap_or(0.0)))
        });
        methods.add_function("zero", |_, ()| Ok(Vector::ZERO));
        methods.add_function("random2D", |lua, ()| {
            Ok(with_script_rng(lua, |rng| Vector::random_unit(rng)))
        });
        methods.add_function("fromAngle", |_, (angle, length): (f64, Option<f64>)| {
            Ok(Vector::from_angle(angle, length.unwrap_or(1.0)))
        });
        methods.add_function("add", |_, (a, b): (Vector, Operand)| Ok(b.add_to(a)));
        methods.add_function("sub", |_, (a, b): (Vector, Operand)| Ok(b.sub_from(a)));
        for name in ["mult", "multiply", "scale"] {
            methods.add_function(name, |_, (a, factor): (Vector, f64)| Ok(a.scale(factor)));
        }
        for name in ["div", "divide"] {
            methods.add_function(name, |_, (a, divisor): (Vector, f64)| Ok(a.div(divisor)));
        }
        methods.add_function("mag", |_, a: Vector| Ok(a.mag()));
        methods.add_function("magSq", |_, a: Vector| Ok(a.mag_sq()));
        methods.add_function("normalize", |_, a: Vector| Ok(a.normalize()));
        methods.add_function("limit", |_, (a, max): (Vector, f64)| Ok(a.limit(max)));
        methods.add_function("setMag", |_, (a, length): (Vector, f64)| Ok(a.set_mag(length)));
        methods.add_function("heading", |_, a: Vector| Ok(a.heading()));
        methods.add_function("rotate", |_, (a, angle): (Vector, f64)| Ok(a.rotate(angle)));
        methods.add_function("copy", |_, a: Vector| Ok(a));
        methods.add_function("dist", |_, (a, b): (Vector, Vector)| Ok(a.dist(b)));
        methods.add_function("distance", |_, (a, b): (Vector, Vector)| Ok(a.dist(b)));
        methods.add_function("distSq", |_, (a, b): (Vector, Vector)| Ok(a.dist_sq(b)));
        methods.add_function("lerp", |_, (a, b, amount): (Vector, Vector, f64)| {
            Ok(a.lerp(b, amount))
        });
        methods.add_function("dot", |_, (a, b): (Vector, Vector)| Ok(a.dot(b)));
        methods.add_function("cross", |_, (a, b): (Vector, Vector)| Ok(a.cross(b)));

        methods.add_meta_function(
            MetaMethod::Call,
            |_, (_library, x, y): (AnyUserData, Option<f64>, Option<f64>)| {
                Ok(Vector::new(x.unwrap_or(0.0), y.unwrap_or(0.0)))
            },
        );
        methods.add_meta_method(MetaMethod::ToString, |_, _, ()| Ok("Vector"));
    }
}

/// The global `sfx` object. Works with both `sfx.play(name)` and `sfx:play(name)`.
struct SfxHandle;

impl UserData for SfxHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_function("play", |lua, args: Variadic<Value>| {
            let name = args.iter().rev().find_map(|arg| match arg {
                Value::String(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            });
            let cue = Cue::from_name(name.as_deref().unwrap_or_default());
            let played = with_script_audio(lua, |engine| engine.play(cue)).unwrap_or(false);
            debug!(cue = cue.name(), played, "sfx_play");
            Ok(played)
        });
        methods.add_function("resume", |lua, _: Variadic<Value>| {
            with_script_audio(lua, |engine| {
                engine.resume();
            });
            Ok(())
        });
        methods.add_meta_method(MetaMethod::ToString, |_, _, ()| Ok("sfx"));
    }
}

#[derive(Clone)]
struct ScriptRng(Rc<RefCell<StdRng>>);

#[derive(Clone)]
struct ScriptAudio(Rc<RefCell<AudioEngine>>);

/// Runs `f` on the runtime RNG bound to this VM, or on a throwaway entropy
/// RNG when the VM has none or it is already borrowed.
pub(crate) fn with_script_rng<T>(lua: &Lua, f: impl FnOnce(&mut StdRng) -> T) -> T {
    let shared = lua.app_data_ref::<ScriptRng>().map(|rng| Rc::clone(&rng.0));
    let borrowed = shared.as_ref().and_then(|rng| rng.try_borrow_mut().ok());
    match borrowed {
        Some(mut rng) => f(&mut rng),
        None => f(&mut StdRng::from_entropy()),
    }
}

fn with_script_audio<T>(lua: &Lua, f: impl FnOnce(&mut AudioEngine) -> T) -> Option<T> {
    let shared = lua.app_data_ref::<ScriptAudio>().map(|audio| Rc::clone(&audio.0))?;
    let mut engine = shared.try_borrow_mut().ok()?;
    Some(f(&mut engine))
}

/// Values bound into one script environment, kept so the loader can tell
/// which ones the script later replaced.
#[derive(Debug, Clone)]
pub struct InstalledCapabilities {
    bindings: Vec<(&'static str, Value)>,
}

impl InstalledCapabilities {
    /// Manifest names whose global no longer holds the host's value.
    pub fn shadowed_in(&self, env: &Table) -> mlua::Result<Vec<&'static str>> {
        let mut shadowed = Vec::new();
        for (name, installed) in &self.bindings {
            let current = env.raw_get::<Value>(*name)?;
            if current != *installed {
                shadowed.push(*name);
            }
        }
        Ok(shadowed)
    }
}

/// Per-runtime capability set shared by every script the runtime loads.
#[derive(Debug, Clone)]
pub struct Capabilities {
    audio: Rc<RefCell<AudioEngine>>,
    rng: Rc<RefCell<StdRng>>,
    palette: Palette,
}

impl Capabilities {
    pub fn new(audio: Rc<RefCell<AudioEngine>>, rng: Rc<RefCell<StdRng>>, palette: Palette) -> Self {
        Self {
            audio,
            rng,
            palette,
        }
    }

    pub fn audio(&self) -> &Rc<RefCell<AudioEngine>> {
        &self.audio
    }

    pub fn rng(&self) -> &Rc<RefCell<StdRng>> {
        &self.rng
    }

    pub fn install(&self, lua: &Lua, env: &Table) -> mlua::Result<InstalledCapabilities> {
        lua.set_app_data(ScriptRng(Rc::clone(&self.rng)));
        lua.set_app_data(ScriptAudio(Rc::clone(&self.audio)));

        let colors = lua.create_table()?;
        for (name, value) in self.palette.entries() {
            colors.raw_set(name, value)?;
        }

        let bindings = vec![
            ("Vector", Value::UserData(lua.create_userdata(VectorLibrary)?)),
            ("COLORS", Value::Table(colors)),
            ("sfx", Value::UserData(lua.create_userdata(SfxHandle)?)),
        ];
        for (name, value) in &bindings {
            env.raw_set(*name, value.clone())?;
        }
        Ok(InstalledCapabilities { bindings })
    }
}
