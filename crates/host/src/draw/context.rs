use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use mlua::{UserData, UserDataFields, UserDataMethods, Value, Variadic};

use super::display_list::{DisplayList, Transform};
use super::font;
use super::surface::DrawSurface;

/// The `ctx` object passed to a script's `draw` hook.
///
/// Numeric arguments are read leniently: anything that is not a number
/// becomes NaN and the call is dropped by the display list, so a bad
/// coordinate never escalates into a script fault.
#[derive(Debug, Clone, Default)]
pub struct DrawContext {
    list: Rc<RefCell<DisplayList>>,
}

impl DrawContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&self) {
        if let Ok(mut list) = self.list.try_borrow_mut() {
            list.begin_frame();
        }
    }

    pub fn replay(&self, surface: &mut dyn DrawSurface) {
        if let Ok(list) = self.list.try_borrow() {
            list.replay(surface);
        }
    }

    pub fn command_count(&self) -> usize {
        self.list.try_borrow().map(|list| list.commands().len()).unwrap_or(0)
    }

    pub fn dropped(&self) -> usize {
        self.list.try_borrow().map(|list| list.dropped()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Option<DisplayList> {
        self.list.try_borrow().ok().map(|list| list.clone())
    }

    fn list_mut(&self) -> mlua::Result<RefMut<'_, DisplayList>> {
        self.list
            .try_borrow_mut()
            .map_err(|_| mlua::Error::runtime("drawing context is busy"))
    }
}

fn number(args: &[Value], index: usize) -> f64 {
    match args.get(index) {
        Some(Value::Integer(value)) => *value as f64,
        Some(Value::Number(value)) => *value,
        _ => f64::NAN,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.to_string_lossy().to_string()),
        Value::Integer(value) => Some(value.to_string()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

macro_rules! ctx_method {
    ($methods:expr, $name:literal, |$list:ident, $args:ident| $body:expr) => {
        $methods.add_method($name, |_, this, $args: Variadic<Value>| {
            let mut $list = this.list_mut()?;
            $body;
            Ok(())
        });
    };
}

impl UserData for DrawContext {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("fillStyle", |_, this| {
            Ok(this.list_mut()?.fill_style().to_string())
        });
        fields.add_field_method_set("fillStyle", |_, this, value: Value| {
            if let Some(raw) = text(&value) {
                this.list_mut()?.set_fill_style(&raw);
            }
            Ok(())
        });
        fields.add_field_method_get("strokeStyle", |_, this| {
            Ok(this.list_mut()?.stroke_style().to_string())
        });
        fields.add_field_method_set("strokeStyle", |_, this, value: Value| {
            if let Some(raw) = text(&value) {
                this.list_mut()?.set_stroke_style(&raw);
            }
            Ok(())
        });
        fields.add_field_method_get("lineWidth", |_, this| Ok(this.list_mut()?.line_width()));
        fields.add_field_method_set("lineWidth", |_, this, value: Value| {
            this.list_mut()?.set_line_width(number(&[value], 0));
            Ok(())
        });
        fields.add_field_method_get("globalAlpha", |_, this| {
            Ok(this.list_mut()?.global_alpha())
        });
        fields.add_field_method_set("globalAlpha", |_, this, value: Value| {
            this.list_mut()?.set_global_alpha(number(&[value], 0));
            Ok(())
        });
        fields.add_field_method_get("font", |_, this| Ok(this.list_mut()?.font().to_string()));
        fields.add_field_method_set("font", |_, this, value: Value| {
            if let Some(raw) = text(&value) {
                this.list_mut()?.set_font(&raw);
            }
            Ok(())
        });
        fields.add_field_method_get("textAlign", |_, this| {
            Ok(this.list_mut()?.text_align().as_str())
        });
        fields.add_field_method_set("textAlign", |_, this, value: Value| {
            if let Some(raw) = text(&value) {
                this.list_mut()?.set_text_align(&raw);
            }
            Ok(())
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        ctx_method!(methods, "clearRect", |list, args| list.clear_rect(
            number(&args, 0),
            number(&args, 1),
            number(&args, 2),
            number(&args, 3)
        ));
        ctx_method!(methods, "fillRect", |list, args| list.fill_rect(
            number(&args, 0),
            number(&args, 1),
            number(&args, 2),
            number(&args, 3)
        ));
        ctx_method!(methods, "strokeRect", |list, args| list.stroke_rect(
            number(&args, 0),
            number(&args, 1),
            number(&args, 2),
            number(&args, 3)
        ));
        ctx_method!(methods, "rect", |list, args| list.rect(
            number(&args, 0),
            number(&args, 1),
            number(&args, 2),
            number(&args, 3)
        ));
        ctx_method!(methods, "beginPath", |list, _args| list.begin_path());
        ctx_method!(methods, "closePath", |list, _args| list.close_path());
        ctx_method!(methods, "moveTo", |list, args| list
            .move_to(number(&args, 0), number(&args, 1)));
        ctx_method!(methods, "lineTo", |list, args| list
            .line_to(number(&args, 0), number(&args, 1)));
        ctx_method!(methods, "arc", |list, args| list.arc(
            number(&args, 0),
            number(&args, 1),
            number(&args, 2),
            number(&args, 3),
            number(&args, 4),
            matches!(args.get(5), Some(Value::Boolean(true)))
        ));
        ctx_method!(methods, "fill", |list, _args| list.fill());
        ctx_method!(methods, "stroke", |list, _args| list.stroke());
        ctx_method!(methods, "fillText", |list, args| {
            if let Some(content) = args.first().and_then(text) {
                list.fill_text(&content, number(&args, 1), number(&args, 2));
            }
        });
        ctx_method!(methods, "save", |list, _args| list.save());
        ctx_method!(methods, "restore", |list, _args| list.restore());
        ctx_method!(methods, "translate", |list, args| list
            .translate(number(&args, 0), number(&args, 1)));
        ctx_method!(methods, "scale", |list, args| list
            .scale(number(&args, 0), number(&args, 1)));
        ctx_method!(methods, "rotate", |list, args| list.rotate(number(&args, 0)));
        ctx_method!(methods, "setTransform", |list, args| list.set_transform(Transform {
            a: number(&args, 0),
            b: number(&args, 1),
            c: number(&args, 2),
            d: number(&args, 3),
            e: number(&args, 4),
            f: number(&args, 5),
        }));
        ctx_method!(methods, "resetTransform", |list, _args| list.reset_transform());

        methods.add_method("measureText", |lua, this, content: Value| {
            let content = text(&content).unwrap_or_default();
            let list = this.list_mut()?;
            let scale = font::scale_for_size(list.font_px());
            let metrics = lua.create_table()?;
            metrics.set("width", font::text_width(&content, scale))?;
            Ok(metrics)
        });
    }
}
