/// Straight (non-premultiplied) RGBA8, the same layout the frame buffer uses.
pub type Rgba = [u8; 4];

pub const WHITE: Rgba = [255, 255, 255, 255];
pub const BLACK: Rgba = [0, 0, 0, 255];

const NAMED_COLORS: [(&str, Rgba); 20] = [
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("lime", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("aqua", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("fuchsia", [255, 0, 255, 255]),
    ("orange", [255, 165, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("pink", [255, 192, 203, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("silver", [192, 192, 192, 255]),
    ("gold", [255, 215, 0, 255]),
    ("navy", [0, 0, 128, 255]),
    ("transparent", [0, 0, 0, 0]),
];

/// Parses the CSS colour forms scripts commonly emit: `#rgb`, `#rgba`,
/// `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` and a small set
/// of names.
pub fn parse_css_color(raw: &str) -> Option<Rgba> {
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = function_args(&value, "rgba").or_else(|| function_args(&value, "rgb")) {
        return parse_rgb_args(args);
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, color)| *color)
}

/// Scales the alpha channel by `alpha` (clamped to `[0, 1]`).
pub fn with_alpha(color: Rgba, alpha: f64) -> Rgba {
    let alpha = if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let [r, g, b, a] = color;
    [r, g, b, (f64::from(a) * alpha).round() as u8]
}

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |index: usize| u8::from_str_radix(&hex[index..index + 1], 16).ok();
    let byte = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
    match hex.len() {
        3 | 4 => {
            let mut color = [255u8; 4];
            for (slot, index) in (0..hex.len()).enumerate() {
                color[slot] = nibble(index)? * 17;
            }
            Some(color)
        }
        6 | 8 => {
            let mut color = [255u8; 4];
            for (slot, index) in (0..hex.len()).step_by(2).enumerate() {
                color[slot] = byte(index)?;
            }
            Some(color)
        }
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba> {
    let parts = args
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let mut color = [255u8; 4];
    for (slot, part) in parts.iter().take(3).enumerate() {
        color[slot] = parse_channel(part)?;
    }
    if let Some(alpha) = parts.get(3) {
        let alpha = match alpha.strip_suffix('%') {
            Some(percent) => percent.parse::<f64>().ok()? / 100.0,
            None => alpha.parse::<f64>().ok()?,
        };
        if !alpha.is_finite() {
            return None;
        }
        color[3] = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    Some(color)
}

fn parse_channel(part: &str) -> Option<u8> {
    let value = match part.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? * 2.55,
        None => part.parse::<f64>().ok()?,
    };
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_css_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_css_color("#f008"), Some([255, 0, 0, 136]));
        assert_eq!(parse_css_color("#00e5ff"), Some([0, 229, 255, 255]));
        assert_eq!(parse_css_color(" #FF386080 "), Some([255, 56, 96, 128]));
    }

    #[test]
    fn parses_functional_forms() {
        assert_eq!(parse_css_color("rgb(10, 20, 30)"), Some([10, 20, 30, 255]));
        assert_eq!(
            parse_css_color("rgba(255,255,255,0.5)"),
            Some([255, 255, 255, 128])
        );
        assert_eq!(parse_css_color("rgb(100% 0% 0% / 50%)"), Some([255, 0, 0, 128]));
        assert_eq!(parse_css_color("rgb(400, -5, 3)"), Some([255, 0, 3, 255]));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(parse_css_color("Orange"), Some([255, 165, 0, 255]));
        assert_eq!(parse_css_color("transparent"), Some([0, 0, 0, 0]));
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "#12", "#ggg", "rgb(1,2)", "rgb(a,b,c)", "blurple", "rgba(1,2,3,nan)"] {
            assert_eq!(parse_css_color(raw), None, "{raw}");
        }
    }

    #[test]
    fn with_alpha_scales_and_clamps() {
        assert_eq!(with_alpha([1, 2, 3, 200], 0.5), [1, 2, 3, 100]);
        assert_eq!(with_alpha([1, 2, 3, 200], 7.0), [1, 2, 3, 200]);
        assert_eq!(with_alpha([1, 2, 3, 200], f64::NAN), [1, 2, 3, 200]);
    }
}
