/// Named colours exposed to scripts as the `COLORS` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub player: &'static str,
    pub enemy: &'static str,
    pub accent: &'static str,
    pub text: &'static str,
}

pub const DEFAULT_PALETTE: Palette = Palette {
    background: "#0b0f1a",
    player: "#00e5ff",
    enemy: "#ff3860",
    accent: "#ffd166",
    text: "#f4f8fc",
};

impl Default for Palette {
    fn default() -> Self {
        DEFAULT_PALETTE
    }
}

impl Palette {
    pub fn entries(&self) -> [(&'static str, &'static str); 5] {
        [
            ("background", self.background),
            ("player", self.player),
            ("enemy", self.enemy),
            ("accent", self.accent),
            ("text", self.text),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::parse_css_color;

    #[test]
    fn every_default_entry_is_a_parseable_colour() {
        for (name, value) in DEFAULT_PALETTE.entries() {
            assert!(
                parse_css_color(value).is_some(),
                "palette entry {name} does not parse: {value}"
            );
        }
    }
}
