//! 3x5 bitmap font shared by `fillText` and the diagnostic overlay.
//! Lowercase letters render with the uppercase shapes.

pub const GLYPH_WIDTH: i32 = 3;
pub const GLYPH_HEIGHT: i32 = 5;
/// Longest run of characters that is ever recorded or rasterized.
pub const MAX_TEXT_CHARS: usize = 4096;

const FIRST_GLYPH: u8 = b' ';
const MAX_SCALE: i32 = 64;

// One entry per code point from ' ' (0x20) through '_' (0x5F). Each row holds
// three pixels, most significant bit leftmost.
#[rustfmt::skip]
const GLYPHS: [[u8; 5]; 64] = [
    [0, 0, 0, 0, 0],                     // ' '
    [2, 2, 2, 0, 2],                     // !
    [5, 5, 0, 0, 0],                     // "
    [5, 7, 5, 7, 5],                     // #
    [7, 6, 7, 3, 7],                     // $
    [5, 1, 2, 4, 5],                     // %
    [2, 5, 2, 5, 3],                     // &
    [2, 2, 0, 0, 0],                     // '
    [1, 2, 2, 2, 1],                     // (
    [4, 2, 2, 2, 4],                     // )
    [0, 5, 2, 5, 0],                     // *
    [0, 2, 7, 2, 0],                     // +
    [0, 0, 0, 2, 4],                     // ,
    [0, 0, 7, 0, 0],                     // -
    [0, 0, 0, 0, 2],                     // .
    [1, 1, 2, 4, 4],                     // /
    [7, 5, 5, 5, 7],                     // 0
    [2, 6, 2, 2, 7],                     // 1
    [7, 1, 7, 4, 7],                     // 2
    [7, 1, 3, 1, 7],                     // 3
    [5, 5, 7, 1, 1],                     // 4
    [7, 4, 7, 1, 7],                     // 5
    [7, 4, 7, 5, 7],                     // 6
    [7, 1, 1, 2, 2],                     // 7
    [7, 5, 7, 5, 7],                     // 8
    [7, 5, 7, 1, 7],                     // 9
    [0, 2, 0, 2, 0],                     // :
    [0, 2, 0, 2, 4],                     // ;
    [1, 2, 4, 2, 1],                     // <
    [0, 7, 0, 7, 0],                     // =
    [4, 2, 1, 2, 4],                     // >
    [7, 1, 3, 0, 2],                     // ?
    [7, 5, 7, 4, 7],                     // @
    [2, 5, 7, 5, 5],                     // A
    [6, 5, 6, 5, 6],                     // B
    [3, 4, 4, 4, 3],                     // C
    [6, 5, 5, 5, 6],                     // D
    [7, 4, 6, 4, 7],                     // E
    [7, 4, 6, 4, 4],                     // F
    [3, 4, 5, 5, 3],                     // G
    [5, 5, 7, 5, 5],                     // H
    [7, 2, 2, 2, 7],                     // I
    [1, 1, 1, 5, 2],                     // J
    [5, 5, 6, 5, 5],                     // K
    [4, 4, 4, 4, 7],                     // L
    [5, 7, 7, 5, 5],                     // M
    [6, 5, 5, 5, 5],                     // N
    [2, 5, 5, 5, 2],                     // O
    [6, 5, 6, 4, 4],                     // P
    [2, 5, 5, 6, 3],                     // Q
    [6, 5, 6, 5, 5],                     // R
    [3, 4, 2, 1, 6],                     // S
    [7, 2, 2, 2, 2],                     // T
    [5, 5, 5, 5, 7],                     // U
    [5, 5, 5, 5, 2],                     // V
    [5, 5, 7, 7, 5],                     // W
    [5, 5, 2, 5, 5],                     // X
    [5, 5, 2, 2, 2],                     // Y
    [7, 1, 2, 4, 7],                     // Z
    [3, 2, 2, 2, 3],                     // [
    [4, 4, 2, 1, 1],                     // backslash
    [6, 2, 2, 2, 6],                     // ]
    [2, 5, 0, 0, 0],                     // ^
    [0, 0, 0, 0, 7],                     // _
];

const FALLBACK_GLYPH: [u8; 5] = GLYPHS[(b'?' - FIRST_GLYPH) as usize];

/// Row bitmaps for `ch`. Characters outside the table draw as `?`;
/// control characters draw as blank space.
pub fn glyph_rows(ch: char) -> [u8; 5] {
    let ch = ch.to_ascii_uppercase();
    match ch {
        ' '..='_' => GLYPHS[(ch as u8 - FIRST_GLYPH) as usize],
        '`' => GLYPHS[(b'\'' - FIRST_GLYPH) as usize],
        '{' => GLYPHS[(b'(' - FIRST_GLYPH) as usize],
        '}' => GLYPHS[(b')' - FIRST_GLYPH) as usize],
        '|' => [2, 2, 2, 2, 2],
        '~' => [0, 3, 6, 0, 0],
        ch if ch.is_control() => GLYPHS[0],
        _ => FALLBACK_GLYPH,
    }
}

pub fn advance(scale: i32) -> i32 {
    (GLYPH_WIDTH + 1) * scale
}

pub fn line_height(scale: i32) -> i32 {
    (GLYPH_HEIGHT + 2) * scale
}

/// Integer glyph scale for a CSS pixel font size; 7px per glyph cell row
/// keeps cap height close to the requested size.
pub fn scale_for_size(size_px: f64) -> i32 {
    if !size_px.is_finite() {
        return 1;
    }
    ((size_px / 7.0).round() as i32).clamp(1, MAX_SCALE)
}

/// Width in pixels of `text` at `scale`, without trailing spacing.
/// Saturates at `i32::MAX` for absurdly long strings.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let count = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
    if count == 0 {
        return 0;
    }
    let scale = i64::from(scale.max(1));
    let width = count
        .saturating_mul((i64::from(GLYPH_WIDTH) + 1) * scale)
        .saturating_sub(scale);
    i32::try_from(width).unwrap_or(i32::MAX)
}

/// `text` cut to at most [`MAX_TEXT_CHARS`] characters.
pub fn clip_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Calls `plot(x, y)` for every lit pixel of `text` with its top-left corner
/// at `(x, y)`.
pub fn for_each_text_pixel(text: &str, x: i32, y: i32, scale: i32, mut plot: impl FnMut(i32, i32)) {
    let scale = scale.clamp(1, MAX_SCALE);
    let mut pen_x = x;
    for ch in clip_text(text).chars() {
        let rows = glyph_rows(ch);
        for (row_index, bits) in rows.iter().enumerate() {
            let top = y.saturating_add(row_index as i32 * scale);
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let left = pen_x.saturating_add(col * scale);
                for dy in 0..scale {
                    for dx in 0..scale {
                        plot(left.saturating_add(dx), top.saturating_add(dy));
                    }
                }
            }
        }
        pen_x = pen_x.saturating_add(advance(scale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_printable_ascii_character_has_a_glyph() {
        for byte in b' '..=b'~' {
            let rows = glyph_rows(byte as char);
            assert!(rows.iter().all(|row| *row <= 0b111), "{}", byte as char);
            if byte != b' ' {
                assert!(rows.iter().any(|row| *row != 0), "{} is blank", byte as char);
            }
        }
    }

    #[test]
    fn lowercase_shares_uppercase_shapes() {
        assert_eq!(glyph_rows('a'), glyph_rows('A'));
        assert_eq!(glyph_rows('z'), glyph_rows('Z'));
    }

    #[test]
    fn huge_text_width_saturates_instead_of_overflowing() {
        let long = "A".repeat(8_000_000);
        assert_eq!(text_width(&long, 64), 8_000_000 * 256 - 64);
        assert_eq!(text_width(&"A".repeat(20_000_000), 64), i32::MAX);
        assert_eq!(text_width("AB", 2), 14);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn clip_text_keeps_a_bounded_prefix() {
        let long = "é".repeat(MAX_TEXT_CHARS + 10);
        assert_eq!(clip_text(&long).chars().count(), MAX_TEXT_CHARS);
        assert_eq!(clip_text("short"), "short");
    }

    #[test]
    fn pixel_walk_near_i32_max_does_not_overflow() {
        let mut plotted = 0usize;
        for_each_text_pixel("WW", i32::MAX - 3, i32::MAX - 3, 64, |_, _| plotted += 1);
        assert!(plotted > 0);
    }

    #[test]
    fn unknown_characters_fall_back_to_question_mark() {
        assert_eq!(glyph_rows('é'), glyph_rows('?'));
        assert_eq!(glyph_rows('\n'), glyph_rows(' '));
    }

    #[test]
    fn text_width_follows_scale() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("A", 1), 3);
        assert_eq!(text_width("AB", 2), 14);
    }

    #[test]
    fn font_sizes_map_to_integer_scales() {
        assert_eq!(scale_for_size(10.0), 1);
        assert_eq!(scale_for_size(14.0), 2);
        assert_eq!(scale_for_size(48.0), 7);
        assert_eq!(scale_for_size(0.5), 1);
        assert_eq!(scale_for_size(f64::NAN), 1);
    }

    #[test]
    fn pixel_walk_scales_each_lit_cell() {
        let mut lit = 0;
        for_each_text_pixel(".", 0, 0, 3, |_, _| lit += 1);
        assert_eq!(lit, 9);
    }
}
