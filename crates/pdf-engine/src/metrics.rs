//! Built-in glyph metrics for the standard fonts, used when a font dictionary
//! carries no `/Widths` of its own.

/// Helvetica advance widths for codes 32..=126, in glyph units (1/1000 em).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const COURIER_WIDTH: f32 = 600.0;
const DEFAULT_WIDTH: f32 = 500.0;

/// Ascent/descent used when no `/FontDescriptor` is available.
pub(crate) const DEFAULT_ASCENT: f32 = 0.8;
pub(crate) const DEFAULT_DESCENT: f32 = -0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StandardFamily {
    Helvetica,
    Courier,
    Other,
}

impl StandardFamily {
    pub(crate) fn from_base_font(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("courier") || lower.contains("mono") {
            Self::Courier
        } else if lower.contains("helvetica") || lower.contains("arial") {
            Self::Helvetica
        } else {
            Self::Other
        }
    }

    /// Advance width in glyph units for a character code.
    pub(crate) fn width(self, code: u32) -> f32 {
        match self {
            Self::Courier => COURIER_WIDTH,
            // Times and unknown fonts are approximated with Helvetica.
            Self::Helvetica | Self::Other => {
                if (32..=126).contains(&code) {
                    HELVETICA_WIDTHS[(code - 32) as usize] as f32
                } else {
                    DEFAULT_WIDTH
                }
            }
        }
    }
}
