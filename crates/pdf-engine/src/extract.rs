//! Content-stream interpreter producing positioned words.
//!
//! Tracks enough of the graphics and text state to place each glyph in user
//! space: the CTM stack, text/line matrices, font size, character and word
//! spacing, horizontal scaling, rise, and the non-stroking colour. Glyph
//! boxes use the font's ascent/descent, so word boxes are true glyph extents
//! rather than baseline guesses.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::metrics::{StandardFamily, DEFAULT_ASCENT, DEFAULT_DESCENT};
use crate::{inherited_attribute, number, resolve, resolve_dict, EngineError, PageSize};

/// Form XObjects nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 8;

/// A `TJ` adjustment wider than this (thousandths of an em) reads as a space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Gap (fraction of the font size) above which adjacent shows are separate words.
const JOIN_TOLERANCE: f32 = 0.15;

/// One extracted word in top-left, y-down page points.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExtractedWord {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_name: String,
    /// Non-stroking colour, each component in `[0, 1]`.
    pub color: [f32; 3],
    pub bold: bool,
    pub italic: bool,
    pub has_trailing_space: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page_index: u32,
    pub size: PageSize,
    pub words: Vec<ExtractedWord>,
}

pub(crate) fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    page_index: u32,
    size: PageSize,
) -> Result<PageText, EngineError> {
    let content = page_content(doc, page_id);
    let resources = inherited_attribute(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r));

    let mut interpreter = Interpreter::new(doc, page_index);
    interpreter.run(&content, resources, GraphicsState::new(Matrix::IDENTITY), 0)?;
    interpreter.flush(false);

    let words = interpreter
        .words
        .into_iter()
        .map(|raw| raw.into_word(&size))
        .collect();

    Ok(PageText { page_index, size, words })
}

/// Concatenated, decompressed bytes of every `/Contents` stream of a page.
fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Ok(contents) = page.get(b"Contents") else {
        return Vec::new();
    };

    let mut bytes = Vec::new();
    let parts: Vec<&Object> = match resolve(doc, contents) {
        Object::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for part in parts {
        if let Object::Stream(stream) = resolve(doc, part) {
            bytes.extend_from_slice(&stream_bytes(stream));
            bytes.push(b'\n');
        }
    }
    bytes
}

pub(crate) fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream.decompressed_content().unwrap_or_else(|_| stream.content.clone())
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f32> = operands[..6].iter().map(number).collect::<Option<_>>()?;
        Some(Matrix { a: v[0], b: v[1], c: v[2], d: v[3], e: v[4], f: v[5] })
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, o: &Matrix) -> Matrix {
        Matrix {
            a: self.a * o.a + self.b * o.c,
            b: self.a * o.b + self.b * o.d,
            c: self.c * o.a + self.d * o.c,
            d: self.c * o.b + self.d * o.d,
            e: self.e * o.a + self.f * o.c + o.e,
            f: self.e * o.b + self.f * o.d + o.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Length of the transformed unit y-vector.
    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: [f32; 3],
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: [0.0, 0.0, 0.0],
            font: None,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Word under construction, in user space.
#[derive(Debug, Clone)]
struct PendingWord {
    text: String,
    start: Matrix,
    end: Matrix,
    font_size: f32,
    rise: f32,
    ascent: f32,
    descent: f32,
    font_name: String,
    color: [f32; 3],
    bold: bool,
    italic: bool,
}

impl PendingWord {
    fn origin_end(&self) -> (f32, f32) {
        self.end.apply(0.0, self.rise)
    }

    fn effective_size(&self) -> f32 {
        self.font_size * self.start.vertical_scale()
    }

    fn finish(self, has_trailing_space: bool) -> RawWord {
        let bottom = self.rise + self.descent * self.font_size;
        let top = self.rise + self.ascent * self.font_size;
        let corners = [
            self.start.apply(0.0, bottom),
            self.start.apply(0.0, top),
            self.end.apply(0.0, bottom),
            self.end.apply(0.0, top),
        ];
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let font_size = self.effective_size();
        RawWord {
            text: self.text,
            min_x,
            min_y,
            max_x,
            max_y,
            font_size,
            font_name: self.font_name,
            color: self.color,
            bold: self.bold,
            italic: self.italic,
            has_trailing_space,
        }
    }
}

/// Finished word still in user space.
#[derive(Debug, Clone)]
struct RawWord {
    text: String,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    font_size: f32,
    font_name: String,
    color: [f32; 3],
    bold: bool,
    italic: bool,
    has_trailing_space: bool,
}

impl RawWord {
    fn into_word(self, size: &PageSize) -> ExtractedWord {
        let (x, y) = size.to_top_left(self.min_x, self.max_y);
        ExtractedWord {
            text: self.text,
            x,
            y,
            width: self.max_x - self.min_x,
            height: self.max_y - self.min_y,
            font_size: self.font_size,
            font_name: self.font_name,
            color: self.color,
            bold: self.bold,
            italic: self.italic,
            has_trailing_space: self.has_trailing_space,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    page_index: u32,
    fonts: HashMap<ObjectKey, Rc<FontInfo>>,
    words: Vec<RawWord>,
    pending: Option<PendingWord>,
}

/// Fonts are cached per dictionary identity; direct dictionaries use their address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
    Indirect(ObjectId),
    Direct(usize),
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, page_index: u32) -> Self {
        Self { doc, page_index, fonts: HashMap::new(), words: Vec::new(), pending: None }
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<(), EngineError> {
        let content = Content::decode(content).map_err(|err| EngineError::Content {
            page: self.page_index,
            reason: err.to_string(),
        })?;

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                }
                "ET" => self.flush(false),
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(number))
                    {
                        state.font = Some(name.clone());
                        state.font_size = size;
                    }
                }
                "Tc" => state.char_spacing = first_number(operands).unwrap_or(0.0),
                "Tw" => state.word_spacing = first_number(operands).unwrap_or(0.0),
                "Tz" => state.horizontal_scale = first_number(operands).unwrap_or(100.0) / 100.0,
                "TL" => state.leading = first_number(operands).unwrap_or(0.0),
                "Ts" => state.rise = first_number(operands).unwrap_or(0.0),
                "Td" | "TD" => {
                    let tx = operands.first().and_then(number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    line_matrix = Matrix::translation(tx, ty).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        line_matrix = m;
                        text_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translation(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes, &state, &mut text_matrix, resources);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        state.word_spacing = operands.first().and_then(number).unwrap_or(0.0);
                        state.char_spacing = operands.get(1).and_then(number).unwrap_or(0.0);
                    }
                    line_matrix = Matrix::translation(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        self.show(bytes, &state, &mut text_matrix, resources);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(bytes, &state, &mut text_matrix, resources);
                                }
                                other => {
                                    let Some(adjust) = number(other) else { continue };
                                    let tx = -adjust / 1000.0
                                        * state.font_size
                                        * state.horizontal_scale;
                                    text_matrix = Matrix::translation(tx, 0.0).then(&text_matrix);
                                    if -adjust > TJ_SPACE_THRESHOLD {
                                        self.flush(true);
                                    }
                                }
                            }
                        }
                    }
                }
                "g" => state.fill = gray(operands),
                "rg" => state.fill = rgb(operands),
                "k" => state.fill = cmyk(operands),
                "sc" | "scn" => {
                    let numeric: Vec<&Object> =
                        operands.iter().filter(|o| number(o).is_some()).collect();
                    state.fill = match numeric.len() {
                        1 => gray(operands),
                        3 => rgb(operands),
                        4 => cmyk(operands),
                        _ => state.fill,
                    };
                }
                "Do" => {
                    if depth >= MAX_FORM_DEPTH {
                        log::warn!(
                            "page {}: form nesting deeper than {MAX_FORM_DEPTH}, skipping",
                            self.page_index
                        );
                        continue;
                    }
                    if let Some(Object::Name(name)) = operands.first() {
                        self.run_form(name, resources, &state, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn run_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<(), EngineError> {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(doc, x))
            .and_then(|x| x.get(name).ok())
            .and_then(|obj| match resolve(doc, obj) {
                Object::Stream(stream) => Some(stream),
                _ => None,
            })
        else {
            return Ok(());
        };

        let is_form = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form");
        if !is_form {
            return Ok(());
        }

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| resolve(doc, m).as_array().ok())
            .and_then(|items| Matrix::from_operands(items))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources =
            stream.dict.get(b"Resources").ok().and_then(|r| resolve_dict(doc, r)).or(resources);

        // Forms start from the invoking state with the form matrix applied.
        let mut inherited = state.clone();
        inherited.ctm = form_matrix.then(&state.ctm);

        let content = stream_bytes(stream);
        self.flush(false);
        self.run(&content, form_resources, inherited, depth + 1)?;
        self.flush(false);
        Ok(())
    }

    fn show(
        &mut self,
        bytes: &[u8],
        state: &GraphicsState,
        text_matrix: &mut Matrix,
        resources: Option<&'a Dictionary>,
    ) {
        let font = self.font_for(state.font.as_deref(), resources);
        let fs = state.font_size;
        let th = state.horizontal_scale;

        for code in font.codes(bytes) {
            let decoded = font.decode(code);
            let is_space = !decoded.is_empty() && decoded.chars().all(char::is_whitespace);
            let word_spacing =
                if !font.two_byte && code == 32 { state.word_spacing } else { 0.0 };
            let advance =
                (font.width(code) / 1000.0 * fs + state.char_spacing + word_spacing) * th;

            if is_space {
                self.flush(true);
            } else {
                let glyph_origin = text_matrix.then(&state.ctm);
                self.begin_or_continue(&font, state, glyph_origin);
                if let Some(pending) = self.pending.as_mut() {
                    pending.text.push_str(&decoded);
                }
            }

            *text_matrix = Matrix::translation(advance, 0.0).then(text_matrix);

            if !is_space {
                if let Some(pending) = self.pending.as_mut() {
                    pending.end = text_matrix.then(&state.ctm);
                }
            }
        }
    }

    /// Start a new word at `origin` unless it continues the pending one.
    fn begin_or_continue(&mut self, font: &FontInfo, state: &GraphicsState, origin: Matrix) {
        if let Some(pending) = &self.pending {
            let (ex, ey) = pending.origin_end();
            let (sx, sy) = origin.apply(0.0, state.rise);
            let size = pending.effective_size().max(1.0);
            let same_style = pending.font_name == font.base_name
                && (pending.font_size - state.font_size).abs() < 0.01
                && pending.color == state.fill;
            let gap = ((sx - ex).powi(2) + (sy - ey).powi(2)).sqrt();
            if same_style && gap <= JOIN_TOLERANCE * size {
                return;
            }
            let same_line = (sy - ey).abs() < 0.5 * size;
            self.flush(same_line && sx > ex);
        }

        self.pending = Some(PendingWord {
            text: String::new(),
            start: origin,
            end: origin,
            font_size: state.font_size,
            rise: state.rise,
            ascent: font.ascent,
            descent: font.descent,
            font_name: font.base_name.clone(),
            color: state.fill,
            bold: font.bold,
            italic: font.italic,
        });
    }

    fn flush(&mut self, has_trailing_space: bool) {
        if let Some(pending) = self.pending.take() {
            if !pending.text.trim().is_empty() {
                self.words.push(pending.finish(has_trailing_space));
            }
        } else if has_trailing_space {
            // A space after an already-flushed word still belongs to it.
            if let Some(last) = self.words.last_mut() {
                last.has_trailing_space = true;
            }
        }
    }

    fn font_for(&mut self, name: Option<&[u8]>, resources: Option<&'a Dictionary>) -> Rc<FontInfo> {
        let doc = self.doc;
        let entry = name.and_then(|name| {
            resources
                .and_then(|r| r.get(b"Font").ok())
                .and_then(|f| resolve_dict(doc, f))
                .and_then(|fonts| fonts.get(name).ok())
        });

        let Some(entry) = entry else {
            return Rc::new(FontInfo::fallback());
        };
        let key = match entry {
            Object::Reference(id) => ObjectKey::Indirect(*id),
            other => ObjectKey::Direct(other as *const Object as usize),
        };
        if let Some(font) = self.fonts.get(&key) {
            return Rc::clone(font);
        }
        let font = Rc::new(
            resolve_dict(doc, entry)
                .map(|dict| FontInfo::load(doc, dict))
                .unwrap_or_else(FontInfo::fallback),
        );
        self.fonts.insert(key, Rc::clone(&font));
        font
    }
}

fn first_number(operands: &[Object]) -> Option<f32> {
    operands.first().and_then(number)
}

fn components(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).map(|v| v.clamp(0.0, 1.0)).collect()
}

fn gray(operands: &[Object]) -> [f32; 3] {
    let g = components(operands).first().copied().unwrap_or(0.0);
    [g, g, g]
}

fn rgb(operands: &[Object]) -> [f32; 3] {
    match components(operands).as_slice() {
        [r, g, b, ..] => [*r, *g, *b],
        _ => [0.0, 0.0, 0.0],
    }
}

fn cmyk(operands: &[Object]) -> [f32; 3] {
    match components(operands).as_slice() {
        [c, m, y, k, ..] => [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)],
        _ => [0.0, 0.0, 0.0],
    }
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32> },
    Cid { default: f32, widths: HashMap<u32, f32> },
    Standard(StandardFamily),
}

/// Resolved font metrics and text decoding tables.
#[derive(Debug, Clone)]
struct FontInfo {
    base_name: String,
    two_byte: bool,
    to_unicode: HashMap<u32, String>,
    differences: HashMap<u32, char>,
    widths: Widths,
    ascent: f32,
    descent: f32,
    bold: bool,
    italic: bool,
}

impl FontInfo {
    fn fallback() -> Self {
        Self {
            base_name: "Helvetica".to_string(),
            two_byte: false,
            to_unicode: HashMap::new(),
            differences: HashMap::new(),
            widths: Widths::Standard(StandardFamily::Helvetica),
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            bold: false,
            italic: false,
        }
    }

    fn load(doc: &Document, dict: &Dictionary) -> Self {
        let base_name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|n| resolve(doc, n).as_name().ok())
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)))
            .unwrap_or_else(|| "Helvetica".to_string());
        let family = StandardFamily::from_base_font(&base_name);

        let subtype = dict.get(b"Subtype").ok().and_then(|s| s.as_name().ok()).unwrap_or(&[]);
        let two_byte = subtype == b"Type0";

        let descendant = if two_byte {
            dict.get(b"DescendantFonts")
                .ok()
                .and_then(|d| resolve(doc, d).as_array().ok())
                .and_then(|items| items.first())
                .and_then(|d| resolve_dict(doc, d))
        } else {
            None
        };

        let widths = match descendant {
            Some(cid_font) => cid_widths(doc, cid_font),
            None => simple_widths(doc, dict).unwrap_or(Widths::Standard(family)),
        };

        let descriptor = descendant
            .unwrap_or(dict)
            .get(b"FontDescriptor")
            .ok()
            .and_then(|d| resolve_dict(doc, d));
        let descriptor_number = |key: &[u8]| {
            descriptor.and_then(|d| d.get(key).ok()).map(|v| resolve(doc, v)).and_then(number)
        };
        let ascent = descriptor_number(b"Ascent")
            .filter(|a| *a > 0.0)
            .map(|a| a / 1000.0)
            .unwrap_or(DEFAULT_ASCENT);
        let descent = descriptor_number(b"Descent")
            .filter(|d| *d < 0.0)
            .map(|d| d / 1000.0)
            .unwrap_or(DEFAULT_DESCENT);
        let flags = descriptor_number(b"Flags").unwrap_or(0.0) as u32;
        let italic_angle = descriptor_number(b"ItalicAngle").unwrap_or(0.0);

        let lower = base_name.to_ascii_lowercase();
        let bold = lower.contains("bold")
            || lower.contains("black")
            || lower.contains("heavy")
            || flags & (1 << 18) != 0;
        let italic = lower.contains("italic") || lower.contains("oblique") || italic_angle != 0.0;

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|t| match resolve(doc, t) {
                Object::Stream(stream) => Some(parse_to_unicode(&stream_bytes(stream))),
                _ => None,
            })
            .unwrap_or_default();

        let differences = dict
            .get(b"Encoding")
            .ok()
            .and_then(|e| resolve_dict(doc, e))
            .and_then(|e| e.get(b"Differences").ok())
            .and_then(|d| resolve(doc, d).as_array().ok())
            .map(|items| parse_differences(items))
            .unwrap_or_default();

        Self {
            base_name,
            two_byte,
            to_unicode,
            differences,
            widths,
            ascent,
            descent,
            bold,
            italic,
        }
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied())
                .unwrap_or_else(|| StandardFamily::from_base_font(&self.base_name).width(code)),
            Widths::Cid { default, widths } => widths.get(&code).copied().unwrap_or(*default),
            Widths::Standard(family) => family.width(code),
        }
    }

    fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if let Some(c) = self.differences.get(&code) {
            return c.to_string();
        }
        if self.two_byte {
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        win_ansi(code as u8).to_string()
    }
}

fn strip_subset_prefix(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> Option<Widths> {
    let first_char = dict.get(b"FirstChar").ok().map(|v| resolve(doc, v)).and_then(number)?;
    let widths = dict.get(b"Widths").ok().and_then(|w| resolve(doc, w).as_array().ok())?;
    Some(Widths::Simple {
        first_char: first_char.max(0.0) as u32,
        widths: widths.iter().map(|w| number(resolve(doc, w)).unwrap_or(0.0)).collect(),
    })
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &Document, cid_font: &Dictionary) -> Widths {
    let default =
        cid_font.get(b"DW").ok().map(|v| resolve(doc, v)).and_then(number).unwrap_or(1000.0);
    let mut widths = HashMap::new();

    if let Some(items) = cid_font.get(b"W").ok().and_then(|w| resolve(doc, w).as_array().ok()) {
        let mut i = 0;
        while i < items.len() {
            let Some(start) = number(resolve(doc, &items[i])) else { break };
            let start = start as u32;
            match items.get(i + 1).map(|o| resolve(doc, o)) {
                Some(Object::Array(list)) => {
                    for (offset, w) in list.iter().enumerate() {
                        let Some(cid) = u32::try_from(offset).ok().and_then(|o| start.checked_add(o))
                        else {
                            break;
                        };
                        if let Some(w) = number(resolve(doc, w)) {
                            widths.insert(cid, w);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = number(end).unwrap_or(start as f32) as u32;
                    let w = items.get(i + 2).and_then(|w| number(resolve(doc, w))).unwrap_or(default);
                    for cid in start..=end.min(start.saturating_add(0xFFFF)) {
                        widths.insert(cid, w);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    Widths::Cid { default, widths }
}

fn parse_differences(items: &[Object]) -> HashMap<u32, char> {
    let mut map = HashMap::new();
    // `None` once the run leaves the code space; names are skipped until the next start.
    let mut code = Some(0u32);
    for item in items {
        match item {
            Object::Integer(start) => code = u32::try_from(*start).ok(),
            Object::Name(glyph) => {
                if let (Some(code), Some(c)) = (code, glyph_to_char(&String::from_utf8_lossy(glyph))) {
                    map.insert(code, c);
                }
                code = code.and_then(|c| c.checked_add(1));
            }
            _ => {}
        }
    }
    map
}

fn glyph_to_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        return u32::from_str_radix(hex.get(..4)?, 16).ok().and_then(char::from_u32);
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    let c = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" | "quoteright" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "underscore" => '_',
        "quoteleft" => '\u{2018}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "bullet" => '\u{2022}',
        "ellipsis" => '\u{2026}',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        _ => return None,
    };
    Some(c)
}

/// Map a WinAnsiEncoding byte to its character.
fn win_ansi(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x85 => '\u{2026}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x99 => '\u{2122}',
        other => char::from(other),
    }
}

/// Parse the `bfchar`/`bfrange` sections of a ToUnicode CMap.
fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let text = String::from_utf8_lossy(data);
    let tokens = cmap_tokens(&text);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            CmapToken::Keyword("beginbfchar") => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CmapToken::Hex(src), CmapToken::Hex(dst)) => {
                            map.insert(hex_code(src), utf16_hex(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CmapToken::Keyword("beginbfrange") => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CmapToken::Hex(lo), CmapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1])
                    else {
                        break;
                    };
                    let (lo, hi) = (hex_code(lo), hex_code(hi));
                    match &tokens[i + 2] {
                        CmapToken::Hex(dst) => {
                            let base: Vec<u16> = utf16_units(dst);
                            for (offset, code) in (lo..=hi.min(lo.saturating_add(0xFFFF))).enumerate() {
                                let mut units = base.clone();
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&units));
                            }
                            i += 3;
                        }
                        CmapToken::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = Some(lo);
                            while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                                if let Some(code) = code.filter(|c| *c <= hi) {
                                    map.insert(code, utf16_hex(dst));
                                }
                                code = code.and_then(|c| c.checked_add(1));
                                j += 1;
                            }
                            // Skip the closing bracket.
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    map
}

#[derive(Debug, PartialEq)]
enum CmapToken<'a> {
    Hex(&'a str),
    ArrayStart,
    ArrayEnd,
    Keyword(&'a str),
}

fn cmap_tokens(text: &str) -> Vec<CmapToken<'_>> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' if bytes.get(i + 1) != Some(&b'<') => {
                let end = text[i + 1..].find('>').map(|e| i + 1 + e).unwrap_or(bytes.len());
                tokens.push(CmapToken::Hex(&text[i + 1..end]));
                i = end + 1;
            }
            b'<' | b'>' => i += 2,
            b'[' => {
                tokens.push(CmapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(CmapToken::Keyword(&text[start..i]));
            }
            _ => i += 1,
        }
    }
    tokens
}

fn hex_code(hex: &str) -> u32 {
    let digits: String = hex.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    u32::from_str_radix(&digits, 16).unwrap_or(0)
}

fn utf16_units(hex: &str) -> Vec<u16> {
    let digits: Vec<char> = hex.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    digits
        .chunks(4)
        .filter_map(|chunk| u16::from_str_radix(&chunk.iter().collect::<String>(), 16).ok())
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&utf16_units(hex))
}
