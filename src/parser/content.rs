//! Content stream interpretation.
//!
//! Walks the text and graphics state operators of a page and emits one
//! [`Glyph`] per shown character code, in content-stream order. Each glyph
//! remembers which stream, operator, operand and bytes produced it, so the
//! redactor can later rewrite exactly those bytes. `Do` on a Form XObject
//! runs the form's operations as a nested stream.

use std::ops::Range;

use lopdf::content::Operation;
use lopdf::{Object, ObjectId};

use super::fonts::{number, FontMetrics, PageFont, PageFonts};
use super::resources::{Resources, MAX_FORM_DEPTH};
use crate::model::BBox;

/// Affine transform `[a b c d e f]` using PDF's row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Length of the transformed unit y vector.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    pub(crate) fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        match values.as_slice() {
            [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One shown character code with its page-space geometry and origin in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Decoded Unicode text (may be empty for unmapped codes)
    pub text: String,
    pub bbox: BBox,
    /// Baseline origin in user space
    pub origin: (f32, f32),
    /// Effective font size in user space
    pub font_size: f32,
    /// Single-byte code 32, subject to word spacing
    pub is_space: bool,
    /// Stream that shows the glyph: 0 is the page, `n` is [`Interpretation::invocations`]`[n - 1]`
    pub stream: usize,
    /// Index of the show operator in that stream's operation list
    pub op_index: usize,
    /// Operand index (`Tj`, `'`, `"`) or array element index (`TJ`)
    pub element: usize,
    /// Bytes of the string operand encoding this glyph
    pub bytes: Range<usize>,
    /// The glyph's displacement expressed in `TJ` adjustment units
    pub adjustment: f32,
}

impl Glyph {
    pub fn is_whitespace(&self) -> bool {
        self.is_space || self.text.chars().all(char::is_whitespace)
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// One `Do` that painted a Form XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct FormInvocation {
    /// The form's stream object
    pub form: ObjectId,
    /// Resource name the `Do` used
    pub name: Vec<u8>,
    /// Stream containing the `Do` (0 for the page)
    pub parent: usize,
    /// Index of the `Do` in the parent's operations
    pub op_index: usize,
}

/// Glyphs of a page together with the form invocations they came through.
#[derive(Debug, Clone, Default)]
pub struct Interpretation {
    pub glyphs: Vec<Glyph>,
    pub invocations: Vec<FormInvocation>,
}

impl Interpretation {
    /// The invocation that opened `stream`, `None` for the page itself.
    pub fn invocation(&self, stream: usize) -> Option<&FormInvocation> {
        stream.checked_sub(1).and_then(|i| self.invocations.get(i))
    }

    /// Number of streams, the page included.
    pub fn stream_count(&self) -> usize {
        self.invocations.len() + 1
    }
}

/// Interprets a page's operations against its resources.
pub struct Interpreter {
    fallback: PageFont<'static>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    out: Interpretation,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            fallback: PageFont::new("Unknown", FontMetrics::default()),
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            out: Interpretation::default(),
        }
    }

    /// Run all operations, following Form XObjects, and return what they show.
    pub fn run(mut self, ops: &[Operation], resources: &Resources<'_>) -> Interpretation {
        self.run_stream(ops, resources, 0, 0);
        self.out
    }

    fn run_stream(&mut self, ops: &[Operation], resources: &Resources<'_>, stream: usize, depth: usize) {
        for (index, op) in ops.iter().enumerate() {
            if op.operator == "Do" {
                self.paint_form(op, index, resources, stream, depth);
            } else {
                self.step(index, op, &resources.fonts, stream);
            }
        }
    }

    /// `Do`: run a Form XObject in its own graphics state. Other XObjects are ignored.
    fn paint_form(&mut self, op: &Operation, index: usize, resources: &Resources<'_>, stream: usize, depth: usize) {
        let Some(Ok(name)) = op.operands.first().map(Object::as_name) else {
            return;
        };
        let Some(form) = resources.form(name) else {
            return;
        };
        if depth >= MAX_FORM_DEPTH {
            log::warn!(
                "Form XObject {} nested deeper than {} levels, its text is not read",
                String::from_utf8_lossy(name),
                MAX_FORM_DEPTH
            );
            return;
        }

        self.out.invocations.push(FormInvocation {
            form: form.id,
            name: name.to_vec(),
            parent: stream,
            op_index: index,
        });
        let child = self.out.invocations.len();

        let saved = (self.state.clone(), self.stack.len(), self.tm, self.tlm);
        self.state.ctm = form.matrix.then(&self.state.ctm);
        let inner = form.resources.as_ref().unwrap_or(resources);
        self.run_stream(&form.operations, inner, child, depth + 1);

        let (state, stack_len, tm, tlm) = saved;
        self.state = state;
        self.stack.truncate(stack_len);
        self.tm = tm;
        self.tlm = tlm;
    }

    fn step(&mut self, index: usize, op: &Operation, fonts: &PageFonts<'_>, stream: usize) {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number);

        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Ok(name)) = operands.first().map(|o| o.as_name()) {
                    self.state.text.font = name.to_vec();
                }
                if let Some(size) = num(1) {
                    self.state.text.size = size;
                }
            }
            "Tc" => self.state.text.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.text.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.text.h_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.text.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.text.rise = num(0).unwrap_or(0.0),
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.state.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, fonts, stream, index, 0);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes, fonts, stream, index, 0);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                    self.state.text.word_spacing = aw;
                    self.state.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes, fonts, stream, index, 2);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for (element, item) in items.iter().enumerate() {
                        match item {
                            Object::String(bytes, _) => self.show(bytes, fonts, stream, index, element),
                            other => {
                                if let Some(n) = number(other) {
                                    let ts = &self.state.text;
                                    let tx = -n / 1000.0 * ts.size * ts.h_scale;
                                    self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8], fonts: &PageFonts<'_>, stream: usize, op_index: usize, element: usize) {
        let Self {
            fallback,
            state,
            tm,
            out,
            ..
        } = self;
        let ts = &state.text;
        let font = fonts.get(&ts.font).unwrap_or(&*fallback);
        let metrics = &font.metrics;
        let scale = ts.size * ts.h_scale;
        let (asc, desc) = (metrics.ascent / 1000.0, metrics.descent / 1000.0);

        for (range, code) in font.codes(bytes) {
            let w = metrics.width(code) / 1000.0;
            let is_space = metrics.code_len == 1 && code == 32;

            let trm = Matrix::new(scale, 0.0, 0.0, ts.size, 0.0, ts.rise)
                .then(tm)
                .then(&state.ctm);
            let corners = [
                trm.apply(0.0, desc),
                trm.apply(w, desc),
                trm.apply(0.0, asc),
                trm.apply(w, asc),
            ];
            let Some(bbox) = BBox::from_points(&corners) else {
                continue;
            };

            let spacing = ts.char_spacing + if is_space { ts.word_spacing } else { 0.0 };
            let tx = (w * ts.size + spacing) * ts.h_scale;
            let adjustment = if scale.abs() > f32::EPSILON {
                -tx / scale * 1000.0
            } else {
                0.0
            };

            let baseline = tm.then(&state.ctm);
            out.glyphs.push(Glyph {
                text: font.decode(&bytes[range.clone()]),
                bbox,
                origin: baseline.apply(0.0, 0.0),
                font_size: baseline.vertical_scale() * ts.size.abs(),
                is_space,
                stream,
                op_index,
                element,
                bytes: range,
                adjustment,
            });

            *tm = Matrix::translate(tx, 0.0).then(tm);
        }
    }
}

/// Interpret a page's operations and return its glyphs in stream order.
pub fn interpret(ops: &[Operation], resources: &Resources<'_>) -> Vec<Glyph> {
    Interpreter::new().run(ops, resources).glyphs
}
