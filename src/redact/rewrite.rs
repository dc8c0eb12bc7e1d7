//! Removal of covered glyphs from text-showing operators.
//!
//! A removed glyph is replaced by a `TJ` position adjustment equal to its
//! advance, so text after it on the same line keeps its original position.

use std::collections::BTreeMap;
use std::ops::Range;

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::parser::{number, Glyph};

/// Drop every glyph for which `covered` returns true.
///
/// Returns the rewritten operation list and the number of glyphs removed.
/// Operators without removed glyphs are passed through untouched.
pub(crate) fn strip_glyphs<F>(ops: Vec<Operation>, glyphs: &[Glyph], covered: F) -> (Vec<Operation>, usize)
where
    F: Fn(&Glyph) -> bool,
{
    // op index -> element -> removed glyphs (byte range, adjustment)
    let mut removals: BTreeMap<usize, BTreeMap<usize, Vec<(Range<usize>, f32)>>> = BTreeMap::new();
    let mut removed = 0;
    for glyph in glyphs.iter().filter(|g| covered(g)) {
        removals
            .entry(glyph.op_index)
            .or_default()
            .entry(glyph.element)
            .or_default()
            .push((glyph.bytes.clone(), glyph.adjustment));
        removed += 1;
    }
    if removed == 0 {
        return (ops, 0);
    }

    let mut out = Vec::with_capacity(ops.len() + removals.len() * 3);
    for (index, op) in ops.into_iter().enumerate() {
        match removals.get(&index) {
            Some(elements) => out.extend(rewrite_show(op, elements)),
            None => out.push(op),
        }
    }
    (out, removed)
}

/// Rewrite one show operator as a `TJ`, preceded by whatever state changes
/// `'` and `"` imply.
fn rewrite_show(op: Operation, removals: &BTreeMap<usize, Vec<(Range<usize>, f32)>>) -> Vec<Operation> {
    let mut prefix = Vec::new();
    let mut array = TjBuilder::default();

    let operator = op.operator.clone();
    match operator.as_str() {
        "Tj" | "'" => {
            if operator == "'" {
                prefix.push(Operation::new("T*", vec![]));
            }
            if let Some(Object::String(bytes, format)) = op.operands.first() {
                array.push_string(bytes, *format, removals.get(&0));
            }
        }
        "\"" => {
            if let (Some(aw), Some(ac)) = (op.operands.first(), op.operands.get(1)) {
                prefix.push(Operation::new("Tw", vec![aw.clone()]));
                prefix.push(Operation::new("Tc", vec![ac.clone()]));
            }
            prefix.push(Operation::new("T*", vec![]));
            if let Some(Object::String(bytes, format)) = op.operands.get(2) {
                array.push_string(bytes, *format, removals.get(&2));
            }
        }
        "TJ" => {
            if let Some(Object::Array(items)) = op.operands.first() {
                for (element, item) in items.iter().enumerate() {
                    match item {
                        Object::String(bytes, format) => {
                            array.push_string(bytes, *format, removals.get(&element))
                        }
                        other => {
                            if let Some(n) = number(other) {
                                array.push_adjustment(n);
                            }
                        }
                    }
                }
            }
        }
        _ => return vec![op],
    }

    prefix.push(Operation::new("TJ", vec![Object::Array(array.finish())]));
    prefix
}

/// Accumulates `TJ` array elements, merging adjacent strings and adjustments.
#[derive(Default)]
struct TjBuilder {
    items: Vec<Object>,
    buffer: Vec<u8>,
    format: Option<StringFormat>,
    pending: f32,
}

impl TjBuilder {
    fn push_string(&mut self, bytes: &[u8], format: StringFormat, removed: Option<&Vec<(Range<usize>, f32)>>) {
        self.format.get_or_insert(format);
        let mut cursor = 0;
        let mut cuts: Vec<&(Range<usize>, f32)> = removed.map(|r| r.iter().collect()).unwrap_or_default();
        cuts.sort_by_key(|(range, _)| range.start);

        for (range, adjustment) in cuts {
            if range.start > cursor {
                self.push_bytes(&bytes[cursor..range.start.min(bytes.len())]);
            }
            self.push_adjustment(*adjustment);
            cursor = cursor.max(range.end);
        }
        if cursor < bytes.len() {
            self.push_bytes(&bytes[cursor..]);
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.pending != 0.0 {
            self.flush_buffer();
            self.items.push(Object::Real(self.pending));
            self.pending = 0.0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    fn push_adjustment(&mut self, n: f32) {
        self.pending += n;
    }

    fn flush_buffer(&mut self) {
        if !self.buffer.is_empty() {
            let format = self.format.unwrap_or(StringFormat::Literal);
            self.items.push(Object::String(std::mem::take(&mut self.buffer), format));
        }
    }

    fn finish(mut self) -> Vec<Object> {
        self.flush_buffer();
        if self.pending != 0.0 {
            self.items.push(Object::Real(self.pending));
        }
        self.items
    }
}
