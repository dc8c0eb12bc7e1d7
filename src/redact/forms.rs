//! Glyph removal across a page and the Form XObjects it paints.
//!
//! A form can be painted by several pages, or several times on one page, so
//! its stream is never edited in place. Each `Do` whose form (or a form
//! nested inside it) loses glyphs is pointed at a redacted copy that only
//! this invocation uses. The copy's name replaces the original in the
//! invoking stream's /XObject resources, and the original name is dropped
//! when nothing there paints it any more, so pruning can discard it.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId};

use super::rewrite::strip_glyphs;
use crate::error::{Error, Result};
use crate::parser::{Glyph, Interpretation, LopdfBackend, PageId};

/// Resources to install on a rewritten stream, and the /XObject names to drop.
#[derive(Debug, Clone)]
pub(super) struct XObjectEdit {
    /// Effective resources of the stream, with /XObject as a direct dictionary
    base: Dictionary,
    dropped: Vec<Vec<u8>>,
}

impl XObjectEdit {
    /// Resources for stream `parent` once its redacted children have object ids.
    pub(super) fn apply(&self, parent: usize, forms: &[FormCopy], ids: &HashMap<usize, ObjectId>) -> Dictionary {
        let mut resources = self.base.clone();
        let mut xobjects = match resources.get(b"XObject") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        for name in &self.dropped {
            xobjects.remove(name);
        }
        for form in forms.iter().filter(|f| f.parent == parent) {
            if let Some(id) = ids.get(&form.stream) {
                xobjects.set(copy_name(form.stream), *id);
            }
        }
        resources.set("XObject", xobjects);
        resources
    }
}

/// A redacted copy of one form invocation.
#[derive(Debug, Clone)]
pub(super) struct FormCopy {
    pub stream: usize,
    pub parent: usize,
    /// The original stream dictionary, without its filters
    pub dict: Dictionary,
    /// Uncompressed content
    pub content: Vec<u8>,
    pub resources: Option<XObjectEdit>,
}

/// Page operations and form copies after removing covered glyphs.
#[derive(Debug)]
pub(super) struct StrippedPage {
    pub ops: Vec<Operation>,
    /// Replacement page resources, set when the page paints a form copy
    pub resources: Option<XObjectEdit>,
    /// Copies in ascending stream order, parents before children
    pub forms: Vec<FormCopy>,
    pub removed: usize,
}

/// Resource name a redacted copy of `stream` is painted under.
pub(super) fn copy_name(stream: usize) -> Vec<u8> {
    format!("Redacted{}", stream).into_bytes()
}

/// Remove every covered glyph of `run` from the page and its forms.
pub(super) fn strip_page<F>(
    backend: &LopdfBackend,
    page: PageId,
    ops: Vec<Operation>,
    run: &Interpretation,
    covered: F,
) -> Result<StrippedPage>
where
    F: Fn(&Glyph) -> bool,
{
    let count = run.stream_count();
    let mut dirty = vec![false; count];
    for glyph in run.glyphs.iter().filter(|g| covered(g)) {
        if let Some(flag) = dirty.get_mut(glyph.stream) {
            *flag = true;
        }
    }
    // A changed form changes whatever paints it
    for stream in (1..count).rev() {
        if let (true, Some(invocation)) = (dirty[stream], run.invocation(stream)) {
            dirty[invocation.parent] = true;
        }
    }

    // Resources each stream draws with; forms without their own inherit the caller's
    let mut effective: Vec<Option<&Dictionary>> = Vec::with_capacity(count);
    effective.push(backend.resources_dict(page));
    for stream in 1..count {
        let own = run
            .invocation(stream)
            .and_then(|i| backend.form_dict(i.form))
            .and_then(|dict| backend.dict_value(dict, b"Resources"));
        let inherited = run.invocation(stream).and_then(|i| effective[i.parent]);
        effective.push(own.or(inherited));
    }

    let mut page_ops = Some(ops);
    let mut result = StrippedPage {
        ops: Vec::new(),
        resources: None,
        forms: Vec::new(),
        removed: 0,
    };
    for stream in (0..count).filter(|s| dirty[*s]) {
        let mut ops = match run.invocation(stream) {
            None => page_ops.take().unwrap_or_default(),
            Some(invocation) => backend.form_operations(invocation.form)?,
        };

        let mut renamed = Vec::new();
        for child in (stream + 1)..count {
            let Some(invocation) = run.invocation(child).filter(|i| i.parent == stream && dirty[child]) else {
                continue;
            };
            if let Some(op) = ops.get_mut(invocation.op_index) {
                op.operands = vec![Object::Name(copy_name(child))];
                renamed.push(invocation.name.clone());
            }
        }
        let edit = (!renamed.is_empty()).then(|| {
            let painted = painted_names(&ops);
            XObjectEdit {
                base: direct_resources(backend, effective[stream]),
                dropped: renamed.into_iter().filter(|n| !painted.contains(n)).collect(),
            }
        });

        let glyphs: Vec<Glyph> = run.glyphs.iter().filter(|g| g.stream == stream).cloned().collect();
        let (ops, removed) = strip_glyphs(ops, &glyphs, &covered);
        result.removed += removed;

        match run.invocation(stream) {
            None => {
                result.ops = ops;
                result.resources = edit;
            }
            Some(invocation) => {
                let mut dict = backend
                    .form_dict(invocation.form)
                    .cloned()
                    .ok_or_else(|| {
                        Error::Redaction(format!("missing form stream {} {}", invocation.form.0, invocation.form.1))
                    })?;
                for key in [&b"Filter"[..], &b"DecodeParms"[..], &b"Length"[..]] {
                    dict.remove(key);
                }
                let content = Content { operations: ops }
                    .encode()
                    .map_err(|e| Error::Redaction(e.to_string()))?;
                result.forms.push(FormCopy {
                    stream,
                    parent: invocation.parent,
                    dict,
                    content,
                    resources: edit,
                });
            }
        }
    }
    if let Some(ops) = page_ops {
        result.ops = ops;
    }
    Ok(result)
}

/// Names still painted by `Do` in a stream.
fn painted_names(ops: &[Operation]) -> HashSet<Vec<u8>> {
    ops.iter()
        .filter(|op| op.operator == "Do")
        .filter_map(|op| op.operands.first())
        .filter_map(|o| o.as_name().ok())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Copy of a resources dictionary whose /XObject entry is direct.
fn direct_resources(backend: &LopdfBackend, resources: Option<&Dictionary>) -> Dictionary {
    let mut copy = resources.cloned().unwrap_or_else(Dictionary::new);
    let xobjects = resources
        .and_then(|res| backend.dict_value(res, b"XObject"))
        .cloned()
        .unwrap_or_else(Dictionary::new);
    copy.set("XObject", xobjects);
    copy
}
