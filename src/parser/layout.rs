//! Reading-order layout.
//!
//! Glyphs are merged into word tokens, words are grouped into lines by
//! baseline, and two-column pages are read column by column. The result is
//! fed to a [`LinearTextBuilder`] so every character of the page text maps
//! back to the token that produced it.

use std::cmp::Ordering;

use super::content::Glyph;
use super::options::ExtractOptions;
use crate::model::{BBox, LinearTextBuilder};

/// Upper bound on 3pt slices scanned for a gutter (a 200 inch wide page).
const MAX_SLICES: usize = 4800;

/// A word assembled from consecutive glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
    /// Baseline y of the first glyph
    pub baseline: f32,
    pub font_size: f32,
}

impl Word {
    fn start(glyph: &Glyph) -> Self {
        Self {
            text: glyph.text.clone(),
            bbox: glyph.bbox,
            baseline: glyph.origin.1,
            font_size: glyph.font_size,
        }
    }

    fn push(&mut self, glyph: &Glyph) {
        self.text.push_str(&glyph.text);
        self.bbox = self.bbox.union(&glyph.bbox);
        self.font_size = self.font_size.max(glyph.font_size);
    }
}

/// A visual line of words, sorted left to right.
#[derive(Debug, Clone)]
pub struct Line {
    pub words: Vec<Word>,
    pub baseline: f32,
}

/// A vertical column region on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub left: f32,
    pub right: f32,
    pub index: usize,
}

impl Column {
    /// Check if a word's horizontal centre falls in this column.
    pub fn contains(&self, word: &Word) -> bool {
        let center = (word.bbox.x0 + word.bbox.x1) / 2.0;
        center >= self.left && center < self.right
    }
}

/// Merge glyphs (in content order) into words.
///
/// A word ends at whitespace, at a horizontal gap wider than
/// `word_gap_ratio × font size`, at a backwards jump, or at a baseline change.
pub fn assemble_words(glyphs: &[Glyph], options: &ExtractOptions) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<Word> = None;

    for glyph in glyphs {
        if glyph.is_whitespace() {
            words.extend(current.take());
            continue;
        }
        if glyph.text.is_empty() {
            continue;
        }
        if let Some(word) = current.as_mut() {
            let size = word.font_size.max(glyph.font_size).max(1.0);
            let same_line = (glyph.origin.1 - word.baseline).abs() <= size * options.line_tolerance_ratio;
            let gap = glyph.bbox.x0 - word.bbox.x1;
            if same_line && gap <= size * options.word_gap_ratio && gap >= -size * 0.5 {
                word.push(glyph);
                continue;
            }
            words.extend(current.take());
        }
        current = Some(Word::start(glyph));
    }
    words.extend(current);
    words
}

/// Group words into lines, top to bottom, for a single column.
pub fn group_lines(mut words: Vec<Word>, options: &ExtractOptions) -> Vec<Line> {
    words.sort_by(|a, b| {
        b.baseline
            .partial_cmp(&a.baseline)
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<Line> = Vec::new();
    for word in words {
        let tolerance = word.font_size * options.line_tolerance_ratio;
        match lines.last_mut() {
            Some(line) if (word.baseline - line.baseline).abs() <= tolerance => line.words.push(word),
            _ => lines.push(Line {
                baseline: word.baseline,
                words: vec![word],
            }),
        }
    }

    for line in &mut lines {
        line.words
            .sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
    }
    lines
}

/// Detect a two-column layout by looking for an empty vertical gutter.
///
/// Word extents are clipped to `bounds` (the page's MediaBox), so text
/// placed far outside the page cannot stretch the search area. Returns one
/// column when no convincing gutter exists.
pub fn detect_columns(words: &[Word], bounds: &BBox) -> Vec<Column> {
    let clip = |x: f32| x.max(bounds.x0).min(bounds.x1);
    let min_x = words.iter().map(|w| clip(w.bbox.x0)).fold(f32::INFINITY, f32::min);
    let max_x = words.iter().map(|w| clip(w.bbox.x1)).fold(f32::NEG_INFINITY, f32::max);
    let single = vec![Column {
        left: f32::NEG_INFINITY,
        right: f32::INFINITY,
        index: 0,
    }];

    let page_width = max_x - min_x;
    if words.is_empty() || !page_width.is_finite() || page_width < 250.0 {
        return single;
    }

    // Count words occupying each 3pt vertical slice
    let slice_width = 3.0;
    let slices = page_width / slice_width;
    if slices >= MAX_SLICES as f32 {
        log::debug!("Text area {:.0}pt wide, treating as single column", page_width);
        return single;
    }
    let num_slices = slices as usize + 1;
    let mut occupancy = vec![0usize; num_slices];
    for word in words {
        let start = ((clip(word.bbox.x0) - min_x) / slice_width) as usize;
        let end = (((clip(word.bbox.x1) - min_x) / slice_width) as usize).min(num_slices - 1);
        for slot in occupancy.iter_mut().take(end + 1).skip(start) {
            *slot += 1;
        }
    }

    // Widest empty run in the middle 70% of the text area, closer to centre on ties
    let search = (num_slices * 15 / 100)..(num_slices * 85 / 100);
    let center = num_slices / 2;
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = None;
    for i in search.clone().chain(std::iter::once(search.end)) {
        let empty = i < search.end && occupancy[i] == 0;
        match (empty, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                let len = i - start;
                let dist = (start + len / 2).abs_diff(center);
                let better = match best {
                    None => true,
                    Some((b_start, b_len)) => {
                        let b_dist = (b_start + b_len / 2).abs_diff(center);
                        len > b_len || (len == b_len && dist < b_dist)
                    }
                };
                if better {
                    best = Some((start, len));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let Some((gap_start, gap_len)) = best else {
        return single;
    };
    let gap_width = gap_len as f32 * slice_width;
    if gap_width < 12.0 {
        log::debug!("Gutter too narrow ({:.1}pt), treating as single column", gap_width);
        return single;
    }

    let gutter = min_x + (gap_start as f32 + gap_len as f32 / 2.0) * slice_width;
    if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
        log::debug!("Column too narrow, treating as single column");
        return single;
    }

    let left = words.iter().filter(|w| (w.bbox.x0 + w.bbox.x1) / 2.0 < gutter).count();
    let right = words.len() - left;
    let min_words = (words.len() / 10).max(2);
    if left < min_words || right < min_words {
        log::debug!("Words too imbalanced ({} / {}), treating as single column", left, right);
        return single;
    }

    log::debug!("Two columns split at x={:.1}", gutter);
    vec![
        Column {
            left: f32::NEG_INFINITY,
            right: gutter,
            index: 0,
        },
        Column {
            left: gutter,
            right: f32::INFINITY,
            index: 1,
        },
    ]
}

/// Lay out words in reading order: column by column, each top to bottom.
pub fn order_lines(words: Vec<Word>, bounds: &BBox, options: &ExtractOptions) -> Vec<Line> {
    let columns = if options.detect_columns {
        detect_columns(&words, bounds)
    } else {
        Vec::new()
    };
    if columns.len() <= 1 {
        return group_lines(words, options);
    }

    let mut per_column: Vec<Vec<Word>> = vec![Vec::new(); columns.len()];
    for word in words {
        let idx = columns.iter().position(|c| c.contains(&word)).unwrap_or(0);
        per_column[idx].push(word);
    }
    per_column
        .into_iter()
        .flat_map(|col| group_lines(col, options))
        .collect()
}

/// Full layout pass from glyphs to a populated [`LinearTextBuilder`].
///
/// `media_box` bounds the column search; glyphs outside it are still laid out.
pub fn build_layout(glyphs: &[Glyph], media_box: &BBox, options: &ExtractOptions) -> LinearTextBuilder {
    let words = assemble_words(glyphs, options);
    let mut builder = LinearTextBuilder::new();
    for (line_no, line) in order_lines(words, media_box, options).into_iter().enumerate() {
        for word in line.words {
            builder.push_token(&word.text, word.bbox, line_no, word.font_size);
        }
    }
    builder
}
