//! Page layout extraction.

use rayon::prelude::*;

use super::backend::{LopdfBackend, PageId, PdfBackend};
use super::content::interpret;
use super::layout::build_layout;
use super::options::ExtractOptions;
use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};
use crate::model::{Document, Metadata, Page};

/// Turns PDF bytes into pages of positioned tokens and linear text.
#[derive(Debug, Clone, Default)]
pub struct PageLayoutExtractor {
    options: ExtractOptions,
}

impl PageLayoutExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every page of a PDF held in memory.
    ///
    /// Fails with an input error when the bytes are not a loadable PDF, and with
    /// an extraction error when the document is encrypted, has no pages, or any
    /// page cannot be laid out. No partial document is ever returned.
    pub fn extract(&self, data: &[u8]) -> Result<Document> {
        let format = detect_format_from_bytes(data)?;
        log::debug!("Detected PDF {} at offset {}", format.version, format.header_offset);
        let backend = LopdfBackend::load_bytes(data)?;
        self.extract_from(&backend)
    }

    /// Extract every page through an already loaded backend.
    pub fn extract_from<B: PdfBackend>(&self, backend: &B) -> Result<Document> {
        if backend.is_encrypted() {
            return Err(Error::Encrypted);
        }
        let page_ids = backend.page_ids();
        if page_ids.is_empty() {
            return Err(Error::NoPages);
        }

        let pages: Vec<Page> = if self.options.parallel && page_ids.len() > 1 {
            page_ids
                .par_iter()
                .enumerate()
                .map(|(index, id)| self.extract_page(backend, index, *id))
                .collect::<Result<_>>()?
        } else {
            page_ids
                .iter()
                .enumerate()
                .map(|(index, id)| self.extract_page(backend, index, *id))
                .collect::<Result<_>>()?
        };

        log::debug!(
            "Extracted {} pages, {} tokens",
            pages.len(),
            pages.iter().map(|p| p.tokens().len()).sum::<usize>()
        );

        Ok(Document {
            metadata: Metadata {
                pdf_version: backend.version(),
                page_count: pages.len(),
            },
            pages,
        })
    }

    /// Extract one page.
    pub fn extract_page<B: PdfBackend>(&self, backend: &B, index: usize, id: PageId) -> Result<Page> {
        let media_box = backend.media_box(id);
        let ops = backend
            .page_operations(id)
            .map_err(|e| Error::Extraction(format!("page {}: {}", index, e)))?;
        let resources = backend.page_resources(id)?;
        let glyphs = interpret(&ops, &resources);
        let page = Page::new(index, media_box).with_layout(build_layout(&glyphs, &media_box, &self.options));
        log::trace!("Page {}: {} glyphs, {} tokens", index, glyphs.len(), page.tokens().len());
        Ok(page)
    }
}
