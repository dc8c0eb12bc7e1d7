//! Integration tests for page layout extraction.

mod common;

use common::{text_pdf, PdfBuilder, GLYPH_WIDTH};
use nopii::{Error, ErrorKind, ExtractOptions, PageLayoutExtractor};

#[test]
fn test_lines_become_linear_text() {
    let pdf = text_pdf(&["Contact John Tan, NRIC S1234567D, at Blk 5.", "Second line here"]);
    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();

    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.metadata.pdf_version, "1.5");
    let page = &doc.pages[0];
    assert_eq!(
        page.text(),
        "Contact John Tan, NRIC S1234567D, at Blk 5.\nSecond line here"
    );
    assert_eq!(page.line_count(), 2);
    assert_eq!(page.dimensions(), (612.0, 792.0));
}

#[test]
fn test_offset_round_trip() {
    let pdf = PdfBuilder::new()
        .lines(&["Alpha  beta", "gamma delta epsilon"])
        .lines(&["René Lim paid 5"])
        .build();
    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();

    for page in &doc.pages {
        assert!(page.verify_offsets(), "page {} offsets", page.index);
        let text = page.text();
        for offset in 0..text.len() {
            assert!(page.token_at(offset).is_some(), "offset {} on page {}", offset, page.index);
        }
        for token in page.tokens() {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }
    // Repeated spaces collapse to one separator
    assert_eq!(doc.pages[0].text(), "Alpha beta\ngamma delta epsilon");
    // Latin-1 range bytes decode to Unicode
    assert_eq!(doc.pages[1].text(), "René Lim paid 5");
}

#[test]
fn test_token_boxes_match_glyph_metrics() {
    let pdf = text_pdf(&["John Tan"]);
    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();
    let tokens = doc.pages[0].tokens();

    assert_eq!(tokens.len(), 2);
    let tan = &tokens[1];
    assert_eq!(tan.text, "Tan");
    assert!((tan.bbox.x0 - (72.0 + 5.0 * GLYPH_WIDTH)).abs() < 1e-3);
    assert!((tan.bbox.x1 - (72.0 + 8.0 * GLYPH_WIDTH)).abs() < 1e-3);
    assert!((tan.bbox.y0 - 697.6).abs() < 1e-3);
    assert!((tan.bbox.y1 - 709.6).abs() < 1e-3);
    assert_eq!(tan.font_size, 12.0);
}

#[test]
fn test_two_columns_read_in_order() {
    let pdf = PdfBuilder::new()
        .page(&[
            (72.0, 700.0, "Left one two"),
            (330.0, 700.0, "Right one two"),
            (72.0, 686.0, "Left three four"),
            (330.0, 686.0, "Right three four"),
            (72.0, 672.0, "Left five six"),
            (330.0, 672.0, "Right five six"),
        ])
        .build();

    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();
    assert_eq!(
        doc.pages[0].text(),
        "Left one two\nLeft three four\nLeft five six\nRight one two\nRight three four\nRight five six"
    );

    let flat = PageLayoutExtractor::new(ExtractOptions::new().with_columns(false))
        .extract(&pdf)
        .unwrap();
    assert!(flat.pages[0].text().starts_with("Left one two Right one two\n"));
}

#[test]
fn test_text_far_off_the_page_is_extracted() {
    let pdf = PdfBuilder::new()
        .page(&[(72.0, 700.0, "Contact John Tan"), (1.0e12, 700.0, "offpage")])
        .page(&[(-1.0e12, 500.0, "left"), (72.0, 400.0, "on page")])
        .build();
    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();

    assert_eq!(doc.pages[0].text(), "Contact John Tan offpage");
    assert_eq!(doc.pages[1].text(), "left\non page");
    assert!(doc.pages.iter().all(|p| p.verify_offsets()));
}

#[test]
fn test_form_xobject_text_is_extracted() {
    let pdf = PdfBuilder::new()
        .form_page(&[(72.0, 700.0, "NRIC S1234567D"), (72.0, 686.0, "issued 2019")])
        .build();
    let doc = PageLayoutExtractor::default().extract(&pdf).unwrap();
    let page = &doc.pages[0];

    assert_eq!(page.text(), "NRIC S1234567D\nissued 2019");
    // The form's /Matrix brings the text back to page coordinates
    let id = &page.tokens()[1];
    assert_eq!(id.text, "S1234567D");
    assert!((id.bbox.x0 - (72.0 + 5.0 * GLYPH_WIDTH)).abs() < 1e-3);
    assert!((id.bbox.y0 - 697.6).abs() < 1e-3);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let pdf = PdfBuilder::new()
        .lines(&["Page one"])
        .lines(&["Page two"])
        .lines(&["Page three"])
        .build();

    let parallel = PageLayoutExtractor::default().extract(&pdf).unwrap();
    let sequential = PageLayoutExtractor::new(ExtractOptions::new().sequential())
        .extract(&pdf)
        .unwrap();
    assert_eq!(parallel.plain_text(), sequential.plain_text());
    assert_eq!(parallel.plain_text(), "Page one\u{c}Page two\u{c}Page three");
    let indices: Vec<usize> = parallel.pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_non_pdf_is_input_error() {
    let err = PageLayoutExtractor::default().extract(b"GIF89a....").unwrap_err();
    assert!(matches!(err, Error::UnknownFormat));
    assert_eq!(err.kind(), ErrorKind::Input);

    let err = PageLayoutExtractor::default()
        .extract(b"%PDF-1.7\nthis is not a document")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn test_document_without_pages_is_extraction_error() {
    let pdf = PdfBuilder::new().build();
    let err = PageLayoutExtractor::default().extract(&pdf).unwrap_err();
    assert!(matches!(err, Error::NoPages));
    assert_eq!(err.kind(), ErrorKind::Extraction);
}
