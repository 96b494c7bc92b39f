#![allow(dead_code)]

use std::io::Cursor;

use docoverlay_core::{
    ingest, CancellationToken, EditSession, EditorConfig, IngestOutput, Page,
    PlaceholderRasterizer, Rect, Word,
};
pub use pdf_engine::test_support::text_pdf;

/// Small RGBA PNG with a transparent corner.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
    bytes
}

pub fn ingest_bytes(bytes: &[u8]) -> IngestOutput {
    ingest(
        bytes,
        &PlaceholderRasterizer::default(),
        &EditorConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap()
}

pub fn texts(output: &IngestOutput) -> Vec<String> {
    output.words.iter().map(|w| w.text.clone()).collect()
}

/// Session with one 612x792 page and the given words on page 1.
pub fn session_with(words: Vec<Word>) -> EditSession {
    let mut session = EditSession::default();
    session.seed(
        vec![Page::blank(1, 612.0, 792.0, 0.1), Page::blank(2, 612.0, 792.0, 0.1)],
        words,
    );
    session
}

pub fn hello_word() -> Word {
    Word::new("w1", "Hello", Rect::new(10.0, 10.0, 50.0, 20.0), 1)
}
