//! Lossless image compression.
//!
//! Only runs when the mode policy asks for minification; development builds copy
//! images unchanged.

use std::ffi::OsStr;
use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use super::{Transform, TransformContext};
use crate::error::TransformFailure;

/// SVG elements dropped entirely, including their children
const SVG_DROPPED_ELEMENTS: &[&[u8]] = &[b"metadata", b"title", b"desc"];

/// SVG elements whose text content is rendered, whitespace included
const SVG_TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompressor;

impl Transform for ImageCompressor {
    fn name(&self) -> &str {
        "imagemin"
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        if !ctx.policy.should_minify() {
            return Ok(input);
        }

        let ext = ctx
            .source
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("svg") => minify_svg(&input),
            Some("png") => recompress_png(input),
            // JPEG and GIF have no lossless built-in pass
            _ => Ok(input),
        }
    }
}

/// Strip comments, processing instructions, editor metadata and indentation.
///
/// `viewBox` and every other attribute are kept, as is all text inside
/// `<text>`, `<tspan>` and `<textPath>`. Whitespace-only text elsewhere is dropped.
pub fn minify_svg(input: &[u8]) -> Result<Vec<u8>, TransformFailure> {
    let text = std::str::from_utf8(input)?;
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(input.len()));
    let mut skip_depth = 0usize;
    let mut text_depth = 0usize;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if skip_depth > 0 || SVG_DROPPED_ELEMENTS.contains(&e.name().as_ref()) => {
                skip_depth += 1;
            }
            Event::End(_) if skip_depth > 0 => {
                skip_depth -= 1;
            }
            _ if skip_depth > 0 => {}
            Event::Empty(ref e) if SVG_DROPPED_ELEMENTS.contains(&e.name().as_ref()) => {}
            Event::Comment(_) | Event::PI(_) => {}
            Event::Text(ref t) if text_depth == 0 && t.iter().all(u8::is_ascii_whitespace) => {}
            other => {
                match &other {
                    Event::Start(e) if SVG_TEXT_ELEMENTS.contains(&e.local_name().as_ref()) => {
                        text_depth += 1;
                    }
                    Event::End(e) if SVG_TEXT_ELEMENTS.contains(&e.local_name().as_ref()) => {
                        text_depth = text_depth.saturating_sub(1);
                    }
                    _ => {}
                }
                writer.write_event(other)?;
            }
        }
    }

    Ok(writer.into_inner())
}

/// Re-encode a PNG at maximum compression; keep the original if that is not smaller.
pub fn recompress_png(input: Vec<u8>) -> Result<Vec<u8>, TransformFailure> {
    let decoded = image::load_from_memory_with_format(&input, ImageFormat::Png)?;

    let mut encoded = Cursor::new(Vec::with_capacity(input.len()));
    PngEncoder::new_with_quality(&mut encoded, CompressionType::Best, FilterType::Adaptive)
        .write_image(
            decoded.as_bytes(),
            decoded.width(),
            decoded.height(),
            decoded.color(),
        )?;

    let encoded = encoded.into_inner();
    if encoded.len() < input.len() {
        Ok(encoded)
    } else {
        Ok(input)
    }
}
