//! PDF backend: turns a composed [`Document`] into PDF bytes with `printpdf`.
//!
//! Only the built-in Helvetica faces are used, so no font files are needed.
//! Those faces are declared with `WinAnsiEncoding`, so text is transcoded to
//! Windows-1252 and written as raw `Tj` strings.

use crate::layout::{DrawCommand, Document, FontWeight, Rgb};
use encoding_rs::WINDOWS_1252;
use printpdf::{
    BuiltinFont, Color, DictItem, Line, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage,
    PdfSaveOptions, Point, Polygon, PolygonRing, Pt, WindingOrder,
};
use tracing::{debug, warn};

/// Stands in for characters Windows-1252 cannot represent.
const UNMAPPABLE: u8 = b'?';

pub const DOCUMENT_TITLE: &str = "Parametrização Fiscal";

/// Renders every page of `document` and returns the PDF file contents.
pub fn render(document: &Document) -> Vec<u8> {
    let height = document.geometry.height;
    let width_mm = Mm(document.geometry.width / crate::layout::PT_PER_MM);
    let height_mm = Mm(height / crate::layout::PT_PER_MM);

    let pages: Vec<PdfPage> = document
        .pages
        .iter()
        .map(|page| {
            let ops = page
                .commands
                .iter()
                .flat_map(|command| ops_for(command, height))
                .collect();
            PdfPage::new(width_mm, height_mm, ops)
        })
        .collect();

    let page_count = pages.len();
    let mut warnings = Vec::new();
    let mut pdf = PdfDocument::new(DOCUMENT_TITLE);
    let bytes = pdf
        .with_pages(pages)
        .save(
            // Raw text operators are dropped by the writer unless it runs unrestricted.
            &PdfSaveOptions {
                secure: false,
                ..PdfSaveOptions::default()
            },
            &mut warnings,
        );

    if !warnings.is_empty() {
        warn!(count = warnings.len(), "PDF writer reported warnings");
        debug!(?warnings, "PDF writer warnings");
    }
    debug!(pages = page_count, bytes = bytes.len(), "Rendered PDF");
    bytes
}

/// Encodes `text` as Windows-1252, one byte per character.
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    let mut buf = [0u8; 4];
    text.chars()
        .map(|c| {
            let (bytes, _, unmappable) = WINDOWS_1252.encode(c.encode_utf8(&mut buf));
            match bytes.as_ref() {
                [byte] if !unmappable => *byte,
                _ => UNMAPPABLE,
            }
        })
        .collect()
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb {
        r: f32::from(rgb.0) / 255.0,
        g: f32::from(rgb.1) / 255.0,
        b: f32::from(rgb.2) / 255.0,
        icc_profile: None,
    })
}

/// Top-left layout coordinates to PDF's bottom-left origin.
fn point(x: f32, y: f32, page_height: f32) -> Point {
    Point {
        x: Pt(x),
        y: Pt(page_height - y),
    }
}

fn corner(x: f32, y: f32, page_height: f32) -> LinePoint {
    LinePoint {
        p: point(x, y, page_height),
        bezier: false,
    }
}

fn font(weight: FontWeight) -> BuiltinFont {
    match weight {
        FontWeight::Regular => BuiltinFont::Helvetica,
        FontWeight::Bold => BuiltinFont::HelveticaBold,
    }
}

fn ops_for(command: &DrawCommand, page_height: f32) -> Vec<Op> {
    match command {
        DrawCommand::Rect {
            x,
            y,
            width,
            height,
            color: fill,
        } => vec![
            Op::SaveGraphicsState,
            Op::SetFillColor { col: color(*fill) },
            Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing {
                        points: vec![
                            corner(*x, *y, page_height),
                            corner(x + width, *y, page_height),
                            corner(x + width, y + height, page_height),
                            corner(*x, y + height, page_height),
                        ],
                    }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            },
            Op::RestoreGraphicsState,
        ],
        DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            color: stroke,
            thickness,
        } => vec![
            Op::SaveGraphicsState,
            Op::SetOutlineColor { col: color(*stroke) },
            Op::SetOutlineThickness { pt: Pt(*thickness) },
            Op::DrawLine {
                line: Line {
                    points: vec![
                        corner(*x1, *y1, page_height),
                        corner(*x2, *y2, page_height),
                    ],
                    is_closed: false,
                },
            },
            Op::RestoreGraphicsState,
        ],
        DrawCommand::Text {
            x,
            y,
            size,
            weight,
            color: fill,
            text,
        } => vec![
            Op::SaveGraphicsState,
            Op::StartTextSection,
            Op::SetFillColor { col: color(*fill) },
            Op::SetFontSizeBuiltinFont {
                size: Pt(*size),
                font: font(*weight),
            },
            Op::SetTextCursor {
                pos: point(*x, *y, page_height),
            },
            // Registers the font resource on the page; writes nothing itself.
            Op::WriteTextBuiltinFont {
                items: Vec::new(),
                font: font(*weight),
            },
            Op::Unknown {
                key: "Tj".to_string(),
                value: vec![DictItem::String {
                    data: win_ansi_bytes(text),
                    literal: false,
                }],
            },
            Op::EndTextSection,
            Op::RestoreGraphicsState,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Composer, PageGeometry};

    #[test]
    fn renders_a_pdf_file() {
        let mut composer = Composer::new(PageGeometry::a4());
        composer.card("Empresa", |c| c.field("Razão Social:", "Comércio Ltda"));
        composer.divider();
        let bytes = render(&composer.finish());
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..4], b"%PDF");
    }

    #[test]
    fn win_ansi_maps_portuguese_accents_to_single_bytes() {
        assert_eq!(win_ansi_bytes("ção"), vec![0xE7, 0xE3, b'o']);
        assert_eq!(win_ansi_bytes("Alíquota"), b"Al\xEDquota".to_vec());
        assert_eq!(win_ansi_bytes("R$ 10 €"), vec![b'R', b'$', b' ', b'1', b'0', b' ', 0x80]);
    }

    #[test]
    fn win_ansi_replaces_characters_outside_the_code_page() {
        assert_eq!(win_ansi_bytes("a→b"), b"a?b".to_vec());
        assert_eq!(win_ansi_bytes("日本"), b"??".to_vec());
    }
}
