use anyhow::{Context, Result, anyhow};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color as PdfColor, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rect, Rgb,
};
use std::io::{BufWriter, Cursor};
use tracing::{debug, warn};

use crate::assembler::RenderBackend;
use crate::blocks::{ChartBlock, Color, ContentBlock, NoticeLevel, SwatchBlock, TableBlock};
use crate::chart::{CHART_SIZE, render_chart_png};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
// 40pt sides, 60pt top and bottom.
const SIDE_MARGIN: f32 = 14.1;
const VERTICAL_MARGIN: f32 = 21.2;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * SIDE_MARGIN;

const PT_TO_MM: f32 = 0.3528;
// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

const CHART_WIDTH_MM: f32 = 170.0;
const SWATCH_WIDTH_MM: f32 = 35.0;
const SWATCH_HEIGHT_MM: f32 = 53.0;

const NOTICE_WARNING: Color = Color::rgb(0xB9, 0x77, 0x0E);

/// A4 PDF output through printpdf's built-in Helvetica fonts.
#[derive(Debug, Clone)]
pub struct PdfBackend {
    title: String,
}

impl Default for PdfBackend {
    fn default() -> Self {
        Self::new("Medical Report")
    }
}

impl PdfBackend {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

impl RenderBackend for PdfBackend {
    fn render(&self, blocks: &[ContentBlock]) -> Result<Vec<u8>> {
        let (doc, page, layer) =
            PdfDocument::new(&self.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let fonts = Fonts {
            regular: builtin_font(&doc, BuiltinFont::Helvetica)?,
            bold: builtin_font(&doc, BuiltinFont::HelveticaBold)?,
            italic: builtin_font(&doc, BuiltinFont::HelveticaOblique)?,
        };

        let mut writer = PageWriter {
            doc: &doc,
            layer,
            fonts,
            y: PAGE_HEIGHT - VERTICAL_MARGIN,
            pages: 1,
        };

        for block in blocks {
            writer.write_block(block);
        }
        debug!(blocks = blocks.len(), pages = writer.pages, "PDF laid out");

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| anyhow!("failed to write PDF: {e}"))?;
        buf.into_inner()
            .map_err(|e| anyhow!("failed to flush PDF buffer: {e}"))
    }
}

fn builtin_font(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef> {
    doc.add_builtin_font(font)
        .map_err(|e| anyhow!("failed to load built-in font: {e}"))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

/// Cursor over the current page; `y` is the baseline position in mm from
/// the bottom edge.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    y: f32,
    pages: usize,
}

impl PageWriter<'_> {
    fn write_block(&mut self, block: &ContentBlock) {
        match block {
            ContentBlock::Title(text) => {
                self.text_block(text, 18.0, FontKind::Bold, Color::BLACK);
                self.gap(6.0);
            }
            ContentBlock::Heading(text) => {
                self.gap(2.0);
                self.text_block(text, 14.0, FontKind::Bold, Color::BLACK);
                self.gap(5.0);
            }
            ContentBlock::SubHeading(text) => {
                self.gap(3.0);
                self.text_block(text, 12.0, FontKind::Bold, Color::BLACK);
                self.gap(2.5);
            }
            ContentBlock::Paragraph(text) => {
                self.text_block(text, 10.0, FontKind::Regular, Color::BLACK);
                self.gap(5.0);
            }
            ContentBlock::Fields(fields) => {
                for (label, value) in fields {
                    self.text_block(&format!("{}: {}", label, value), 10.0, FontKind::Regular, Color::BLACK);
                }
                self.gap(6.0);
            }
            ContentBlock::Notice { level, text } => {
                let (prefix, color) = match level {
                    NoticeLevel::Info => ("Note", Color::BLACK),
                    NoticeLevel::Warning => ("Warning", NOTICE_WARNING),
                };
                self.text_block(&format!("{}: {}", prefix, text), 10.0, FontKind::Regular, color);
                self.gap(4.0);
            }
            ContentBlock::Table(table) => {
                self.table(table);
                self.gap(7.0);
            }
            ContentBlock::Chart(chart) => self.chart(chart),
            ContentBlock::Swatch(swatch) => self.swatch(swatch),
            ContentBlock::PageBreak => self.new_page(),
        }
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - VERTICAL_MARGIN;
        self.pages += 1;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < VERTICAL_MARGIN && self.y < PAGE_HEIGHT - VERTICAL_MARGIN {
            self.new_page();
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn font(&self, kind: FontKind) -> &IndirectFontRef {
        match kind {
            FontKind::Regular => &self.fonts.regular,
            FontKind::Bold => &self.fonts.bold,
            FontKind::Italic => &self.fonts.italic,
        }
    }

    fn text_block(&mut self, text: &str, size: f32, kind: FontKind, color: Color) {
        let line_height = size * PT_TO_MM * 1.3;
        for line in wrap_text(text, chars_per_line(CONTENT_WIDTH, size)) {
            self.ensure_space(line_height);
            self.y -= line_height;
            self.layer.set_fill_color(pdf_color(color));
            self.layer
                .use_text(line, size, Mm(SIDE_MARGIN), Mm(self.y), self.font(kind));
        }
    }

    fn table(&mut self, table: &TableBlock) {
        let columns = table.header.len().max(1);
        let column_width = CONTENT_WIDTH / columns as f32;
        let style = table.style;

        self.table_row(&table.header, column_width, 11.0, FontKind::Bold, |_| style.header_fill, style.header_text, style.grid);

        for (row_idx, row) in table.rows.iter().enumerate() {
            let fill = |column: usize| {
                table
                    .highlight_at(row_idx, column)
                    .unwrap_or(style.body_fill)
            };
            self.table_row(row, column_width, 10.0, FontKind::Regular, fill, Color::BLACK, style.grid);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn table_row(
        &mut self,
        cells: &[String],
        column_width: f32,
        size: f32,
        kind: FontKind,
        fill: impl Fn(usize) -> Color,
        text_color: Color,
        grid: Option<Color>,
    ) {
        let line_height = size * PT_TO_MM * 1.25;
        let padding = 2.0;
        let per_line = chars_per_line(column_width - 2.0 * padding, size);
        let wrapped: Vec<Vec<String>> = cells.iter().map(|cell| wrap_text(cell, per_line)).collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let row_height = lines as f32 * line_height + 2.0 * padding;

        self.ensure_space(row_height);
        let top = self.y;
        let bottom = top - row_height;

        for (column, cell_lines) in wrapped.iter().enumerate() {
            let left = SIDE_MARGIN + column as f32 * column_width;
            let right = left + column_width;

            self.layer.set_fill_color(pdf_color(fill(column)));
            self.layer
                .add_rect(Rect::new(Mm(left), Mm(bottom), Mm(right), Mm(top)).with_mode(PaintMode::Fill));

            if let Some(grid) = grid {
                self.layer.set_outline_color(pdf_color(grid));
                self.layer.set_outline_thickness(0.8);
                self.layer
                    .add_rect(Rect::new(Mm(left), Mm(bottom), Mm(right), Mm(top)).with_mode(PaintMode::Stroke));
            }

            self.layer.set_fill_color(pdf_color(text_color));
            let mut baseline = top - padding;
            for line in cell_lines {
                baseline -= line_height;
                self.layer.use_text(
                    line.as_str(),
                    size,
                    Mm(left + padding),
                    Mm(baseline + line_height * 0.2),
                    self.font(kind),
                );
            }
        }

        self.y = bottom;
    }

    /// A chart that cannot be drawn or embedded is replaced by a note.
    fn chart(&mut self, chart: &ChartBlock) {
        if let Err(e) = self.embed_chart(chart) {
            warn!(title = %chart.title, error = %e, "chart rendering failed");
            self.write_block(&ContentBlock::Notice {
                level: NoticeLevel::Warning,
                text: "chart could not be rendered.".to_string(),
            });
        }
    }

    fn embed_chart(&mut self, chart: &ChartBlock) -> Result<()> {
        let png = render_chart_png(chart)?;
        let decoder = printpdf::image_crate::codecs::png::PngDecoder::new(Cursor::new(png))
            .context("failed to read chart PNG")?;
        let image = Image::try_from(decoder).context("failed to embed chart image")?;

        let (width_px, height_px) = CHART_SIZE;
        let dpi = width_px as f32 / (CHART_WIDTH_MM / 25.4);
        let height_mm = height_px as f32 / dpi * 25.4;

        self.ensure_space(height_mm);
        self.y -= height_mm;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(SIDE_MARGIN + (CONTENT_WIDTH - CHART_WIDTH_MM) / 2.0)),
                translate_y: Some(Mm(self.y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.gap(7.0);
        Ok(())
    }

    fn swatch(&mut self, swatch: &SwatchBlock) {
        self.ensure_space(SWATCH_HEIGHT_MM);
        let top = self.y;
        let bottom = top - SWATCH_HEIGHT_MM;
        let rect = || Rect::new(Mm(SIDE_MARGIN), Mm(bottom), Mm(SIDE_MARGIN + SWATCH_WIDTH_MM), Mm(top));

        self.layer.set_fill_color(pdf_color(swatch.color));
        self.layer.add_rect(rect().with_mode(PaintMode::Fill));
        self.layer.set_outline_color(pdf_color(Color::BLACK));
        self.layer.set_outline_thickness(1.0);
        self.layer.add_rect(rect().with_mode(PaintMode::Stroke));

        self.y = bottom - 3.5;
        self.text_block(&swatch.caption, 10.0, FontKind::Italic, Color::BLACK);
        self.gap(7.0);
    }
}

#[derive(Debug, Clone, Copy)]
enum FontKind {
    Regular,
    Bold,
    Italic,
}

fn pdf_color(color: Color) -> PdfColor {
    PdfColor::Rgb(Rgb::new(
        color.r as f32 / 255.0,
        color.g as f32 / 255.0,
        color.b as f32 / 255.0,
        None,
    ))
}

fn chars_per_line(width_mm: f32, size: f32) -> usize {
    let glyph_mm = size * GLYPH_WIDTH * PT_TO_MM;
    ((width_mm / glyph_mm) as usize).max(1)
}

/// Greedy word wrap; words longer than a line are split. Embedded newlines
/// start new lines.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: String = word.to_string();
            while word.chars().count() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split = word
                    .char_indices()
                    .nth(max_chars)
                    .map(|(i, _)| i)
                    .unwrap_or(word.len());
                let rest = word.split_off(split);
                lines.push(word);
                word = rest;
            }

            let needed = current.chars().count() + word.chars().count() + 1;
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
