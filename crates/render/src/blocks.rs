//! Backend-agnostic layout units produced by the planner.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITESMOKE: Color = Color::rgb(0xF5, 0xF5, 0xF5);
    pub const LIGHT_GREEN: Color = Color::rgb(0x90, 0xEE, 0x90);
    pub const LIGHT_CORAL: Color = Color::rgb(0xF0, 0x80, 0x80);
    pub const LIGHT_YELLOW: Color = Color::rgb(0xFF, 0xFF, 0xE0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Presentation hints for a table; the backend decides how to honour them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStyle {
    pub header_fill: Color,
    pub header_text: Color,
    pub body_fill: Color,
    pub grid: Option<Color>,
}

impl TableStyle {
    /// White bold header on `header_fill`, whitesmoke body, black grid.
    pub fn with_header(header_fill: Color) -> Self {
        Self {
            header_fill,
            header_text: Color::WHITE,
            body_fill: Color::WHITESMOKE,
            grid: Some(Color::BLACK),
        }
    }
}

/// Background override for one body cell (row index excludes the header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHighlight {
    pub row: usize,
    pub column: usize,
    pub fill: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub style: TableStyle,
    pub highlights: Vec<CellHighlight>,
}

impl TableBlock {
    pub fn new(header: &[&str], style: TableStyle) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            style,
            highlights: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn highlight_last(&mut self, column: usize, fill: Color) {
        if let Some(row) = self.rows.len().checked_sub(1) {
            self.highlights.push(CellHighlight { row, column, fill });
        }
    }

    pub fn highlight_at(&self, row: usize, column: usize) -> Option<Color> {
        self.highlights
            .iter()
            .rev()
            .find(|h| h.row == row && h.column == column)
            .map(|h| h.fill)
    }
}

/// One test in a value-vs-range bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl ChartBar {
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn out_of_range(&self) -> bool {
        self.value < self.min || self.value > self.max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBlock {
    pub title: String,
    pub bars: Vec<ChartBar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwatchBlock {
    pub color: Color,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Title(String),
    Heading(String),
    SubHeading(String),
    Paragraph(String),
    /// Label/value lines such as patient details.
    Fields(Vec<(String, String)>),
    Notice { level: NoticeLevel, text: String },
    Table(TableBlock),
    Chart(ChartBlock),
    Swatch(SwatchBlock),
    PageBreak,
}

impl ContentBlock {
    pub fn notice(text: impl Into<String>) -> Self {
        ContentBlock::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn is_page_break(&self) -> bool {
        matches!(self, ContentBlock::PageBreak)
    }
}
