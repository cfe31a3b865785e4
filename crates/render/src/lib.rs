pub mod assembler;
pub mod blocks;
pub mod chart;
pub mod pdf;
pub mod planner;

pub use assembler::{DocumentAssembler, RenderBackend};
pub use blocks::{ChartBar, ChartBlock, Color, ContentBlock, NoticeLevel, SwatchBlock, TableBlock, TableStyle};
pub use pdf::PdfBackend;
pub use planner::ReportPlanner;
