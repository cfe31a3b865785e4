pub mod classify;
pub mod export;
pub mod merge;
pub mod sections;
pub mod status;
pub mod value;

pub use classify::{DomainClass, classify};
pub use export::{collect_test_results, test_results_json};
pub use merge::merge_reports;
pub use sections::{
    LabeledSectionExtractor, NarrativeField, NarrativeSection, SectionExtractor,
    extract_narrative,
};
pub use status::{RangeStatus, Status, compare_to_range, evaluate, numeric_reading};
pub use value::{ReferenceRange, parse_bounds, parse_number, parse_range};
