pub mod parser;

pub use parser::{LabResultParser, SAMPLE_REPORT};
