//! segkit: a corpus segmentation substrate and tabulation kernel.
//!
//! Grounded on the LTTL library (`Segmentation`, `Segment`, `Table`,
//! `Segmenter`, `Processor`): segmentations are views over an
//! immutable, process-global string store; segmenter transforms build
//! new segmentations out of existing ones; the processor reduces
//! segmentations into pivot/flat/record tables.

pub mod collections;
pub mod config;
pub mod error;
pub mod processor;
pub mod segment;
pub mod segmentation;
pub mod segmenter;
pub mod store;
pub mod table;
pub mod util;

pub use error::{SegError, SegResult};
pub use segment::Segment;
pub use segmentation::Segmentation;
