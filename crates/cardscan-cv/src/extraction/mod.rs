//! Turning accepted regions into standalone card images

pub mod enricher;
pub mod extractor;

pub use enricher::PlaceholderEnricher;
pub use extractor::CardExtractor;
