//! Pipeline preparation stages, in run order:
//!
//! 1. frequency alignment of the monthly and annual tables (`align`)
//! 2. stationarity transforms from the metadata sheet (`transform`)
//! 3. theory feature construction (`features`)
//! 4. training-window filtering and gap filling (`sample`)

pub mod align;
pub mod features;
pub mod sample;
pub mod transform;

pub use align::align_frequencies;
pub use features::{theory_columns, theory_features, INFLATION_GAP};
pub use sample::{filter_sample, PreparedSample};
pub use transform::{transform_features, Metadata, TransformCode};
