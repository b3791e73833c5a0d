//! Position records, accuracy levels and last-fix persistence.

mod accuracy;
mod fix;
mod store;

pub use accuracy::{AccuracyLevel, PositioningMethods};
pub use fix::{Coordinate, PositionFix};
pub use store::LastFixStore;
