//! Item economics, usage enrichment and the recommendation rules.

pub mod enrichment;
pub mod entities;
pub mod localization;
pub mod pricing;
pub mod progress;
pub mod recommendation;
pub mod roi;

pub use enrichment::Catalog;
pub use entities::Snapshot;
pub use pricing::PricingTable;
pub use progress::UserProgress;
pub use recommendation::{resolve_recommendation, Recommendation};
pub use roi::calculate_roi;
