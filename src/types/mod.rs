// Public modules
pub mod image_data;
pub mod model;
pub mod pending_request;
pub mod tabular_summary;
pub mod turn;

// Re-exports
pub use image_data::{ImageData, ImageMediaType};
pub use model::{KnownModel, Model};
pub use pending_request::{GenerateRequest, Part, PendingRequest};
pub use tabular_summary::{ColumnStats, ColumnSummary, TabularSummary};
pub use turn::{Role, Turn, TurnContent};
