//! Cultivar catalog domain: models, record mapping, validation and the
//! mutation facade.

mod manager;
pub mod mapper;
mod models;
pub mod timestamp;
pub mod validation;

pub use manager::{CatalogError, CultivarManager, CultivarOrder, CULTIVARS_COLLECTION};
pub use mapper::map_to_entity;
pub use models::*;
pub use validation::ValidationError;
