// src/services/mod.rs
pub mod advisor;
pub mod detector;
pub mod geodata;
pub mod store;
pub mod translator;

pub use advisor::AdvisorService;
pub use detector::DetectorService;
pub use geodata::GeoDataService;
pub use store::HistoryStore;
pub use translator::{TokenCache, TranslatorService};
