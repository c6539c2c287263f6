pub mod hexdb;
pub mod http_client;
pub mod planespotters;

pub use hexdb::HexDbEnricher;
pub use planespotters::PlanespottersEnricher;
