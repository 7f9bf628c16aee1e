pub mod api;
pub mod data_collector;
pub mod enricher;
pub mod history;
pub mod models;
