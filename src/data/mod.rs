pub mod configuration;
pub mod series;
pub mod source;
pub mod store;
