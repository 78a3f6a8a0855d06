//! Loading metric catalogs from configuration files

mod catalog_config;

pub use catalog_config::CatalogConfig;
