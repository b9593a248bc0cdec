pub mod doc_service_client;

pub use doc_service_client::*;
