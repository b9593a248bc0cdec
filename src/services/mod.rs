pub mod doc_session_service;

pub use doc_session_service::*;
