pub mod mime_types;
pub mod validation;
