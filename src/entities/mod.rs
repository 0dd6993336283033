pub mod prelude;

pub mod form_fields;
