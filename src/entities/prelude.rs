pub use super::form_fields::Entity as FormFields;
