pub mod body_type_picker;
pub mod session_record;
pub mod session_store;
