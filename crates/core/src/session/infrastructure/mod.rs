pub mod json_file_session_store;
