pub mod start_session_use_case;
