pub mod command_mode;
pub mod form_input;
