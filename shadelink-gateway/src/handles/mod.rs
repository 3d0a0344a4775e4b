pub mod console_handle;

pub use console_handle::{ConsoleCommand, handle_console};
