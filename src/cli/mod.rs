mod commands;
mod handlers;

pub use commands::{Cli, Commands, NotionArgs, ServeArgs, TelegramArgs};
pub use handlers::{handle_get, handle_list, handle_retry, handle_serve};
