pub mod guilds;
pub mod spam;
pub mod templates;
pub mod warnings;
