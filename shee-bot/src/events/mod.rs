pub mod member_join;
pub mod mention;
pub mod moderation;
