pub mod guild;
pub mod template;
