pub mod assemble;
pub mod groups;
pub mod inspect;
pub mod show;
