pub mod contact;
pub mod csrf;
