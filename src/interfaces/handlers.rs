pub mod contact;
pub mod csrf;
pub mod fallback;
pub mod home;
pub mod system;
