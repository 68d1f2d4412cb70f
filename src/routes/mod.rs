pub mod engage;
pub mod home;
pub mod posts;
pub mod profile;
