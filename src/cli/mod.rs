pub mod setup;
pub mod status;
