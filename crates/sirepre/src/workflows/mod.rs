pub mod intake;
pub mod registration;
