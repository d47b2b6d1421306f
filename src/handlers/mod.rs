pub mod common;
pub mod orders;
pub mod payments;
