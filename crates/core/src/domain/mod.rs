pub mod acceptance;
pub mod approval;
pub mod quote;
