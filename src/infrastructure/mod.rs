pub mod bubble;
pub mod capture;
pub mod logging;
