//! Screen rendering

pub mod dashboard;
pub mod popups;
