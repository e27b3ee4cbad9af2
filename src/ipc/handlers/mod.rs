pub mod backup;
pub mod constraints;
pub mod core;
pub mod reports;
pub mod roster;
