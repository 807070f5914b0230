//! Foundational types shared by the rules, option builders and optimizer.

pub mod bank;
pub mod demand;
pub mod distinctiveness;
pub mod habitat;
pub mod pricing;
pub mod snapshot;
pub mod stock;
