//! # habitat-allocation
//!
//! Biodiversity credit allocation engine.
//!
//! Given a basket of required habitat credits and a snapshot of what supplier
//! banks hold, this engine finds the cheapest legal allocation that uses at
//! most two banks.
//!
//! ## Architecture
//!
//! - **core** — Foundational types: banks, habitats, stock, prices, demand
//! - **rules** — Geographic tiers, trading legality, price resolution
//! - **options** — Candidate supply options, including paired blends
//! - **optimization** — Staged LP optimizer, greedy fallback, results
//! - **simulation** — Random snapshot generation for stress testing

pub mod core;
pub mod error;
pub mod optimization;
pub mod options;
pub mod rules;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::bank::{Bank, BankKey};
    pub use crate::core::demand::{DemandBasket, DemandLine};
    pub use crate::core::habitat::{HabitatCatalog, HabitatEntry, Ledger};
    pub use crate::core::pricing::{ContractSize, PriceRow, PriceTable, Tier};
    pub use crate::core::snapshot::{ReferenceSnapshot, ReferenceTables, TargetSite};
    pub use crate::core::stock::{StockId, StockLot};
    pub use crate::error::AllocationError;
    pub use crate::optimization::allocator::{Allocator, AllocatorConfig};
    pub use crate::optimization::result::{AllocationResult, AllocationRow, AllocationType};
    pub use crate::options::builder::OptionBuilder;
}
