//! Pure domain rules: geographic tiers, trading legality and price resolution.

pub mod legality;
pub mod price_resolver;
pub mod tier;
