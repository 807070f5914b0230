pub mod allocator;
pub mod greedy;
pub mod lp;
pub mod result;
pub mod stages;
