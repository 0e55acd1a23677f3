//! Home battery charge and discharge scheduling against day-ahead energy prices.

pub mod core;
pub mod error;
pub mod prelude;
pub mod providers;
pub mod quantity;
