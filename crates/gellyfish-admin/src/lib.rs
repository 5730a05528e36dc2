//! gellyfish-admin: Maintenance actions for hosted environments.
//!
//! Copies records between environments, hands out random foods to the
//! demo jellyfish, and seeds challenges from `.gelly` files. Each action
//! works against the `gellyfish-core` backend traits and returns a report.

pub mod assign;
pub mod copy;
pub mod seed;

pub use assign::assign_foods;
pub use copy::copy_environment;
pub use seed::seed_challenges;
