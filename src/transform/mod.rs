//! Tree-to-tree transform passes over validated modules.
//!
//! Every pass consumes a validated [`Module`] and produces a new one with
//! the side-tables rebuilt; type caches are preserved or recomputed, never
//! left stale. `fold_constants` and `eliminate_dead_code` are idempotent.

mod dce;
mod fold;
mod options;
#[cfg(test)]
mod tests;

pub use dce::eliminate_dead_code;
pub use fold::fold_constants;
pub use options::apply_options;
