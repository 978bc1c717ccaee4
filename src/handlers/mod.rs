// handlers/mod.rs - two security tiers
//
// Public (no auth) → Protected (JWT auth, strict or lenient tagging)
pub mod public;
pub mod protected;
