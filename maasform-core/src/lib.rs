//! maasform Core
//!
//! Resource model, provider contract and the small apply engine that drives
//! providers through create/read/update/delete.

pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod reference;
pub mod resource;
pub mod schema;
