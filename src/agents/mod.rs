//! Collaborator agents (`SPEC_FULL.md` §4.4–§4.6): simpler per-epoch
//! accounting state machines whose wire contracts the Controller depends on.
//! Grounded on the teacher's `devices/` module for the idea of one small
//! struct per simulated entity with its own `#[cfg(test)]` block, though the
//! state-machine shape itself (per-epoch sent/received flags, an explicit
//! `finalize_epoch`) is this crate's own realization of
//! `examples/original_source/user_component/user_component.py` et al.

pub mod grid;
pub mod station;
pub mod user;

pub use grid::GridAgent;
pub use station::StationAgent;
pub use user::UserAgent;
