//! Utility
//!
//! **This module is exempt from the API stability guarantee.** It's exposed
//! only because it's needed by the port implementation macros.
mod init;
pub mod pairing_heap;
mod veclike;
pub use self::{init::Init, veclike::*};
