//! Typed access to a rizin session over rz-pipe.
//!
//! Only the commands needed to load a binary, locate its entry points,
//! query cross references and decode single instructions are wrapped here.

extern crate rzpipe;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;

pub mod structs;
pub mod api;
