/*
Kaali Teeri core: deterministic rules engine plus the host-authoritative
snapshot replication protocol. Rendering, input collection, and the
transport itself live outside this crate.
*/

pub mod directory;
pub mod game;
pub mod protocol;
pub mod session;
pub mod suggest;
