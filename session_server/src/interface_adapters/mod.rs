// Interface adapters: wire protocol, collaborator clients and network handling.

pub mod clients;
pub mod net;
pub mod protocol;
pub mod state;
