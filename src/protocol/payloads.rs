mod auth_switch;
mod column_definition;
mod command;
mod eof;
mod err;
mod handshake;
mod handshake_response;
mod ok;

pub use auth_switch::*;
pub use column_definition::*;
pub use command::*;
pub use eof::*;
pub use err::*;
pub use handshake::*;
pub(crate) use handshake_response::*;
pub use ok::*;
