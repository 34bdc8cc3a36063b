//! # calico
//!
//! A pure Rust implementation of the MySQL client/server wire protocol.
//!
//! `calico` is the protocol core of a MySQL client: it frames and reassembles
//! packets, speaks the handshake and `mysql_native_password` authentication,
//! optionally wraps the stream in TLS and the compressed protocol, and reads
//! query responses through a streaming, forward-only cursor.
//!
//! # Quick Start
//!
//! ```no_run
//! use calico::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new();
//!     config.host("localhost");
//!     config.port(3306);
//!     config.user("app");
//!     config.password("secret");
//!     config.database("inventory");
//!
//!     let mut session = Session::connect_tcp(config).await?;
//!
//!     let mut rows = session.query("SELECT id, name FROM users").await?;
//!     while rows.read().await? {
//!         let id: Option<i64> = rows.get(0);
//!         let name: Option<&str> = rows.get(1);
//!         println!("{:?} {:?}", id, name);
//!     }
//!
//!     session.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Key Types
//!
//! - [`Session`] — one authenticated connection and its conversation state
//! - [`Config`] — connection configuration builder
//! - [`SslMode`] — whether and how strictly to wrap the stream in TLS
//! - [`ResultSet`] — the streaming cursor over a query response
//! - [`Value`] / [`FromValue`] — decoded cells and their Rust conversions
//! - [`blocking::BlockingSession`] — the same session driven without an
//!   executor
//!
//! # Scope
//!
//! The crate speaks the textual protocol with `mysql_native_password` only.
//! Prepared statements (`COM_STMT_*`), the binary row format, `LOCAL INFILE`
//! and other authentication plugins are out of scope, as are connection
//! pooling and SQL statement construction, which belong to the layers above.
#![allow(dead_code)]

#[macro_use]
mod macros;

pub mod blocking;
mod connection;
pub mod error;
mod from_value;
mod protocol;
mod resultset;
mod value;

pub use connection::{Config, Session, SessionState, SslMode};
pub use error::{Error, ServerError};
pub use from_value::FromValue;
pub use protocol::payloads::{
    AuthSwitchRequest, ChangeUserCommand, ColumnDefinition, ColumnType, Command, EofPayload,
    InitialHandshake, OkPayload, PingCommand, QueryCommand, QuitCommand, ResetConnectionCommand,
    ServerVersion,
};
pub use protocol::{
    Capability, CapabilityFlags, ColumnFlag, ColumnFlags, Conversation, Decode, Encode, Payload,
    ProtocolErrorBehavior, ServerStatus, ServerStatusFlags,
};
pub use resultset::{ResultSet, ResultSetState};
pub use value::Value;

/// An alias for a result that holds this crate's error type as the error.
pub type Result<T> = std::result::Result<T, Error>;
