//! Blocking variants of [`Session`] and [`ResultSet`].
//!
//! There is exactly one protocol implementation — the async one. The types
//! here own a dedicated current-thread tokio runtime and drive each async
//! operation to completion on it, so callers without an executor get the same
//! state machine behind a plain function call.

use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio_util::compat::Compat;

use crate::connection::{Config, Session, SessionState};
use crate::from_value::FromValue;
use crate::protocol::payloads::{ColumnDefinition, ServerVersion};
use crate::resultset::{ResultSet, ResultSetState};
use crate::value::Value;

/// A blocking MySQL session. No executor required.
///
/// # Example
///
/// ```no_run
/// use calico::{blocking::BlockingSession, Config};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::new();
/// config.host("localhost");
/// config.user("app");
/// config.password("secret");
///
/// let mut session = BlockingSession::connect(config)?;
/// let mut rows = session.query("SELECT 1")?;
/// while rows.read()? {
///     let value: Option<i32> = rows.get(0);
///     println!("{:?}", value);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BlockingSession {
    runtime: Runtime,
    session: Session<Compat<TcpStream>>,
}

impl BlockingSession {
    /// Resolves, dials and authenticates, blocking until done.
    pub fn connect(config: Config) -> crate::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let session = runtime.block_on(Session::connect_tcp(config))?;
        Ok(Self { runtime, session })
    }

    /// Sends `COM_QUERY` and opens a blocking cursor over the response.
    pub fn query<'a>(&'a mut self, sql: &str) -> crate::Result<BlockingResultSet<'a>> {
        let inner = self.runtime.block_on(self.session.query(sql))?;
        Ok(BlockingResultSet {
            runtime: &self.runtime,
            inner,
        })
    }

    /// See [`Session::try_ping`].
    pub fn try_ping(&mut self) -> crate::Result<bool> {
        self.runtime.block_on(self.session.try_ping())
    }

    /// See [`Session::reset`].
    pub fn reset(
        &mut self,
        user: &str,
        password: &str,
        database: Option<&str>,
    ) -> crate::Result<()> {
        self.runtime
            .block_on(self.session.reset(user, password, database))
    }

    /// See [`Session::dispose`].
    pub fn dispose(&mut self) {
        let Self { runtime, session } = self;
        runtime.block_on(session.dispose());
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn server_version(&self) -> &ServerVersion {
        self.session.server_version()
    }

    pub fn connection_id(&self) -> u32 {
        self.session.connection_id()
    }

    pub fn is_tls(&self) -> bool {
        self.session.is_tls()
    }

    pub fn is_compressed(&self) -> bool {
        self.session.is_compressed()
    }

    pub fn pool_generation(&self) -> u32 {
        self.session.pool_generation()
    }

    pub fn set_pool_generation(&mut self, generation: u32) {
        self.session.set_pool_generation(generation);
    }
}

/// The blocking counterpart of [`ResultSet`]; same cursor, driven to
/// completion per call.
pub struct BlockingResultSet<'a> {
    runtime: &'a Runtime,
    inner: ResultSet<'a, Compat<TcpStream>>,
}

impl BlockingResultSet<'_> {
    /// See [`ResultSet::read`].
    pub fn read(&mut self) -> crate::Result<bool> {
        self.runtime.block_on(self.inner.read())
    }

    /// See [`ResultSet::has_rows`].
    pub fn has_rows(&mut self) -> crate::Result<bool> {
        self.runtime.block_on(self.inner.has_rows())
    }

    /// See [`ResultSet::next_result`].
    pub fn next_result(&mut self) -> crate::Result<bool> {
        self.runtime.block_on(self.inner.next_result())
    }

    /// See [`ResultSet::read_row`].
    pub fn read_row(&mut self) -> crate::Result<Option<Vec<Value<'static>>>> {
        self.runtime.block_on(self.inner.read_row())
    }

    /// See [`ResultSet::collect_rows`].
    pub fn collect_rows(&mut self) -> crate::Result<Vec<Vec<Value<'static>>>> {
        self.runtime.block_on(self.inner.collect_rows())
    }

    /// See [`ResultSet::value`].
    pub fn value(&self, ordinal: usize) -> crate::Result<Value<'_>> {
        self.inner.value(ordinal)
    }

    /// See [`ResultSet::try_get`].
    pub fn try_get<'s, T: FromValue<'s>>(&'s self, ordinal: usize) -> crate::Result<Option<T>> {
        self.inner.try_get(ordinal)
    }

    /// See [`ResultSet::get`].
    pub fn get<'s, T: FromValue<'s>>(&'s self, ordinal: usize) -> Option<T> {
        self.inner.get(ordinal)
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        self.inner.columns()
    }

    pub fn affected_rows(&self) -> u64 {
        self.inner.affected_rows()
    }

    pub fn last_insert_id(&self) -> u64 {
        self.inner.last_insert_id()
    }

    pub fn warning_count(&self) -> u16 {
        self.inner.warning_count()
    }

    pub fn state(&self) -> ResultSetState {
        self.inner.state()
    }
}
