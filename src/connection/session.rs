use bytes::BytesMut;
use futures_util::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{event, Level};

use super::auth::{native_password_scramble, MYSQL_NATIVE_PASSWORD};
use super::config::{Config, SslMode};
use crate::protocol::payloads::{
    AuthSwitchRequest, ChangeUserCommand, HandshakeResponse41, InitialHandshake, OkPayload,
    PingCommand, QueryCommand, QuitCommand, ResetConnectionCommand, ServerError, ServerVersion,
    SslRequest,
};
use crate::protocol::{
    Capability, CapabilityFlags, Conversation, Decode, Encode, Payload, ProtocolErrorBehavior,
    Transport, EOF_HEADER, ERR_HEADER, OK_HEADER,
};
use crate::resultset::ResultSet;
use crate::value::DecodeOptions;
use crate::Error;

/// Lifecycle state of a [`Session`].
///
/// ```text
/// Created -- connect succeeds --> Connected
/// Connected -- I/O fault -------> Failed
/// Connected -- dispose ---------> Closed
/// Failed    -- dispose ---------> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connect has not finished. Sessions in this state are internal to
    /// [`Session::connect`]; a failed connect is dropped rather than returned.
    Created,
    /// The handshake completed; commands may be issued.
    Connected,
    /// Disposed. Every operation except `dispose` raises `ObjectDisposed`.
    Closed,
    /// A send or receive faulted. Only `dispose` is legal from here.
    Failed,
}

/// One authenticated connection to a MySQL server: the byte transport, the
/// sequence-number conversation, and the session identity the handshake
/// established.
///
/// A session is single-owner: no two operations may be in flight at once,
/// which the `&mut self` receivers enforce. All operations are async; the
/// [`blocking`](crate::blocking) module drives them to completion on a
/// dedicated runtime for callers without an executor.
///
/// # Example
///
/// ```no_run
/// use calico::{Config, Session};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::new();
/// config.host("localhost");
/// config.user("app");
/// config.password("secret");
///
/// let mut session = Session::connect_tcp(config).await?;
///
/// let mut rows = session.query("SELECT 1").await?;
/// while rows.read().await? {
///     let value: Option<i32> = rows.get(0);
///     println!("{:?}", value);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session<S: AsyncRead + AsyncWrite + Unpin + Send> {
    state: SessionState,
    transport: Transport<S>,
    conversation: Conversation,
    capabilities: CapabilityFlags,
    server_version: ServerVersion,
    connection_id: u32,
    /// The 20-byte challenge from the initial handshake, re-used to hash the
    /// password for `COM_CHANGE_USER`.
    auth_plugin_data: [u8; 20],
    hostname: String,
    pool_generation: u32,
    decode_options: DecodeOptions,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Session<S> {
    /// Establishes a session over an already-connected stream: reads the
    /// server greeting, optionally switches to TLS, authenticates, and
    /// enables compression when negotiated.
    ///
    /// The stream is typically a `TcpStream` wrapped with
    /// [`compat_write()`](tokio_util::compat::TokioAsyncWriteCompatExt::compat_write);
    /// [`connect_tcp`](Session::connect_tcp) does the resolving and dialing
    /// too.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is malformed, the server requires an
    /// authentication plugin other than `mysql_native_password`, the TLS
    /// handshake fails, or the server refuses the credentials.
    pub async fn connect(config: Config, stream: S) -> crate::Result<Session<S>> {
        let mut session = Session {
            state: SessionState::Created,
            transport: Transport::new(stream),
            conversation: Conversation::new(),
            capabilities: CapabilityFlags::empty(),
            server_version: ServerVersion::empty(),
            connection_id: 0,
            auth_plugin_data: [0u8; 20],
            hostname: config.hosts.first().cloned().unwrap_or_default(),
            pool_generation: config.pool_generation,
            decode_options: DecodeOptions {
                convert_zero_datetime: config.convert_zero_datetime,
                old_guids: config.old_guids,
            },
        };

        session.handshake(&config).await?;
        session.state = SessionState::Connected;
        Ok(session)
    }

    async fn handshake(&mut self, config: &Config) -> crate::Result<()> {
        // The server opens the conversation with its greeting at sequence 0;
        // everything up to the final OK continues the same conversation.
        self.conversation.start_new();
        let payload = self
            .transport
            .read_packet(&mut self.conversation, ProtocolErrorBehavior::Throw)
            .await?;

        if payload.is_err() {
            let err = ServerError::decode(&mut payload.into_inner())?;
            return Err(Error::Server(err));
        }

        let handshake = InitialHandshake::decode(&mut payload.into_inner())?;

        if handshake.auth_plugin_name != MYSQL_NATIVE_PASSWORD {
            return Err(Error::Authentication(
                format!(
                    "unsupported authentication plugin '{}'",
                    handshake.auth_plugin_name
                )
                .into(),
            ));
        }

        let server_capabilities = handshake.capabilities;
        if !server_capabilities.contains(Capability::Protocol41)
            || !server_capabilities.contains(Capability::SecureConnection)
        {
            return Err(Error::Protocol(
                "server does not support the 4.1 protocol".into(),
            ));
        }

        self.server_version = ServerVersion::parse(&handshake.server_version);
        self.connection_id = handshake.connection_id;
        self.auth_plugin_data = handshake.auth_plugin_data;

        event!(
            Level::INFO,
            server_version = %self.server_version.as_str(),
            connection_id = self.connection_id,
            "received server greeting"
        );

        let mut capabilities = Capability::Protocol41
            | Capability::SecureConnection
            | Capability::LongPassword
            | Capability::MultiResults;
        if config.database.is_some() {
            capabilities |= Capability::ConnectWithDb;
        }
        if server_capabilities.contains(Capability::PluginAuth) {
            capabilities |= Capability::PluginAuth;
        }

        let compress = config.compress && server_capabilities.contains(Capability::Compress);
        if compress {
            capabilities |= Capability::Compress;
        }

        if config.ssl_mode != SslMode::None {
            if server_capabilities.contains(Capability::Ssl) {
                capabilities |= Capability::Ssl;
                let mut buf = BytesMut::new();
                SslRequest { capabilities }.encode(&mut buf)?;
                self.transport
                    .write_packet(&mut self.conversation, &buf)
                    .await?;
                // The plaintext SSL request is fully flushed; from here on the
                // TLS engine owns the stream.
                let hostname = self.hostname.clone();
                self.transport.upgrade_to_tls(config, &hostname).await?;
            } else if config.ssl_mode == SslMode::Preferred {
                event!(
                    Level::WARN,
                    "server does not support TLS, continuing in plaintext"
                );
            } else {
                return Err(Error::Tls("server does not support TLS".to_string()));
            }
        }

        let auth_response = native_password_scramble(&config.password, &self.auth_plugin_data);
        let response = HandshakeResponse41 {
            capabilities,
            user: &config.user,
            auth_response: &auth_response,
            database: config.database.as_deref(),
            auth_plugin: capabilities
                .contains(Capability::PluginAuth)
                .then_some(MYSQL_NATIVE_PASSWORD),
        };

        let mut buf = BytesMut::new();
        response.encode(&mut buf)?;
        self.transport
            .write_packet(&mut self.conversation, &buf)
            .await?;

        let reply = self
            .transport
            .read_packet(&mut self.conversation, ProtocolErrorBehavior::Throw)
            .await?;

        match reply.header_byte() {
            Some(OK_HEADER) => {}
            Some(ERR_HEADER) => {
                let err = ServerError::decode(&mut reply.into_inner())?;
                return Err(Error::Authentication(err.to_string().into()));
            }
            Some(EOF_HEADER) => {
                // Auth switch: rehash against the fresh challenge and reply.
                let switch = AuthSwitchRequest::decode(&mut reply.into_inner())?;
                if switch.plugin_name != MYSQL_NATIVE_PASSWORD {
                    return Err(Error::Authentication(
                        format!(
                            "server switched to unsupported authentication plugin '{}'",
                            switch.plugin_name
                        )
                        .into(),
                    ));
                }

                let rehash = native_password_scramble(&config.password, &switch.auth_data);
                self.transport
                    .write_packet(&mut self.conversation, &rehash)
                    .await?;

                let reply = self
                    .transport
                    .read_packet(&mut self.conversation, ProtocolErrorBehavior::Throw)
                    .await?;
                if reply.is_err() {
                    let err = ServerError::decode(&mut reply.into_inner())?;
                    return Err(Error::Authentication(err.to_string().into()));
                }
                if !reply.is_ok() {
                    return Err(Error::Protocol(
                        "unexpected payload after auth switch response".into(),
                    ));
                }
            }
            _ => {
                return Err(Error::Protocol(
                    "unexpected payload in handshake reply".into(),
                ));
            }
        }

        self.capabilities = capabilities;
        self.conversation.finish();

        if compress {
            self.transport.enable_compression();
            event!(Level::INFO, "compressed protocol enabled");
        }

        Ok(())
    }

    fn ensure_connected(&self) -> crate::Result<()> {
        match self.state {
            SessionState::Connected => Ok(()),
            SessionState::Closed => Err(Error::ObjectDisposed),
            SessionState::Failed => Err(Error::InvalidState(
                "the session has failed; dispose it".into(),
            )),
            SessionState::Created => Err(Error::InvalidState(
                "the session is not connected yet".into(),
            )),
        }
    }

    /// Starts a new conversation and writes `item` as its first packet.
    pub async fn send<E: Encode>(&mut self, item: E) -> crate::Result<()> {
        self.ensure_connected()?;
        self.conversation.start_new();
        self.transport.reset_compressed_sequence();
        self.write_faulting(item).await
    }

    /// Continues the current conversation with another outbound packet.
    pub async fn send_reply<E: Encode>(&mut self, item: E) -> crate::Result<()> {
        self.ensure_connected()?;
        self.conversation.ensure_active()?;
        self.write_faulting(item).await
    }

    /// Starts a new conversation by reading its first packet.
    pub async fn receive(&mut self) -> crate::Result<Payload> {
        self.ensure_connected()?;
        self.conversation.start_new();
        self.transport.reset_compressed_sequence();
        self.read_faulting().await
    }

    /// Continues the current conversation by reading the next packet.
    pub async fn receive_reply(&mut self) -> crate::Result<Payload> {
        self.ensure_connected()?;
        self.conversation.ensure_active()?;
        self.read_faulting().await
    }

    async fn write_faulting<E: Encode>(&mut self, item: E) -> crate::Result<()> {
        let mut buf = BytesMut::new();
        item.encode(&mut buf)?;

        match self
            .transport
            .write_packet(&mut self.conversation, &buf)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn read_faulting(&mut self) -> crate::Result<Payload> {
        match self
            .transport
            .read_packet(&mut self.conversation, ProtocolErrorBehavior::Throw)
            .await
        {
            Ok(payload) => Ok(payload),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Sends `COM_QUERY` and opens a cursor over the response.
    pub async fn query(&mut self, sql: &str) -> crate::Result<ResultSet<'_, S>> {
        self.send(QueryCommand::new(sql)).await?;
        ResultSet::open(self).await
    }

    /// Restores the session to a fresh state.
    ///
    /// Servers from 5.7.3 on get `COM_RESET_CONNECTION` followed by
    /// `SET NAMES utf8mb4`; older servers get `COM_CHANGE_USER` with the
    /// password hashed against the original handshake challenge, answering an
    /// auth switch with a rehash when the server asks for one.
    pub async fn reset(
        &mut self,
        user: &str,
        password: &str,
        database: Option<&str>,
    ) -> crate::Result<()> {
        if self.server_version.supports_reset_connection() {
            self.send(ResetConnectionCommand).await?;
            let payload = self.receive_reply().await?;
            self.expect_ok(payload)?;

            self.send(QueryCommand::new("SET NAMES utf8mb4")).await?;
            let payload = self.receive_reply().await?;
            self.expect_ok(payload)?;
        } else {
            let auth_response = native_password_scramble(password, &self.auth_plugin_data);
            self.send(ChangeUserCommand {
                user,
                auth_response: &auth_response,
                database,
                auth_plugin: self
                    .capabilities
                    .contains(Capability::PluginAuth)
                    .then_some(MYSQL_NATIVE_PASSWORD),
            })
            .await?;

            let payload = self.receive_reply().await?;
            match payload.header_byte() {
                Some(OK_HEADER) => {}
                Some(ERR_HEADER) => {
                    let err = ServerError::decode(&mut payload.into_inner())?;
                    return Err(Error::Server(err));
                }
                Some(EOF_HEADER) => {
                    let switch = AuthSwitchRequest::decode(&mut payload.into_inner())?;
                    if switch.plugin_name != MYSQL_NATIVE_PASSWORD {
                        return Err(Error::Authentication(
                            format!(
                                "server switched to unsupported authentication plugin '{}'",
                                switch.plugin_name
                            )
                            .into(),
                        ));
                    }

                    let rehash = native_password_scramble(password, &switch.auth_data);
                    self.send_reply(&rehash[..]).await?;
                    let payload = self.receive_reply().await?;
                    self.expect_ok(payload)?;
                }
                _ => {
                    return Err(Error::Protocol(
                        "unexpected payload after COM_CHANGE_USER".into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Sends `COM_PING`. `Ok(false)` when the server is gone (EOF or a socket
    /// fault); other failures surface unchanged, including the state errors
    /// raised on a closed or failed session.
    pub async fn try_ping(&mut self) -> crate::Result<bool> {
        let outcome: crate::Result<()> = async {
            self.send(PingCommand).await?;
            let payload = self.receive_reply().await?;
            self.expect_ok(payload)?;
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => Ok(true),
            Err(Error::Io { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Best-effort teardown: `COM_QUIT`, socket shutdown, state to `Closed`.
    /// Never fails; protocol errors during the goodbye are swallowed.
    pub async fn dispose(&mut self) {
        if self.state == SessionState::Connected {
            self.conversation.start_new();
            self.transport.reset_compressed_sequence();

            let mut buf = BytesMut::new();
            if QuitCommand.encode(&mut buf).is_ok() {
                let _ = self
                    .transport
                    .write_packet(&mut self.conversation, &buf)
                    .await;
                // The server usually just closes the stream; if it answers,
                // drain the reply without caring about its sequence number.
                let _ = self
                    .transport
                    .read_packet(&mut self.conversation, ProtocolErrorBehavior::Ignore)
                    .await;
            }
        }

        if self.state != SessionState::Closed {
            let _ = self.transport.shutdown().await;
            self.state = SessionState::Closed;
        }

        self.conversation.finish();
    }

    fn expect_ok(&self, payload: Payload) -> crate::Result<OkPayload> {
        match payload.header_byte() {
            Some(OK_HEADER) => OkPayload::decode(&mut payload.into_inner()),
            Some(ERR_HEADER) => {
                let err = ServerError::decode(&mut payload.into_inner())?;
                Err(Error::Server(err))
            }
            _ => Err(Error::Protocol("expected an OK payload".into())),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The server version reported in the greeting.
    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }

    /// The connection id the server assigned, as shown in `SHOW PROCESSLIST`.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// The capabilities active for this session.
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Opaque pool generation stamp. The pool owning this session manages it;
    /// the session only carries it.
    pub fn pool_generation(&self) -> u32 {
        self.pool_generation
    }

    pub fn set_pool_generation(&mut self, generation: u32) {
        self.pool_generation = generation;
    }

    pub fn is_tls(&self) -> bool {
        self.transport.is_tls()
    }

    pub fn is_compressed(&self) -> bool {
        self.transport.is_compressed()
    }

    pub(crate) fn decode_options(&self) -> DecodeOptions {
        self.decode_options
    }
}

impl Session<Compat<TcpStream>> {
    /// Resolves each configured host and dials every address in order until a
    /// TCP connection succeeds, then runs [`connect`](Session::connect) over
    /// it.
    pub async fn connect_tcp(config: Config) -> crate::Result<Self> {
        let stream = open_stream(&config).await?;
        stream.set_nodelay(true)?;
        Session::connect(config, stream.compat_write()).await
    }
}

async fn open_stream(config: &Config) -> crate::Result<TcpStream> {
    let mut last_error: Option<Error> = None;

    for host in &config.hosts {
        let addrs = match tokio::net::lookup_host((host.as_str(), config.port)).await {
            Ok(addrs) => addrs,
            Err(e) => {
                last_error = Some(e.into());
                continue;
            }
        };

        for addr in addrs {
            let attempt = TcpStream::connect(addr);
            let outcome = match config.connect_timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(Error::ConnectTimeout(format!("{}:{}", host, config.port)))
                    }
                },
                None => attempt.await,
            };

            match outcome {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    event!(Level::WARN, %addr, error = %e, "address did not accept the connection");
                    last_error = Some(e.into());
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Io {
        kind: crate::error::IoErrorKind::NotFound,
        message: "no hosts to connect to".to_string(),
    }))
}
