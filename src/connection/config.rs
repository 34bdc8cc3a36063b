use std::path::PathBuf;
use std::time::Duration;

/// When and how the session stream is wrapped in TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// Never use TLS.
    None,
    /// Use TLS when the server supports it, fall back to plaintext otherwise.
    Preferred,
    /// Require TLS, without validating the server certificate.
    Required,
    /// Require TLS and validate the certificate chain, but not the hostname.
    VerifyCa,
    /// Require TLS and validate both the certificate chain and the hostname.
    VerifyFull,
}

/// Configuration for connecting to a MySQL server.
///
/// Use the builder methods to construct a configuration, then pass it to
/// [`Session`] to establish a connection.
///
/// [`Session`]: struct.Session.html
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) hosts: Vec<String>,
    pub(crate) port: u16,
    pub(crate) user: String,
    pub(crate) password: String,
    pub(crate) database: Option<String>,
    pub(crate) ssl_mode: SslMode,
    pub(crate) ca_cert_path: Option<PathBuf>,
    pub(crate) compress: bool,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) convert_zero_datetime: bool,
    pub(crate) old_guids: bool,
    pub(crate) pool_generation: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: None,
            ssl_mode: SslMode::Preferred,
            ca_cert_path: None,
            compress: false,
            connect_timeout: None,
            convert_zero_datetime: false,
            old_guids: false,
            pool_generation: 0,
        }
    }
}

impl Config {
    /// Create a new `Config` with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A host or ip address to connect to, replacing any previously set hosts.
    ///
    /// - Defaults to `localhost`.
    pub fn host(&mut self, host: impl ToString) {
        self.hosts = vec![host.to_string()];
    }

    /// Several hosts tried in order until one accepts the TCP connection.
    pub fn hosts<I, T>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.hosts = hosts.into_iter().map(|h| h.to_string()).collect();
    }

    /// The server port.
    ///
    /// - Defaults to `3306`.
    pub fn port(&mut self, port: u16) {
        self.port = port;
    }

    /// The user to authenticate as.
    pub fn user(&mut self, user: impl ToString) {
        self.user = user.to_string();
    }

    /// The password to authenticate with.
    pub fn password(&mut self, password: impl ToString) {
        self.password = password.to_string();
    }

    /// The default database for the session.
    ///
    /// - Defaults to no database selected.
    pub fn database(&mut self, database: impl ToString) {
        self.database = Some(database.to_string());
    }

    /// Set the preferred TLS behavior.
    ///
    /// - Defaults to [`SslMode::Preferred`].
    pub fn ssl_mode(&mut self, ssl_mode: SslMode) {
        self.ssl_mode = ssl_mode;
    }

    /// Path to a CA certificate file (`pem`, `crt` or `der`) used to validate
    /// the server certificate under [`SslMode::VerifyCa`] and
    /// [`SslMode::VerifyFull`].
    pub fn ca_cert_path(&mut self, path: impl Into<PathBuf>) {
        self.ca_cert_path = Some(path.into());
    }

    /// Enable the compressed protocol when the server supports it.
    ///
    /// - Defaults to off.
    pub fn compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    /// Deadline for establishing the TCP connection to one address.
    pub fn connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = Some(timeout);
    }

    /// Decode all-zero dates to the minimum date instead of failing.
    ///
    /// - Defaults to off.
    pub fn convert_zero_datetime(&mut self, convert: bool) {
        self.convert_zero_datetime = convert;
    }

    /// Decode `BINARY(16)` columns as GUIDs and `CHAR(36)` columns as text.
    ///
    /// - Defaults to off, which decodes `CHAR(36)` columns as GUIDs.
    pub fn old_guids(&mut self, old_guids: bool) {
        self.old_guids = old_guids;
    }

    /// Opaque pool generation stamp carried by the session. Pool bookkeeping
    /// itself happens outside this crate.
    pub fn pool_generation(&mut self, generation: u32) {
        self.pool_generation = generation;
    }

    pub fn get_hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert_eq!(&["localhost".to_string()][..], config.get_hosts());
        assert_eq!(3306, config.get_port());
        assert_eq!(SslMode::Preferred, config.ssl_mode);
        assert!(!config.compress);
        assert!(config.database.is_none());
    }

    #[test]
    fn host_replaces_hosts() {
        let mut config = Config::new();
        config.hosts(["a", "b"]);
        assert_eq!(2, config.get_hosts().len());
        config.host("c");
        assert_eq!(&["c".to_string()][..], config.get_hosts());
    }

    #[test]
    fn builder_methods() {
        let mut config = Config::new();
        config.port(3307);
        config.user("app");
        config.password("secret");
        config.database("inventory");
        config.ssl_mode(SslMode::Required);
        config.compress(true);
        config.connect_timeout(Duration::from_secs(5));
        config.pool_generation(3);

        assert_eq!(3307, config.port);
        assert_eq!("app", config.user);
        assert_eq!(Some("inventory".to_string()), config.database);
        assert_eq!(SslMode::Required, config.ssl_mode);
        assert!(config.compress);
        assert_eq!(Some(Duration::from_secs(5)), config.connect_timeout);
        assert_eq!(3, config.pool_generation);
    }
}
