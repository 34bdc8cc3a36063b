//! Bit sets negotiated or reported over the wire: client/server capabilities,
//! server status, and per-column flags.

use enumflags2::{bitflags, BitFlags};

/// Capability bits exchanged during the handshake.
///
/// The server advertises its set in the initial handshake; the client answers
/// with the subset it wants active for the session.
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Use the improved version of Old Password Authentication
    LongPassword = 0x0000_0001,
    /// Send found rows instead of affected rows
    FoundRows = 0x0000_0002,
    /// Get all column flags
    LongFlag = 0x0000_0004,
    /// Database (schema) name can be specified on connect
    ConnectWithDb = 0x0000_0008,
    /// Don't allow database.table.column
    NoSchema = 0x0000_0010,
    /// Compression protocol supported
    Compress = 0x0000_0020,
    /// ODBC client
    Odbc = 0x0000_0040,
    /// Can use LOAD DATA LOCAL
    LocalFiles = 0x0000_0080,
    /// Ignore spaces before '('
    IgnoreSpace = 0x0000_0100,
    /// New 4.1 protocol
    Protocol41 = 0x0000_0200,
    /// Interactive client (affects timeouts)
    Interactive = 0x0000_0400,
    /// Use SSL encryption for the session
    Ssl = 0x0000_0800,
    /// Client will not issue SIGPIPE
    IgnoreSigpipe = 0x0000_1000,
    /// Client knows about transactions
    Transactions = 0x0000_2000,
    /// Old flag for the 4.1 protocol
    Reserved = 0x0000_4000,
    /// 4.1 authentication
    SecureConnection = 0x0000_8000,
    /// Enable multi-statement support
    MultiStatements = 0x0001_0000,
    /// Enable multi-results
    MultiResults = 0x0002_0000,
    /// Multi-results in prepared statements
    PsMultiResults = 0x0004_0000,
    /// Pluggable authentication
    PluginAuth = 0x0008_0000,
    /// Connection attributes
    ConnectAttrs = 0x0010_0000,
    /// Authentication response larger than 255 bytes
    PluginAuthLenencData = 0x0020_0000,
    /// Can handle expired passwords
    CanHandleExpiredPasswords = 0x0040_0000,
    /// Track session state changes
    SessionTrack = 0x0080_0000,
    /// Use OK instead of EOF packets
    DeprecateEof = 0x0100_0000,
}

/// The capability set a `u32` from the wire maps to.
pub type CapabilityFlags = BitFlags<Capability>;

/// Status bits the server reports in OK and EOF payloads.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// A transaction is active
    InTransaction = 0x0001,
    /// Autocommit mode is enabled
    Autocommit = 0x0002,
    /// More results exist after the current one
    MoreResultsExist = 0x0008,
    /// Query did not use a good index
    NoGoodIndexUsed = 0x0010,
    /// Query did not use any index
    NoIndexUsed = 0x0020,
    /// Cursor exists
    CursorExists = 0x0040,
    /// Last row was sent
    LastRowSent = 0x0080,
    /// Database was dropped
    DatabaseDropped = 0x0100,
    /// No backslash escapes mode is enabled
    NoBackslashEscapes = 0x0200,
    /// Metadata changed
    MetadataChanged = 0x0400,
    /// Query was slow
    QueryWasSlow = 0x0800,
    /// Prepared statement has output parameters
    PsOutParams = 0x1000,
    /// In a read-only transaction
    InReadonlyTransaction = 0x2000,
    /// Session state has changed
    SessionStateChanged = 0x4000,
}

/// The status set a `u16` from the wire maps to.
pub type ServerStatusFlags = BitFlags<ServerStatus>;

/// Flags carried by each column definition.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFlag {
    /// Column can't be NULL
    NotNull = 0x0001,
    /// Column is part of a primary key
    PrimaryKey = 0x0002,
    /// Column is part of a unique key
    UniqueKey = 0x0004,
    /// Column is part of a key
    MultipleKey = 0x0008,
    /// Column is a blob
    Blob = 0x0010,
    /// Column is unsigned
    Unsigned = 0x0020,
    /// Column is zerofill
    ZeroFill = 0x0040,
    /// Column is binary
    Binary = 0x0080,
    /// Column is an enum
    Enum = 0x0100,
    /// Column is auto-increment
    AutoIncrement = 0x0200,
    /// Column is a timestamp
    Timestamp = 0x0400,
    /// Column is a set
    Set = 0x0800,
    /// Column has no default value
    NoDefaultValue = 0x1000,
    /// Column is set to NOW on UPDATE
    OnUpdateNow = 0x2000,
    /// Column is part of some key
    PartKey = 0x4000,
    /// Column is numeric
    Numeric = 0x8000,
}

/// The flag set a `u16` from the wire maps to.
pub type ColumnFlags = BitFlags<ColumnFlag>;
