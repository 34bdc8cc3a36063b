//! The streaming result-set reader.
//!
//! A query response is a sequence of result sets, each being a column count,
//! the column definitions, an EOF, the rows, and a closing EOF or OK. The
//! cursor walks that stream forward-only, one payload per step, never
//! prefetching beyond the next packet.

use bytes::{Buf, BytesMut};
use futures_util::io::{AsyncRead, AsyncWrite};
use tracing::{event, Level};

use crate::connection::Session;
use crate::from_value::FromValue;
use crate::protocol::payloads::{ColumnDefinition, EofPayload, OkPayload, ServerError};
use crate::protocol::{
    lenenc, Decode, ServerStatusFlags, ERR_HEADER, LOCAL_INFILE_HEADER, OK_HEADER,
};
use crate::value::{self, Value};
use crate::Error;

/// Where the cursor stands in the response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSetState {
    /// Nothing has been read yet.
    None,
    /// Column metadata is read; rows follow.
    ReadResultSetHeader,
    /// The first row was read ahead by [`has_rows`](ResultSet::has_rows) and
    /// is buffered for the next [`read`](ResultSet::read).
    AlreadyReadFirstRow,
    /// Somewhere in the row stream.
    ReadingRows,
    /// The current result set is drained and another one follows.
    HasMoreData,
    /// The whole response is drained.
    NoMoreData,
}

/// A forward-only cursor over the response to a query.
///
/// The cursor borrows its session for the duration of reading; row data
/// returned by [`value`](Self::value), [`get`](Self::get) and
/// [`try_get`](Self::try_get) borrows the current row buffer, which is
/// overwritten by the next [`read`](Self::read). Use
/// [`Value::into_owned`](crate::Value::into_owned) or the owned-row helpers
/// to keep data around.
#[derive(Debug)]
pub struct ResultSet<'a, S: AsyncRead + AsyncWrite + Unpin + Send> {
    session: &'a mut Session<S>,
    columns: Vec<ColumnDefinition>,
    /// The payload of the current row; cell slots index into it.
    row: BytesMut,
    /// One `(offset, length)` per column; `None` is the NULL cell.
    slots: Vec<Option<(usize, usize)>>,
    affected_rows: u64,
    last_insert_id: u64,
    warning_count: u16,
    server_status: ServerStatusFlags,
    state: ResultSetState,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin + Send> ResultSet<'a, S> {
    /// Reads the response header for a query the session just sent.
    pub(crate) async fn open(session: &'a mut Session<S>) -> crate::Result<ResultSet<'a, S>> {
        let mut result_set = ResultSet {
            session,
            columns: Vec::new(),
            row: BytesMut::new(),
            slots: Vec::new(),
            affected_rows: 0,
            last_insert_id: 0,
            warning_count: 0,
            server_status: ServerStatusFlags::empty(),
            state: ResultSetState::None,
        };

        result_set.read_result_set_header().await?;
        Ok(result_set)
    }

    async fn read_result_set_header(&mut self) -> crate::Result<()> {
        loop {
            let payload = self.session.receive_reply().await?;

            match payload.header_byte() {
                Some(OK_HEADER) => {
                    // A statement with no result set.
                    let ok = OkPayload::decode(&mut payload.into_inner())?;
                    self.affected_rows = ok.affected_rows;
                    self.last_insert_id = ok.last_insert_id;
                    self.warning_count = ok.warning_count;
                    self.server_status = ok.server_status;
                    self.columns.clear();
                    self.slots.clear();

                    if ok.has_more_results() {
                        self.state = ResultSetState::HasMoreData;
                        continue;
                    }
                    self.state = ResultSetState::NoMoreData;
                    return Ok(());
                }
                Some(ERR_HEADER) => {
                    let err = ServerError::decode(&mut payload.into_inner())?;
                    return Err(Error::Server(err));
                }
                Some(LOCAL_INFILE_HEADER) => {
                    return Err(Error::Unsupported("LOCAL INFILE is not supported".into()));
                }
                _ => {
                    let mut buf = payload.into_inner();
                    let column_count = lenenc::read_u64(&mut buf)? as usize;
                    if !buf.is_empty() {
                        return Err(Error::Protocol("malformed column count payload".into()));
                    }

                    let mut columns = Vec::with_capacity(column_count);
                    for _ in 0..column_count {
                        let payload = self.session.receive_reply().await?;
                        columns.push(ColumnDefinition::decode(&mut payload.into_inner())?);
                    }

                    let payload = self.session.receive_reply().await?;
                    if !payload.is_eof() {
                        return Err(Error::Protocol(
                            "expected EOF after the column definitions".into(),
                        ));
                    }
                    let eof = EofPayload::decode(&mut payload.into_inner())?;
                    self.warning_count = eof.warning_count;

                    event!(Level::TRACE, columns = column_count, "result set header");

                    self.slots = vec![None; column_count];
                    self.columns = columns;
                    self.state = ResultSetState::ReadResultSetHeader;
                    return Ok(());
                }
            }
        }
    }

    /// Advances to the next row of the current result set. `false` once the
    /// set is drained.
    pub async fn read(&mut self) -> crate::Result<bool> {
        match self.state {
            ResultSetState::AlreadyReadFirstRow => {
                self.state = ResultSetState::ReadingRows;
                Ok(true)
            }
            ResultSetState::ReadResultSetHeader | ResultSetState::ReadingRows => {
                self.advance_row().await
            }
            _ => Ok(false),
        }
    }

    /// Whether the current result set has any rows. May read the first row
    /// ahead; a following [`read`](Self::read) returns it without more I/O.
    pub async fn has_rows(&mut self) -> crate::Result<bool> {
        match self.state {
            ResultSetState::ReadResultSetHeader => {
                if self.advance_row().await? {
                    self.state = ResultSetState::AlreadyReadFirstRow;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            ResultSetState::AlreadyReadFirstRow | ResultSetState::ReadingRows => Ok(true),
            _ => Ok(false),
        }
    }

    async fn advance_row(&mut self) -> crate::Result<bool> {
        let payload = self.session.receive_reply().await?;

        if payload.is_eof() {
            let eof = EofPayload::decode(&mut payload.into_inner())?;
            self.warning_count = eof.warning_count;
            self.server_status = eof.server_status;
            self.state = if eof.has_more_results() {
                ResultSetState::HasMoreData
            } else {
                ResultSetState::NoMoreData
            };
            return Ok(false);
        }

        if payload.header_byte() == Some(ERR_HEADER) {
            let err = ServerError::decode(&mut payload.into_inner())?;
            return Err(Error::Server(err));
        }

        self.parse_row(payload.into_inner())?;
        self.state = ResultSetState::ReadingRows;
        Ok(true)
    }

    fn parse_row(&mut self, buf: BytesMut) -> crate::Result<()> {
        let total = buf.len();
        let mut cursor = &buf[..];

        for slot in self.slots.iter_mut() {
            if cursor.first() == Some(&lenenc::NULL_CELL) {
                cursor.advance(1);
                *slot = None;
                continue;
            }

            let length = lenenc::read_u64(&mut cursor)? as usize;
            if cursor.len() < length {
                return Err(Error::Protocol("row payload is truncated".into()));
            }
            let offset = total - cursor.len();
            cursor.advance(length);
            *slot = Some((offset, length));
        }

        if !cursor.is_empty() {
            return Err(Error::Protocol("row payload has trailing bytes".into()));
        }

        self.row = buf;
        Ok(())
    }

    /// Drains the rest of the current result set, then positions the cursor
    /// on the next one. `false` when the response holds no further result set.
    pub async fn next_result(&mut self) -> crate::Result<bool> {
        loop {
            match self.state {
                ResultSetState::AlreadyReadFirstRow => {
                    self.state = ResultSetState::ReadingRows;
                }
                ResultSetState::ReadResultSetHeader | ResultSetState::ReadingRows => {
                    self.advance_row().await?;
                }
                _ => break,
            }
        }

        match self.state {
            ResultSetState::HasMoreData => {
                self.read_result_set_header().await?;
                Ok(self.state == ResultSetState::ReadResultSetHeader)
            }
            _ => Ok(false),
        }
    }

    /// Decodes the cell at `ordinal` of the current row.
    pub fn value(&self, ordinal: usize) -> crate::Result<Value<'_>> {
        if !matches!(
            self.state,
            ResultSetState::ReadingRows | ResultSetState::AlreadyReadFirstRow
        ) {
            return Err(Error::InvalidState("no current row to read from".into()));
        }

        let column = self.columns.get(ordinal).ok_or_else(|| {
            Error::Conversion(format!("column ordinal {} is out of range", ordinal).into())
        })?;

        match self.slots[ordinal] {
            None => Ok(Value::Null),
            Some((offset, length)) => value::decode_text(
                &self.row[offset..offset + length],
                column,
                self.session.decode_options(),
            ),
        }
    }

    /// Whether the cell at `ordinal` of the current row is NULL.
    pub fn is_null(&self, ordinal: usize) -> crate::Result<bool> {
        Ok(self.value(ordinal)?.is_null())
    }

    /// Converts the cell at `ordinal`, `None` being NULL.
    pub fn try_get<'s, T: FromValue<'s>>(&'s self, ordinal: usize) -> crate::Result<Option<T>> {
        T::from_value(self.value(ordinal)?)
    }

    /// Converts the cell at `ordinal`, `None` being NULL.
    ///
    /// # Panics
    ///
    /// Panics when there is no current row or the cell does not convert into
    /// `T`; use [`try_get`](Self::try_get) to handle those as errors.
    pub fn get<'s, T: FromValue<'s>>(&'s self, ordinal: usize) -> Option<T> {
        self.try_get(ordinal).unwrap()
    }

    /// Reads the next row and detaches it from the row buffer.
    pub async fn read_row(&mut self) -> crate::Result<Option<Vec<Value<'static>>>> {
        if !self.read().await? {
            return Ok(None);
        }

        let mut cells = Vec::with_capacity(self.columns.len());
        for ordinal in 0..self.columns.len() {
            cells.push(self.value(ordinal)?.into_owned());
        }
        Ok(Some(cells))
    }

    /// Collects all remaining rows of the current result set into memory.
    pub async fn collect_rows(&mut self) -> crate::Result<Vec<Vec<Value<'static>>>> {
        let mut rows = Vec::new();
        while let Some(row) = self.read_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The column metadata of the current result set. Empty when the current
    /// result is an OK without rows.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Rows changed by the statement, from its OK payload.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// The auto-increment value generated by the statement, if any.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    /// The server status bits from the most recent OK or EOF payload.
    pub fn server_status(&self) -> ServerStatusFlags {
        self.server_status
    }

    pub fn state(&self) -> ResultSetState {
        self.state
    }
}
