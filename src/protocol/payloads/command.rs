use bytes::{BufMut, BytesMut};

use super::handshake_response::DEFAULT_CHARACTER_SET;
use crate::protocol::Encode;

uint_enum! {
    /// Command bytes of the text protocol.
    #[repr(u8)]
    pub enum Command {
        Quit = 0x01,
        Query = 0x03,
        Ping = 0x0E,
        ChangeUser = 0x11,
        ResetConnection = 0x1F,
    }
}

/// `COM_QUERY`: the command byte followed by the statement text.
#[derive(Debug)]
pub struct QueryCommand<'a> {
    sql: &'a str,
}

impl<'a> QueryCommand<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self { sql }
    }
}

impl Encode for QueryCommand<'_> {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u8(Command::Query as u8);
        dst.put_slice(self.sql.as_bytes());
        Ok(())
    }
}

/// `COM_PING`.
#[derive(Debug)]
pub struct PingCommand;

impl Encode for PingCommand {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u8(Command::Ping as u8);
        Ok(())
    }
}

/// `COM_QUIT`.
#[derive(Debug)]
pub struct QuitCommand;

impl Encode for QuitCommand {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u8(Command::Quit as u8);
        Ok(())
    }
}

/// `COM_RESET_CONNECTION`.
#[derive(Debug)]
pub struct ResetConnectionCommand;

impl Encode for ResetConnectionCommand {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u8(Command::ResetConnection as u8);
        Ok(())
    }
}

/// `COM_CHANGE_USER`: re-authenticates the session in place, the fallback
/// reset path for servers without `COM_RESET_CONNECTION`.
#[derive(Debug)]
pub struct ChangeUserCommand<'a> {
    pub user: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin: Option<&'a str>,
}

impl Encode for ChangeUserCommand<'_> {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u8(Command::ChangeUser as u8);
        dst.put_slice(self.user.as_bytes());
        dst.put_u8(0);

        dst.put_u8(self.auth_response.len() as u8);
        dst.put_slice(self.auth_response);

        dst.put_slice(self.database.unwrap_or("").as_bytes());
        dst.put_u8(0);

        dst.put_u16_le(u16::from(DEFAULT_CHARACTER_SET));

        if let Some(plugin) = self.auth_plugin {
            dst.put_slice(plugin.as_bytes());
            dst.put_u8(0);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes() {
        assert_eq!(0x01, Command::Quit as u8);
        assert_eq!(0x03, Command::Query as u8);
        assert_eq!(0x0E, Command::Ping as u8);
        assert_eq!(0x11, Command::ChangeUser as u8);
        assert_eq!(0x1F, Command::ResetConnection as u8);
    }

    #[test]
    fn command_try_from() {
        assert_eq!(Ok(Command::Query), Command::try_from(0x03));
        assert!(Command::try_from(0x7F).is_err());
    }

    #[test]
    fn query_command_layout() {
        let mut buf = BytesMut::new();
        QueryCommand::new("SELECT 1").encode(&mut buf).unwrap();
        assert_eq!(&b"\x03SELECT 1"[..], &buf[..]);
    }

    #[test]
    fn single_byte_commands() {
        for (expected, encoded) in [
            (0x0Eu8, {
                let mut buf = BytesMut::new();
                PingCommand.encode(&mut buf).unwrap();
                buf
            }),
            (0x01, {
                let mut buf = BytesMut::new();
                QuitCommand.encode(&mut buf).unwrap();
                buf
            }),
            (0x1F, {
                let mut buf = BytesMut::new();
                ResetConnectionCommand.encode(&mut buf).unwrap();
                buf
            }),
        ] {
            assert_eq!(&[expected][..], &encoded[..]);
        }
    }

    #[test]
    fn change_user_layout() {
        let mut buf = BytesMut::new();
        ChangeUserCommand {
            user: "app",
            auth_response: &[0xCD; 20],
            database: Some("inventory"),
            auth_plugin: Some("mysql_native_password"),
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(0x11, buf[0]);
        assert_eq!(&b"app\0"[..], &buf[1..5]);
        assert_eq!(20, buf[5]);
        assert_eq!(&[0xCDu8; 20][..], &buf[6..26]);
        assert_eq!(&b"inventory\0"[..], &buf[26..36]);
        assert_eq!(
            u16::from(DEFAULT_CHARACTER_SET),
            u16::from_le_bytes([buf[36], buf[37]])
        );
        assert_eq!(&b"mysql_native_password\0"[..], &buf[38..]);
    }

    #[test]
    fn change_user_without_database() {
        let mut buf = BytesMut::new();
        ChangeUserCommand {
            user: "app",
            auth_response: &[],
            database: None,
            auth_plugin: None,
        }
        .encode(&mut buf)
        .unwrap();

        // empty database is a bare NUL
        assert_eq!(&b"\x11app\0\0\0"[..], &buf[..7]);
    }
}
