//! A scripted MySQL server speaking literal wire bytes, shared by the
//! integration tests.
#![allow(dead_code)]

use calico::{Config, Session, SslMode};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// The auth challenge every scripted greeting hands out.
pub const NONCE: [u8; 20] = [
    0x3D, 0x4C, 0x5E, 0x2F, 0x1A, 0x0B, 0x7C, 0x8D, 0x9E, 0xAF, 0x10, 0x21, 0x32, 0x43, 0x54,
    0x65, 0x76, 0x87, 0x98, 0xA9,
];

pub const PASSWORD: &str = "secret";

pub type TestSession = Session<Compat<DuplexStream>>;

/// Frames `payload` as one wire packet.
pub fn packet(sequence: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..3]);
    out.push(sequence);
    out.extend_from_slice(payload);
    out
}

/// The server greeting. Capabilities: PROTOCOL_41, SECURE_CONNECTION,
/// LONG_PASSWORD, CONNECT_WITH_DB, MULTI_RESULTS, PLUGIN_AUTH, COMPRESS —
/// no SSL unless `with_ssl`.
pub fn greeting(version: &str, nonce: &[u8; 20], with_ssl: bool) -> Vec<u8> {
    let caps_low: u16 = 0x8209 | 0x0020 | if with_ssl { 0x0800 } else { 0 };
    let caps_high: u16 = 0x000A;

    let mut payload = Vec::new();
    payload.push(0x0A);
    payload.extend_from_slice(version.as_bytes());
    payload.push(0);
    payload.extend_from_slice(&42u32.to_le_bytes());
    payload.extend_from_slice(&nonce[..8]);
    payload.push(0);
    payload.extend_from_slice(&caps_low.to_le_bytes());
    payload.push(45); // utf8mb4
    payload.extend_from_slice(&0x0002u16.to_le_bytes()); // autocommit
    payload.extend_from_slice(&caps_high.to_le_bytes());
    payload.push(21);
    payload.extend_from_slice(&[0u8; 10]);
    payload.extend_from_slice(&nonce[8..]);
    payload.push(0);
    payload.extend_from_slice(b"mysql_native_password\0");
    packet(0, &payload)
}

pub fn ok_payload() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
}

pub fn ok_payload_with(affected: u8, last_insert_id: u8, status: u16) -> Vec<u8> {
    let mut payload = vec![0x00, affected, last_insert_id];
    payload.extend_from_slice(&status.to_le_bytes());
    payload.extend_from_slice(&[0x00, 0x00]);
    payload
}

pub fn eof_payload(status: u16) -> Vec<u8> {
    let mut payload = vec![0xFE, 0x00, 0x00];
    payload.extend_from_slice(&status.to_le_bytes());
    payload
}

pub fn err_payload(code: u16, sql_state: &str, message: &str) -> Vec<u8> {
    let mut payload = vec![0xFF];
    payload.extend_from_slice(&code.to_le_bytes());
    payload.push(b'#');
    payload.extend_from_slice(sql_state.as_bytes());
    payload.extend_from_slice(message.as_bytes());
    payload
}

pub fn column_definition(
    name: &str,
    column_type: u8,
    flags: u16,
    length: u32,
    character_set: u16,
) -> Vec<u8> {
    fn lenenc_str(out: &mut Vec<u8>, s: &str) {
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }

    let mut payload = Vec::new();
    lenenc_str(&mut payload, "def");
    lenenc_str(&mut payload, "");
    lenenc_str(&mut payload, "");
    lenenc_str(&mut payload, "");
    lenenc_str(&mut payload, name);
    lenenc_str(&mut payload, name);
    payload.push(0x0C);
    payload.extend_from_slice(&character_set.to_le_bytes());
    payload.extend_from_slice(&length.to_le_bytes());
    payload.push(column_type);
    payload.extend_from_slice(&flags.to_le_bytes());
    payload.push(0);
    payload.extend_from_slice(&[0, 0]);
    payload
}

/// The scramble the server expects for `password`, computed independently of
/// the client under test.
pub fn scramble(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1.iter().zip(stage3.iter()).map(|(a, b)| a ^ b).collect()
}

pub async fn read_packet(stream: &mut DuplexStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.unwrap();
    let length = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await.unwrap();
    (header[3], payload)
}

/// Parses the auth response out of a client `HandshakeResponse41`.
pub fn auth_response_of(handshake_response: &[u8]) -> Vec<u8> {
    let rest = &handshake_response[32..];
    let nul = rest.iter().position(|b| *b == 0).unwrap();
    let rest = &rest[nul + 1..];
    let auth_len = rest[0] as usize;
    rest[1..1 + auth_len].to_vec()
}

/// Serves the greeting, validates the client's handshake response, answers OK.
pub async fn serve_handshake(server: &mut DuplexStream, version: &str, password: &str) {
    server
        .write_all(&greeting(version, &NONCE, false))
        .await
        .unwrap();

    let (sequence, response) = read_packet(server).await;
    assert_eq!(1, sequence);

    let caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);
    assert_ne!(0, caps & 0x0200, "client must set CLIENT_PROTOCOL_41");
    assert_ne!(0, caps & 0x8000, "client must set CLIENT_SECURE_CONNECTION");
    assert_ne!(0, caps & 0x0001, "client must set CLIENT_LONG_PASSWORD");
    assert_ne!(0, caps & 0x0002_0000, "client must set CLIENT_MULTI_RESULTS");

    assert_eq!(scramble(password, &NONCE), auth_response_of(&response));

    server.write_all(&packet(2, &ok_payload())).await.unwrap();
}

pub fn test_config() -> Config {
    let mut config = Config::new();
    config.user("app");
    config.password(PASSWORD);
    config.ssl_mode(SslMode::None);
    config
}

pub async fn connect() -> (TestSession, DuplexStream) {
    connect_with_version("5.7.29-test").await
}

pub async fn connect_with_version(version: &str) -> (TestSession, DuplexStream) {
    let (client, mut server) = tokio::io::duplex(1 << 20);
    let version = version.to_string();

    let task = tokio::spawn(async move {
        serve_handshake(&mut server, &version, PASSWORD).await;
        server
    });

    let session = Session::connect(test_config(), client.compat())
        .await
        .unwrap();
    let server = task.await.unwrap();
    (session, server)
}
