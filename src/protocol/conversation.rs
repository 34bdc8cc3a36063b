//! The sequence-numbered dialogue around one caller-initiated request.
//!
//! Every packet carries a one-byte sequence number. Within one conversation
//! the numbers run 0, 1, 2, … (mod 256) across both directions; the counter
//! resets whenever the caller starts a new exchange. The packet codec does not
//! track sequence numbers itself, it takes and verifies them here.

use crate::Error;

/// How the packet layer reacts to a sequence-number mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorBehavior {
    /// Fail the operation with a protocol error.
    Throw,
    /// Swallow the mismatch. Used only while tearing a session down.
    Ignore,
}

/// The sequence counter shared by all packets of one exchange.
#[derive(Debug, Default)]
pub struct Conversation {
    next_sequence: u8,
    active: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new exchange: the next packet in either direction carries
    /// sequence number zero.
    pub fn start_new(&mut self) {
        self.next_sequence = 0;
        self.active = true;
    }

    /// Ends the current exchange. Reply operations fail until a new
    /// conversation is started.
    pub fn finish(&mut self) {
        self.next_sequence = 0;
        self.active = false;
    }

    /// Fails unless an exchange is in progress. A reply must follow a send or
    /// receive on the same conversation.
    pub fn ensure_active(&self) -> crate::Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::InvalidState(
                "no conversation in progress; a reply must follow a send or a receive".into(),
            ))
        }
    }

    /// Hands out the sequence number for the next outbound packet.
    pub(crate) fn take_sequence(&mut self) -> u8 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    /// Verifies the sequence number of a received packet against the counter
    /// and advances it.
    pub(crate) fn accept_sequence(
        &mut self,
        actual: u8,
        behavior: ProtocolErrorBehavior,
    ) -> crate::Result<()> {
        let expected = self.next_sequence;
        if actual == expected {
            self.next_sequence = self.next_sequence.wrapping_add(1);
            return Ok(());
        }

        // Resynchronize so a tolerated mismatch does not cascade.
        self.next_sequence = actual.wrapping_add(1);

        match behavior {
            ProtocolErrorBehavior::Throw => Err(Error::Protocol(
                format!(
                    "packet out of order: expected sequence {}, got {}",
                    expected, actual
                )
                .into(),
            )),
            ProtocolErrorBehavior::Ignore => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_runs_from_zero() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        assert_eq!(0, conversation.take_sequence());
        assert_eq!(1, conversation.take_sequence());
        assert_eq!(2, conversation.take_sequence());
    }

    #[test]
    fn start_new_resets_the_counter() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        conversation.take_sequence();
        conversation.take_sequence();
        conversation.start_new();
        assert_eq!(0, conversation.take_sequence());
    }

    #[test]
    fn sequence_wraps_mod_256() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        for _ in 0..=255 {
            conversation.take_sequence();
        }
        assert_eq!(0, conversation.take_sequence());
    }

    #[test]
    fn accept_sequence_advances_on_match() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        conversation
            .accept_sequence(0, ProtocolErrorBehavior::Throw)
            .unwrap();
        conversation
            .accept_sequence(1, ProtocolErrorBehavior::Throw)
            .unwrap();
        assert_eq!(2, conversation.take_sequence());
    }

    #[test]
    fn accept_sequence_mismatch_throws() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        let err = conversation
            .accept_sequence(5, ProtocolErrorBehavior::Throw)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn accept_sequence_mismatch_ignored_resynchronizes() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        conversation
            .accept_sequence(5, ProtocolErrorBehavior::Ignore)
            .unwrap();
        assert_eq!(6, conversation.take_sequence());
    }

    #[test]
    fn reply_without_exchange_is_invalid() {
        let conversation = Conversation::new();
        let err = conversation.ensure_active().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn finish_deactivates() {
        let mut conversation = Conversation::new();
        conversation.start_new();
        assert!(conversation.ensure_active().is_ok());
        conversation.finish();
        assert!(conversation.ensure_active().is_err());
    }
}
