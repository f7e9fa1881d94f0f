//! Response generator interface
//!
//! Forwarded fragments are submitted fire-and-forget. The generator's reply
//! comes back to the session as a separate `Speak` request.

use crate::arbitration::Fragment;
use crate::{Result, TurnError};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Consumer of user turns
pub trait ResponseGenerator: Send + Sync {
    /// Submit a user turn; must not block on the reply
    fn forward(&self, fragment: &Fragment) -> Result<()>;
}

/// Forwards fragments over a channel to whatever drives the language model
pub struct ChannelGenerator {
    tx: Sender<Fragment>,
}

impl ChannelGenerator {
    pub fn new(tx: Sender<Fragment>) -> Self {
        Self { tx }
    }

    /// Create a generator together with the receiving end of its channel
    pub fn with_receiver() -> (Self, Receiver<Fragment>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }
}

impl ResponseGenerator for ChannelGenerator {
    fn forward(&self, fragment: &Fragment) -> Result<()> {
        self.tx
            .send(fragment.clone())
            .map_err(|e| TurnError::GeneratorError(format!("Failed to forward fragment: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_delivers_fragment() {
        let (generator, rx) = ChannelGenerator::with_receiver();
        let fragment = Fragment::new("What time is it");
        generator.forward(&fragment).unwrap();

        let received = rx.try_recv().unwrap();
        assert_eq!(received.id, fragment.id);
        assert_eq!(received.text, "what time is it");
    }

    #[test]
    fn test_forward_after_receiver_dropped() {
        let (generator, rx) = ChannelGenerator::with_receiver();
        drop(rx);

        let err = generator.forward(&Fragment::new("hello")).unwrap_err();
        assert!(matches!(err, TurnError::GeneratorError(_)));
        assert!(err.is_recoverable());
    }
}
