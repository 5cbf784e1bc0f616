//! ==============================================================================
//! pump.rs - command relay for the pump actuator
//! ==============================================================================
//!
//! purpose:
//!     validates a pump command and hands it to the broker client for
//!     publishing on iot/pompa. fire-and-forget: the only thing we can
//!     observe locally is whether the client accepted the message for send.
//!
//! relationships:
//!     - used by: api.rs (POST /api/pompa)
//!     - publishes through: CommandPublisher (mqtt.rs implements it for
//!       rumqttc::AsyncClient)
//!
//! ==============================================================================

use std::sync::Arc;
use tracing::info;

use crate::domain::PumpCommand;
use crate::error::{TransportError, ValidationError};

/// one-way publish seam between the relay and the broker client
pub trait CommandPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone)]
pub struct CommandRelay {
    publisher: Arc<dyn CommandPublisher>,
    topic: String,
}

impl CommandRelay {
    pub fn new(publisher: Arc<dyn CommandPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    /// validate `status` and publish it; nothing is sent for an invalid value
    pub fn relay(&self, status: &str) -> Result<PumpCommand, RelayError> {
        let command: PumpCommand = status.parse()?;
        self.publisher.publish(&self.topic, command.as_str().as_bytes())?;
        info!(%command, topic = %self.topic, "Pump command sent");
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// records every publish instead of talking to a broker
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl CommandPublisher for RecordingPublisher {
        fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    struct ClosedPublisher;

    impl CommandPublisher for ClosedPublisher {
        fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }
    }

    #[test]
    fn valid_command_is_published_once() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = CommandRelay::new(publisher.clone(), "iot/pompa");

        assert_eq!(relay.relay("ON").unwrap(), PumpCommand::On);

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("iot/pompa".to_string(), b"ON".to_vec())]);
    }

    #[test]
    fn invalid_command_publishes_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = CommandRelay::new(publisher.clone(), "iot/pompa");

        let err = relay.relay("MAYBE").unwrap_err();
        assert!(matches!(err, RelayError::Validation(ValidationError::PumpStatus)));
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn transport_failure_is_reported() {
        let relay = CommandRelay::new(Arc::new(ClosedPublisher), "iot/pompa");
        assert!(matches!(relay.relay("OFF"), Err(RelayError::Transport(_))));
    }
}
