//! One-shot client: deliver a single message to the running server

use tracing::debug;

use crate::channel::ClientChannel;
use crate::codec::{self, Message};
use crate::config::Config;
use crate::error::{DstatError, Result};
use crate::registry::{self, Probe};

/// What the client was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Show `text`, optionally for `delay` seconds
    SendMessage { text: String, delay: Option<u64> },
    /// Stop the server
    SendTerminate,
}

impl Intent {
    fn into_message(self) -> Message {
        match self {
            Intent::SendMessage { text, delay } => Message::display(text, delay),
            Intent::SendTerminate => Message::terminate(),
        }
    }
}

/// Check for a live server and write one frame to its channel
///
/// Fails with [`DstatError::NotRunning`] before touching the channel when no
/// server owns the pid record, and with [`DstatError::Unreachable`] when the
/// server exists but its channel cannot be written.
pub fn send(config: &Config, intent: Intent) -> Result<()> {
    let pid_path = config.pid_path();
    let pid = match registry::probe(&pid_path) {
        Probe::Running(pid) => pid,
        Probe::NotRunning => return Err(DstatError::NotRunning { path: pid_path }),
    };

    let channel_path = config.channel_path();
    debug!("Server pid {} found, writing to {}", pid, channel_path.display());

    let frame = codec::encode_frame(&intent.into_message());
    ClientChannel::connect(&channel_path)?.send(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ReadOutcome, ServerChannel};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config::new("dstat", dir.path().to_path_buf())
    }

    fn claim_record(config: &Config) {
        fs::write(config.pid_path(), format!("{}\n", std::process::id())).unwrap();
    }

    #[test]
    fn test_no_server_fails_fast_without_channel() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let result = send(&config, Intent::SendTerminate);
        assert!(matches!(result, Err(DstatError::NotRunning { .. })));
        assert!(!config.channel_path().exists());
    }

    #[test]
    fn test_stale_record_counts_as_not_running() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::write(config.pid_path(), format!("{}\n", i32::MAX)).unwrap();

        let result = send(&config, Intent::SendTerminate);
        assert!(matches!(result, Err(DstatError::NotRunning { .. })));
    }

    #[test]
    fn test_live_record_without_channel_is_unreachable() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        claim_record(&config);

        let result = send(
            &config,
            Intent::SendMessage {
                text: "hi".into(),
                delay: Some(1),
            },
        );
        assert!(matches!(result, Err(DstatError::Unreachable { .. })));
    }

    #[test]
    fn test_message_reaches_channel() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        claim_record(&config);
        let server = ServerChannel::create(&config.channel_path()).unwrap();

        send(
            &config,
            Intent::SendMessage {
                text: "a:b".into(),
                delay: Some(4),
            },
        )
        .unwrap();

        let mut buf = [0u8; 256];
        let ReadOutcome::Data(n) = server.poll_read(&mut buf, Duration::from_millis(50)).unwrap()
        else {
            panic!("no data on channel");
        };
        assert_eq!(
            codec::decode(&buf[..n]).unwrap(),
            Message::display("a:b", Some(4))
        );
    }

    #[test]
    fn test_oversized_message_is_refused() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        claim_record(&config);
        let _server = ServerChannel::create(&config.channel_path()).unwrap();

        let result = send(
            &config,
            Intent::SendMessage {
                text: "x".repeat(codec::MAX_FRAME_LEN),
                delay: None,
            },
        );
        assert!(matches!(result, Err(DstatError::FrameTooLarge { .. })));
    }
}
