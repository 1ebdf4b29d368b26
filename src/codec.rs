//! Wire codec for channel messages
//!
//! A message is the record `COMMAND:DELAY:PAYLOAD`, base64-encoded as a whole
//! and terminated by `\n`. Base64 never emits the terminator, so frames can
//! be cut out of the byte stream without looking inside them.
//!
//! # Format
//!
//! - `COMMAND`: `MSG` or `DIE`
//! - `DELAY`: decimal seconds, `NULL` when absent
//! - `PAYLOAD`: free text, `NULL` for `DIE`
//!
//! The record is split at the first two colons only, so colons inside the
//! payload survive.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Field separator inside the plaintext record
const FIELD_SEPARATOR: char = ':';

/// Placeholder for an absent field
const NULL_FIELD: &str = "NULL";

/// Terminates every frame on the wire
pub const FRAME_DELIMITER: u8 = b'\n';

/// Largest frame a client may send; writes up to this size are atomic on a pipe
pub const MAX_FRAME_LEN: usize = 4096;

/// Errors produced while decoding a frame
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame is not valid base64
    #[error("frame is not valid base64: {0}")]
    Transport(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8 text
    #[error("frame does not decode to text: {0}")]
    NotText(#[from] std::string::FromUtf8Error),

    /// Record does not have three fields
    #[error("malformed record: expected 3 fields, got {fields}")]
    Malformed { fields: usize },

    /// Command field is not recognised
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Unterminated data outgrew the frame limit and was discarded
    #[error("discarded {len} bytes of unterminated data")]
    Oversized { len: usize },
}

/// Commands a client can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the payload in place of the status line
    DisplayMessage,
    /// Shut the server down
    Terminate,
}

impl Command {
    /// Wire spelling
    pub fn as_wire(self) -> &'static str {
        match self {
            Command::DisplayMessage => "MSG",
            Command::Terminate => "DIE",
        }
    }

    /// Parse the wire spelling
    pub fn from_wire(field: &str) -> Option<Self> {
        match field {
            "MSG" => Some(Command::DisplayMessage),
            "DIE" => Some(Command::Terminate),
            _ => None,
        }
    }
}

/// One message on the channel
///
/// Built only through [`Message::display`] and [`Message::terminate`], so a
/// terminate message always has no delay and an empty payload and every
/// message survives an encode/decode round trip. The delay is `None` when
/// the sender gave no usable value; the server then keeps its current
/// override duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    command: Command,
    delay_seconds: Option<u64>,
    payload: String,
}

impl Message {
    /// Override message
    pub fn display(payload: impl Into<String>, delay_seconds: Option<u64>) -> Self {
        Self {
            command: Command::DisplayMessage,
            delay_seconds,
            payload: payload.into(),
        }
    }

    /// Shutdown message
    pub fn terminate() -> Self {
        Self {
            command: Command::Terminate,
            delay_seconds: None,
            payload: String::new(),
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Requested override duration
    pub fn delay_seconds(&self) -> Option<u64> {
        self.delay_seconds
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Encode a message to its base64 text form (without terminator)
pub fn encode(message: &Message) -> String {
    let record = match message.command {
        Command::DisplayMessage => {
            let delay = message
                .delay_seconds
                .map_or_else(|| NULL_FIELD.to_string(), |d| d.to_string());
            format!(
                "{}{sep}{}{sep}{}",
                Command::DisplayMessage.as_wire(),
                delay,
                message.payload,
                sep = FIELD_SEPARATOR
            )
        }
        Command::Terminate => format!(
            "{}{sep}{null}{sep}{null}",
            Command::Terminate.as_wire(),
            sep = FIELD_SEPARATOR,
            null = NULL_FIELD
        ),
    };
    STANDARD.encode(record)
}

/// Encode a message as a complete wire frame
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let mut frame = encode(message).into_bytes();
    frame.push(FRAME_DELIMITER);
    frame
}

/// Decode one frame (surrounding whitespace and terminator are ignored)
pub fn decode(frame: &[u8]) -> Result<Message, DecodeError> {
    let text = frame.trim_ascii();
    let record = String::from_utf8(STANDARD.decode(text)?)?;

    let fields: Vec<&str> = record.splitn(3, FIELD_SEPARATOR).collect();
    let &[command, delay, payload] = fields.as_slice() else {
        return Err(DecodeError::Malformed {
            fields: fields.len(),
        });
    };

    match Command::from_wire(command) {
        Some(Command::DisplayMessage) => Ok(Message::display(payload, delay.parse().ok())),
        Some(Command::Terminate) => Ok(Message::terminate()),
        None => Err(DecodeError::UnknownCommand(command.to_string())),
    }
}

/// Reassembles frames from the byte stream read off the channel
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes
    ///
    /// Unterminated data beyond [`MAX_FRAME_LEN`] can never become a valid
    /// frame; it is dropped and reported as [`DecodeError::Oversized`].
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.pending.extend_from_slice(bytes);

        let complete = self
            .pending
            .iter()
            .rposition(|&b| b == FRAME_DELIMITER)
            .map_or(0, |pos| pos + 1);
        let tail = self.pending.len() - complete;
        if tail > MAX_FRAME_LEN {
            self.pending.truncate(complete);
            return Err(DecodeError::Oversized { len: tail });
        }
        Ok(())
    }

    /// Whether a complete frame is buffered
    pub fn has_frame(&self) -> bool {
        self.pending.contains(&FRAME_DELIMITER)
    }

    /// Pop the next complete, non-empty frame
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.pending.iter().position(|&b| b == FRAME_DELIMITER) {
            let mut frame: Vec<u8> = self.pending.drain(..=pos).collect();
            frame.pop();
            if !frame.trim_ascii().is_empty() {
                return Some(frame);
            }
        }
        None
    }

    /// Bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
