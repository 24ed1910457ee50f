//! Wire envelope framing and the `Cmd`/`Msg`/`QueryParams` command schema
//! exchanged over the logd datagram protocol.

mod envelope;
mod wire;

pub use envelope::{compute_sum, pack, CodecError, Envelope, HEADER_LEN, SUM_LEN, TIME_LEN};
pub use wire::{Cmd, CmdName, HttpMethod, Level, Msg, QueryParams};

/// Reserved key carried by every unsigned reply datagram (greetings, `+END`,
/// `kick`, and other informational replies).
pub const REPLY_KEY: &str = "//logd";

/// Sentinel text marking the end of a query's result stream.
pub const END_SENTINEL: &str = "+END";

/// Sentinel text sent as a subscriber's final datagram before removal.
pub const KICK_SENTINEL: &str = "kick";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode command payload: {0}")]
    Cmd(#[from] bincode::Error),
}

/// Encodes a `Cmd` to its wire payload.
pub fn encode_cmd(cmd: &Cmd) -> Vec<u8> {
    bincode::serialize(cmd).expect("Cmd serialization is infallible for in-memory buffers")
}

/// Decodes a `Cmd` from a wire payload.
pub fn decode_cmd(payload: &[u8]) -> Result<Cmd, DecodeError> {
    Ok(bincode::deserialize(payload)?)
}

/// Encodes a `Msg` to its reply-datagram payload.
pub fn encode_msg(msg: &Msg) -> Vec<u8> {
    bincode::serialize(msg).expect("Msg serialization is infallible for in-memory buffers")
}

/// Decodes a `Msg` from a datagram payload (either a store record or a
/// reply datagram).
pub fn decode_msg(payload: &[u8]) -> Result<Msg, DecodeError> {
    Ok(bincode::deserialize(payload)?)
}
