// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Opcode framing and message payloads for MTP control frames.
//!
//! Byte 14 of a control frame (just past the Ethernet II header) is the
//! opcode; byte 15 onward is the opcode-specific payload. VID sets are
//! encoded as an explicit count byte followed by that many null-terminated
//! VID strings -- the source this protocol was distilled from used in-band
//! sentinels instead, which this crate rejects in favor of a length prefix
//! that can detect under/overcount.

use crate::vid::{VID_LEN, Vid};

/// Upper bound on the number of VIDs carried in a single message. Messages
/// declaring more are dropped rather than truncated.
pub const MAX_VIDS_PER_MSG: usize = 32;

/// MTP control opcodes, carried at byte 14 of every control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Hello, No Response expected -- broadcast by a leaf or relaying spine.
    HelloNr = 1,
    /// Join Request, sent upward in response to a HelloNr.
    JoinReq = 2,
    /// Join Response, sent downward carrying the extended VID set.
    JoinRes = 3,
    /// Join Ack, sent upward to confirm acceptance.
    JoinAck = 4,
    /// Start Hello, sent downward once JoinAck is processed; begins liveness.
    StartHello = 5,
    /// Tenant data frame, carrying an encapsulated IPv4 frame.
    Data = 6,
    /// Periodic keep-alive on an established control port.
    KeepAlive = 7,
    /// Failure-Update flood: a VID set has become unreachable or reachable-elsewhere.
    FailureUpdate = 8,
    /// Recover-Update flood: a previously failed VID set is reachable again.
    RecoverUpdate = 9,
}

impl Opcode {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::HelloNr,
            2 => Self::JoinReq,
            3 => Self::JoinRes,
            4 => Self::JoinAck,
            5 => Self::StartHello,
            6 => Self::Data,
            7 => Self::KeepAlive,
            8 => Self::FailureUpdate,
            9 => Self::RecoverUpdate,
            _ => return None,
        })
    }
}

/// The `option` byte carried by FAILURE_UPDATE / RECOVER_UPDATE messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FailureOption {
    /// The carried VIDs are no longer reachable via the sender.
    Unreachable = 1,
    /// The carried VIDs are (still, or again) reachable via the sender.
    Reachable = 2,
}

impl FailureOption {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Unreachable,
            2 => Self::Reachable,
            _ => return None,
        })
    }
}

/// Opcode-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// HELLONR / JOIN_REQ / JOIN_RES / JOIN_ACK: sender's tier followed by
    /// the VID set being advertised or extended.
    Handshake {
        /// Sender's fabric tier (1 == leaf).
        tier: u8,
        /// The VID set carried by the handshake step.
        vids: Vec<Vid>,
    },
    /// KEEP_ALIVE and START_HELLO carry no payload: START_HELLO merely signals
    /// that the sender is ready to begin the liveness exchange on this port.
    KeepAlive,
    /// FAILURE_UPDATE / RECOVER_UPDATE: an option plus the affected VID set.
    Update {
        /// Whether the VIDs became unreachable or reachable.
        option: FailureOption,
        /// The affected VIDs.
        vids: Vec<Vid>,
    },
    /// DATA: an encapsulated tenant IPv4 frame, tagged with its path VIDs.
    Data {
        /// VID of the originating leaf.
        src_vid: u16,
        /// VID of the destination leaf.
        dst_vid: u16,
        /// The raw IPv4 frame, starting at its IPv4 header.
        frame: Vec<u8>,
    },
}

/// A fully decoded MTP control message: opcode plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtpMessage {
    /// The opcode this message carries.
    pub opcode: Opcode,
    /// The opcode-specific payload.
    pub payload: Payload,
}

/// Errors encountered while decoding a wire message. All are silent-drop
/// conditions at the caller.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Frame shorter than its declared content required.
    #[error("frame too short: have {have}, need at least {need}")]
    TooShort {
        /// Bytes actually available.
        have: usize,
        /// Bytes required to decode the declared content.
        need: usize,
    },
    /// Byte 14 did not match a known [`Opcode`].
    #[error("unknown opcode byte {0}")]
    UnknownOpcode(u8),
    /// Byte 15 of a FAILURE_UPDATE/RECOVER_UPDATE did not match a known [`FailureOption`].
    #[error("unknown failure-update option byte {0}")]
    UnknownOption(u8),
    /// Declared VID count was zero or exceeded [`MAX_VIDS_PER_MSG`].
    #[error("vid count {0} out of range")]
    VidCountOutOfRange(usize),
    /// Fewer or more VID strings were present than the declared count.
    #[error("vid count byte said {declared} but {actual} were present")]
    VidCountMismatch {
        /// The count byte on the wire.
        declared: usize,
        /// The number of VID strings actually decoded before the payload ended.
        actual: usize,
    },
    /// A VID string failed to parse.
    #[error(transparent)]
    InvalidVid(#[from] crate::vid::VidParseError),
}

fn encode_vid_set(vids: &[Vid], out: &mut Vec<u8>) {
    out.push(vids.len() as u8);
    for vid in vids {
        let s = vid.to_string();
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
}

fn decode_vid_set(buf: &[u8]) -> Result<(Vec<Vid>, usize), WireError> {
    let declared = *buf.first().ok_or(WireError::TooShort {
        have: buf.len(),
        need: 1,
    })? as usize;
    if declared == 0 || declared > MAX_VIDS_PER_MSG {
        return Err(WireError::VidCountOutOfRange(declared));
    }
    let mut offset = 1;
    let mut vids = Vec::with_capacity(declared);
    while vids.len() < declared {
        let start = offset;
        let nul = buf[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::VidCountMismatch {
                declared,
                actual: vids.len(),
            })?;
        let end = offset + nul;
        if end - start == 0 || end - start > VID_LEN {
            return Err(WireError::VidCountMismatch {
                declared,
                actual: vids.len(),
            });
        }
        let s = std::str::from_utf8(&buf[start..end]).map_err(|_| WireError::VidCountMismatch {
            declared,
            actual: vids.len(),
        })?;
        vids.push(Vid::try_from(s)?);
        offset = end + 1;
    }
    Ok((vids, offset))
}

impl MtpMessage {
    /// Encode this message as `[opcode byte][payload bytes...]`, ready to be
    /// appended after an [`crate::eth::Eth`] header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.opcode as u8];
        match &self.payload {
            Payload::Handshake { tier, vids } => {
                out.push(*tier);
                encode_vid_set(vids, &mut out);
            }
            Payload::KeepAlive => {}
            Payload::Update { option, vids } => {
                out.push(*option as u8);
                encode_vid_set(vids, &mut out);
            }
            Payload::Data {
                src_vid,
                dst_vid,
                frame,
            } => {
                out.extend_from_slice(&src_vid.to_be_bytes());
                out.extend_from_slice(&dst_vid.to_be_bytes());
                out.extend_from_slice(frame);
            }
        }
        out
    }

    /// Decode a message from `buf`, which must start at the opcode byte
    /// (i.e. immediately after the Ethernet II header).
    pub fn decode(buf: &[u8]) -> Result<MtpMessage, WireError> {
        let &opcode_byte = buf.first().ok_or(WireError::TooShort { have: 0, need: 1 })?;
        let opcode = Opcode::from_u8(opcode_byte).ok_or(WireError::UnknownOpcode(opcode_byte))?;
        let rest = &buf[1..];
        let payload = match opcode {
            Opcode::HelloNr | Opcode::JoinReq | Opcode::JoinRes | Opcode::JoinAck => {
                let &tier = rest.first().ok_or(WireError::TooShort {
                    have: rest.len(),
                    need: 1,
                })?;
                let (vids, _) = decode_vid_set(&rest[1..])?;
                Payload::Handshake { tier, vids }
            }
            Opcode::KeepAlive | Opcode::StartHello => Payload::KeepAlive,
            Opcode::FailureUpdate | Opcode::RecoverUpdate => {
                let &option_byte = rest.first().ok_or(WireError::TooShort {
                    have: rest.len(),
                    need: 1,
                })?;
                let option =
                    FailureOption::from_u8(option_byte).ok_or(WireError::UnknownOption(option_byte))?;
                let (vids, _) = decode_vid_set(&rest[1..])?;
                Payload::Update { option, vids }
            }
            Opcode::Data => {
                if rest.len() < 4 {
                    return Err(WireError::TooShort {
                        have: rest.len(),
                        need: 4,
                    });
                }
                let src_vid = u16::from_be_bytes([rest[0], rest[1]]);
                let dst_vid = u16::from_be_bytes([rest[2], rest[3]]);
                let frame = rest[4..].to_vec();
                Payload::Data {
                    src_vid,
                    dst_vid,
                    frame,
                }
            }
        };
        Ok(MtpMessage { opcode, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(s: &str) -> Vid {
        Vid::try_from(s).unwrap()
    }

    #[test]
    fn handshake_round_trips() {
        let msg = MtpMessage {
            opcode: Opcode::JoinRes,
            payload: Payload::Handshake {
                tier: 2,
                vids: vec![vid("7.3")],
            },
        };
        let bytes = msg.encode();
        let decoded = MtpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn update_round_trips_with_multiple_vids() {
        let msg = MtpMessage {
            opcode: Opcode::FailureUpdate,
            payload: Payload::Update {
                option: FailureOption::Unreachable,
                vids: vec![vid("7"), vid("9.1")],
            },
        };
        let bytes = msg.encode();
        let decoded = MtpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn data_round_trips_with_embedded_frame() {
        let msg = MtpMessage {
            opcode: Opcode::Data,
            payload: Payload::Data {
                src_vid: 7,
                dst_vid: 9,
                frame: vec![0x45, 0x00, 0x00, 0x14],
            },
        };
        let bytes = msg.encode();
        let decoded = MtpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn start_hello_carries_no_payload() {
        let msg = MtpMessage {
            opcode: Opcode::StartHello,
            payload: Payload::KeepAlive,
        };
        let bytes = msg.encode();
        assert_eq!(bytes.len(), 1);
        let decoded = MtpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(matches!(
            MtpMessage::decode(&[0xff]),
            Err(WireError::UnknownOpcode(0xff))
        ));
    }

    #[test]
    fn vid_count_mismatch_is_rejected() {
        // declares 2 vids but only provides one null-terminated string
        let mut buf = vec![Opcode::HelloNr as u8, 1, 2];
        buf.extend_from_slice(b"7\0");
        assert!(matches!(
            MtpMessage::decode(&buf),
            Err(WireError::VidCountMismatch { .. })
        ));
    }

    #[test]
    fn zero_vid_count_is_rejected() {
        let buf = vec![Opcode::HelloNr as u8, 1, 0];
        assert!(matches!(
            MtpMessage::decode(&buf),
            Err(WireError::VidCountOutOfRange(0))
        ));
    }
}
