//! Multi-frame reassembly for security challenges and FRAM images.
//!
//! The buffer only ever holds bytes of one target. Starting a sequence of
//! the other target discards whatever was buffered.

use super::protocol::{thresholds::*, ResponseKind};
use crate::domain::sensor::Fram;
use crate::error::DecodeError;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyTarget {
    Challenge,
    Fram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeProgress {
    Partial(usize),
    /// The significant prefix of a complete 28-byte challenge
    Complete(Vec<u8>),
    /// Fragment did not fit the two-stage layout; buffer was dropped
    Desync { buffered: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramProgress {
    Partial(usize),
    Complete { fram: Fram, discarded: usize },
}

#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    buffer: Vec<u8>,
    target: Option<ReassemblyTarget>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(FRAM_LEN + 32),
            target: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn target(&self) -> Option<ReassemblyTarget> {
        if self.buffer.is_empty() {
            None
        } else {
            self.target
        }
    }

    /// True while a sequence for `target` has bytes buffered.
    pub fn is_collecting(&self, target: ReassemblyTarget) -> bool {
        self.target() == Some(target)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.target = None;
    }

    fn buffered_for(&self, target: ReassemblyTarget) -> usize {
        if self.is_collecting(target) {
            self.buffer.len()
        } else {
            0
        }
    }

    fn switch_to(&mut self, target: ReassemblyTarget) {
        if let Some(current) = self.target() {
            if current != target {
                warn!(
                    "Discarding {} buffered bytes of {:?} for a new {:?} sequence",
                    self.buffer.len(),
                    current,
                    target
                );
                self.buffer.clear();
            }
        }
        self.target = Some(target);
    }

    /// Append a security-challenge fragment.
    ///
    /// The first fragment carries its payload from offset 5, the second from
    /// offset 4 and only when exactly 15 bytes are buffered.
    pub fn push_challenge(&mut self, frame: &[u8]) -> Result<ChallengeProgress, DecodeError> {
        let offset = match self.buffered_for(ReassemblyTarget::Challenge) {
            0 => CHALLENGE_FIRST_OFFSET,
            CHALLENGE_FIRST_LEN => CHALLENGE_SECOND_OFFSET,
            buffered => {
                warn!(
                    "Security challenge desync: {} bytes buffered, dropping",
                    buffered
                );
                self.reset();
                return Ok(ChallengeProgress::Desync { buffered });
            }
        };

        if frame.len() < offset {
            return Err(DecodeError::TooShort {
                kind: ResponseKind::SecurityChallenge,
                needed: offset,
                actual: frame.len(),
            });
        }

        self.switch_to(ReassemblyTarget::Challenge);
        self.buffer.extend_from_slice(&frame[offset..]);
        debug!("Bubble: partial buffer size: {}", self.buffer.len());

        let progress = match self.buffer.len() {
            CHALLENGE_LEN => {
                let challenge = self.buffer[..CHALLENGE_PREFIX].to_vec();
                self.reset();
                ChallengeProgress::Complete(challenge)
            }
            buffered if buffered > CHALLENGE_LEN => {
                warn!(
                    "Security challenge overran: {} bytes buffered, dropping",
                    buffered
                );
                self.reset();
                ChallengeProgress::Desync { buffered }
            }
            buffered => ChallengeProgress::Partial(buffered),
        };
        Ok(progress)
    }

    /// Append a data-packet fragment, completing once 344 bytes are buffered.
    /// Bytes past the image are dropped.
    pub fn push_data_packet(
        &mut self,
        kind: ResponseKind,
        frame: &[u8],
    ) -> Result<FramProgress, DecodeError> {
        if frame.len() < DATA_PACKET_OFFSET {
            return Err(DecodeError::TooShort {
                kind,
                needed: DATA_PACKET_OFFSET,
                actual: frame.len(),
            });
        }

        self.switch_to(ReassemblyTarget::Fram);
        self.buffer.extend_from_slice(&frame[DATA_PACKET_OFFSET..]);
        debug!("Bubble: partial buffer size: {}", self.buffer.len());

        if self.buffer.len() < FRAM_LEN {
            return Ok(FramProgress::Partial(self.buffer.len()));
        }

        let mut fram: Fram = Box::new([0u8; FRAM_LEN]);
        fram.copy_from_slice(&self.buffer[..FRAM_LEN]);
        let discarded = self.buffer.len() - FRAM_LEN;
        self.reset();
        Ok(FramProgress::Complete { fram, discarded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8, header: usize, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![tag];
        f.resize(header, 0);
        f.extend_from_slice(payload);
        f
    }

    #[test]
    fn test_challenge_two_stage() {
        let mut buf = ReassemblyBuffer::new();
        let first: Vec<u8> = (0..15).collect();
        let second: Vec<u8> = (15..28).collect();

        let p = buf.push_challenge(&frame(0x8A, 5, &first)).unwrap();
        assert_eq!(p, ChallengeProgress::Partial(15));
        assert!(buf.is_collecting(ReassemblyTarget::Challenge));

        let p = buf.push_challenge(&frame(0x8A, 4, &second)).unwrap();
        assert_eq!(p, ChallengeProgress::Complete((0..25).collect()));
        assert!(buf.is_empty());
        assert_eq!(buf.target(), None);
    }

    #[test]
    fn test_challenge_desync_when_first_stage_is_short() {
        let mut buf = ReassemblyBuffer::new();
        assert_eq!(
            buf.push_challenge(&frame(0x8A, 5, &[1; 10])).unwrap(),
            ChallengeProgress::Partial(10)
        );
        assert_eq!(
            buf.push_challenge(&frame(0x8A, 4, &[2; 13])).unwrap(),
            ChallengeProgress::Desync { buffered: 10 }
        );
        assert!(buf.is_empty());

        // The next fragment starts over as a first fragment.
        assert_eq!(
            buf.push_challenge(&frame(0x8A, 5, &[3; 15])).unwrap(),
            ChallengeProgress::Partial(15)
        );
    }

    #[test]
    fn test_challenge_overrun_is_desync() {
        let mut buf = ReassemblyBuffer::new();
        buf.push_challenge(&frame(0x8A, 5, &[0; 15])).unwrap();
        assert_eq!(
            buf.push_challenge(&frame(0x8A, 4, &[0; 20])).unwrap(),
            ChallengeProgress::Desync { buffered: 35 }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_challenge_frame_leaves_buffer_untouched() {
        let mut buf = ReassemblyBuffer::new();
        buf.push_challenge(&frame(0x8A, 5, &[0; 15])).unwrap();

        let err = buf.push_challenge(&[0x8A, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooShort {
                kind: ResponseKind::SecurityChallenge,
                needed: 4,
                actual: 3
            }
        );
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_fram_exact_threshold() {
        let mut buf = ReassemblyBuffer::new();
        let payload: Vec<u8> = (0..344u32).map(|i| i as u8).collect();

        for chunk in payload[..336].chunks(16) {
            let p = buf
                .push_data_packet(ResponseKind::DataPacket, &frame(0x82, 4, chunk))
                .unwrap();
            assert!(matches!(p, FramProgress::Partial(_)));
        }

        let p = buf
            .push_data_packet(ResponseKind::DataPacket, &frame(0x82, 4, &payload[336..]))
            .unwrap();
        match p {
            FramProgress::Complete { fram, discarded } => {
                assert_eq!(&fram[..], &payload[..]);
                assert_eq!(discarded, 0);
            }
            other => panic!("Expected complete FRAM, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fram_overshoot_keeps_first_344() {
        let mut buf = ReassemblyBuffer::new();
        let payload: Vec<u8> = (0..352u32).map(|i| (i % 251) as u8).collect();

        let mut last = None;
        for chunk in payload.chunks(16) {
            last = Some(
                buf.push_data_packet(ResponseKind::DecryptedDataPacket, &frame(0x88, 4, chunk))
                    .unwrap(),
            );
        }
        match last {
            Some(FramProgress::Complete { fram, discarded }) => {
                assert_eq!(&fram[..], &payload[..344]);
                assert_eq!(discarded, 8);
            }
            other => panic!("Expected complete FRAM, got {:?}", other),
        }
    }

    #[test]
    fn test_new_target_discards_other_sequence() {
        let mut buf = ReassemblyBuffer::new();
        buf.push_data_packet(ResponseKind::DataPacket, &frame(0x82, 4, &[9; 16]))
            .unwrap();
        assert!(buf.is_collecting(ReassemblyTarget::Fram));

        let p = buf.push_challenge(&frame(0x8A, 5, &[1; 15])).unwrap();
        assert_eq!(p, ChallengeProgress::Partial(15));
        assert_eq!(buf.len(), 15);
        assert!(buf.is_collecting(ReassemblyTarget::Challenge));
    }

    #[test]
    fn test_short_data_packet() {
        let mut buf = ReassemblyBuffer::new();
        let err = buf
            .push_data_packet(ResponseKind::DataPacket, &[0x82, 0x00])
            .unwrap_err();
        assert!(matches!(err, DecodeError::TooShort { needed: 4, actual: 2, .. }));
        assert!(buf.is_empty());
    }
}
