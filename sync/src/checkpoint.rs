//! Versioned on-disk encoding of a peer queue.
//!
//! A checkpoint is the whole pending-event list of one queue, written as a
//! single file: a fixed header followed by length-prefixed records. The
//! explicit format (rather than dumping the in-memory structure wholesale)
//! keeps checkpoints readable across releases; bumping [`FORMAT_VERSION`]
//! is the upgrade path.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic   4 bytes  b"PACT"
//! version u16
//! count   u32
//! record  count times: u32 length + that many bytes (bincode ChangeEvent)
//! ```

use crate::{ChangeEvent, SyncError};

const MAGIC: &[u8; 4] = b"PACT";

/// Current checkpoint format version.
pub const FORMAT_VERSION: u16 = 1;

/// Encode a queue's pending events into checkpoint bytes.
pub fn encode_queue(events: &[ChangeEvent]) -> Result<Vec<u8>, SyncError> {
    let mut out = Vec::with_capacity(16 + events.len() * 128);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&(events.len() as u32).to_be_bytes());
    for event in events {
        let record =
            bincode::serialize(event).map_err(|e| SyncError::Serialization(e.to_string()))?;
        out.extend_from_slice(&(record.len() as u32).to_be_bytes());
        out.extend_from_slice(&record);
    }
    Ok(out)
}

/// Decode checkpoint bytes back into the pending-event list.
///
/// Any structural problem (bad magic, unknown version, truncated record)
/// is an error — the caller decides whether to degrade to an empty queue.
pub fn decode_queue(bytes: &[u8]) -> Result<Vec<ChangeEvent>, SyncError> {
    let mut cursor = 0usize;

    let magic = take(bytes, &mut cursor, 4)?;
    if magic != MAGIC {
        return Err(SyncError::Corrupt("bad magic".into()));
    }

    let version = u16::from_be_bytes(take(bytes, &mut cursor, 2)?.try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(SyncError::UnsupportedVersion(version));
    }

    let count = u32::from_be_bytes(take(bytes, &mut cursor, 4)?.try_into().unwrap()) as usize;

    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        let len = u32::from_be_bytes(take(bytes, &mut cursor, 4)?.try_into().unwrap()) as usize;
        let record = take(bytes, &mut cursor, len)?;
        let event = bincode::deserialize::<ChangeEvent>(record)
            .map_err(|e| SyncError::Corrupt(format!("undecodable record: {e}")))?;
        events.push(event);
    }

    if cursor != bytes.len() {
        return Err(SyncError::Corrupt(format!(
            "{} trailing bytes after {} records",
            bytes.len() - cursor,
            count
        )));
    }

    Ok(events)
}

/// Slice `len` bytes at `cursor`, advancing it; errors on a short buffer.
fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], SyncError> {
    let end = cursor
        .checked_add(len)
        .ok_or_else(|| SyncError::Corrupt("length overflow".into()))?;
    if end > bytes.len() {
        return Err(SyncError::Corrupt(format!(
            "truncated: wanted {} bytes at offset {}, have {}",
            len,
            cursor,
            bytes.len() - *cursor
        )));
    }
    let slice = &bytes[*cursor..end];
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pact_types::{NodeId, SyncAction, SyncDataType};

    fn event(n: u8) -> ChangeEvent {
        ChangeEvent {
            data_type: SyncDataType::VoteInvite,
            action: SyncAction::Create,
            source_id: format!("vote-{n}/voter-{n}"),
            payload: vec![n; 16],
            destination: NodeId::new("peer-b").unwrap(),
        }
    }

    #[test]
    fn empty_queue_round_trips() {
        let bytes = encode_queue(&[]).unwrap();
        let decoded = decode_queue(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn events_round_trip_in_order() {
        let events = vec![event(1), event(2), event(3)];
        let bytes = encode_queue(&events).unwrap();
        let decoded = decode_queue(&bytes).unwrap();
        assert_eq!(decoded, events);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = encode_queue(&[event(1)]).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_queue(&bytes),
            Err(SyncError::Corrupt(_))
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut bytes = encode_queue(&[event(1)]).unwrap();
        bytes[4] = 0xFF;
        assert!(matches!(
            decode_queue(&bytes),
            Err(SyncError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn truncated_record_rejected() {
        let bytes = encode_queue(&[event(1), event(2)]).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(decode_queue(cut), Err(SyncError::Corrupt(_))));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut bytes = encode_queue(&[event(1)]).unwrap();
        bytes.extend_from_slice(b"junk");
        assert!(matches!(
            decode_queue(&bytes),
            Err(SyncError::Corrupt(_))
        ));
    }
}
