/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
// Packet id allocation and the single-shot ack slots the read loop completes.

use indexmap::IndexMap;
use tokio::sync::oneshot;

use crate::error::ClientError;

/// Reserved for CONNECT; never allocated to an application packet.
pub const CONNECT_PACKET_ID: u16 = 0;

#[derive(Debug, Clone)]
pub enum AckOutcome {
    Success { granted: Vec<u8> },
    Reason(crate::error::ReasonCode),
}

pub type AckSender = oneshot::Sender<Result<AckOutcome, ClientError>>;
pub type AckReceiver = oneshot::Receiver<Result<AckOutcome, ClientError>>;

/// Tracks in-flight packet ids and their completion slots. Owned exclusively
/// by the client task; other tasks interact through the oneshot channels
/// handed back by `reserve`, never by touching this table directly.
#[derive(Default)]
pub struct PendingAckTable {
    slots: IndexMap<u16, AckSender>,
}

impl PendingAckTable {
    pub fn new() -> Self {
        PendingAckTable {
            slots: IndexMap::new(),
        }
    }

    /// Next free id: `max(in-flight) + 1`, starting at 1, skipping the
    /// reserved CONNECT id. `None` if the 16-bit id space is exhausted.
    fn next_id(&self) -> Option<u16> {
        let candidate = self
            .slots
            .keys()
            .copied()
            .max()
            .map(|max| max.wrapping_add(1))
            .unwrap_or(1);
        if candidate == CONNECT_PACKET_ID {
            return None; // wrapped past 65535
        }
        if self.slots.contains_key(&candidate) {
            // max+1 collided only if ids were freed out of order; fall back
            // to a linear scan of the remaining space.
            (1..=u16::MAX).find(|id| !self.slots.contains_key(id))
        } else {
            Some(candidate)
        }
    }

    /// Reserve the next packet id and register its completion slot.
    pub fn reserve(&mut self) -> Result<(u16, AckReceiver), ClientError> {
        let id = self.next_id().ok_or(ClientError::PacketIdExhausted)?;
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        Ok((id, rx))
    }

    /// Reserve the fixed CONNECT slot (key 0), used exactly once per connect.
    pub fn reserve_connect(&mut self) -> AckReceiver {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(CONNECT_PACKET_ID, tx);
        rx
    }

    pub fn complete(&mut self, id: u16, outcome: Result<AckOutcome, ClientError>) {
        if let Some(tx) = self.slots.shift_remove(&id) {
            let _ = tx.send(outcome);
        }
    }

    /// Fail every pending slot, draining the table. Used on transport
    /// failure, server DISCONNECT, and keep-alive violation.
    pub fn fail_all(&mut self, err: ClientError) {
        for (_, tx) in self.slots.drain(..) {
            let cloned = clone_client_error(&err);
            let _ = tx.send(Err(cloned));
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// `ClientError` doesn't derive `Clone` (it wraps `std::io::Error`), so
/// fan-out to every pending slot re-describes the terminal condition instead.
fn clone_client_error(err: &ClientError) -> ClientError {
    match err {
        ClientError::KeepAliveViolated => ClientError::KeepAliveViolated,
        ClientError::ServerDisconnect(code) => ClientError::ServerDisconnect(*code),
        ClientError::NotConnected => ClientError::NotConnected,
        ClientError::ProtocolDesync => ClientError::ProtocolDesync,
        _ => ClientError::NotConnected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_starting_at_one() {
        let mut table = PendingAckTable::new();
        let (id, _rx) = table.reserve().unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn allocates_monotonically() {
        let mut table = PendingAckTable::new();
        let (a, _) = table.reserve().unwrap();
        let (b, _) = table.reserve().unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn reuses_freed_ids() {
        let mut table = PendingAckTable::new();
        let (a, _ra) = table.reserve().unwrap();
        let (_b, _rb) = table.reserve().unwrap();
        table.complete(a, Ok(AckOutcome::Success { granted: vec![] }));
        assert_eq!(table.len(), 1);
        let (c, _) = table.reserve().unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn fail_all_drains_table() {
        let mut table = PendingAckTable::new();
        let (_id, mut rx) = table.reserve().unwrap();
        table.fail_all(ClientError::KeepAliveViolated);
        assert!(table.is_empty());
        let outcome = rx.try_recv().unwrap();
        assert!(matches!(outcome, Err(ClientError::KeepAliveViolated)));
    }
}
