//! Bulk transfer over the offerer's data channel.
//!
//! [`DataTransfer`] cuts `total` bytes into chunks and keeps one chunk in
//! flight at a time: the next `SendData` command is issued only after the
//! transport confirmed the previous one. Bytes are counted again as the
//! answerer reports them received, and the transfer is complete once the
//! received count equals `total`.

use bytes::Bytes;
use shared::error::{Error, Result};

use crate::transport::TransactionId;

pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
pub const BYTES_PER_MEGABYTE: usize = 1024 * 1024;

/// Converts a transfer size in megabytes into bytes, rounding to the nearest
/// whole megabyte. Sizes that round to zero or below are rejected.
pub fn bytes_to_send(megabytes: f64) -> Result<usize> {
    let megabytes = megabytes.round();
    if !megabytes.is_finite() || megabytes <= 0.0 {
        return Err(Error::ErrInvalidTransferSize);
    }
    (megabytes as usize)
        .checked_mul(BYTES_PER_MEGABYTE)
        .ok_or(Error::ErrInvalidTransferSize)
}

/// Counters of a transfer, as reported in progress events.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    pub total: usize,
    pub sent: usize,
    pub received: usize,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }
}

#[derive(Debug)]
pub struct DataTransfer {
    chunk_size: usize,
    progress: TransferProgress,
    queued: usize,
    in_flight: Option<(TransactionId, usize)>,
}

impl DataTransfer {
    pub fn new(total: usize) -> Result<Self> {
        Self::with_chunk_size(total, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(total: usize, chunk_size: usize) -> Result<Self> {
        if total == 0 || chunk_size == 0 {
            return Err(Error::ErrInvalidTransferSize);
        }
        Ok(DataTransfer {
            chunk_size,
            progress: TransferProgress {
                total,
                ..Default::default()
            },
            queued: 0,
            in_flight: None,
        })
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn owns(&self, transaction_id: TransactionId) -> bool {
        self.in_flight.is_some_and(|(id, _)| id == transaction_id)
    }

    /// Next chunk to hand to the transport, unless one is still in flight or
    /// everything has been queued already.
    pub(crate) fn next_chunk(&mut self) -> Option<Bytes> {
        if self.in_flight.is_some() || self.queued >= self.progress.total {
            return None;
        }
        let len = self.chunk_size.min(self.progress.total - self.queued);
        self.queued += len;
        Some(Bytes::from(vec![0u8; len]))
    }

    pub(crate) fn chunk_issued(&mut self, transaction_id: TransactionId, len: usize) {
        self.in_flight = Some((transaction_id, len));
    }

    /// Settles the chunk in flight. Returns its size when it was sent.
    pub(crate) fn chunk_done(&mut self, result: Result<()>) -> Result<usize> {
        let (_, len) = self.in_flight.take().ok_or_else(|| {
            Error::Other("no data chunk in flight".to_owned())
        })?;
        result?;
        self.progress.sent += len;
        Ok(len)
    }

    /// Counts bytes the receiving side got. Returns `true` once everything
    /// sent has arrived.
    pub(crate) fn on_received(&mut self, len: usize) -> bool {
        self.progress.received = self.progress.received.saturating_add(len);
        self.progress.is_complete()
    }
}
