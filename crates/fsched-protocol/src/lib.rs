//! Message kinds and length-prefixed framing exchanged between the
//! coordinator and its workers. One `Message` per logical step: assigning a
//! file, reporting local queue feedback, requesting an archive, or
//! announcing termination.
//!
//! Wire format: a 4-byte little-endian length prefix followed by a
//! `bincode`-encoded `Message`, matching the framing convention used
//! elsewhere in this workspace's Unix-domain-socket daemons.

use fsched_queue::HasPriority;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Maximum byte length of a file path carried in an `Assign` message. Kept
/// as a validated ceiling (not a padded fixed-size wire array) now that
/// frames are length-prefixed rather than fixed-size MPI buffers.
pub const PATH_MAX_WIRE: usize = 80;

/// Maximum payload size accepted by a single frame, guarding against a
/// corrupt or hostile length prefix causing an unbounded allocation.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// One file assignment: path, byte size, and scheduling priority,
    /// delivered as a single unit (see the assignment-collapse design note).
    Assign {
        path: String,
        size: u64,
        priority: i64,
    },
    /// Sent by the coordinator to every worker once dispatch is complete,
    /// and by a worker back to the coordinator once it has drained its
    /// local queue. The payload is always 1 on the wire.
    Stop(u32),
    /// A worker's request that the coordinator archive the named file.
    Archive(String),
    /// A worker's locally-observed queue size or length, reported after an
    /// assignment under the feedback-driven policies.
    QueueData(i64),
}

impl Message {
    pub fn assign(path: impl Into<String>, size: u64, priority: i64) -> Result<Self, ProtocolError> {
        let path = path.into();
        if path.len() > PATH_MAX_WIRE {
            return Err(ProtocolError::PathTooLong { len: path.len() });
        }
        Ok(Message::Assign { path, size, priority })
    }
}

/// One assignable unit of work: a file's path, its size in bytes (used by
/// the `QueueSize` policy's feedback accounting), and its dispatch
/// priority. Held in both the coordinator's global queue and a worker's
/// local queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: String,
    pub size: u64,
    pub priority: i64,
}

impl HasPriority for FileDescriptor {
    fn priority(&self) -> i64 {
        self.priority
    }
    fn size_hint(&self) -> u64 {
        self.size
    }
}

impl From<FileDescriptor> for Message {
    fn from(fd: FileDescriptor) -> Self {
        Message::Assign {
            path: fd.path,
            size: fd.size,
            priority: fd.priority,
        }
    }
}

impl TryFrom<Message> for FileDescriptor {
    type Error = ProtocolError;

    fn try_from(msg: Message) -> Result<Self, Self::Error> {
        match msg {
            Message::Assign { path, size, priority } => Ok(FileDescriptor { path, size, priority }),
            other => Err(ProtocolError::UnexpectedMessage(other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode/decode message: {0}")]
    Encode(#[from] bincode::Error),
    #[error("path exceeds {} bytes: {len}", PATH_MAX_WIRE)]
    PathTooLong { len: usize },
    #[error("frame of {len} bytes exceeds the {} byte limit", MAX_FRAME_LEN)]
    FrameTooLarge { len: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("expected an Assign message, got {0:?}")]
    UnexpectedMessage(Message),
}

/// Blocking frame I/O, used by the worker over its `std::net`/`UnixStream`
/// connection.
pub mod frame_sync {
    use super::*;

    pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<(), ProtocolError> {
        let payload = bincode::serialize(message)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge { len: payload.len() });
        }
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed)
            }
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge { len });
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        Ok(bincode::deserialize(&payload)?)
    }
}

/// Async frame I/O, used by the coordinator's tokio tasks.
#[cfg(feature = "tokio")]
pub mod frame_async {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    pub async fn write_message<W: AsyncWriteExt + Unpin>(
        writer: &mut W,
        message: &Message,
    ) -> Result<(), ProtocolError> {
        let payload = bincode::serialize(message)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge { len: payload.len() });
        }
        writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;
        Ok(())
    }

    pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed)
            }
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge { len });
        }
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;
        Ok(bincode::deserialize(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_rejects_overlong_path() {
        let long = "a".repeat(PATH_MAX_WIRE + 1);
        let err = Message::assign(long, 1, 1).unwrap_err();
        assert!(matches!(err, ProtocolError::PathTooLong { .. }));
    }

    #[test]
    fn assign_accepts_path_at_the_limit() {
        let exact = "a".repeat(PATH_MAX_WIRE);
        assert!(Message::assign(exact, 1, 1).is_ok());
    }

    #[test]
    fn sync_round_trip_every_variant() {
        let messages = vec![
            Message::assign("file_10.sen", 1024, -10).unwrap(),
            Message::Stop(1),
            Message::Archive("archive/file_10.sen".to_string()),
            Message::QueueData(7),
        ];

        for msg in messages {
            let mut buf = Vec::new();
            frame_sync::write_message(&mut buf, &msg).unwrap();
            let mut cursor = std::io::Cursor::new(buf);
            let decoded = frame_sync::read_message(&mut cursor).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn file_descriptor_round_trips_through_message() {
        let fd = FileDescriptor {
            path: "f_10.sen".to_string(),
            size: 128,
            priority: -10,
        };
        let msg: Message = fd.clone().into();
        let back = FileDescriptor::try_from(msg).unwrap();
        assert_eq!(fd, back);
    }

    #[test]
    fn file_descriptor_conversion_rejects_non_assign_messages() {
        let err = FileDescriptor::try_from(Message::Stop(1)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedMessage(Message::Stop(1))));
    }

    #[test]
    fn sync_read_on_closed_stream_reports_connection_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = frame_sync::read_message(&mut cursor).unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn async_round_trip_every_variant() {
        let messages = vec![
            Message::assign("file_10.sen", 1024, -10).unwrap(),
            Message::Stop(1),
            Message::Archive("archive/file_10.sen".to_string()),
            Message::QueueData(7),
        ];

        for msg in messages {
            let (mut client, mut server) = tokio::io::duplex(4096);
            frame_async::write_message(&mut client, &msg).await.unwrap();
            let decoded = frame_async::read_message(&mut server).await.unwrap();
            assert_eq!(decoded, msg);
        }
    }
}
