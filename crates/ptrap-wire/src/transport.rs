//! Chunked async socket transport.
//!
//! All transfers are split into pieces of at most [`NET_MAX_LENGTH`]
//! bytes. The helpers are generic over tokio's async I/O traits so the
//! server and its tests can run over TCP or an in-memory duplex pipe.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::command::{Command, PacketHeader, PACKET_HEADER_SIZE};
use crate::error::WireError;
use crate::status::Status;
use crate::{NET_MAX_LENGTH, SCAN_END_MARKER};

/// Write `data` in chunks of at most [`NET_MAX_LENGTH`] bytes.
pub async fn send_all<W>(writer: &mut W, data: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    for chunk in data.chunks(NET_MAX_LENGTH) {
        writer.write_all(chunk).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Read exactly `len` bytes in chunks of at most [`NET_MAX_LENGTH`].
pub async fn recv_exact<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    for chunk in buf.chunks_mut(NET_MAX_LENGTH) {
        reader.read_exact(chunk).await?;
    }
    Ok(buf)
}

pub async fn send_status<W>(writer: &mut W, status: Status) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    send_all(writer, &status.to_le_bytes()).await
}

/// Send `status` followed by `payload` in one flush.
pub async fn send_status_with<W>(
    writer: &mut W,
    status: Status,
    payload: &[u8],
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&status.to_le_bytes());
    out.extend_from_slice(payload);
    send_all(writer, &out).await
}

/// Read the next packet header.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly
/// between packets.
pub async fn read_header<R>(reader: &mut R) -> Result<Option<PacketHeader>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; PACKET_HEADER_SIZE];
    let mut filled = 0;
    while filled < PACKET_HEADER_SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WireError::Truncated {
                what: "packet header",
                expected: PACKET_HEADER_SIZE,
                actual: filled,
            });
        }
        filled += n;
    }
    let header = PacketHeader::decode(&buf)?;
    trace!(cmd = format_args!("{:#010x}", header.cmd), len = header.data_len, "packet header");
    Ok(Some(header))
}

/// Stream scan matches as 8-byte addresses, then the end marker.
pub async fn send_scan_results<W>(writer: &mut W, addresses: &[u64]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    const PER_CHUNK: usize = NET_MAX_LENGTH / 8;
    trace!(count = addresses.len(), "streaming scan results");
    let mut buf = Vec::with_capacity(NET_MAX_LENGTH);
    for batch in addresses.chunks(PER_CHUNK) {
        buf.clear();
        for addr in batch {
            buf.extend_from_slice(&addr.to_le_bytes());
        }
        writer.write_all(&buf).await?;
    }
    writer.write_all(&SCAN_END_MARKER.to_le_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Send a request packet. Used by controllers and tests.
pub async fn send_packet<W>(writer: &mut W, cmd: Command, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let header = PacketHeader::new(cmd, payload.len() as u32);
    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    send_all(writer, &out).await
}

/// Read a raw 32-bit status word. Used by controllers and tests.
pub async fn read_status<R>(reader: &mut R) -> Result<u32, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_le_bytes(buf))
}

/// Read scan results up to and including the end marker.
pub async fn read_scan_results<R>(reader: &mut R) -> Result<Vec<u64>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 8];
    loop {
        reader.read_exact(&mut buf).await?;
        let addr = u64::from_le_bytes(buf);
        if addr == SCAN_END_MARKER {
            return Ok(out);
        }
        out.push(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn large_transfers_survive_chunking() {
        let (mut a, mut b) = duplex(1024);
        let data: Vec<u8> = (0..3 * NET_MAX_LENGTH + 17).map(|i| i as u8).collect();
        let expected = data.clone();
        let writer = tokio::spawn(async move {
            send_all(&mut a, &data).await.unwrap();
        });
        let got = recv_exact(&mut b, expected.len()).await.unwrap();
        writer.await.unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn header_roundtrip_over_pipe() {
        let (mut a, mut b) = duplex(64);
        send_packet(&mut a, Command::Attach, &100u32.to_le_bytes())
            .await
            .unwrap();
        let hdr = read_header(&mut b).await.unwrap().unwrap();
        assert_eq!(hdr.command().unwrap(), Command::Attach);
        assert_eq!(hdr.data_len, 4);
        assert_eq!(recv_exact(&mut b, 4).await.unwrap(), [100, 0, 0, 0]);
    }

    #[tokio::test]
    async fn clean_close_yields_none() {
        let (a, mut b) = duplex(64);
        drop(a);
        assert!(read_header(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_header_is_an_error() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&[0xCC, 0xBB]).await.unwrap();
        drop(a);
        let err = read_header(&mut b).await.unwrap_err();
        assert!(matches!(err, WireError::Truncated { actual: 2, .. }));
    }

    #[tokio::test]
    async fn scan_results_end_with_single_marker() {
        let (mut a, mut b) = duplex(4096);
        let addrs: Vec<u64> = (0..2500).map(|i| 0x1000 + i * 4).collect();
        let expected = addrs.clone();
        let writer = tokio::spawn(async move {
            send_scan_results(&mut a, &addrs).await.unwrap();
            drop(a);
        });
        let got = read_scan_results(&mut b).await.unwrap();
        writer.await.unwrap();
        assert_eq!(got, expected);
        // nothing after the marker
        let mut rest = Vec::new();
        b.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn status_with_payload_is_contiguous() {
        let (mut a, mut b) = duplex(64);
        send_status_with(&mut a, Status::Success, &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(read_status(&mut b).await.unwrap(), Status::Success.code());
        assert_eq!(recv_exact(&mut b, 3).await.unwrap(), [1, 2, 3]);
    }
}
