//! Compressed-stream detection by content sniffing.

use {
    async_compression::futures::bufread::{GzipDecoder, XzDecoder},
    futures::io::{AsyncRead, AsyncReadExt, BufReader, Cursor},
    std::{io, pin::Pin},
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

fn buffered<R: AsyncRead + Send>(reader: R) -> BufReader<R> {
    const BUFSIZE: usize = 64 * 1024;
    BufReader::with_capacity(BUFSIZE, reader)
}

/// Wraps `reader` in a decoder chosen by sniffing the first bytes of the
/// stream: gzip, xz, or transparent passthrough. The peeked bytes are
/// rechained, so the returned reader yields the stream from the start.
pub async fn decompress<'a, R: AsyncRead + Send + Unpin + 'a>(
    mut reader: R,
) -> io::Result<Pin<Box<dyn AsyncRead + Send + 'a>>> {
    let mut head = [0u8; 8];
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let head = head[..filled].to_vec();
    let is_gzip = head.starts_with(&GZIP_MAGIC);
    let is_xz = head.starts_with(&XZ_MAGIC);
    let rejoined = Cursor::new(head).chain(reader);
    Ok(if is_gzip {
        Box::pin(GzipDecoder::new(buffered(rejoined)))
    } else if is_xz {
        Box::pin(XzDecoder::new(buffered(rejoined)))
    } else {
        Box::pin(rejoined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // gzip.compress(b"Package: hello\n", mtime=0)
    const HELLO_GZ: &[u8] = &[
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0x0b, 0x48, 0x4c, 0xce, 0x4e,
        0x4c, 0x4f, 0xb5, 0x52, 0xc8, 0x48, 0xcd, 0xc9, 0xc9, 0xe7, 0x02, 0x00, 0xac, 0x82, 0xbc,
        0x4a, 0x0f, 0x00, 0x00, 0x00,
    ];

    // lzma.compress(b"Package: hello\n", format=lzma.FORMAT_XZ)
    const HELLO_XZ: &[u8] = &[
        0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00, 0x00, 0x04, 0xe6, 0xd6, 0xb4, 0x46, 0x02, 0x00, 0x21,
        0x01, 0x16, 0x00, 0x00, 0x00, 0x74, 0x2f, 0xe5, 0xa3, 0x01, 0x00, 0x0e, 0x50, 0x61, 0x63,
        0x6b, 0x61, 0x67, 0x65, 0x3a, 0x20, 0x68, 0x65, 0x6c, 0x6c, 0x6f, 0x0a, 0x00, 0x00, 0xf8,
        0xc3, 0x78, 0x0b, 0x19, 0xee, 0xb3, 0x53, 0x00, 0x01, 0x27, 0x0f, 0xdf, 0x1a, 0xfc, 0x6a,
        0x1f, 0xb6, 0xf3, 0x7d, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x59, 0x5a,
    ];

    async fn read_all(data: &[u8]) -> String {
        let mut out = String::new();
        decompress(futures::io::Cursor::new(data.to_vec()))
            .await
            .unwrap()
            .read_to_string(&mut out)
            .await
            .unwrap();
        out
    }

    #[async_std::test]
    async fn test_gzip() {
        assert_eq!(read_all(HELLO_GZ).await, "Package: hello\n");
    }

    #[async_std::test]
    async fn test_xz() {
        assert_eq!(read_all(HELLO_XZ).await, "Package: hello\n");
    }

    #[async_std::test]
    async fn test_passthrough() {
        assert_eq!(read_all(b"Package: hello\n").await, "Package: hello\n");
    }

    #[async_std::test]
    async fn test_short_input() {
        assert_eq!(read_all(b"hi").await, "hi");
        assert_eq!(read_all(b"").await, "");
    }
}
