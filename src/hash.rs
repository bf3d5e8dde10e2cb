//! Digest accumulation and verification for downloaded streams.

use {
    crate::error::{Error, Result},
    digest::{FixedOutput, Output, Update},
    futures::io::AsyncRead,
    std::{
        fmt,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
    },
    subtle::ConstantTimeEq,
};

pub trait HashAlgo: FixedOutput + Update + Default + Clone + Send + Unpin {}
impl<T: FixedOutput + Update + Default + Clone + Send + Unpin> HashAlgo for T {}

/// A fixed-size digest value, hex-parsed and hex-rendered.
#[derive(Default, Clone)]
pub struct Digest<D: HashAlgo> {
    inner: Output<D>,
}

impl<D: HashAlgo> PartialEq for Digest<D> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<D: HashAlgo> Eq for Digest<D> {}

impl<D: HashAlgo> Digest<D> {
    /// Constant-time comparison, for verifying untrusted streams.
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        self.inner.as_slice().ct_eq(other.inner.as_slice()).into()
    }
}

impl<D: HashAlgo> TryFrom<&str> for Digest<D> {
    type Error = Error;
    fn try_from(value: &str) -> Result<Self> {
        let mut inner = Output::<D>::default();
        hex::decode_to_slice(value, inner.as_mut_slice())
            .map_err(|err| Error::parse("digest", 0, err.to_string()))?;
        Ok(Digest { inner })
    }
}

impl<D: HashAlgo> From<Output<D>> for Digest<D> {
    fn from(inner: Output<D>) -> Self {
        Digest { inner }
    }
}

impl<D: HashAlgo> fmt::Display for Digest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.inner))
    }
}

impl<D: HashAlgo> fmt::Debug for Digest<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.inner))
    }
}

/// Transparent reader that feeds every byte it yields into a digest.
///
/// The digest state is shared with [`DigestHandle`]s so it can be inspected
/// after downstream decoders have consumed the reader.
pub struct HashingReader<D: HashAlgo, R> {
    digester: Arc<Mutex<D>>,
    inner: R,
}

/// A handle onto the digest state of a [`HashingReader`].
#[derive(Clone)]
pub struct DigestHandle<D: HashAlgo> {
    digester: Arc<Mutex<D>>,
}

impl<D: HashAlgo, R: AsyncRead + Unpin + Send> HashingReader<D, R> {
    pub fn new(inner: R) -> Self {
        Self {
            digester: Arc::new(Mutex::new(D::default())),
            inner,
        }
    }

    pub fn handle(&self) -> DigestHandle<D> {
        DigestHandle {
            digester: Arc::clone(&self.digester),
        }
    }

    pub fn into_digest(self) -> Digest<D> {
        let digester = self.digester.lock().unwrap_or_else(|err| err.into_inner()).clone();
        Digest {
            inner: digester.finalize_fixed(),
        }
    }
}

impl<D: HashAlgo> DigestHandle<D> {
    /// The digest of everything read so far.
    pub fn digest(&self) -> Digest<D> {
        let digester = self.digester.lock().unwrap_or_else(|err| err.into_inner()).clone();
        Digest {
            inner: digester.finalize_fixed(),
        }
    }

    /// Compares the accumulated digest against an expected value in
    /// constant time.
    pub fn verify(&self, expected: &Digest<D>) -> Result<()> {
        let actual = self.digest();
        if actual.constant_time_eq(expected) {
            Ok(())
        } else {
            Err(Error::HashMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl<D: HashAlgo, R: AsyncRead + Unpin + Send> AsyncRead for HashingReader<D, R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(0)) => Poll::Ready(Ok(0)),
            Poll::Ready(Ok(size)) => {
                this.digester
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .update(&buf[..size]);
                Poll::Ready(Ok(size))
            }
            other => other,
        }
    }
}
