//! In-memory archive fixtures shared by the source and recipe tests.

use {
    crate::transport::TransportProvider,
    futures::io::{AsyncRead, Cursor},
    std::{collections::HashMap, io, pin::Pin},
};

pub(crate) const MIRROR_URL: &str = "http://mirror.test";

pub(crate) const INRELEASE: &[u8] = include_bytes!("../tests/fixtures/InRelease");
pub(crate) const ARCHIVE_KEY: &[u8] = include_bytes!("../tests/fixtures/archive-key.asc");
pub(crate) const PACKAGES_AMD64_GZ: &[u8] = include_bytes!("../tests/fixtures/Packages-amd64.gz");
pub(crate) const PACKAGES_ALL_GZ: &[u8] = include_bytes!("../tests/fixtures/Packages-all.gz");

/// Serves byte blobs by URL; anything else is a 404.
pub(crate) struct FakeTransport {
    files: HashMap<String, Vec<u8>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    pub(crate) fn insert<U: Into<String>>(&mut self, url: U, data: Vec<u8>) {
        self.files.insert(url.into(), data);
    }
}

impl TransportProvider for FakeTransport {
    async fn open(&self, url: &str) -> io::Result<Pin<Box<dyn AsyncRead + Send>>> {
        match self.files.get(url) {
            Some(data) => Ok(Box::pin(Cursor::new(data.clone()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, url.to_string())),
        }
    }
}

/// The miniature signed archive the fixtures describe: one source, one
/// component, architectures `all` and `amd64`.
pub(crate) fn mirror() -> FakeTransport {
    let mut transport = FakeTransport::new();
    transport.insert(
        format!("{}/archive-key.asc", MIRROR_URL),
        ARCHIVE_KEY.to_vec(),
    );
    transport.insert(
        format!("{}/debian/dists/stable/InRelease", MIRROR_URL),
        INRELEASE.to_vec(),
    );
    transport.insert(
        format!("{}/debian/dists/stable/main/binary-amd64/Packages.gz", MIRROR_URL),
        PACKAGES_AMD64_GZ.to_vec(),
    );
    transport.insert(
        format!("{}/debian/dists/stable/main/binary-all/Packages.gz", MIRROR_URL),
        PACKAGES_ALL_GZ.to_vec(),
    );
    transport
}
