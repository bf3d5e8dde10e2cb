//! OpenPGP public-key bundles used to verify archive indices.

use {
    crate::{
        error::{Error, Result},
        transport::TransportProvider,
    },
    pgp::{Deserializable, SignedPublicKey},
    std::io::Cursor,
};

const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";

// Keyrings are small; anything larger is a download gone wrong.
const MAX_KEYRING_SIZE: u64 = 16 * 1024 * 1024;

/// An immutable bundle of public keys, safe to share between tasks.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    keys: Vec<SignedPublicKey>,
}

impl KeyRing {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn keys(&self) -> &[SignedPublicKey] {
        &self.keys
    }

    /// Decodes an armored or binary public-key bundle.
    pub fn parse(location: &str, data: &[u8]) -> Result<Self> {
        let parse_err = |message: String| Error::KeyringParse {
            location: location.to_string(),
            message,
        };
        let armored = std::str::from_utf8(data)
            .map(|text| text.trim_start().starts_with(ARMOR_HEADER))
            .unwrap_or(false);
        let keys: Vec<SignedPublicKey> = if armored {
            let (iter, _headers) = SignedPublicKey::from_armor_many(Cursor::new(data))
                .map_err(|err| parse_err(err.to_string()))?;
            iter.collect::<std::result::Result<_, _>>()
                .map_err(|err| parse_err(err.to_string()))?
        } else {
            SignedPublicKey::from_bytes_many(Cursor::new(data))
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| parse_err(err.to_string()))?
        };
        if keys.is_empty() {
            return Err(parse_err("no public keys in bundle".to_string()));
        }
        Ok(KeyRing { keys })
    }

    /// Loads a keyring from an `http(s)` URL via the supplied transport, or
    /// from the filesystem for any other location.
    pub async fn load<T: TransportProvider + ?Sized>(
        transport: &T,
        location: &str,
    ) -> Result<Self> {
        let fetch_err = |message: String| Error::KeyringFetch {
            location: location.to_string(),
            message,
        };
        let data = if location.starts_with("https://") || location.starts_with("http://") {
            transport
                .fetch(location, MAX_KEYRING_SIZE)
                .await
                .map_err(|err| fetch_err(err.to_string()))?
        } else {
            async_std::fs::read(location)
                .await
                .map_err(|err| fetch_err(err.to_string()))?
        };
        Self::parse(location, &data)
    }
}
