//! PGP clear-signed documents (RFC 4880 section 7): envelope splitting and
//! signature verification against a keyring.

use {
    crate::{
        error::{Error, Result},
        keyring::KeyRing,
    },
    digest::Digest as _,
    pgp::{
        armor::{BlockType, Dearmor},
        crypto::{HashAlgorithm, Hasher},
        packet::{Packet, PacketParser},
        types::PublicKeyTrait,
        Signature,
    },
    std::io::{self, Cursor},
};

pub(crate) const HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_ARMOR: &str = "-----BEGIN PGP SIGNATURE-----";

/// A clear-signed document taken apart.
pub(crate) struct SignedText {
    /// The dash-unescaped message with LF line endings, ready for parsing.
    pub body: String,
    /// The normalised form signatures are computed over: CRLF joined, no
    /// line break before the signature armor.
    pub signed: String,
    /// The ASCII-armored signature block.
    pub armor: String,
}

/// Splits a clear-signed document into message text and signature armor,
/// reversing dash-escaping (lines beginning `- ` lose those two bytes).
pub(crate) fn split(text: &str) -> Result<SignedText> {
    let invalid = |msg: &str| Error::SignatureInvalid(msg.to_string());
    let mut lines = text.lines();
    match lines.next() {
        Some(line) if line.trim_end() == HEADER => {}
        _ => return Err(invalid("missing clear-sign header")),
    }
    // armor headers (`Hash: ...`) up to the first empty line
    loop {
        match lines.next() {
            None => return Err(invalid("truncated clear-signed document")),
            Some(line) if line.trim().is_empty() => break,
            Some(_) => {}
        }
    }
    let mut body_lines: Vec<&str> = Vec::new();
    let mut armor = String::new();
    loop {
        match lines.next() {
            None => return Err(invalid("clear-signed document lacks a signature block")),
            Some(line) if line.trim_end() == SIGNATURE_ARMOR => {
                armor.push_str(SIGNATURE_ARMOR);
                armor.push('\n');
                for rest in lines {
                    armor.push_str(rest);
                    armor.push('\n');
                }
                break;
            }
            Some(line) => body_lines.push(line.strip_prefix("- ").unwrap_or(line)),
        }
    }
    let mut body = body_lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    let signed = body_lines.join("\r\n");
    Ok(SignedText {
        body,
        signed,
        armor,
    })
}

/// Verifies the armored signatures of a split document against the keyring
/// and returns the hex fingerprint of the verifying key.
pub(crate) fn verify(signed: &SignedText, keyring: &KeyRing) -> Result<String> {
    let mut dearmor = Dearmor::new(Cursor::new(signed.armor.as_bytes()));
    dearmor
        .read_header()
        .map_err(|err| Error::SignatureInvalid(err.to_string()))?;
    if !matches!(dearmor.typ, Some(BlockType::Signature)) {
        return Err(Error::SignatureInvalid(
            "expected a PGP SIGNATURE block".to_string(),
        ));
    }
    let mut signatures = Vec::new();
    for packet in PacketParser::new(dearmor) {
        match packet.map_err(|err| Error::SignatureInvalid(err.to_string()))? {
            Packet::Signature(sig) => signatures.push(sig),
            _ => {
                return Err(Error::SignatureInvalid(
                    "unexpected packet in signature block".to_string(),
                ))
            }
        }
    }
    if signatures.is_empty() {
        return Err(Error::SignatureMissing);
    }

    let mut last_err = None;
    for sig in &signatures {
        for key in keyring.keys() {
            match try_verify(sig, &signed.signed, key) {
                Some(Ok(fingerprint)) => return Ok(fingerprint),
                Some(Err(err)) => last_err = Some(err),
                None => {}
            }
            for subkey in &key.public_subkeys {
                match try_verify(sig, &signed.signed, subkey) {
                    Some(Ok(fingerprint)) => return Ok(fingerprint),
                    Some(Err(err)) => last_err = Some(err),
                    None => {}
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        Error::SignatureInvalid("no signature made by a key in the keyring".to_string())
    }))
}

/// `None` when the signature names a different issuer than `key`.
fn try_verify<K: PublicKeyTrait>(
    sig: &Signature,
    signed: &str,
    key: &K,
) -> Option<Result<String>> {
    if let Some(issuer) = sig.issuer() {
        if &key.key_id() != issuer {
            return None;
        }
    }
    Some(verify_one(sig, signed, key))
}

fn verify_one<K: PublicKeyTrait>(sig: &Signature, signed: &str, key: &K) -> Result<String> {
    let mut hasher = Box::new(MessageHasher::new(sig.config.hash_alg)?);
    Hasher::update(&mut *hasher, signed.as_bytes());
    let len = sig
        .config
        .hash_signature_data(&mut *hasher)
        .map_err(|err| Error::SignatureInvalid(err.to_string()))?;
    Hasher::update(&mut *hasher, &sig.config.trailer(len));
    let digest = hasher.finish();
    if digest[0..2] != sig.signed_hash_value {
        return Err(Error::SignatureInvalid(
            "signed hash value mismatch".to_string(),
        ));
    }
    key.verify_signature(sig.config.hash_alg, &digest, &sig.signature)
        .map_err(|err| Error::SignatureInvalid(err.to_string()))?;
    Ok(hex::encode(key.fingerprint()))
}

// The pgp crate hashes signature data through its own Hasher trait; this
// bridges it to the RustCrypto digests for the algorithms archives use.
enum MessageHasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl MessageHasher {
    fn new(alg: HashAlgorithm) -> Result<Self> {
        Ok(match alg {
            HashAlgorithm::MD5 => Self::Md5(md5::Md5::new()),
            HashAlgorithm::SHA1 => Self::Sha1(sha1::Sha1::new()),
            HashAlgorithm::SHA2_256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::SHA2_384 => Self::Sha384(sha2::Sha384::new()),
            HashAlgorithm::SHA2_512 => Self::Sha512(sha2::Sha512::new()),
            other => {
                return Err(Error::SignatureInvalid(format!(
                    "unsupported signature hash algorithm {:?}",
                    other
                )))
            }
        })
    }
}

impl io::Write for MessageHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Hasher::update(self, buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Hasher for MessageHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(d) => d.update(data),
            Self::Sha1(d) => d.update(data),
            Self::Sha256(d) => d.update(data),
            Self::Sha384(d) => d.update(data),
            Self::Sha512(d) => d.update(data),
        }
    }
    fn finish(self: Box<Self>) -> Vec<u8> {
        match *self {
            Self::Md5(d) => d.finalize().to_vec(),
            Self::Sha1(d) => d.finalize().to_vec(),
            Self::Sha256(d) => d.finalize().to_vec(),
            Self::Sha384(d) => d.finalize().to_vec(),
            Self::Sha512(d) => d.finalize().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
-----BEGIN PGP SIGNED MESSAGE-----
Hash: SHA256

Origin: Debian
- -----Escaped: line
Suite: stable
-----BEGIN PGP SIGNATURE-----

bm90IGEgcmVhbCBzaWduYXR1cmU=
-----END PGP SIGNATURE-----
";

    #[test]
    fn test_split() {
        let signed = split(FIXTURE).unwrap();
        assert_eq!(
            signed.body,
            "Origin: Debian\n-----Escaped: line\nSuite: stable\n"
        );
        assert_eq!(
            signed.signed,
            "Origin: Debian\r\n-----Escaped: line\r\nSuite: stable"
        );
        assert!(signed.armor.starts_with(SIGNATURE_ARMOR));
        assert!(signed.armor.contains("-----END PGP SIGNATURE-----"));
    }

    #[test]
    fn test_split_errors() {
        assert!(split("plain text\n").is_err());
        assert!(split("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n").is_err());
        // envelope without a signature block
        assert!(split("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nBody: x\n").is_err());
    }
}
