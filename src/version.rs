//! Debian version numbers.
//!
//! The version format is `[epoch:]upstream_version[-debian_revision]`.
//! See <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.

use {
    crate::error::{Error, Result},
    std::{
        cmp::Ordering,
        fmt::{self, Display, Formatter},
        str::FromStr,
    },
};

/// A parsed Debian version: epoch, upstream version and Debian revision.
///
/// Equality is structural on the canonical parse; ordering follows the
/// Debian comparison algorithm, under which distinct renderings may still
/// compare equal (`1.0` and `1.00`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version {
    epoch: u32,
    upstream: String,
    revision: String,
}

pub(crate) fn version_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || b == b'.'
        || b == b'+'
        || b == b'-'
        || b == b'~'
        || b == b':'
}

impl Version {
    pub fn parse(src: &str) -> Result<Self> {
        let err = |at: usize, message: &str| Error::parse("version", at, message);
        if src.is_empty() {
            return Err(err(0, "empty version string"));
        }
        let bytes = src.as_bytes();
        if let Some(pos) = bytes.iter().position(|&b| !version_char(b)) {
            return Err(err(pos, "invalid character"));
        }

        let (epoch, rest, upstream_at) = match src.find(':') {
            Some(0) => return Err(err(0, "empty epoch")),
            Some(colon) => {
                let digits = &src[..colon];
                if !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err(0, "non-numeric epoch"));
                }
                let epoch = digits
                    .parse::<u32>()
                    .map_err(|_| err(0, "epoch out of range"))?;
                (epoch, &src[colon + 1..], colon + 1)
            }
            None => (0, src, 0),
        };
        if rest.contains(':') {
            return Err(err(upstream_at, "colon in upstream version"));
        }

        let (upstream, revision) = match rest.rfind('-') {
            Some(dash) => (&rest[..dash], &rest[dash + 1..]),
            None => (rest, ""),
        };
        if upstream.is_empty() {
            return Err(err(upstream_at, "empty upstream version"));
        }
        if !upstream.as_bytes()[0].is_ascii_digit() && src.find(':').is_none() {
            return Err(err(upstream_at, "upstream version must start with a digit"));
        }

        Ok(Version {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        })
    }

    /// Panics on invalid input. Test fixtures and constants only.
    pub fn must_parse(src: &str) -> Self {
        Self::parse(src).expect("invalid version literal")
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
    pub fn upstream(&self) -> &str {
        &self.upstream
    }
    pub fn revision(&self) -> &str {
        &self.revision
    }
}

impl FromStr for Version {
    type Err = Error;
    fn from_str(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl TryFrom<&str> for Version {
    type Error = Error;
    fn try_from(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}:", self.epoch)?;
        }
        f.write_str(&self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_part(self.upstream.as_bytes(), other.upstream.as_bytes()))
            .then_with(|| cmp_part(self.revision.as_bytes(), other.revision.as_bytes()))
    }
}

// The upstream version and revision are compared in segments alternating
// between non-digit and digit runs. Non-digit runs compare character by
// character with letters sorting before non-letters and `~` before
// anything, including the end of the run. Digit runs compare numerically
// with leading zeros ignored; a missing run counts as zero.
fn cmp_part(mut a: &[u8], mut b: &[u8]) -> Ordering {
    loop {
        if a.is_empty() && b.is_empty() {
            return Ordering::Equal;
        }
        let an = a.iter().position(|b| b.is_ascii_digit()).unwrap_or(a.len());
        let bn = b.iter().position(|b| b.is_ascii_digit()).unwrap_or(b.len());
        match cmp_alpha(&a[..an], &b[..bn]) {
            Ordering::Equal => {}
            ne => return ne,
        }
        a = &a[an..];
        b = &b[bn..];
        let an = a
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(a.len());
        let bn = b
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(b.len());
        match cmp_digits(&a[..an], &b[..bn]) {
            Ordering::Equal => {}
            ne => return ne,
        }
        a = &a[an..];
        b = &b[bn..];
    }
}

fn cmp_alpha(a: &[u8], b: &[u8]) -> Ordering {
    let mut i = 0;
    loop {
        match (a.get(i), b.get(i)) {
            (None, None) => return Ordering::Equal,
            (None, Some(&c)) => {
                return if c == b'~' {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Some(&c), None) => {
                return if c == b'~' {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Some(&x), Some(&y)) if x != y => return cmp_char(x, y),
            _ => i += 1,
        }
    }
}

fn cmp_char(x: u8, y: u8) -> Ordering {
    if x == b'~' {
        Ordering::Less
    } else if y == b'~' {
        Ordering::Greater
    } else {
        match (x.is_ascii_alphabetic(), y.is_ascii_alphabetic()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.cmp(&y),
        }
    }
}

fn cmp_digits(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_zeros(a);
    let b = strip_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_zeros(mut s: &[u8]) -> &[u8] {
    while let [b'0', rest @ ..] = s {
        s = rest;
    }
    s
}
