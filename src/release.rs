//! The signed index document at an archive's distribution root.

use {
    crate::{
        arch::Arch,
        control::{parse_bool, parse_u64, parse_words, write_field, ControlStanza, Paragraph},
        error::{Error, Result},
    },
    chrono::{DateTime, Utc},
    std::fmt::Write as _,
};

/// One ` digest size path` line of a Release checksum table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub digest: String,
    pub size: u64,
    pub path: String,
}

pub(crate) fn parse_file_hashes(field: &'static str, value: &str) -> Result<Vec<FileHash>> {
    let mut out = Vec::new();
    for line in value.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_ascii_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(digest), Some(size), Some(path), None) => out.push(FileHash {
                digest: digest.to_string(),
                size: parse_u64(field, size)?,
                path: path.to_string(),
            }),
            _ => {
                return Err(Error::type_mismatch(
                    field,
                    format!("invalid file hash line {:?}", line),
                ))
            }
        }
    }
    Ok(out)
}

fn write_file_hashes(out: &mut String, name: &str, hashes: &[FileHash]) {
    if hashes.is_empty() {
        return;
    }
    let mut value = String::new();
    for fh in hashes {
        let _ = write!(value, "\n {} {} {}", fh.digest, fh.size, fh.path);
    }
    write_field(out, name, &value);
}

/// A parsed `InRelease`/`Release` paragraph.
#[derive(Debug, Clone, Default)]
pub struct Release {
    pub origin: String,
    pub label: String,
    pub suite: String,
    pub codename: String,
    pub version: String,
    pub date: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub acquire_by_hash: bool,
    pub architectures: Vec<Arch>,
    pub components: Vec<String>,
    pub description: String,
    pub md5sum: Vec<FileHash>,
    pub sha1: Vec<FileHash>,
    pub sha256: Vec<FileHash>,
}

impl Release {
    pub fn sha256_for(&self, path: &str) -> Option<&FileHash> {
        self.sha256.iter().find(|fh| fh.path == path)
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.to_utc())
        .map_err(|err| Error::type_mismatch(field, format!("invalid date: {}", err)))
}

fn parse_architectures(value: &str) -> Vec<Arch> {
    // ports archives list tuples outside the fixed table; skip those
    // instead of rejecting the whole release
    value
        .split_ascii_whitespace()
        .filter_map(|name| match Arch::parse(name) {
            Ok(arch) => Some(arch),
            Err(err) => {
                tracing::warn!(arch = name, %err, "skipping unknown architecture");
                None
            }
        })
        .collect()
}

impl Paragraph for Release {
    fn from_stanza(stanza: &ControlStanza<'_>) -> Result<Self> {
        let mut release = Release::default();
        for field in stanza.fields() {
            let value = field.value();
            if field.is_a("Origin") {
                release.origin = value.trim().to_string();
            } else if field.is_a("Label") {
                release.label = value.trim().to_string();
            } else if field.is_a("Suite") {
                release.suite = value.trim().to_string();
            } else if field.is_a("Codename") {
                release.codename = value.trim().to_string();
            } else if field.is_a("Version") {
                release.version = value.trim().to_string();
            } else if field.is_a("Date") {
                release.date = Some(parse_date("Date", value)?);
            } else if field.is_a("Valid-Until") {
                release.valid_until = Some(parse_date("Valid-Until", value)?);
            } else if field.is_a("Acquire-By-Hash") {
                release.acquire_by_hash = parse_bool("Acquire-By-Hash", value)?;
            } else if field.is_a("Architectures") {
                release.architectures = parse_architectures(value);
            } else if field.is_a("Components") {
                release.components = parse_words(value);
            } else if field.is_a("Description") {
                release.description = value.trim().to_string();
            } else if field.is_a("MD5Sum") {
                release.md5sum = parse_file_hashes("MD5Sum", value)?;
            } else if field.is_a("SHA1") {
                release.sha1 = parse_file_hashes("SHA1", value)?;
            } else if field.is_a("SHA256") {
                release.sha256 = parse_file_hashes("SHA256", value)?;
            } else {
                tracing::debug!(field = field.name(), "skipping unknown release field");
            }
        }
        Ok(release)
    }

    fn write_to(&self, out: &mut String) {
        write_field(out, "Origin", &self.origin);
        write_field(out, "Label", &self.label);
        write_field(out, "Suite", &self.suite);
        write_field(out, "Codename", &self.codename);
        write_field(out, "Version", &self.version);
        if let Some(date) = &self.date {
            write_field(out, "Date", &date.to_rfc2822());
        }
        if let Some(valid_until) = &self.valid_until {
            write_field(out, "Valid-Until", &valid_until.to_rfc2822());
        }
        if self.acquire_by_hash {
            write_field(out, "Acquire-By-Hash", "yes");
        }
        if !self.architectures.is_empty() {
            let names: Vec<String> = self.architectures.iter().map(|a| a.to_string()).collect();
            write_field(out, "Architectures", &names.join(" "));
        }
        if !self.components.is_empty() {
            write_field(out, "Components", &self.components.join(" "));
        }
        write_field(out, "Description", &self.description);
        write_file_hashes(out, "MD5Sum", &self.md5sum);
        write_file_hashes(out, "SHA1", &self.sha1);
        write_file_hashes(out, "SHA256", &self.sha256);
    }
}
