//! Control paragraphs: parsing RFC-822-style stanzas and the typed codec
//! on top of them.
//!
//! See <https://www.debian.org/doc/debian-policy/ch-controlfields.html> for
//! the field syntax. The parser keeps continuation lines and ` .` blank-line
//! markers verbatim; typed records decode and re-encode them unchanged.

use {
    crate::{
        clearsign,
        error::{Error, Result},
        keyring::KeyRing,
    },
    futures::io::{AsyncRead, AsyncReadExt},
    std::io::Write,
};

/// A single `Name: value` field borrowed from a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlField<'a> {
    name: &'a str,
    value: &'a str,
}

impl<'a> ControlField<'a> {
    /// True if this field is named `name` (ASCII case-insensitive).
    pub fn is_a(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
    pub fn name(&self) -> &'a str {
        self.name
    }
    pub fn value(&self) -> &'a str {
        self.value
    }
}

impl std::fmt::Display for ControlField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.starts_with('\n') {
            writeln!(f, "{}:{}", self.name, self.value)
        } else {
            writeln!(f, "{}: {}", self.name, self.value)
        }
    }
}

#[inline]
fn valid_name_char(b: u8) -> bool {
    (0x21..=0x7e).contains(&b) && b != b':'
}

#[inline]
fn valid_name_first_char(b: u8) -> bool {
    valid_name_char(b) && b != b'-' && b != b'#'
}

#[inline]
fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Streaming parser over the fields of control paragraphs.
///
/// `field` returns `None` at the end of a paragraph; calling it again either
/// yields the first field of the next paragraph or `None` at end of input.
pub struct ControlParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ControlParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.pos
    }

    fn quote_err(&self) -> String {
        let rest = &self.src[self.pos..];
        match rest.char_indices().nth(20) {
            None => rest,
            Some((n, _)) => &rest[..n],
        }
        .to_string()
    }

    pub fn field(&mut self) -> Result<Option<ControlField<'a>>> {
        let bytes = self.src.as_bytes();
        if self.pos >= bytes.len() {
            return Ok(None);
        }
        if bytes[self.pos] == b'\n' {
            self.pos += 1;
            return Ok(None);
        }
        if !valid_name_first_char(bytes[self.pos]) {
            return Err(Error::MalformedHeader(self.quote_err()));
        }
        let name_start = self.pos;
        let mut i = self.pos + 1;
        while i < bytes.len() && valid_name_char(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b':' {
            return Err(Error::MalformedHeader(self.quote_err()));
        }
        let name = &self.src[name_start..i];
        i += 1;
        while i < bytes.len() && is_ws(bytes[i]) {
            i += 1;
        }
        let value_start = i;
        let mut value_end;
        loop {
            match memchr::memchr(b'\n', &bytes[i..]) {
                None => {
                    value_end = bytes.len();
                    i = value_end;
                    break;
                }
                Some(n) => {
                    value_end = i + n;
                    i = value_end + 1;
                    // a line starting with space or tab continues the value
                    if i < bytes.len() && is_ws(bytes[i]) {
                        continue;
                    }
                    break;
                }
            }
        }
        self.pos = i;
        Ok(Some(ControlField {
            name,
            value: &self.src[value_start..value_end],
        }))
    }
}

impl<'a> Iterator for ControlParser<'a> {
    type Item = Result<ControlField<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        self.field().transpose()
    }
}

/// One parsed control paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlStanza<'a> {
    fields: Vec<ControlField<'a>>,
}

impl<'a> ControlStanza<'a> {
    /// Parses a string into a stanza, requiring the entire input to be
    /// one non-empty paragraph.
    pub fn parse(src: &'a str) -> Result<Self> {
        let mut parser = ControlParser::new(src);
        let mut fields = Vec::new();
        while let Some(field) = parser.field()? {
            fields.push(field);
        }
        if fields.is_empty() {
            return Err(Error::MalformedHeader("empty control stanza".to_string()));
        }
        if parser.offset() < src.trim_end().len() {
            return Err(Error::MalformedHeader(
                "unexpected second paragraph".to_string(),
            ));
        }
        Ok(ControlStanza { fields })
    }

    pub(crate) fn from_fields(fields: Vec<ControlField<'a>>) -> Self {
        ControlStanza { fields }
    }

    /// Returns the value of the `name` field if present.
    pub fn field(&self, name: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .find(|f| f.is_a(name))
            .map(|f| f.value())
    }

    pub fn fields(&self) -> impl Iterator<Item = &ControlField<'a>> {
        self.fields.iter()
    }
}

/// A sequence of control paragraphs.
pub struct ControlFile<'a> {
    pub stanzas: Vec<ControlStanza<'a>>,
}

impl<'a> ControlFile<'a> {
    pub fn parse(src: &'a str) -> Result<Self> {
        let mut parser = ControlParser::new(src);
        let mut stanzas = Vec::new();
        loop {
            let mut fields = Vec::new();
            let before = parser.offset();
            while let Some(field) = parser.field()? {
                fields.push(field);
            }
            if fields.is_empty() {
                if parser.offset() == before {
                    break;
                }
                continue;
            }
            stanzas.push(ControlStanza { fields });
        }
        Ok(Self { stanzas })
    }

    pub fn stanzas(&self) -> impl Iterator<Item = &ControlStanza<'a>> {
        self.stanzas.iter()
    }
}

/// A record type that maps to a control paragraph.
pub trait Paragraph: Sized {
    fn from_stanza(stanza: &ControlStanza<'_>) -> Result<Self>;
    /// Emits the record's fields in declaration order, each line terminated.
    fn write_to(&self, out: &mut String);
}

pub(crate) fn write_field(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str(name);
    if value.starts_with('\n') {
        out.push(':');
    } else {
        out.push_str(": ");
    }
    out.push_str(value);
    out.push('\n');
}

pub(crate) fn parse_bool(field: &'static str, value: &str) -> Result<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("no") || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::type_mismatch(
            field,
            format!("invalid boolean {:?}", value),
        ))
    }
}

pub(crate) fn parse_u64(field: &'static str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| Error::type_mismatch(field, format!("invalid number: {}", err)))
}

pub(crate) fn parse_words(value: &str) -> Vec<String> {
    value.split_ascii_whitespace().map(String::from).collect()
}

pub(crate) fn parse_commas(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Decodes a stream of control paragraphs into typed records, transparently
/// unwrapping and (when a keyring is supplied) verifying PGP clear-signed
/// input.
pub struct Decoder {
    body: String,
    signer: Option<String>,
    pos: usize,
}

impl Decoder {
    pub fn new<S: Into<String>>(text: S, keyring: &KeyRing) -> Result<Self> {
        let text = text.into();
        if text.starts_with(clearsign::HEADER) {
            let signed = clearsign::split(&text)?;
            let signer = if keyring.is_empty() {
                None
            } else {
                Some(clearsign::verify(&signed, keyring)?)
            };
            Ok(Decoder {
                body: signed.body,
                signer,
                pos: 0,
            })
        } else {
            Ok(Decoder {
                body: text,
                signer: None,
                pos: 0,
            })
        }
    }

    pub async fn read<R: AsyncRead + Unpin + Send>(mut r: R, keyring: &KeyRing) -> Result<Self> {
        let mut text = String::new();
        r.read_to_string(&mut text).await?;
        Self::new(text, keyring)
    }

    /// The hex fingerprint of the key that signed the document, if any.
    pub fn signer(&self) -> Option<&str> {
        self.signer.as_deref()
    }

    pub fn ensure_signed(&self) -> Result<()> {
        if self.signer.is_some() {
            Ok(())
        } else {
            Err(Error::SignatureMissing)
        }
    }

    /// Decodes the next paragraph, or `None` at end of input.
    pub fn decode<T: Paragraph>(&mut self) -> Result<Option<T>> {
        loop {
            if self.pos >= self.body.len() {
                return Ok(None);
            }
            let mut parser = ControlParser::new(&self.body[self.pos..]);
            let mut fields = Vec::new();
            while let Some(field) = parser.field()? {
                fields.push(field);
            }
            let consumed = parser.offset();
            if fields.is_empty() {
                if consumed == 0 {
                    return Ok(None);
                }
                self.pos += consumed;
                continue;
            }
            let stanza = ControlStanza::from_fields(fields);
            let record = T::from_stanza(&stanza)?;
            self.pos += consumed;
            return Ok(Some(record));
        }
    }

    pub fn decode_all<T: Paragraph>(&mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(record) = self.decode()? {
            out.push(record);
        }
        Ok(out)
    }
}

/// Encodes typed records as control paragraphs, blank-line separated.
pub struct Encoder<W: Write> {
    w: W,
    first: bool,
}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Self {
        Self { w, first: true }
    }

    pub fn encode<T: Paragraph>(&mut self, record: &T) -> Result<()> {
        let mut out = String::new();
        if !self.first {
            out.push('\n');
        }
        self.first = false;
        record.write_to(&mut out);
        self.w.write_all(out.as_bytes())?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
