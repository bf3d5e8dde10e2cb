//! The Debian dependency mini-language.
//!
//! A [`Dependency`] is a conjunction of [`Relation`]s; each relation is a
//! disjunction of [`Possibility`]s naming a package with optional version,
//! architecture and build-profile restrictions.

use {
    crate::{
        arch::Arch,
        error::{Error, Result},
        version::{version_char, Version},
    },
    smallvec::SmallVec,
    std::fmt::{self, Display, Formatter},
    std::str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    StrictlyEarlier,
    EarlierOrEqual,
    Exactly,
    LaterOrEqual,
    StrictlyLater,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrictlyEarlier => f.write_str("<<"),
            Self::EarlierOrEqual => f.write_str("<="),
            Self::Exactly => f.write_str("="),
            Self::LaterOrEqual => f.write_str(">="),
            Self::StrictlyLater => f.write_str(">>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub operator: Operator,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchConstraint {
    pub negated: bool,
    pub arch: Arch,
}

/// One alternative inside a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Possibility {
    pub name: String,
    pub arch_qualifier: Option<String>,
    pub version: Option<VersionConstraint>,
    pub architectures: Vec<ArchConstraint>,
    /// Build-profile groups, kept verbatim and not interpreted.
    pub profiles: Vec<String>,
}

/// A `|`-separated group of alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relation {
    pub possibilities: SmallVec<[Possibility; 2]>,
}

/// A comma-separated conjunction of relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    pub relations: Vec<Relation>,
}

// Package names must consist only of lower case letters (a-z), digits (0-9),
// plus (+) and minus (-) signs, and periods (.). They must be at least two
// characters long and must start with an alphanumeric character.
fn package_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-' || b == b'+'
}

fn qualifier_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'
}

struct Cursor<'a> {
    inp: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            inp: src.as_bytes(),
            pos: 0,
        }
    }
    fn err<M: Into<String>>(&self, message: M) -> Error {
        Error::parse("dependency", self.pos, message)
    }
    fn peek(&self) -> Option<u8> {
        self.inp.get(self.pos).copied()
    }
    fn bump(&mut self) {
        self.pos += 1;
    }
    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }
    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.inp.len()
    }
    fn eat(&mut self, b: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(b) {
            self.bump();
            true
        } else {
            false
        }
    }
    fn expect(&mut self, b: u8, what: &str) -> Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.err(format!("expected {}", what)))
        }
    }
    fn take_while(
        &mut self,
        at_least: usize,
        pred: fn(u8) -> bool,
        what: &str,
    ) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if pred(b) {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos - start < at_least {
            Err(Error::parse("dependency", start, format!("expected {}", what)))
        } else {
            // the input is checked byte-wise against an ASCII predicate
            Ok(std::str::from_utf8(&self.inp[start..self.pos]).expect("ascii run"))
        }
    }
}

impl Possibility {
    pub fn parse(src: &str) -> Result<Self> {
        let mut cur = Cursor::new(src);
        let possi = Self::parse_internal(&mut cur)?;
        if cur.at_end() {
            Ok(possi)
        } else {
            Err(cur.err("unexpected remaining input"))
        }
    }

    fn parse_internal(cur: &mut Cursor<'_>) -> Result<Self> {
        cur.skip_ws();
        let name = cur.take_while(2, package_char, "package name")?.to_string();
        let arch_qualifier = if cur.peek() == Some(b':') {
            cur.bump();
            Some(cur.take_while(2, qualifier_char, "architecture qualifier")?.to_string())
        } else {
            None
        };
        let mut possi = Possibility {
            name,
            arch_qualifier,
            ..Possibility::default()
        };
        // adornments may appear in either order; the canonical emission
        // puts the architecture restriction before the version constraint
        loop {
            cur.skip_ws();
            match cur.peek() {
                Some(b'(') => {
                    if possi.version.is_some() {
                        return Err(cur.err("duplicate version constraint"));
                    }
                    cur.bump();
                    possi.version = Some(parse_version_constraint(cur)?);
                }
                Some(b'[') => {
                    if !possi.architectures.is_empty() {
                        return Err(cur.err("duplicate architecture restriction"));
                    }
                    cur.bump();
                    possi.architectures = parse_arch_list(cur)?;
                }
                Some(b'<') => {
                    cur.bump();
                    possi.profiles.push(parse_profile_group(cur)?);
                }
                _ => break,
            }
        }
        Ok(possi)
    }
}

fn parse_version_constraint(cur: &mut Cursor<'_>) -> Result<VersionConstraint> {
    cur.skip_ws();
    let operator = match cur.peek() {
        Some(b'=') => {
            cur.bump();
            Operator::Exactly
        }
        Some(b'<') => {
            cur.bump();
            match cur.peek() {
                Some(b'<') => {
                    cur.bump();
                    Operator::StrictlyEarlier
                }
                Some(b'=') => {
                    cur.bump();
                    Operator::EarlierOrEqual
                }
                _ => return Err(cur.err("invalid relation operator")),
            }
        }
        Some(b'>') => {
            cur.bump();
            match cur.peek() {
                Some(b'>') => {
                    cur.bump();
                    Operator::StrictlyLater
                }
                Some(b'=') => {
                    cur.bump();
                    Operator::LaterOrEqual
                }
                _ => return Err(cur.err("invalid relation operator")),
            }
        }
        _ => return Err(cur.err("expected relation operator")),
    };
    cur.skip_ws();
    let at = cur.pos;
    let text = cur.take_while(1, version_char, "version number")?;
    let version =
        Version::parse(text).map_err(|err| Error::parse("dependency", at, err.to_string()))?;
    cur.expect(b')', "closing ')'")?;
    Ok(VersionConstraint { operator, version })
}

fn parse_arch_list(cur: &mut Cursor<'_>) -> Result<Vec<ArchConstraint>> {
    let mut out = Vec::new();
    loop {
        if cur.eat(b']') {
            if out.is_empty() {
                return Err(cur.err("empty architecture restriction"));
            }
            return Ok(out);
        }
        let negated = cur.eat(b'!');
        cur.skip_ws();
        let at = cur.pos;
        let token = cur.take_while(1, arch_token_char, "architecture name")?;
        let arch =
            Arch::parse(token).map_err(|err| Error::parse("dependency", at, err.to_string()))?;
        out.push(ArchConstraint { negated, arch });
    }
}

fn arch_token_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'
}

fn parse_profile_group(cur: &mut Cursor<'_>) -> Result<String> {
    let start = cur.pos;
    while let Some(b) = cur.peek() {
        if b == b'>' {
            let inner = std::str::from_utf8(&cur.inp[start..cur.pos])
                .expect("ascii run")
                .trim()
                .to_string();
            cur.bump();
            if inner.is_empty() {
                return Err(cur.err("empty build profile group"));
            }
            return Ok(inner);
        }
        cur.bump();
    }
    Err(cur.err("unterminated build profile group"))
}

impl Relation {
    fn parse_internal(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut possibilities: SmallVec<[Possibility; 2]> = SmallVec::new();
        loop {
            possibilities.push(Possibility::parse_internal(cur)?);
            if !cur.eat(b'|') {
                break;
            }
        }
        Ok(Relation { possibilities })
    }
}

/// Iterator over the comma-separated relations of a dependency field.
///
/// On a malformed relation the iterator yields the error and resumes after
/// the next top-level comma, so one bad entry does not hide the rest.
pub struct Relations<'a> {
    cur: Cursor<'a>,
}

impl<'a> Relations<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            cur: Cursor::new(src),
        }
    }

    fn parse_next(&mut self) -> Result<Relation> {
        let relation = Relation::parse_internal(&mut self.cur)?;
        self.cur.skip_ws();
        match self.cur.peek() {
            None => {}
            Some(b',') => {
                self.cur.bump();
                if self.cur.at_end() {
                    return Err(self.cur.err("trailing comma"));
                }
            }
            Some(_) => return Err(self.cur.err("expected ','")),
        }
        Ok(relation)
    }
}

impl<'a> Iterator for Relations<'a> {
    type Item = Result<Relation>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.cur.at_end() {
            return None;
        }
        let item = self.parse_next();
        if item.is_err() {
            while let Some(b) = self.cur.peek() {
                self.cur.bump();
                if b == b',' {
                    break;
                }
            }
        }
        Some(item)
    }
}

impl Dependency {
    pub fn parse(src: &str) -> Result<Self> {
        Ok(Dependency {
            relations: Relations::new(src).collect::<Result<Vec<_>>>()?,
        })
    }

    /// Panics on invalid input. Test fixtures only.
    pub fn must_parse(src: &str) -> Self {
        Self::parse(src).expect("invalid dependency literal")
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl FromStr for Dependency {
    type Err = Error;
    fn from_str(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl TryFrom<&str> for Dependency {
    type Error = Error;
    fn try_from(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl Display for Possibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(qual) = &self.arch_qualifier {
            write!(f, ":{}", qual)?;
        }
        if !self.architectures.is_empty() {
            f.write_str(" [")?;
            for (i, ac) in self.architectures.iter().enumerate() {
                if i != 0 {
                    f.write_str(" ")?;
                }
                if ac.negated {
                    f.write_str("!")?;
                }
                ac.arch.fmt(f)?;
            }
            f.write_str("]")?;
        }
        if let Some(vc) = &self.version {
            write!(f, " ({} {})", vc.operator, vc.version)?;
        }
        for group in &self.profiles {
            write!(f, " <{}>", group)?;
        }
        Ok(())
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, possi) in self.possibilities.iter().enumerate() {
            if i != 0 {
                f.write_str(" | ")?;
            }
            possi.fmt(f)?;
        }
        Ok(())
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, relation) in self.relations.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            relation.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structure() {
        let dep = Dependency::must_parse("foo, bar (>= 1.0) [amd64] | baz");
        assert_eq!(dep.relations.len(), 2);
        assert_eq!(dep.relations[0].possibilities.len(), 1);
        assert_eq!(dep.relations[0].possibilities[0].name, "foo");

        let second = &dep.relations[1];
        assert_eq!(second.possibilities.len(), 2);
        let bar = &second.possibilities[0];
        assert_eq!(bar.name, "bar");
        let vc = bar.version.as_ref().unwrap();
        assert_eq!(vc.operator, Operator::LaterOrEqual);
        assert_eq!(vc.version, Version::must_parse("1.0"));
        assert_eq!(bar.architectures.len(), 1);
        assert!(!bar.architectures[0].negated);
        assert_eq!(bar.architectures[0].arch, Arch::must_parse("amd64"));
        assert_eq!(second.possibilities[1].name, "baz");
    }

    #[test]
    fn test_canonical_emission() {
        let dep = Dependency::must_parse("foo, bar (>= 1.0) [amd64] | baz");
        assert_eq!(dep.to_string(), "foo, bar [amd64] (>= 1.0) | baz");
        // canonical output round-trips
        assert_eq!(Dependency::must_parse(&dep.to_string()), dep);
    }

    #[test]
    fn test_adornments() {
        let dep = Dependency::must_parse(
            "libfoo-dev:native (>= 2:1.2~rc1-1) [linux-any !armel] <!nocheck cross>",
        );
        let possi = &dep.relations[0].possibilities[0];
        assert_eq!(possi.name, "libfoo-dev");
        assert_eq!(possi.arch_qualifier.as_deref(), Some("native"));
        assert_eq!(possi.architectures.len(), 2);
        assert!(possi.architectures[1].negated);
        assert_eq!(possi.profiles, vec!["!nocheck cross".to_string()]);
        assert_eq!(
            dep.to_string(),
            "libfoo-dev:native [linux-any !armel] (>= 2:1.2~rc1-1) <!nocheck cross>"
        );
        assert_eq!(Dependency::must_parse(&dep.to_string()), dep);
    }

    #[test]
    fn test_liberal_whitespace() {
        let dep = Dependency::must_parse("  foo ,\n bar\t( >= 1.0 ) |\nbaz ");
        assert_eq!(dep.relations.len(), 2);
        assert_eq!(dep.to_string(), "foo, bar (>= 1.0) | baz");
    }

    #[test]
    fn test_empty() {
        assert!(Dependency::must_parse("").is_empty());
        assert!(Dependency::must_parse("  \n ").is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(Dependency::parse("foo,").is_err());
        assert!(Dependency::parse("foo (1.0)").is_err());
        assert!(Dependency::parse("foo (< 1.0)").is_err());
        assert!(Dependency::parse("foo (= 1.0").is_err());
        assert!(Dependency::parse("foo []").is_err());
        assert!(Dependency::parse("foo <").is_err());
        assert!(Dependency::parse("f").is_err());
        assert!(Possibility::parse("foo bar").is_err());

        match Dependency::parse("foo (< 1.0)") {
            Err(Error::Parse { what, at, .. }) => {
                assert_eq!(what, "dependency");
                assert!(at >= 5);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_relation_iterator_resyncs() {
        let mut it = Relations::new("foo (== 1.0), bar");
        assert!(it.next().unwrap().is_err());
        let bar = it.next().unwrap().unwrap();
        assert_eq!(bar.possibilities[0].name, "bar");
        assert!(it.next().is_none());
    }
}
