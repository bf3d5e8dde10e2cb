//! Debian architecture names and wildcard matching.

use {
    crate::error::{Error, Result},
    std::fmt::{self, Display, Formatter},
};

// explicit compile-time mapping to a distro-style arch name

#[cfg(target_arch = "x86")]
pub const DEFAULT_ARCH: &str = "i386";

#[cfg(target_arch = "x86_64")]
pub const DEFAULT_ARCH: &str = "amd64";

#[cfg(target_arch = "aarch64")]
pub const DEFAULT_ARCH: &str = "arm64";

#[cfg(target_arch = "powerpc64")]
pub const DEFAULT_ARCH: &str = "ppc64el";

#[cfg(target_arch = "riscv64")]
pub const DEFAULT_ARCH: &str = "riscv64";

#[cfg(target_arch = "s390x")]
pub const DEFAULT_ARCH: &str = "s390x";

// mips 32-bit -> mipsel
#[cfg(all(target_arch = "mips", target_pointer_width = "32"))]
pub const DEFAULT_ARCH: &str = "mipsel";

// mips 64-bit -> mips64el
#[cfg(any(
    target_arch = "mips64",
    all(target_arch = "mips", target_pointer_width = "64")
))]
pub const DEFAULT_ARCH: &str = "mips64el";

// arm: choose hard-float vs soft-float variant at compile time via target_feature
#[cfg(all(target_arch = "arm", target_feature = "vfp2"))]
pub const DEFAULT_ARCH: &str = "armhf";

#[cfg(all(target_arch = "arm", not(target_feature = "vfp2")))]
pub const DEFAULT_ARCH: &str = "armel";

// Fallback: if none of the above matched, use the literal from std::env::consts::ARCH
#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "powerpc64",
    target_arch = "riscv64",
    target_arch = "s390x",
    all(target_arch = "mips", target_pointer_width = "32"),
    target_arch = "mips64",
    all(target_arch = "mips", target_pointer_width = "64"),
    all(target_arch = "arm", target_feature = "vfp2"),
    all(target_arch = "arm", not(target_feature = "vfp2"))
)))]
pub const DEFAULT_ARCH: &str = std::env::consts::ARCH;

// CPU names that may appear bare (implying the linux OS part) or as the
// cpu half of an os-cpu tuple.
const CPUS: &[&str] = &[
    "amd64", "arm64", "armel", "armhf", "i386", "mips", "mipsel", "mips64", "mips64el", "ppc64",
    "ppc64el", "powerpc", "riscv64", "s390", "s390x", "sparc", "sparc64", "ia64", "m68k", "sh4",
    "alpha", "hppa", "x32", "loong64", "arm",
];

const OSES: &[&str] = &["linux", "kfreebsd", "hurd", "musl-linux", "uclibc-linux"];

/// A Debian architecture as an (os, cpu) pair with wildcard support.
///
/// `all` (architecture-independent) and `any` (full wildcard) are modelled
/// as tuples with both halves set to the respective keyword; partial
/// wildcards (`linux-any`, `any-amd64`) keep the concrete half.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Arch {
    os: String,
    cpu: String,
}

impl Arch {
    pub fn parse(src: &str) -> Result<Self> {
        let src = src.trim();
        match src {
            "" => return Err(Error::parse("architecture", 0, "empty architecture")),
            "all" => return Ok(Arch::all()),
            "any" => return Ok(Arch::any()),
            _ => {}
        }
        if let Some(cpu) = src.strip_prefix("any-") {
            if CPUS.contains(&cpu) {
                return Ok(Arch {
                    os: "any".to_string(),
                    cpu: cpu.to_string(),
                });
            }
            return Err(Error::parse(
                "architecture",
                4,
                format!("unknown cpu {:?}", cpu),
            ));
        }
        if let Some(os) = src.strip_suffix("-any") {
            if OSES.contains(&os) {
                return Ok(Arch {
                    os: os.to_string(),
                    cpu: "any".to_string(),
                });
            }
            return Err(Error::parse(
                "architecture",
                0,
                format!("unknown os {:?}", os),
            ));
        }
        if CPUS.contains(&src) {
            return Ok(Arch {
                os: "linux".to_string(),
                cpu: src.to_string(),
            });
        }
        if let Some((os, cpu)) = src.rsplit_once('-') {
            if OSES.contains(&os) && CPUS.contains(&cpu) {
                return Ok(Arch {
                    os: os.to_string(),
                    cpu: cpu.to_string(),
                });
            }
        }
        Err(Error::parse(
            "architecture",
            0,
            format!("unknown architecture {:?}", src),
        ))
    }

    /// Panics on invalid literals. Compile-time constants and tests only.
    pub fn must_parse(src: &str) -> Self {
        Self::parse(src).expect("invalid architecture literal")
    }

    /// The host architecture under its Debian name.
    pub fn host() -> Self {
        Self::must_parse(DEFAULT_ARCH)
    }

    pub fn all() -> Self {
        Arch {
            os: "all".to_string(),
            cpu: "all".to_string(),
        }
    }

    pub fn any() -> Self {
        Arch {
            os: "any".to_string(),
            cpu: "any".to_string(),
        }
    }

    /// The empty tuple used by synthetic (virtual) database entries.
    /// Renders empty and matches only itself.
    pub(crate) fn unspecified() -> Self {
        Arch::default()
    }

    pub fn is_all(&self) -> bool {
        self.os == "all"
    }

    pub fn os(&self) -> &str {
        &self.os
    }
    pub fn cpu(&self) -> &str {
        &self.cpu
    }

    /// Symmetric wildcard-aware comparison: `all` matches everything, and
    /// an `any` half on either side is compatible with any concrete value.
    pub fn matches(&self, other: &Arch) -> bool {
        if self == other {
            return true;
        }
        if self.os.is_empty() || other.os.is_empty() {
            // the unspecified tuple only matches itself
            return false;
        }
        if self.is_all() || other.is_all() {
            return true;
        }
        let half = |a: &str, b: &str| a == "any" || b == "any" || a == b;
        half(&self.os, &other.os) && half(&self.cpu, &other.cpu)
    }
}

impl TryFrom<&str> for Arch {
    type Error = Error;
    fn try_from(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl std::str::FromStr for Arch {
    type Err = Error;
    fn from_str(src: &str) -> Result<Self> {
        Self::parse(src)
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.os.as_str(), self.cpu.as_str()) {
            ("", "") => Ok(()),
            ("all", _) => f.write_str("all"),
            ("any", "any") => f.write_str("any"),
            ("linux", "any") => f.write_str("linux-any"),
            ("linux", cpu) => f.write_str(cpu),
            (os, cpu) => write!(f, "{}-{}", os, cpu),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        for (src, rendered) in [
            ("amd64", "amd64"),
            ("all", "all"),
            ("any", "any"),
            ("linux-any", "linux-any"),
            ("any-amd64", "any-amd64"),
            ("kfreebsd-amd64", "kfreebsd-amd64"),
            ("hurd-any", "hurd-any"),
        ] {
            assert_eq!(Arch::must_parse(src).to_string(), rendered, "{}", src);
        }
        assert!(Arch::parse("").is_err());
        assert!(Arch::parse("notanarch").is_err());
        assert!(Arch::parse("any-notacpu").is_err());
    }

    #[test]
    fn test_matches() {
        let amd64 = Arch::must_parse("amd64");
        let arm64 = Arch::must_parse("arm64");
        let all = Arch::all();
        let any = Arch::any();

        assert!(amd64.matches(&amd64));
        assert!(!amd64.matches(&arm64));
        assert!(all.matches(&amd64));
        assert!(all.matches(&all));
        assert!(any.matches(&amd64));
        assert!(Arch::must_parse("linux-any").matches(&amd64));
        assert!(Arch::must_parse("any-amd64").matches(&amd64));
        assert!(!Arch::must_parse("any-amd64").matches(&arm64));
        assert!(Arch::must_parse("kfreebsd-any").matches(&Arch::must_parse("kfreebsd-amd64")));
        assert!(!Arch::must_parse("kfreebsd-any").matches(&amd64));
    }

    #[test]
    fn test_matching_symmetry() {
        let fixtures = [
            Arch::must_parse("amd64"),
            Arch::must_parse("arm64"),
            Arch::must_parse("linux-any"),
            Arch::must_parse("any-amd64"),
            Arch::must_parse("kfreebsd-amd64"),
            Arch::all(),
            Arch::any(),
            Arch::unspecified(),
        ];
        for a in &fixtures {
            for b in &fixtures {
                assert_eq!(a.matches(b), b.matches(a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_unspecified() {
        let virt = Arch::unspecified();
        assert_eq!(virt.to_string(), "");
        assert!(virt.matches(&virt));
        assert!(!virt.matches(&Arch::must_parse("amd64")));
        assert!(!virt.matches(&Arch::any()));
        assert!(!virt.matches(&Arch::all()));
    }

    #[test]
    fn test_host() {
        // must be a known tuple on every supported build target
        let host = Arch::host();
        assert!(!host.is_all());
    }
}
