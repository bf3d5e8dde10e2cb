//! Binary package records as they appear in `Packages` indices.

use {
    crate::{
        arch::Arch,
        control::{parse_bool, parse_commas, parse_u64, write_field, ControlStanza, Paragraph},
        error::{Error, Result},
        relation::Dependency,
        version::Version,
    },
    std::cmp::Ordering,
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum Priority {
    #[default]
    Unknown,
    Extra,
    Optional,
    Standard,
    Important,
    Required,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Priority::Required => write!(f, "required"),
            Priority::Important => write!(f, "important"),
            Priority::Standard => write!(f, "standard"),
            Priority::Optional => write!(f, "optional"),
            Priority::Extra => write!(f, "extra"),
            Priority::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for Priority {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("required") {
            Priority::Required
        } else if value.eq_ignore_ascii_case("important") {
            Priority::Important
        } else if value.eq_ignore_ascii_case("standard") {
            Priority::Standard
        } else if value.eq_ignore_ascii_case("optional") {
            Priority::Optional
        } else if value.eq_ignore_ascii_case("extra") {
            Priority::Extra
        } else {
            Priority::Unknown
        }
    }
}

/// One binary package, concrete or virtual.
///
/// Concrete records come from `Packages` paragraphs. Virtual records are
/// synthesized by the database for `Provides` names and carry owned copies
/// of their providers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    pub name: String,
    pub source: String,
    pub version: Version,
    pub architecture: Arch,
    pub installed_size: Option<u64>,
    pub maintainer: String,
    pub description: String,
    pub homepage: String,
    pub tags: Vec<String>,
    pub essential: bool,
    pub section: String,
    pub priority: Priority,
    pub filename: String,
    pub size: Option<u64>,
    pub sha256: String,
    pub replaces: Dependency,
    pub breaks: Dependency,
    pub provides: Dependency,
    pub conflicts: Dependency,
    pub enhances: Dependency,
    pub depends: Dependency,
    pub recommends: Dependency,
    pub suggests: Dependency,
    pub pre_depends: Dependency,

    /// Where the binary may be fetched; populated when the package is
    /// attached to a component.
    pub urls: Vec<String>,
    /// Set on synthetic entries standing in for a `Provides` name.
    pub is_virtual: bool,
    pub providers: Vec<Package>,
}

impl Package {
    /// The unique identity `(name, version, arch)` rendered as one string.
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.name, self.version, self.architecture)
    }

    /// Database order: name, version, then architecture, with matching
    /// architectures collapsing to equality so `all`/`any` variants of the
    /// same name and version de-duplicate.
    pub fn cmp_order(&self, other: &Package) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| {
                if self.architecture.matches(&other.architecture) {
                    Ordering::Equal
                } else {
                    self.architecture
                        .to_string()
                        .cmp(&other.architecture.to_string())
                }
            })
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}={}", self.name, self.architecture, self.version)
    }
}

fn parse_dependency(field: &'static str, value: &str) -> Result<Dependency> {
    Dependency::parse(value).map_err(|err| Error::type_mismatch(field, err.to_string()))
}

impl Paragraph for Package {
    fn from_stanza(stanza: &ControlStanza<'_>) -> Result<Self> {
        let mut pkg = Package::default();
        let mut seen_version = false;
        let mut seen_arch = false;
        for field in stanza.fields() {
            let value = field.value();
            if field.is_a("Package") {
                pkg.name = value.trim().to_string();
            } else if field.is_a("Source") {
                pkg.source = value.trim().to_string();
            } else if field.is_a("Version") {
                pkg.version = Version::parse(value.trim())
                    .map_err(|err| Error::type_mismatch("Version", err.to_string()))?;
                seen_version = true;
            } else if field.is_a("Architecture") {
                pkg.architecture = Arch::parse(value.trim())
                    .map_err(|err| Error::type_mismatch("Architecture", err.to_string()))?;
                seen_arch = true;
            } else if field.is_a("Installed-Size") {
                pkg.installed_size = Some(parse_u64("Installed-Size", value)?);
            } else if field.is_a("Maintainer") {
                pkg.maintainer = value.trim().to_string();
            } else if field.is_a("Description") {
                pkg.description = value.to_string();
            } else if field.is_a("Homepage") {
                pkg.homepage = value.trim().to_string();
            } else if field.is_a("Tag") {
                pkg.tags = parse_commas(value);
            } else if field.is_a("Essential") {
                pkg.essential = parse_bool("Essential", value)?;
            } else if field.is_a("Section") {
                pkg.section = value.trim().to_string();
            } else if field.is_a("Priority") {
                pkg.priority = Priority::from(value.trim());
            } else if field.is_a("Filename") {
                pkg.filename = value.trim().to_string();
            } else if field.is_a("Size") {
                pkg.size = Some(parse_u64("Size", value)?);
            } else if field.is_a("SHA256") {
                pkg.sha256 = value.trim().to_string();
            } else if field.is_a("Replaces") {
                pkg.replaces = parse_dependency("Replaces", value)?;
            } else if field.is_a("Breaks") {
                pkg.breaks = parse_dependency("Breaks", value)?;
            } else if field.is_a("Provides") {
                pkg.provides = parse_dependency("Provides", value)?;
            } else if field.is_a("Conflicts") {
                pkg.conflicts = parse_dependency("Conflicts", value)?;
            } else if field.is_a("Enhances") {
                pkg.enhances = parse_dependency("Enhances", value)?;
            } else if field.is_a("Depends") {
                pkg.depends = parse_dependency("Depends", value)?;
            } else if field.is_a("Recommends") {
                pkg.recommends = parse_dependency("Recommends", value)?;
            } else if field.is_a("Suggests") {
                pkg.suggests = parse_dependency("Suggests", value)?;
            } else if field.is_a("Pre-Depends") {
                pkg.pre_depends = parse_dependency("Pre-Depends", value)?;
            } else {
                tracing::debug!(field = field.name(), "skipping unknown package field");
            }
        }
        if pkg.name.is_empty() {
            return Err(Error::type_mismatch("Package", "field not found".to_string()));
        }
        if !seen_version {
            return Err(Error::type_mismatch("Version", "field not found".to_string()));
        }
        if !seen_arch {
            return Err(Error::type_mismatch(
                "Architecture",
                "field not found".to_string(),
            ));
        }
        Ok(pkg)
    }

    fn write_to(&self, out: &mut String) {
        write_field(out, "Package", &self.name);
        write_field(out, "Source", &self.source);
        write_field(out, "Version", &self.version.to_string());
        if let Some(installed_size) = self.installed_size {
            write_field(out, "Installed-Size", &installed_size.to_string());
        }
        write_field(out, "Maintainer", &self.maintainer);
        write_field(out, "Architecture", &self.architecture.to_string());
        write_field(out, "Replaces", &self.replaces.to_string());
        write_field(out, "Breaks", &self.breaks.to_string());
        write_field(out, "Provides", &self.provides.to_string());
        write_field(out, "Conflicts", &self.conflicts.to_string());
        write_field(out, "Enhances", &self.enhances.to_string());
        write_field(out, "Depends", &self.depends.to_string());
        write_field(out, "Recommends", &self.recommends.to_string());
        write_field(out, "Suggests", &self.suggests.to_string());
        write_field(out, "Pre-Depends", &self.pre_depends.to_string());
        write_field(out, "Description", &self.description);
        write_field(out, "Homepage", &self.homepage);
        write_field(out, "Tag", &self.tags.join(", "));
        write_field(out, "Section", &self.section);
        if self.essential {
            write_field(out, "Essential", "yes");
        }
        if self.priority != Priority::Unknown {
            write_field(out, "Priority", &self.priority.to_string());
        }
        write_field(out, "Filename", &self.filename);
        if let Some(size) = self.size {
            write_field(out, "Size", &size.to_string());
        }
        write_field(out, "SHA256", &self.sha256);
    }
}
