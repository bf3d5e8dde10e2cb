//! Declarative selection of a Debian-family base system.
//!
//! Given a recipe naming archive sources and a package set, this crate
//! downloads and cryptographically verifies the archive indices, assembles
//! a database of candidate packages, resolves transitive dependencies
//! (virtual packages and versioned constraints included) and returns the
//! closed, version-pinned set of concrete packages satisfying the request.
//!
//! Producing installable artifacts from the selection, on-disk caching and
//! any user interface are out of scope; HTTP access is abstracted behind
//! [`TransportProvider`] so callers can inject their own.

mod arch;
mod clearsign;
mod comp;
mod control;
mod db;
mod error;
mod hash;
mod keyring;
mod packages;
mod recipe;
mod relation;
mod release;
mod resolver;
mod source;
#[cfg(test)]
mod testutil;
mod transport;
mod version;

pub use {
    arch::{Arch, DEFAULT_ARCH},
    comp::decompress,
    control::{
        ControlField, ControlFile, ControlParser, ControlStanza, Decoder, Encoder, Paragraph,
    },
    db::PackageDb,
    error::{Error, Result},
    hash::{Digest, DigestHandle, HashingReader},
    keyring::KeyRing,
    packages::{Package, Priority},
    recipe::{load, select, Contents, Recipe, API_VERSION, KIND},
    relation::{
        ArchConstraint, Dependency, Operator, Possibility, Relation, Relations, VersionConstraint,
    },
    release::{FileHash, Release},
    resolver::{Request, Resolver},
    source::{Component, Source, SourceConfig},
    transport::{HttpTransport, TransportProvider},
    version::Version,
};
