//! Archive sources: resolving a configured repository URL to its signed
//! release and downloadable package indices.

use {
    crate::{
        arch::Arch,
        comp::decompress,
        control::Decoder,
        error::{Error, Result},
        hash::{Digest, HashingReader},
        keyring::KeyRing,
        packages::Package,
        release::{FileHash, Release},
        transport::TransportProvider,
    },
    serde::{Deserialize, Serialize},
    sha2::Sha256,
    std::collections::HashMap,
    std::io,
    tracing::{debug, warn},
    url::Url,
};

fn default_distribution() -> String {
    "stable".to_string()
}

fn default_components() -> Vec<String> {
    vec!["main".to_string()]
}

/// One `sources:` entry of a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SourceConfig {
    /// Base URL of the archive.
    pub url: String,
    /// Public key bundle used to verify the archive, as an `http(s)` URL
    /// or a filesystem path.
    pub signed_by: String,
    /// Distribution name (`bookworm`) or class (`stable`).
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default = "default_components")]
    pub components: Vec<String>,
}

/// A configured archive with its keyring loaded.
pub struct Source {
    url: String,
    distribution: String,
    components: Vec<String>,
    keyring: KeyRing,
}

impl Source {
    pub async fn new<T: TransportProvider + ?Sized>(
        transport: &T,
        config: SourceConfig,
    ) -> Result<Self> {
        Url::parse(&config.url)?;
        let keyring = KeyRing::load(transport, &config.signed_by).await?;
        let distribution = if config.distribution.is_empty() {
            default_distribution()
        } else {
            config.distribution
        };
        let components = if config.components.is_empty() {
            default_components()
        } else {
            config.components
        };
        Ok(Source {
            url: config.url,
            distribution,
            components,
            keyring,
        })
    }

    /// Fetches and verifies the distribution's `InRelease` and expands it
    /// into one [`Component`] per (component, matching architecture).
    pub async fn components<T: TransportProvider + ?Sized>(
        &self,
        transport: &T,
        target: &Arch,
    ) -> Result<Vec<Component>> {
        let base = self.url.trim_end_matches('/');
        let url = format!("{}/dists/{}/InRelease", base, self.distribution);
        debug!(%url, "fetching release index");
        let body = transport.open(&url).await?;
        let mut decoder = Decoder::read(body, &self.keyring).await?;
        decoder.ensure_signed()?;
        let release: Release = decoder
            .decode()?
            .ok_or_else(|| Error::MalformedHeader("empty InRelease".to_string()))?;

        let architectures: Vec<&Arch> = release
            .architectures
            .iter()
            .filter(|a| a.is_all() || a.matches(target))
            .collect();
        if architectures.is_empty() {
            warn!("no architectures available");
            return Ok(Vec::new());
        }

        let available: Vec<&str> = release
            .components
            .iter()
            .map(String::as_str)
            .filter(|c| *c == "main" || self.components.iter().any(|want| want.as_str() == *c))
            .collect();
        if available.is_empty() {
            warn!("no components available");
            return Ok(Vec::new());
        }

        let mut components = Vec::new();
        for component in available.iter().copied() {
            for arch in architectures.iter().copied() {
                let component_dir = format!("{}/binary-{}", basename(component), arch);
                let prefix = format!("{}/", component_dir);
                let sha256: HashMap<String, FileHash> = release
                    .sha256
                    .iter()
                    .filter(|fh| fh.path.starts_with(&prefix))
                    .map(|fh| (fh.path[prefix.len()..].to_string(), fh.clone()))
                    .collect();
                components.push(Component {
                    name: component.to_string(),
                    arch: arch.clone(),
                    url: format!(
                        "{}/dists/{}/{}/binary-{}",
                        base, self.distribution, component, arch
                    ),
                    sha256,
                    source_url: base.to_string(),
                    keyring: self.keyring.clone(),
                });
            }
        }
        Ok(components)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A named slice of an archive for one architecture, scoped to the subset
/// of the release's SHA-256 table under its directory.
#[derive(Debug)]
pub struct Component {
    pub name: String,
    pub arch: Arch,
    /// Base URL of the `binary-<arch>` directory.
    pub url: String,
    /// Release SHA-256 entries keyed by path relative to [`Self::url`].
    pub sha256: HashMap<String, FileHash>,
    source_url: String,
    keyring: KeyRing,
}

const PACKAGES_CANDIDATES: [&str; 3] = ["Packages.xz", "Packages.gz", "Packages"];

impl Component {
    /// Downloads and decodes this component's package list, trying each
    /// candidate index file in order and verifying its digest against the
    /// release.
    pub async fn packages<T: TransportProvider + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<Vec<Package>> {
        let mut attempts = Vec::new();
        for name in PACKAGES_CANDIDATES {
            let url = format!("{}/{}", self.url, name);
            match self.try_packages(transport, &url, name).await {
                Ok(packages) => return Ok(packages),
                Err(err) => {
                    debug!(%url, %err, "packages candidate failed");
                    attempts.push((url, err.to_string()));
                }
            }
        }
        Err(Error::PackagesUnavailable(attempts))
    }

    async fn try_packages<T: TransportProvider + ?Sized>(
        &self,
        transport: &T,
        url: &str,
        name: &str,
    ) -> Result<Vec<Package>> {
        let expected = self.sha256.get(name).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no release SHA256 entry for {}", name),
            ))
        })?;
        let expected = Digest::<Sha256>::try_from(expected.digest.as_str())?;

        let body = transport.open(url).await?;
        let hashed = HashingReader::<Sha256, _>::new(body);
        let digest = hashed.handle();
        let reader = decompress(hashed).await?;
        let mut decoder = Decoder::read(reader, &self.keyring).await?;
        let packages: Vec<Package> = decoder.decode_all()?;
        digest.verify(&expected)?;

        let base = self.source_url.trim_end_matches('/');
        Ok(packages
            .into_iter()
            .map(|mut pkg| {
                if !pkg.filename.is_empty() {
                    pkg.urls.push(format!("{}/{}", base, pkg.filename));
                }
                pkg
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{mirror, FakeTransport, MIRROR_URL};

    fn config() -> SourceConfig {
        SourceConfig {
            url: format!("{}/debian", MIRROR_URL),
            signed_by: format!("{}/archive-key.asc", MIRROR_URL),
            distribution: "stable".to_string(),
            components: vec!["main".to_string()],
        }
    }

    async fn fixture_source(transport: &FakeTransport) -> Source {
        Source::new(transport, config()).await.unwrap()
    }

    #[async_std::test]
    async fn test_components() {
        let transport = mirror();
        let source = fixture_source(&transport).await;
        let components = source
            .components(&transport, &Arch::must_parse("amd64"))
            .await
            .unwrap();
        assert_eq!(components.len(), 2);
        assert!(components
            .iter()
            .all(|component| component.name == "main"));
        let arches: Vec<String> = components.iter().map(|c| c.arch.to_string()).collect();
        assert_eq!(arches, vec!["all", "amd64"]);
        let amd64 = &components[1];
        assert_eq!(
            amd64.url,
            format!("{}/debian/dists/stable/main/binary-amd64", MIRROR_URL)
        );
        assert!(amd64.sha256.contains_key("Packages.gz"));
        assert!(amd64.sha256.contains_key("Packages"));
        assert!(!amd64.sha256.contains_key("main/binary-amd64/Packages.gz"));
    }

    #[async_std::test]
    async fn test_components_filters_architectures() {
        let transport = mirror();
        let source = fixture_source(&transport).await;
        let components = source
            .components(&transport, &Arch::must_parse("arm64"))
            .await
            .unwrap();
        // arm64 is not listed in the release; only `all` remains
        assert_eq!(components.len(), 1);
        assert!(components[0].arch.is_all());
    }

    #[async_std::test]
    async fn test_unsigned_release_rejected() {
        let mut transport = mirror();
        transport.insert(
            format!("{}/debian/dists/stable/InRelease", MIRROR_URL),
            b"Origin: Test\nSuite: stable\n".to_vec(),
        );
        let source = fixture_source(&transport).await;
        let err = source
            .components(&transport, &Arch::must_parse("amd64"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureMissing));
    }

    #[async_std::test]
    async fn test_tampered_release_rejected() {
        let mut transport = mirror();
        let tampered = String::from_utf8(crate::testutil::INRELEASE.to_vec())
            .unwrap()
            .replace("Origin: Test", "Origin: Evil");
        transport.insert(
            format!("{}/debian/dists/stable/InRelease", MIRROR_URL),
            tampered.into_bytes(),
        );
        let source = fixture_source(&transport).await;
        let err = source
            .components(&transport, &Arch::must_parse("amd64"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
    }

    #[async_std::test]
    async fn test_packages() {
        let transport = mirror();
        let source = fixture_source(&transport).await;
        let components = source
            .components(&transport, &Arch::must_parse("amd64"))
            .await
            .unwrap();
        // the .xz candidate 404s, the .gz one decodes and verifies
        let packages = components[1].packages(&transport).await.unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "hello");
        assert_eq!(
            packages[0].urls,
            vec![format!(
                "{}/debian/pool/main/h/hello/hello_2.10-3_amd64.deb",
                MIRROR_URL
            )]
        );
        let empty = components[0].packages(&transport).await.unwrap();
        assert!(empty.is_empty());
    }

    #[async_std::test]
    async fn test_packages_hash_mismatch_aggregates() {
        let transport = mirror();
        let source = fixture_source(&transport).await;
        let mut components = source
            .components(&transport, &Arch::must_parse("amd64"))
            .await
            .unwrap();
        let component = &mut components[1];
        for fh in component.sha256.values_mut() {
            fh.digest =
                "0000000000000000000000000000000000000000000000000000000000000000".to_string();
        }
        let err = component.packages(&transport).await.unwrap_err();
        match err {
            Error::PackagesUnavailable(attempts) => {
                assert_eq!(attempts.len(), 3);
                assert!(attempts[1].1.contains("digest mismatch"));
            }
            other => panic!("expected PackagesUnavailable, got {:?}", other),
        }
    }
}
