//! Recipe documents and the end-to-end loading pipeline.

use {
    crate::{
        arch::Arch,
        db::PackageDb,
        error::{Error, Result},
        resolver::Resolver,
        source::{Component, Source, SourceConfig},
        transport::TransportProvider,
    },
    futures::{
        io::{AsyncRead, AsyncReadExt},
        stream::{self, StreamExt, TryStreamExt},
    },
    serde::{Deserialize, Serialize},
    tracing::debug,
};

pub const API_VERSION: &str = "debforge/v1alpha1";
pub const KIND: &str = "Recipe";

/// The declarative input document: where to fetch packages from and which
/// packages the selection must contain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Recipe {
    pub api_version: String,
    pub kind: String,
    pub contents: Contents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Contents {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Requested packages, `name` or `name=version`.
    #[serde(default)]
    pub packages: Vec<String>,
}

impl Recipe {
    const MAX_SIZE: u64 = 8 * 1024 * 1024;

    pub fn from_yaml(text: &str) -> Result<Self> {
        let recipe: Recipe = serde_yaml::from_str(text)?;
        if recipe.api_version != API_VERSION {
            return Err(Error::UnsupportedApiVersion(recipe.api_version));
        }
        if recipe.kind != KIND {
            return Err(Error::UnsupportedKind(recipe.kind));
        }
        Ok(recipe)
    }

    pub async fn read<R: AsyncRead + Unpin + Send>(r: R) -> Result<Self> {
        let mut text = String::new();
        r.take(Self::MAX_SIZE).read_to_string(&mut text).await?;
        Self::from_yaml(&text)
    }
}

/// Builds the merged candidate database for a recipe: sources are expanded
/// to components concurrently, then every component's package list is
/// fetched and merged, at most `limit` downloads in flight. The first
/// failure cancels the outstanding peers.
pub async fn load<T: TransportProvider>(
    transport: &T,
    recipe: &Recipe,
    target: &Arch,
    limit: usize,
) -> Result<PackageDb> {
    let components: Vec<Component> = stream::iter(recipe.contents.sources.iter().cloned())
        .map(|config| async move {
            let source = Source::new(transport, config).await?;
            source.components(transport, target).await
        })
        .buffer_unordered(limit.max(1))
        .try_collect::<Vec<Vec<Component>>>()
        .await?
        .into_iter()
        .flatten()
        .collect();

    debug!(count = components.len(), "enumerated components");

    let db = PackageDb::new();
    stream::iter(components)
        .map(|component| {
            let db = &db;
            async move {
                let packages = component.packages(transport).await?;
                debug!(
                    component = %component.name,
                    arch = %component.arch,
                    count = packages.len(),
                    "loaded packages"
                );
                db.add_all(packages);
                Ok::<_, Error>(())
            }
        })
        .buffer_unordered(limit.max(1))
        .try_collect::<Vec<()>>()
        .await?;

    Ok(db)
}

/// Loads the recipe's sources and resolves its package requests, returning
/// the selected closure.
pub async fn select<T: TransportProvider>(
    transport: &T,
    recipe: &Recipe,
    target: &Arch,
    limit: usize,
) -> Result<PackageDb> {
    let db = load(transport, recipe, target, limit).await?;
    debug!(count = db.len(), "loaded package database");
    Resolver::new(&db).resolve(&recipe.contents.packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{mirror, MIRROR_URL};

    fn fixture_yaml() -> String {
        format!(
            "\
apiVersion: debforge/v1alpha1
kind: Recipe
contents:
  sources:
    - url: {url}/debian
      signedBy: {url}/archive-key.asc
  packages:
    - hello
",
            url = MIRROR_URL
        )
    }

    #[test]
    fn test_from_yaml_defaults() {
        let recipe = Recipe::from_yaml(&fixture_yaml()).unwrap();
        assert_eq!(recipe.api_version, API_VERSION);
        let source = &recipe.contents.sources[0];
        assert_eq!(source.distribution, "stable");
        assert_eq!(source.components, vec!["main"]);
        assert_eq!(recipe.contents.packages, vec!["hello"]);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_versions() {
        let text = fixture_yaml().replace("debforge/v1alpha1", "debforge/v2");
        assert!(matches!(
            Recipe::from_yaml(&text),
            Err(Error::UnsupportedApiVersion(_))
        ));
        let text = fixture_yaml().replace("kind: Recipe", "kind: Blueprint");
        assert!(matches!(
            Recipe::from_yaml(&text),
            Err(Error::UnsupportedKind(_))
        ));
        assert!(Recipe::from_yaml("not yaml: [").is_err());
    }

    #[async_std::test]
    async fn test_read_bounded() {
        let recipe = Recipe::read(futures::io::Cursor::new(fixture_yaml().into_bytes()))
            .await
            .unwrap();
        assert_eq!(recipe.contents.sources.len(), 1);
    }

    #[async_std::test]
    async fn test_load_and_select() {
        let transport = mirror();
        let recipe = Recipe::from_yaml(&fixture_yaml()).unwrap();
        let target = Arch::must_parse("amd64");

        let db = load(&transport, &recipe, &target, 4).await.unwrap();
        assert_eq!(db.concrete().len(), 2);

        let selected = select(&transport, &recipe, &target, 4).await.unwrap();
        let names: Vec<String> = selected
            .concrete()
            .iter()
            .map(|p| format!("{}={}", p.name, p.version))
            .collect();
        assert_eq!(names, vec!["hello=2.10-3", "libgreet=1.2-1"]);
    }

    #[async_std::test]
    async fn test_load_fails_fast_on_missing_source() {
        let transport = mirror();
        let mut recipe = Recipe::from_yaml(&fixture_yaml()).unwrap();
        recipe.contents.sources.push(SourceConfig {
            url: format!("{}/missing", MIRROR_URL),
            signed_by: format!("{}/archive-key.asc", MIRROR_URL),
            distribution: "stable".to_string(),
            components: vec!["main".to_string()],
        });
        let target = Arch::must_parse("amd64");
        assert!(load(&transport, &recipe, &target, 4).await.is_err());
    }
}
