//! Transitive dependency closure and version selection.
//!
//! The strategy is deliberately greedy: gather every candidate reachable
//! from the requests, prune entries whose dependencies cannot be satisfied
//! from the candidate set itself, keep the highest version per name, prune
//! again, and confirm the requests survived. Conflict-aware optimisation is
//! out of scope.

use {
    crate::{
        db::PackageDb,
        error::{Error, Result},
        packages::{Package, Priority},
        relation::{Operator, Relation},
        version::Version,
    },
    std::collections::{HashMap, HashSet, VecDeque},
    tracing::debug,
};

/// One requested package: a name, optionally pinned to an exact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub name: String,
    pub version: Option<Version>,
}

impl Request {
    /// Parses `name` or `name=version`.
    pub fn parse(src: &str) -> Result<Self> {
        match src.split_once('=') {
            Some((name, version)) => Ok(Request {
                name: name.to_string(),
                version: Some(Version::parse(version)?),
            }),
            None => Ok(Request {
                name: src.to_string(),
                version: None,
            }),
        }
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}={}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Resolves package requests against a pool database.
pub struct Resolver<'a> {
    pool: &'a PackageDb,
}

impl<'a> Resolver<'a> {
    pub fn new(pool: &'a PackageDb) -> Self {
        Self { pool }
    }

    /// Computes the version-pinned closure of the requests and returns it
    /// as a new database.
    pub fn resolve<S: AsRef<str>>(&self, requests: &[S]) -> Result<PackageDb> {
        let mut requested: HashMap<String, Option<Version>> = HashMap::new();
        let candidates = PackageDb::new();

        for request in requests {
            let request = Request::parse(request.as_ref())?;
            match &request.version {
                Some(version) => {
                    let pkg = self
                        .pool
                        .exactly_equal(&request.name, version)
                        .ok_or_else(|| Error::NotFound(request.to_string()))?;
                    candidates.add(pkg);
                }
                None => {
                    let found = self.pool.get(&request.name);
                    if found.is_empty() {
                        return Err(Error::NotFound(request.to_string()));
                    }
                    candidates.add_all(found);
                }
            }
            requested.insert(request.name, request.version);
        }

        debug!(count = candidates.len(), "found initial candidates");
        debug!("building dependency tree");

        let mut queue: VecDeque<Package> = candidates.snapshot().into();
        let mut visited: HashSet<String> = HashSet::new();
        while let Some(pkg) = queue.pop_front() {
            if !visited.insert(pkg.id()) {
                continue;
            }
            let deps = self.dependencies_of(self.pool, &candidates, &pkg)?;
            for dep in deps {
                if !visited.contains(&dep.id()) {
                    candidates.add(dep.clone());
                    queue.push_back(dep);
                }
            }
        }

        debug!("pruning candidates with unsatisfiable dependencies");
        self.prune_unsatisfied(&candidates);

        // Keep the newest version of every name that was not pinned. When
        // several architectures of one name+version survive, the first in
        // database order wins.
        debug!("selecting newest version of each package");
        let selected = PackageDb::new();
        for pkg in candidates.snapshot() {
            if let Some(Some(pinned)) = requested.get(&pkg.name) {
                if pkg.version.cmp(pinned) == std::cmp::Ordering::Equal {
                    selected.add(pkg);
                }
                continue;
            }
            let existing = selected.get(&pkg.name);
            if let Some(first) = existing.first() {
                if pkg.version.cmp(&first.version) == std::cmp::Ordering::Greater {
                    selected.remove(first);
                    selected.add(pkg);
                }
            } else {
                selected.add(pkg);
            }
        }

        self.prune_unsatisfied(&selected);

        debug!("confirming requested packages are still selected");
        for (name, version) in &requested {
            let dropped = match version {
                Some(version) => selected.exactly_equal(name, version).is_none(),
                None => selected.get(name).is_empty(),
            };
            if dropped {
                let request = Request {
                    name: name.clone(),
                    version: version.clone(),
                };
                return Err(Error::RequestedPackageDropped(request.to_string()));
            }
        }

        Ok(selected)
    }

    /// Iteratively removes candidates whose dependencies cannot be
    /// resolved using the candidate set itself as the pool.
    fn prune_unsatisfied(&self, candidates: &PackageDb) {
        loop {
            let mut prune = Vec::new();
            for pkg in candidates.snapshot() {
                if let Err(err) = self.dependencies_of(candidates, candidates, &pkg) {
                    debug!(name = %pkg.name, version = %pkg.version, %err, "pruning unsatisfiable candidate");
                    prune.push(pkg);
                }
            }
            if prune.is_empty() {
                break;
            }
            for pkg in &prune {
                candidates.remove(pkg);
            }
        }
    }

    /// Resolves the `Pre-Depends` and `Depends` relations of one package
    /// to concrete packages out of `pool`.
    fn dependencies_of(
        &self,
        pool: &PackageDb,
        candidates: &PackageDb,
        pkg: &Package,
    ) -> Result<Vec<Package>> {
        let mut out = Vec::new();
        let relations = pkg
            .pre_depends
            .relations
            .iter()
            .chain(pkg.depends.relations.iter());

        for relation in relations {
            let mut satisfied = false;
            for possi in &relation.possibilities {
                // `<<` and `>>` widen to `<=`/`>=` here; pruning narrows
                // the overshoot later
                let found = match &possi.version {
                    Some(vc) => match vc.operator {
                        Operator::StrictlyEarlier | Operator::EarlierOrEqual => {
                            pool.earlier_or_equal(&possi.name, &vc.version)
                        }
                        Operator::Exactly => pool
                            .exactly_equal(&possi.name, &vc.version)
                            .into_iter()
                            .collect(),
                        Operator::LaterOrEqual | Operator::StrictlyLater => {
                            pool.later_or_equal(&possi.name, &vc.version)
                        }
                    },
                    None => pool.get(&possi.name),
                };

                let mut resolved = Vec::new();
                for found_pkg in found {
                    if found_pkg.is_virtual {
                        match self.resolve_virtual(pool, candidates, &found_pkg) {
                            Ok(provider) => resolved.push(provider),
                            Err(err) => {
                                debug!(name = %found_pkg.name, %err, "failed to resolve virtual package");
                            }
                        }
                    } else {
                        resolved.push(found_pkg);
                    }
                }

                if !resolved.is_empty() {
                    out.extend(resolved);
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Err(Error::UnsatisfiableDependency(unsatisfied(relation, pkg)));
            }
        }
        Ok(out)
    }

    /// Picks the concrete provider standing behind a virtual entry.
    fn resolve_virtual(
        &self,
        pool: &PackageDb,
        candidates: &PackageDb,
        virt: &Package,
    ) -> Result<Package> {
        let providers: Vec<Package> = virt
            .providers
            .iter()
            .filter_map(|p| pool.exactly_equal(&p.name, &p.version))
            .collect();

        match providers.len() {
            0 => Err(Error::UnsatisfiableDependency(virt.name.clone())),
            1 => Ok(providers.into_iter().next().expect("one provider")),
            _ => {
                // prefer a provider that is already part of the selection
                if let Some(selected) = providers
                    .iter()
                    .find(|p| candidates.exactly_equal(&p.name, &p.version).is_some())
                {
                    return Ok(selected.clone());
                }
                if let Some(required) = providers
                    .iter()
                    .find(|p| p.priority == Priority::Required)
                {
                    return Ok(required.clone());
                }
                Err(Error::AmbiguousVirtual(virt.name.clone()))
            }
        }
    }
}

fn unsatisfied(relation: &Relation, pkg: &Package) -> String {
    format!("{} (required by {})", relation, pkg.name)
}
