//! The in-memory package database.
//!
//! An ordered multi-index over [`Package`] keyed by (name, version,
//! architecture), with virtual-package fan-out: inserting a package that
//! `Provides` a name maintains a synthetic entry for that name listing all
//! current providers.

use {
    crate::{arch::Arch, packages::Package, version::Version},
    std::{
        cmp::Ordering,
        collections::BTreeMap,
        sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    },
};

#[derive(Debug, Clone)]
struct EntryKey {
    version: Version,
    arch: Arch,
    arch_name: String,
}

impl EntryKey {
    fn of(pkg: &Package) -> Self {
        EntryKey {
            version: pkg.version.clone(),
            arch: pkg.architecture.clone(),
            arch_name: pkg.architecture.to_string(),
        }
    }

    fn of_virtual(name_version: Version) -> Self {
        EntryKey {
            version: name_version,
            arch: Arch::unspecified(),
            arch_name: String::new(),
        }
    }
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version).then_with(|| {
            // matching architectures collapse to equality so that
            // `all`/`any` variants of one name+version de-duplicate
            if self.arch.matches(&other.arch) {
                Ordering::Equal
            } else {
                self.arch_name.cmp(&other.arch_name)
            }
        })
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntryKey {}

type Entries = BTreeMap<EntryKey, Package>;

/// An ordered, internally synchronised package database.
///
/// Mutations take the exclusive lock, queries the shared one; iteration
/// yields entries in (name, version, architecture) order.
#[derive(Debug, Default)]
pub struct PackageDb {
    inner: RwLock<BTreeMap<String, Entries>>,
}

impl PackageDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entries>> {
        self.inner.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entries>> {
        self.inner.write().unwrap_or_else(|err| err.into_inner())
    }

    /// Total number of entries, virtual ones included.
    pub fn len(&self) -> usize {
        self.read().values().map(Entries::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.read().values().all(Entries::is_empty)
    }

    pub fn add(&self, pkg: Package) {
        add_locked(&mut self.write(), pkg);
    }

    pub fn add_all<I: IntoIterator<Item = Package>>(&self, packages: I) {
        let mut inner = self.write();
        for pkg in packages {
            add_locked(&mut inner, pkg);
        }
    }

    pub fn remove(&self, pkg: &Package) {
        remove_locked(&mut self.write(), pkg);
    }

    /// Visits every entry in database order while holding the shared lock.
    pub fn for_each<F: FnMut(&Package)>(&self, mut f: F) {
        let inner = self.read();
        for entries in inner.values() {
            for pkg in entries.values() {
                f(pkg);
            }
        }
    }

    /// Clones every entry in database order.
    pub fn snapshot(&self) -> Vec<Package> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|pkg| out.push(pkg.clone()));
        out
    }

    /// Clones every concrete (non-virtual) entry in database order.
    pub fn concrete(&self) -> Vec<Package> {
        let mut out = Vec::new();
        self.for_each(|pkg| {
            if !pkg.is_virtual {
                out.push(pkg.clone());
            }
        });
        out
    }

    /// All entries named `name`, virtual ones included.
    pub fn get(&self, name: &str) -> Vec<Package> {
        self.read()
            .get(name)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    fn get_filtered<F: Fn(&Package) -> bool>(&self, name: &str, keep: F) -> Vec<Package> {
        self.read()
            .get(name)
            .map(|entries| entries.values().filter(|p| keep(p)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn strictly_earlier(&self, name: &str, version: &Version) -> Vec<Package> {
        self.get_filtered(name, |p| p.version.cmp(version) == Ordering::Less)
    }

    pub fn earlier_or_equal(&self, name: &str, version: &Version) -> Vec<Package> {
        self.get_filtered(name, |p| p.version.cmp(version) != Ordering::Greater)
    }

    pub fn exactly_equal(&self, name: &str, version: &Version) -> Option<Package> {
        self.read().get(name).and_then(|entries| {
            entries
                .values()
                .find(|p| p.version.cmp(version) == Ordering::Equal)
                .cloned()
        })
    }

    pub fn later_or_equal(&self, name: &str, version: &Version) -> Vec<Package> {
        self.get_filtered(name, |p| p.version.cmp(version) != Ordering::Less)
    }

    pub fn strictly_later(&self, name: &str, version: &Version) -> Vec<Package> {
        self.get_filtered(name, |p| p.version.cmp(version) == Ordering::Greater)
    }
}

fn add_locked(map: &mut BTreeMap<String, Entries>, pkg: Package) {
    let provides = pkg.provides.clone();
    let provider = pkg.clone();
    map.entry(pkg.name.clone())
        .or_default()
        .insert(EntryKey::of(&pkg), pkg);

    for relation in &provides.relations {
        for possi in &relation.possibilities {
            let version = possi
                .version
                .as_ref()
                .map(|vc| vc.version.clone())
                .unwrap_or_default();
            let entries = map.entry(possi.name.clone()).or_default();
            let virt = entries
                .entry(EntryKey::of_virtual(version.clone()))
                .or_insert_with(|| Package {
                    name: possi.name.clone(),
                    version,
                    architecture: Arch::unspecified(),
                    is_virtual: true,
                    ..Package::default()
                });
            if !virt
                .providers
                .iter()
                .any(|p| p.cmp_order(&provider) == Ordering::Equal)
            {
                virt.providers.push(provider.clone());
            }
        }
    }
}

fn remove_locked(map: &mut BTreeMap<String, Entries>, pkg: &Package) {
    if let Some(entries) = map.get_mut(&pkg.name) {
        entries.remove(&EntryKey::of(pkg));
        if entries.is_empty() {
            map.remove(&pkg.name);
        }
    }
    for relation in &pkg.provides.relations {
        for possi in &relation.possibilities {
            let version = possi
                .version
                .as_ref()
                .map(|vc| vc.version.clone())
                .unwrap_or_default();
            let key = EntryKey::of_virtual(version);
            let Some(entries) = map.get_mut(&possi.name) else {
                continue;
            };
            let drop_virtual = match entries.get_mut(&key) {
                Some(virt) if virt.is_virtual => {
                    virt.providers.retain(|p| p.cmp_order(pkg) != Ordering::Equal);
                    virt.providers.is_empty()
                }
                _ => false,
            };
            if drop_virtual {
                entries.remove(&key);
            }
            if entries.is_empty() {
                map.remove(&possi.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Dependency;

    fn mk(name: &str, version: &str) -> Package {
        Package {
            name: name.to_string(),
            version: Version::must_parse(version),
            architecture: Arch::must_parse("amd64"),
            ..Package::default()
        }
    }

    fn fixture_db() -> PackageDb {
        let db = PackageDb::new();
        db.add_all([mk("foo", "1.0"), mk("foo", "1.1"), mk("bar", "2.0")]);
        db
    }

    #[test]
    fn test_range_queries() {
        let db = fixture_db();
        assert_eq!(db.len(), 3);

        assert_eq!(db.get("foo").len(), 2);
        assert_eq!(db.get("missing").len(), 0);

        let earlier = db.strictly_earlier("foo", &Version::must_parse("1.1"));
        assert_eq!(earlier.len(), 1);
        assert_eq!(earlier[0].version, Version::must_parse("1.0"));

        assert_eq!(db.earlier_or_equal("foo", &Version::must_parse("1.1")).len(), 2);

        let found = db.exactly_equal("foo", &Version::must_parse("1.0")).unwrap();
        assert_eq!(found.name, "foo");
        assert!(db.exactly_equal("foo", &Version::must_parse("1.2")).is_none());

        let later = db.later_or_equal("foo", &Version::must_parse("1.0"));
        assert_eq!(later.len(), 2);
        assert_eq!(later[0].version, Version::must_parse("1.0"));
        assert_eq!(later[1].version, Version::must_parse("1.1"));

        let strictly = db.strictly_later("foo", &Version::must_parse("1.0"));
        assert_eq!(strictly.len(), 1);
        assert_eq!(strictly[0].version, Version::must_parse("1.1"));
    }

    #[test]
    fn test_add_remove() {
        let db = fixture_db();
        let baz = mk("baz", "3.0");
        db.add(baz.clone());
        assert_eq!(db.len(), 4);
        db.remove(&baz);
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn test_reinsertion_replaces() {
        let db = fixture_db();
        let mut newer = mk("foo", "1.0");
        newer.section = "shells".to_string();
        db.add(newer);
        assert_eq!(db.len(), 3);
        let foo = db.exactly_equal("foo", &Version::must_parse("1.0")).unwrap();
        assert_eq!(foo.section, "shells");
    }

    #[test]
    fn test_arch_collapse() {
        let db = PackageDb::new();
        let mut all = mk("foo", "1.0");
        all.architecture = Arch::all();
        db.add(all);
        db.add(mk("foo", "1.0"));
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_virtual_packages() {
        let db = fixture_db();
        let mut baz = mk("baz", "3.0");
        baz.provides = Dependency::must_parse("bazz");
        db.add(baz.clone());

        let virtuals = db.get("bazz");
        assert_eq!(virtuals.len(), 1);
        assert!(virtuals[0].is_virtual);
        assert_eq!(virtuals[0].name, "bazz");
        assert_eq!(virtuals[0].providers.len(), 1);
        assert_eq!(virtuals[0].providers[0].name, "baz");
        assert_eq!(
            virtuals[0].providers[0].version,
            Version::must_parse("3.0")
        );

        // duplicate insertion does not duplicate the provider
        db.add(baz.clone());
        assert_eq!(db.get("bazz")[0].providers.len(), 1);

        db.remove(&baz);
        assert!(db.get("bazz").is_empty());
    }

    #[test]
    fn test_virtual_versioned_and_shared() {
        let db = PackageDb::new();
        let mut one = mk("mta-one", "1.0");
        one.provides = Dependency::must_parse("mail-transport-agent (= 9)");
        let mut two = mk("mta-two", "2.0");
        two.provides = Dependency::must_parse("mail-transport-agent (= 9)");
        db.add_all([one.clone(), two.clone()]);

        let virtuals = db.get("mail-transport-agent");
        assert_eq!(virtuals.len(), 1);
        assert_eq!(virtuals[0].version, Version::must_parse("9"));
        assert_eq!(virtuals[0].providers.len(), 2);

        db.remove(&one);
        let virtuals = db.get("mail-transport-agent");
        assert_eq!(virtuals.len(), 1);
        assert_eq!(virtuals[0].providers.len(), 1);
        assert_eq!(virtuals[0].providers[0].name, "mta-two");

        db.remove(&two);
        assert!(db.get("mail-transport-agent").is_empty());
    }

    #[test]
    fn test_for_each_ordering() {
        let db = fixture_db();
        let names: Vec<String> = db.snapshot().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["bar", "foo", "foo"]);
        let versions: Vec<String> = db
            .get("foo")
            .iter()
            .map(|p| p.version.to_string())
            .collect();
        assert_eq!(versions, vec!["1.0", "1.1"]);
    }
}
