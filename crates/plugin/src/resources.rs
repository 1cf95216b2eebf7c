use std::sync::Arc;

use pgmount_storage::Driver;

/// Handles exposed as a scalar for one descriptor, or a list for several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resources<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Resources<T> {
    /// `One` for a single item, `Many` otherwise.
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            1 => Self::One(items.remove(0)),
            _ => Self::Many(items),
        }
    }

    pub fn one(&self) -> Option<&T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(_) => None,
        }
    }

    pub fn many(&self) -> Option<&[T]> {
        match self {
            Self::One(_) => None,
            Self::Many(items) => Some(items),
        }
    }

    /// The first handle, whatever the shape.
    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<'a, T> IntoIterator for &'a Resources<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// What the connector produced for one descriptor.
pub struct ConnectionResult<D: Driver> {
    pub pool: D::Pool,
    pub client: Option<D::Client>,
    /// `user@host/database`, for logs only.
    pub identity: String,
}

impl<D: Driver> Clone for ConnectionResult<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            client: self.client.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// The aggregate attached to the host: the driver plus every handle.
///
/// `pool` and `client` mirror the number of descriptors: scalars for one,
/// index-aligned lists for several. `client` is `None` when persistent
/// clients are disabled.
pub struct ExposedResourceSet<D: Driver> {
    pub lib: Arc<D>,
    pub pool: Resources<D::Pool>,
    pub client: Option<Resources<D::Client>>,
    connections: Vec<ConnectionResult<D>>,
}

impl<D: Driver> ExposedResourceSet<D> {
    pub(crate) fn new(lib: Arc<D>, connections: Vec<ConnectionResult<D>>) -> Self {
        let pool = Resources::from_vec(connections.iter().map(|c| c.pool.clone()).collect());
        let client = connections
            .iter()
            .map(|c| c.client.clone())
            .collect::<Option<Vec<_>>>()
            .map(Resources::from_vec);
        Self {
            lib,
            pool,
            client,
            connections,
        }
    }

    /// The resources of the descriptor at `index`, as a single-entry set.
    pub(crate) fn entry(&self, index: usize) -> Option<Self> {
        let connection = self.connections.get(index)?.clone();
        Some(Self::new(self.lib.clone(), vec![connection]))
    }

    pub fn connections(&self) -> &[ConnectionResult<D>] {
        &self.connections
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|c| c.identity.as_str())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_item_is_scalar() {
        let resources = Resources::from_vec(vec!["a"]);
        assert_eq!(resources, Resources::One("a"));
        assert_eq!(resources.one(), Some(&"a"));
        assert_eq!(resources.many(), None);
        assert_eq!(resources.len(), 1);
    }

    #[test]
    fn several_items_keep_order() {
        let resources = Resources::from_vec(vec!["a", "b", "c"]);
        assert_eq!(resources.many(), Some(&["a", "b", "c"][..]));
        assert_eq!(resources.one(), None);
        assert_eq!(resources.get(2), Some(&"c"));
        assert_eq!(resources.first(), Some(&"a"));
        assert_eq!(resources.iter().copied().collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn scalar_reads_as_slice() {
        let resources = Resources::One(7);
        assert_eq!(resources.as_slice(), &[7]);
        assert_eq!(resources.get(1), None);
        assert!(!resources.is_empty());
    }
}
