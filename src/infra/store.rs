use std::collections::BTreeMap;

/// Generic key/value scratch space.
pub trait Store<T> {
    fn get(&self, key: &str) -> Option<&T>;

    fn set(&mut self, key: &str, value: T);

    fn delete(&mut self, key: &str) -> Option<T>;

    fn clear(&mut self);
}

/// In-memory [`Store`] with ordered keys.
#[derive(Debug, Clone)]
pub struct InMemoryStore<T> {
    data: BTreeMap<String, T>,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> for InMemoryStore<T> {
    fn get(&self, key: &str) -> Option<&T> {
        self.data.get(key)
    }

    fn set(&mut self, key: &str, value: T) {
        self.data.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) -> Option<T> {
        self.data.remove(key)
    }

    fn clear(&mut self) {
        self.data.clear();
    }
}
