use crate::{
    cell::{SharedCell, StateCell},
    InstanceId,
};
use std::{collections::HashMap, fmt::Debug, rc::Rc};

/// The mapping held in the cell behind a [Store].
pub type Db<T> = HashMap<String, T>;

/// A key-value store, with every record held in one [StateCell].
///
/// All operations are total: an unknown key reads as `None`, and
/// deleting it does nothing. Cloning a [Store] produces another handle
/// to the same cell, not a copy of the records.
pub struct Store<T> {
    id: Option<InstanceId>,
    cell: Rc<dyn StateCell<Db<T>>>,
}

impl<T: Clone + 'static> Store<T> {
    /// Create a new, empty [Store] backed by its own [SharedCell].
    pub fn new() -> Self {
        Self::with_cell(Rc::new(SharedCell::new(Db::new())))
    }

    /// Create a [Store] over an existing cell. Any records already in
    /// the cell are visible through the store, and two stores given
    /// the same cell share their records.
    pub fn with_cell(cell: Rc<dyn StateCell<Db<T>>>) -> Self {
        Self { id: None, cell }
    }
}

impl<T: Clone> Store<T> {
    pub(crate) fn with_id(mut self, id: InstanceId) -> Self {
        self.id = Some(id);
        self
    }

    /// The id allocated to this store, if it was created by a
    /// [Registry](crate::Registry).
    pub fn id(&self) -> Option<InstanceId> {
        self.id
    }

    /// Remove every record.
    pub fn clear(&self) {
        // Held until after the cell is released, whatever the cell
        // implementation, so the records drop outside of it.
        let previous = self.cell.get();
        self.cell.set(Db::new());
        drop(previous);
    }

    /// Get a copy of the value stored at `key`.
    pub fn get(&self, key: &str) -> Option<T> {
        self.cell.get().get(key).cloned()
    }

    /// Insert `value` at `key`, replacing any previous value.
    pub fn set<K: Into<String>>(&self, key: K, value: T) {
        let key = key.into();
        let mut value = Some(value);
        let mut replaced = None;
        self.cell.update(&mut |db| {
            if let Some(value) = value.take() {
                replaced = db.insert(key.clone(), value);
            }
        });
        drop(replaced);
    }

    /// Remove the value stored at `key`, if there is one.
    pub fn delete(&self, key: &str) {
        if !self.contains_key(key) {
            return;
        }

        let mut removed = None;
        self.cell.update(&mut |db| {
            removed = db.remove(key);
        });
        drop(removed);
    }

    /// Returns `true` if there is a value stored at `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.cell.get().contains_key(key)
    }

    /// The number of records in this store.
    pub fn len(&self) -> usize {
        self.cell.get().len()
    }

    /// Returns `true` if this store holds no records.
    pub fn is_empty(&self) -> bool {
        self.cell.get().is_empty()
    }

    /// The keys currently present, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.cell.get().keys().cloned().collect()
    }

    /// Modify the records in place through the backing cell. Values
    /// removed by `f` must be moved out of it and dropped afterwards.
    pub(crate) fn update(&self, f: &mut dyn FnMut(&mut Db<T>)) {
        self.cell.update(f);
    }

    /// A snapshot of every record, unaffected by later modifications.
    pub fn snapshot(&self) -> Rc<Db<T>> {
        self.cell.get()
    }
}

impl<T: Clone + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: self.cell.clone(),
        }
    }
}

impl<T: Clone + Debug> Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("records", &*self.cell.get())
            .finish()
    }
}

#[cfg(feature = "serde")]
impl<T: Clone + serde::Serialize> serde::Serialize for Store<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.cell.get().iter())
    }
}

#[cfg(test)]
mod tests {
    use crate::{cell::SharedCell, Db, Store};
    use std::rc::Rc;

    #[test]
    fn get_missing_key() {
        let store: Store<&str> = Store::new();
        assert_eq!(None, store.get("newKey"));
    }

    #[test]
    fn get_after_set() {
        let store = Store::new();
        store.set("fooKey", "barValue");
        assert_eq!(Some("barValue"), store.get("fooKey"));

        store.set("fooKey", "kira");
        assert_eq!(Some("kira"), store.get("fooKey"));
        assert_eq!(1, store.len());
    }

    #[test]
    fn get_after_delete() {
        let store = Store::new();
        store.set("fooKey", "barValue");
        assert_eq!(Some("barValue"), store.get("fooKey"));

        store.delete("fooKey");
        assert_eq!(None, store.get("fooKey"));
        assert!(!store.contains_key("fooKey"));
    }

    #[test]
    fn delete_missing_key() {
        let store = Store::new();
        store.set("fooKey", 1);
        store.delete("otherKey");
        assert_eq!(Some(1), store.get("fooKey"));
    }

    #[test]
    fn get_after_clear() {
        let store = Store::new();
        store.set("fooKey", "barValue");
        store.set("bazKey", "quxValue");
        store.clear();

        assert_eq!(None, store.get("fooKey"));
        assert_eq!(None, store.get("bazKey"));
        assert!(store.is_empty());
    }

    #[test]
    fn clear_does_not_clear_another_store() {
        let store = Store::new();
        let store2: Store<&str> = Store::new();
        store.set("fooKey", "barValue");
        store2.clear();
        store2.delete("fooKey");
        assert_eq!(Some("barValue"), store.get("fooKey"));
    }

    #[test]
    fn null_like_values_are_not_absent() {
        let store: Store<Option<i32>> = Store::new();
        store.set("fooKey", None);
        assert_eq!(Some(None), store.get("fooKey"));
        assert_eq!(None, store.get("barKey"));
    }

    #[test]
    fn injected_cell_is_shared() {
        let cell = Rc::new(SharedCell::new(Db::<i32>::new()));
        let store: Store<i32> = Store::with_cell(cell.clone());
        let other: Store<i32> = Store::with_cell(cell);

        store.set("fooKey", 1);
        assert_eq!(Some(1), other.get("fooKey"));
    }

    #[test]
    fn snapshot_is_unaffected_by_writes() {
        let store = Store::new();
        store.set("fooKey", 1);
        let snapshot = store.snapshot();
        store.set("fooKey", 2);
        store.set("barKey", 3);

        assert_eq!(Some(&1), snapshot.get("fooKey"));
        assert_eq!(1, snapshot.len());
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(vec!["barKey", "fooKey"], keys);
    }

    /// Reads the store it was stored in when dropped.
    struct Guard(Store<Rc<Guard>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let _ = self.0.get("otherKey");
        }
    }

    #[test]
    fn removed_values_may_read_store_when_dropped() {
        let store: Store<Rc<Guard>> = Store::new();
        store.set("fooKey", Rc::new(Guard(store.clone())));
        store.set("fooKey", Rc::new(Guard(store.clone())));
        store.delete("fooKey");

        store.set("fooKey", Rc::new(Guard(store.clone())));
        store.clear();
        assert!(store.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_as_map() {
        let store = Store::new();
        store.set("fooKey", "barValue");
        assert_eq!(
            serde_json::json!({ "fooKey": "barValue" }),
            serde_json::to_value(&store).unwrap()
        );
    }
}
