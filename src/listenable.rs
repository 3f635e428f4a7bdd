use crate::{
    cell::StateCell,
    middleware::{Middleware, Next},
    Callback, Db, InstanceId, Listener, Store,
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
};

/// The record stored for each key of a [ListenableStore]: the current
/// `state`, and the listeners registered on the key in the order they
/// subscribed.
pub struct Listenable<T> {
    state: T,
    listens: Vec<Listener<T>>,
}

impl<T> Listenable<T> {
    /// The current state at this record's key.
    pub fn state(&self) -> &T {
        &self.state
    }

    /// The registered listeners, in subscription order.
    pub fn listeners(&self) -> &[Listener<T>] {
        &self.listens
    }
}

impl<T: Clone> Clone for Listenable<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            listens: self.listens.clone(),
        }
    }
}

impl<T: Debug> Debug for Listenable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listenable")
            .field("state", &self.state)
            .field("listens", &self.listens)
            .finish()
    }
}

/// What happens when a listener panics while being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPolicy {
    /// The panic unwinds out of the store operation which invoked the
    /// listener. Listeners after it are not notified, and a
    /// [set()](ListenableStore::set()) in progress does not write its
    /// value.
    Propagate,
    /// The panic is caught and logged at the `error` level, and the
    /// operation carries on with the next listener. Has no effect when
    /// the crate is built with `panic = "abort"`.
    Isolate,
}

impl Default for ListenerPolicy {
    fn default() -> Self {
        ListenerPolicy::Propagate
    }
}

struct Inner<T> {
    records: Store<Listenable<T>>,
    policy: Cell<ListenerPolicy>,
    middleware: RefCell<Vec<Rc<dyn Middleware<T>>>>,
}

/// A key-value store where listeners can subscribe to the value at a
/// key, and are notified synchronously every time it is
/// [set()](ListenableStore::set()).
///
/// This is a cheap handle: clones refer to the same store.
pub struct ListenableStore<T>(Rc<Inner<T>>);

impl<T: Clone + 'static> ListenableStore<T> {
    /// Create a new, empty [ListenableStore].
    pub fn new() -> Self {
        Self::from_store(Store::new())
    }

    /// Create a [ListenableStore] over an existing cell of records.
    pub fn with_cell(cell: Rc<dyn StateCell<Db<Listenable<T>>>>) -> Self {
        Self::from_store(Store::with_cell(cell))
    }

    pub(crate) fn from_store(records: Store<Listenable<T>>) -> Self {
        Self(Rc::new(Inner {
            records,
            policy: Cell::new(ListenerPolicy::default()),
            middleware: RefCell::new(Vec::new()),
        }))
    }

    /// Set what happens when a listener panics.
    pub fn listener_policy(self, policy: ListenerPolicy) -> Self {
        self.0.policy.set(policy);
        self
    }

    /// The id allocated to this store, if it was created by a
    /// [Registry](crate::Registry).
    pub fn id(&self) -> Option<InstanceId> {
        self.0.records.id()
    }

    /// Get a copy of the state stored at `key`.
    pub fn get(&self, key: &str) -> Option<T> {
        self.0
            .records
            .snapshot()
            .get(key)
            .map(|record| record.state.clone())
    }

    /// Returns `true` if there is a record at `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.records.contains_key(key)
    }

    /// The number of live listeners registered on `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.0
            .records
            .snapshot()
            .get(key)
            .map(|record| record.listens.iter().filter(|l| !l.is_lapsed()).count())
            .unwrap_or(0)
    }

    /// Set the state at `key` to `value`, after passing it through
    /// any [Middleware].
    ///
    /// Every listener registered on `key` is notified with the new
    /// state, in the order they subscribed, before it is written.
    /// While they run, [get()](ListenableStore::get()) still returns
    /// the previous state. Listeners are kept across the write.
    pub fn set<K: Into<String>>(&self, key: K, value: T) {
        let key = key.into();
        let middleware = self.0.middleware.borrow().clone();
        Next::new(self, &middleware).run(&key, value);
    }

    /// Write `new_state` to `key` and notify its listeners, bypassing
    /// middleware.
    pub(crate) fn write(&self, key: &str, new_state: T) {
        let listeners: Vec<Listener<T>> = self
            .0
            .records
            .snapshot()
            .get(key)
            .map(|record| record.listens.clone())
            .unwrap_or_default();

        log::trace!(
            "set {:?} on store {:?}, notifying {} listener(s)",
            key,
            self.id(),
            listeners.len()
        );

        for listener in &listeners {
            if let Some(callback) = listener.as_callback() {
                self.invoke(key, &callback, Some(&new_state));
            }
        }

        // Listeners may have subscribed or unsubscribed while being
        // notified, so the list is re-read here rather than reusing
        // `listeners`.
        let mut new_state = Some(new_state);
        let mut listeners = Some(listeners);
        let mut previous = None;
        self.0.records.update(&mut |db| {
            let state = match new_state.take() {
                Some(state) => state,
                None => return,
            };
            let mut listens = match db.remove(key) {
                Some(record) => {
                    previous = Some(record.state);
                    record.listens
                }
                None => listeners.take().unwrap_or_default(),
            };
            listens.retain(|listener| !listener.is_lapsed());
            db.insert(key.to_string(), Listenable { state, listens });
        });
        drop(previous);
    }

    /// Remove the record at `key`, and with it every listener
    /// registered on it. The listeners are not notified.
    pub fn delete(&self, key: &str) {
        log::trace!("delete {:?} on store {:?}", key, self.id());
        self.0.records.delete(key);

        for middleware in self.middleware() {
            middleware.on_delete(self, key);
        }
    }

    /// Remove every record and listener. The listeners are not
    /// notified.
    pub fn clear(&self) {
        log::trace!("clear store {:?}", self.id());
        self.0.records.clear();

        for middleware in self.middleware() {
            middleware.on_clear(self);
        }
    }

    /// Subscribe `listener` to the state at `key`.
    ///
    /// The listener is invoked straight away with the current state,
    /// or with `None` if `key` has no record. If there is no record,
    /// nothing is registered and `None` is returned. Otherwise the
    /// listener is notified of every subsequent
    /// [set()](ListenableStore::set()) until the returned
    /// [Unsubscribe] is used, or the record is deleted.
    pub fn subscribe<L: Into<Callback<T>>>(
        &self,
        key: &str,
        listener: L,
    ) -> Option<Unsubscribe<T>> {
        let callback = listener.into();
        let listener = Listener::Strong(callback.clone());
        self.attach(key, callback, listener)
    }

    /// Like [subscribe()](ListenableStore::subscribe()), but the store
    /// only keeps a weak reference to `callback`. Once every clone of
    /// `callback` has been dropped it is no longer notified, and it is
    /// removed from `key` at the next [set()](ListenableStore::set()).
    pub fn subscribe_weak(&self, key: &str, callback: &Callback<T>) -> Option<Unsubscribe<T>> {
        self.attach(key, callback.clone(), callback.downgrade())
    }

    fn attach(
        &self,
        key: &str,
        callback: Callback<T>,
        listener: Listener<T>,
    ) -> Option<Unsubscribe<T>> {
        let state = self.get(key);
        self.invoke(key, &callback, state.as_ref());
        drop(callback);

        // The record is re-read after the listener has run, in case it
        // was deleted by the listener.
        let mut attached = false;
        if state.is_some() && self.contains_key(key) {
            let mut pending = Some(listener.clone());
            self.0.records.update(&mut |db| {
                if let (Some(record), Some(listener)) = (db.get_mut(key), pending.take()) {
                    record.listens.push(listener);
                    attached = true;
                }
            });
        }

        log::trace!(
            "subscribe to {:?} on store {:?}, attached: {}",
            key,
            self.id(),
            attached
        );

        for middleware in self.middleware() {
            middleware.on_subscribe(self, key, attached);
        }

        if attached {
            Some(Unsubscribe {
                store: Rc::downgrade(&self.0),
                key: key.to_string(),
                listener,
                revoked: Cell::new(false),
            })
        } else {
            None
        }
    }

    fn detach(&self, key: &str, listener: &Listener<T>) {
        if !self.contains_key(key) {
            log::trace!(
                "unsubscribe from {:?} on store {:?}, record is gone",
                key,
                self.id()
            );
            return;
        }

        log::trace!("unsubscribe from {:?} on store {:?}", key, self.id());
        let mut removed = Vec::new();
        self.0.records.update(&mut |db| {
            if let Some(record) = db.get_mut(key) {
                let (matching, kept) = record.listens.drain(..).partition(|l| l.ptr_eq(listener));
                record.listens = kept;
                removed = matching;
            }
        });
        drop(removed);
    }

    fn invoke(&self, key: &str, callback: &Callback<T>, value: Option<&T>) {
        match self.0.policy.get() {
            ListenerPolicy::Propagate => callback.emit(value),
            ListenerPolicy::Isolate => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| callback.emit(value)));
                if let Err(payload) = result {
                    log::error!(
                        "listener on {:?} in store {:?} panicked: {}",
                        key,
                        self.id(),
                        panic_message(&*payload)
                    );
                }
            }
        }
    }

    /// Add [Middleware] to observe or modify the operations on this
    /// store. Middleware runs in the order it was added.
    pub fn add_middleware<M: Middleware<T> + 'static>(&self, middleware: M) {
        self.0.middleware.borrow_mut().push(Rc::new(middleware));
    }

    fn middleware(&self) -> Vec<Rc<dyn Middleware<T>>> {
        self.0.middleware.borrow().clone()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "Box<dyn Any>"
    }
}

impl<T: Clone + 'static> Default for ListenableStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenableStore<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for ListenableStore<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone + Debug> Debug for ListenableStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenableStore")
            .field("records", &self.0.records)
            .field("policy", &self.0.policy.get())
            .finish()
    }
}

#[cfg(feature = "serde")]
impl<T: Clone + serde::Serialize> serde::Serialize for ListenableStore<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let records = self.0.records.snapshot();
        serializer.collect_map(records.iter().map(|(key, record)| (key, &record.state)))
    }
}

/// Returned by [ListenableStore::subscribe()], removes the listener
/// it was returned for from its key.
///
/// Only the first call to [unsubscribe()](Unsubscribe::unsubscribe())
/// does anything. It is a no-op if the record has since been deleted
/// or cleared, or the store dropped. Dropping an [Unsubscribe] does
/// not unsubscribe.
pub struct Unsubscribe<T> {
    store: Weak<Inner<T>>,
    key: String,
    listener: Listener<T>,
    revoked: Cell<bool>,
}

impl<T: Clone + 'static> Unsubscribe<T> {
    /// Remove the listener from its key, if the record still exists.
    pub fn unsubscribe(&self) {
        if self.revoked.replace(true) {
            return;
        }

        if let Some(inner) = self.store.upgrade() {
            ListenableStore(inner).detach(&self.key, &self.listener);
        }
    }
}

impl<T> Unsubscribe<T> {
    /// The key the listener was subscribed to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` once [unsubscribe()](Unsubscribe::unsubscribe())
    /// has been called.
    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }
}

impl<T> Debug for Unsubscribe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("key", &self.key)
            .field("listener", &self.listener)
            .field("revoked", &self.revoked.get())
            .finish()
    }
}
