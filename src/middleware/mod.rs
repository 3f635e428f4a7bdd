//! [Middleware] used to observe or modify the operations on a
//! [ListenableStore]. This module also contains a simple logging
//! middleware which can be used as a utility in an application.

pub mod simple_logger;

use crate::ListenableStore;
use std::rc::Rc;

/// Runs the remaining middleware in the chain, and then writes the
/// value to the store and notifies the key's listeners.
pub struct Next<'a, T> {
    store: &'a ListenableStore<T>,
    middleware: &'a [Rc<dyn Middleware<T>>],
}

impl<'a, T: Clone + 'static> Next<'a, T> {
    pub(crate) fn new(
        store: &'a ListenableStore<T>,
        middleware: &'a [Rc<dyn Middleware<T>>],
    ) -> Self {
        Self { store, middleware }
    }

    pub fn run(self, key: &str, value: T) {
        match self.middleware.split_first() {
            Some((current, rest)) => current.on_set(
                self.store,
                key,
                value,
                Next {
                    store: self.store,
                    middleware: rest,
                },
            ),
            None => self.store.write(key, value),
        }
    }
}

/// `Middleware` used to observe or modify the operations on a
/// [ListenableStore].
pub trait Middleware<T> {
    /// This method is invoked by the [ListenableStore] during a
    /// [ListenableStore::set()], before the value is written and the
    /// listeners are notified. Calling `next.run()` runs subsequent
    /// middleware and then performs the write.
    ///
    /// This method allows modifying the key or value in question, or
    /// even dropping the set, by not calling `next.run()`.
    fn on_set(&self, _store: &ListenableStore<T>, key: &str, value: T, next: Next<'_, T>)
    where
        T: Clone + 'static,
    {
        next.run(key, value)
    }

    /// Invoked after a [ListenableStore::delete()].
    fn on_delete(&self, _store: &ListenableStore<T>, _key: &str) {}

    /// Invoked after a [ListenableStore::clear()].
    fn on_clear(&self, _store: &ListenableStore<T>) {}

    /// Invoked after a [ListenableStore::subscribe()], once the new
    /// listener has received the current state. `attached` is `false`
    /// if there was no record to subscribe to.
    fn on_subscribe(&self, _store: &ListenableStore<T>, _key: &str, _attached: bool) {}
}

#[cfg(test)]
mod tests {
    use super::{Middleware, Next};
    use crate::{Callback, ListenableStore};
    use std::{cell::RefCell, rc::Rc};

    struct Doubler;

    impl Middleware<i32> for Doubler {
        fn on_set(
            &self,
            _store: &ListenableStore<i32>,
            key: &str,
            value: i32,
            next: Next<'_, i32>,
        ) {
            next.run(key, value * 2)
        }
    }

    struct Offset(i32);

    impl Middleware<i32> for Offset {
        fn on_set(
            &self,
            _store: &ListenableStore<i32>,
            key: &str,
            value: i32,
            next: Next<'_, i32>,
        ) {
            next.run(key, value + self.0)
        }
    }

    /// Drops every set on keys starting with `readonly.`.
    struct ReadOnly;

    impl Middleware<i32> for ReadOnly {
        fn on_set(
            &self,
            _store: &ListenableStore<i32>,
            key: &str,
            value: i32,
            next: Next<'_, i32>,
        ) {
            if !key.starts_with("readonly.") {
                next.run(key, value)
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Middleware<i32> for Recorder {
        fn on_delete(&self, _store: &ListenableStore<i32>, key: &str) {
            self.0.borrow_mut().push(format!("delete {}", key));
        }

        fn on_clear(&self, _store: &ListenableStore<i32>) {
            self.0.borrow_mut().push("clear".to_string());
        }

        fn on_subscribe(&self, _store: &ListenableStore<i32>, key: &str, attached: bool) {
            self.0
                .borrow_mut()
                .push(format!("subscribe {} {}", key, attached));
        }
    }

    #[test]
    fn middleware_runs_in_order() {
        let store = ListenableStore::new();
        store.add_middleware(Doubler);
        store.add_middleware(Offset(1));

        store.set("counter", 5);
        assert_eq!(Some(11), store.get("counter"));
    }

    #[test]
    fn middleware_reverse_order() {
        let store = ListenableStore::new();
        store.add_middleware(Offset(1));
        store.add_middleware(Doubler);

        store.set("counter", 5);
        assert_eq!(Some(12), store.get("counter"));
    }

    #[test]
    fn middleware_can_drop_set() {
        let store = ListenableStore::new();
        store.add_middleware(ReadOnly);
        store.set("readonly.counter", 1);
        store.set("counter", 1);

        assert_eq!(None, store.get("readonly.counter"));
        assert_eq!(Some(1), store.get("counter"));
    }

    #[test]
    fn dropped_set_does_not_notify() {
        let store = ListenableStore::new();
        store.set("readonly.counter", 1);
        store.add_middleware(ReadOnly);

        let calls = Rc::new(RefCell::new(0));
        let calls_copy = calls.clone();
        let _unsubscribe = store.subscribe(
            "readonly.counter",
            Callback::new(move |_: Option<&i32>| *calls_copy.borrow_mut() += 1),
        );
        store.set("readonly.counter", 2);

        assert_eq!(1, *calls.borrow());
        assert_eq!(Some(1), store.get("readonly.counter"));
    }

    #[test]
    fn observation_hooks() {
        let store = ListenableStore::new();
        let recorder = Recorder::default();
        let log = recorder.0.clone();
        store.add_middleware(recorder);

        store.subscribe("counter", |_: Option<&i32>| {});
        store.set("counter", 1);
        store.subscribe("counter", |_: Option<&i32>| {});
        store.delete("counter");
        store.clear();

        assert_eq!(
            vec![
                "subscribe counter false".to_string(),
                "subscribe counter true".to_string(),
                "delete counter".to_string(),
                "clear".to_string(),
            ],
            *log.borrow()
        );
    }
}
