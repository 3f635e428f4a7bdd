use std::{
    fmt::Debug,
    rc::{Rc, Weak},
};

type ListenFn<T> = dyn Fn(Option<&T>);

/// A wrapper for a callback which is notified of changes to the
/// value stored at a key in a
/// [ListenableStore](crate::ListenableStore).
///
/// The callback receives `None` only when it is subscribed to a key
/// which has no record.
///
/// Clones of a [Callback] share its identity: unsubscribing removes
/// registrations by identity, never by comparing closures.
pub struct Callback<T>(Rc<ListenFn<T>>);

impl<T> Callback<T> {
    pub fn new<C: Fn(Option<&T>) + 'static>(closure: C) -> Self {
        Callback(Rc::new(closure))
    }

    pub fn emit(&self, value: Option<&T>) {
        (self.0)(value)
    }

    /// Returns `true` if both callbacks are the same allocation.
    pub fn ptr_eq(&self, other: &Callback<T>) -> bool {
        self.addr() == other.addr()
    }

    /// Produce a [Listener] holding only a weak reference to this
    /// callback.
    pub fn downgrade(&self) -> Listener<T> {
        Listener::Weak(Rc::downgrade(&self.0))
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Callback(self.0.clone())
    }
}

impl<T> Debug for Callback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callback(@ {:p})", self.addr())
    }
}

impl<C, T> From<C> for Callback<T>
where
    C: Fn(Option<&T>) + 'static,
{
    fn from(closure: C) -> Self {
        Callback(Rc::new(closure))
    }
}

/// A callback as it is registered on a key: either held by the store
/// ([Listener::Strong]), or a weak reference which lapses when every
/// clone of the [Callback] has been dropped ([Listener::Weak]).
pub enum Listener<T> {
    Strong(Callback<T>),
    Weak(Weak<ListenFn<T>>),
}

impl<T> Listener<T> {
    /// Attempt to obtain the [Callback] for this listener, otherwise
    /// if it has lapsed, returns `None`.
    pub fn as_callback(&self) -> Option<Callback<T>> {
        match self {
            Listener::Strong(callback) => Some(callback.clone()),
            Listener::Weak(weak) => weak.upgrade().map(Callback),
        }
    }

    /// Returns `true` if this listener can no longer be invoked.
    pub fn is_lapsed(&self) -> bool {
        match self {
            Listener::Strong(_) => false,
            Listener::Weak(weak) => weak.strong_count() == 0,
        }
    }

    /// Returns `true` if this listener refers to `callback`.
    pub fn refers_to(&self, callback: &Callback<T>) -> bool {
        self.addr() == callback.addr()
    }

    /// Returns `true` if both listeners refer to the same callback,
    /// regardless of whether either is weak.
    pub fn ptr_eq(&self, other: &Listener<T>) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        match self {
            Listener::Strong(callback) => callback.addr(),
            Listener::Weak(weak) => Weak::as_ptr(weak) as *const (),
        }
    }
}

impl<T> From<Callback<T>> for Listener<T> {
    fn from(callback: Callback<T>) -> Self {
        Listener::Strong(callback)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Listener::Strong(callback) => Listener::Strong(callback.clone()),
            Listener::Weak(weak) => Listener::Weak(weak.clone()),
        }
    }
}

impl<T> Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Listener::Strong(_) => write!(f, "Listener::Strong(@ {:p})", self.addr()),
            Listener::Weak(_) => write!(f, "Listener::Weak(@ {:p})", self.addr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Callback, Listener};
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn emit() {
        let seen = Rc::new(RefCell::new(None));
        let seen_copy = seen.clone();
        let callback = Callback::new(move |value: Option<&i32>| {
            *seen_copy.borrow_mut() = value.copied();
        });

        callback.emit(Some(&5));
        assert_eq!(Some(5), *seen.borrow());
    }

    #[test]
    fn identity_follows_allocation() {
        let a: Callback<i32> = Callback::new(|_| {});
        let b: Callback<i32> = Callback::new(|_| {});

        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert!(Listener::from(a.clone()).refers_to(&a));
        assert!(a.downgrade().refers_to(&a));
        assert!(!a.downgrade().refers_to(&b));
        assert!(a.downgrade().ptr_eq(&Listener::from(a.clone())));
    }

    #[test]
    fn weak_listener_lapses() {
        let callback: Callback<i32> = Callback::new(|_| {});
        let listener = callback.downgrade();
        assert!(!listener.is_lapsed());
        assert!(listener.as_callback().is_some());

        drop(callback);
        assert!(listener.is_lapsed());
        assert!(listener.as_callback().is_none());
    }
}
