use std::{cell::RefCell, fmt::Debug, rc::Rc};

/// A holder for a single value which can be read back and replaced
/// wholesale. This is the primitive which a [Store](crate::Store)
/// keeps all of its records in.
///
/// Reads hand out an [Rc] snapshot, so a value obtained with
/// [get()](StateCell::get()) is never mutated by a later
/// [set()](StateCell::set()).
pub trait StateCell<V> {
    /// Get the value currently held in this cell.
    fn get(&self) -> Rc<V>;

    /// Replace the value held in this cell.
    fn set(&self, value: V);

    /// Modify the held value in place. The default implementation
    /// copies the current value, applies `f` and writes the copy back
    /// with [set()](StateCell::set()).
    fn update(&self, f: &mut dyn FnMut(&mut V))
    where
        V: Clone,
    {
        let mut value = (*self.get()).clone();
        f(&mut value);
        self.set(value);
    }
}

/// The default [StateCell], a shared `Rc<RefCell<Rc<V>>>`.
///
/// Clones of a [SharedCell] refer to the same value.
pub struct SharedCell<V>(Rc<RefCell<Rc<V>>>);

impl<V> SharedCell<V> {
    pub fn new(initial: V) -> Self {
        SharedCell(Rc::new(RefCell::new(Rc::new(initial))))
    }
}

impl<V: Default> Default for SharedCell<V> {
    fn default() -> Self {
        SharedCell::new(V::default())
    }
}

impl<V> Clone for SharedCell<V> {
    fn clone(&self) -> Self {
        SharedCell(self.0.clone())
    }
}

impl<V: Debug> Debug for SharedCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedCell").field(&*self.0.borrow()).finish()
    }
}

impl<V: Clone> StateCell<V> for SharedCell<V> {
    fn get(&self) -> Rc<V> {
        self.0.borrow().clone()
    }

    /// The previous value is dropped after the cell is released, so its
    /// `Drop` may read the cell again.
    fn set(&self, value: V) {
        let previous = std::mem::replace(&mut *self.0.borrow_mut(), Rc::new(value));
        drop(previous);
    }

    /// Only copies the value when a snapshot handed out by
    /// [get()](StateCell::get()) is still alive. Anything `f` drops is
    /// dropped while the cell is borrowed, so callers move removed
    /// values out of `f` instead.
    fn update(&self, f: &mut dyn FnMut(&mut V)) {
        let mut value = self.0.borrow_mut();
        f(Rc::make_mut(&mut value));
    }
}
