//! Client-side stores mirroring server resources.
//!
//! Every piece of store state lives in an [`Observable`], a `watch`-backed
//! cell that consumers can read directly or subscribe to for change
//! notifications. Stores are constructed once at bootstrap and shared by
//! reference; there are no process-wide instances.

use tokio::sync::watch;

pub mod carts;
pub mod medications;
pub mod orders;
pub mod user_session;

pub use carts::CartsStore;
pub use medications::MedicationsStore;
pub use orders::OrdersStore;
pub use user_session::UserSessionStore;

/// A reactive cell. Writes notify every subscriber; the last write wins.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Loading flag that stays raised while any operation is in flight.
#[derive(Debug, Default)]
pub struct BusyFlag {
    in_flight: Observable<usize>,
}

impl BusyFlag {
    pub fn begin(&self) -> BusyGuard<'_> {
        self.in_flight.update(|n| *n += 1);
        BusyGuard { flag: self }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.get() > 0
    }

    /// Receives the number of in-flight operations; zero means idle.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }
}

pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.in_flight.update(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_see_latest_value() {
        let cell = Observable::new(vec![1]);
        let rx = cell.subscribe();
        cell.update(|v| v.push(2));
        cell.set(vec![3]);
        assert_eq!(*rx.borrow(), vec![3]);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn busy_until_last_guard_drops() {
        let flag = BusyFlag::default();
        assert!(!flag.is_busy());

        let first = flag.begin();
        let second = flag.begin();
        drop(first);
        assert!(flag.is_busy());
        drop(second);
        assert!(!flag.is_busy());
    }
}
