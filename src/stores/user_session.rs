//! User session store: the active user and the registry of switchable users.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::{OrderType, PreferencesPatch, Theme, User};
use crate::stores::Observable;

pub struct UserSessionStore {
    known_users: Observable<Vec<User>>,
    current_user: Observable<Option<User>>,
}

impl UserSessionStore {
    /// Session over `registry`; the first entry starts as the current user.
    pub fn new(registry: Vec<User>) -> Self {
        let current = registry.first().cloned();
        Self {
            known_users: Observable::new(registry),
            current_user: Observable::new(current),
        }
    }

    /// Session over the built-in ward registry.
    pub fn with_default_registry() -> Self {
        Self::new(default_registry())
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user.get()
    }

    pub fn known_users(&self) -> Vec<User> {
        self.known_users.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }

    /// Make a copy of the first registry entry with this id current.
    ///
    /// Unknown ids leave the session as it is. Returns the current user.
    pub fn switch_user(&self, id: impl ToString) -> Option<User> {
        let id = id.to_string();
        let found = self
            .known_users
            .with(|users| users.iter().find(|u| u.id == id).cloned());

        match found {
            Some(user) => {
                info!(user_id = %user.id, name = %user.name, "switched user");
                self.current_user.set(Some(user));
            }
            None => debug!(user_id = %id, "no such user, session unchanged"),
        }
        self.current_user()
    }

    /// Replace the current user wholesale; `None` signs out.
    pub fn set_user(&self, user: Option<User>) {
        self.current_user.set(user);
    }

    pub fn update_preferences(&self, patch: PreferencesPatch) {
        self.current_user.update(|current| {
            if let Some(user) = current {
                user.preferences.merge(patch);
            }
        });
    }

    /// Edit a registry entry in place. The current user is never touched.
    pub fn update_known_user(&self, id: &str, f: impl FnOnce(&mut User)) -> bool {
        let mut applied = false;
        self.known_users.update(|users| {
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                f(user);
                applied = true;
            }
        });
        applied
    }

    pub fn is_known_user(&self, name: &str) -> bool {
        let name = name.trim();
        self.known_users
            .with(|users| users.iter().any(|u| u.name.eq_ignore_ascii_case(name)))
    }

    /// Orders placed by someone in the registry are internal.
    pub fn order_type_for(&self, requester: &str) -> OrderType {
        if self.is_known_user(requester) {
            OrderType::Internal
        } else {
            OrderType::External
        }
    }
}

fn default_registry() -> Vec<User> {
    vec![
        User::new("1", "Merel", "admin", Theme::Light),
        User::new("2", "Dj", "backend", Theme::Dark),
        User::new("3", "Donna", "viewer", Theme::Light),
        User::new("4", "Viktorija", "viewer", Theme::Light),
        // Shares id 4 with the entry above; lookups by id resolve to Viktorija.
        User::new("4", "Janosh", "viewer", Theme::Light),
    ]
}
