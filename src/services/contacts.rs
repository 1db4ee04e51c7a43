//! Emergency contact operations with a cached, capped contact book.

use crate::client::http::ApiClient;
use crate::fallback::dispatcher::FallbackPolicy;
use crate::protocol::models::{Contact, NewContact, MAX_CONTACTS};
use crate::session::store::TokenStore;
use crate::session::validator::SessionValidator;
use crate::simulation::backend::SimulatedBackend;
use crate::LifelineError;
use std::sync::{Arc, Mutex};

/// Client-side copy of the user's contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBook {
    contacts: Vec<Contact>,
}

impl ContactBook {
    /// Cached contacts in server order.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Number of cached contacts.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether no contacts are cached.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Whether another contact may be added.
    pub fn can_add(&self) -> bool {
        self.contacts.len() < MAX_CONTACTS
    }

    /// Free slots left.
    pub fn remaining(&self) -> usize {
        MAX_CONTACTS.saturating_sub(self.contacts.len())
    }
}

/// Contact list operations.
pub struct ContactService {
    client: Arc<ApiClient>,
    simulation: Arc<SimulatedBackend>,
    fallback: FallbackPolicy,
    store: Arc<TokenStore>,
    validator: Arc<SessionValidator>,
    book: Mutex<ContactBook>,
}

impl ContactService {
    /// Create the contact service.
    pub fn new(
        client: Arc<ApiClient>,
        simulation: Arc<SimulatedBackend>,
        fallback: FallbackPolicy,
        store: Arc<TokenStore>,
        validator: Arc<SessionValidator>,
    ) -> Self {
        Self {
            client,
            simulation,
            fallback,
            store,
            validator,
            book: Mutex::new(ContactBook::default()),
        }
    }

    /// Fetch the contact list and refresh the cache.
    pub async fn list(&self) -> Result<Vec<Contact>, LifelineError> {
        let token = self.store.bearer();
        let result = self
            .fallback
            .for_credential(token.as_deref())
            .with_fallback(
                "list_contacts",
                || self.client.list_contacts(),
                || self.simulation.list_contacts(token.as_deref()),
            )
            .await;

        let contacts = self.observe(result)?;
        self.update_book(|book| book.contacts = contacts.clone());
        Ok(contacts)
    }

    /// Add a contact.
    ///
    /// # Errors
    /// - `ValidationFailed` - bad input, or the cached book is already full
    /// - `AuthenticationRejected` - the session is gone
    pub async fn add(&self, contact: &NewContact) -> Result<Contact, LifelineError> {
        contact.validate()?;
        if !self.book().can_add() {
            return Err(LifelineError::invalid_input(format!(
                "You can only store up to {} emergency contacts.",
                MAX_CONTACTS
            )));
        }

        let token = self.store.bearer();
        let result = self
            .fallback
            .for_credential(token.as_deref())
            .with_fallback(
                "add_contact",
                || self.client.add_contact(contact),
                || self.simulation.add_contact(token.as_deref(), contact),
            )
            .await;

        let created = self.observe(result)?;
        self.update_book(|book| book.contacts.push(created.clone()));
        Ok(created)
    }

    /// Delete a contact by id.
    pub async fn delete(&self, id: &str) -> Result<(), LifelineError> {
        let token = self.store.bearer();
        let result = self
            .fallback
            .for_credential(token.as_deref())
            .with_fallback(
                "delete_contact",
                || self.client.delete_contact(id),
                || self.simulation.delete_contact(token.as_deref(), id),
            )
            .await;

        self.observe(result)?;
        self.update_book(|book| book.contacts.retain(|c| c.id != id));
        Ok(())
    }

    /// Snapshot of the cached contact book.
    pub fn book(&self) -> ContactBook {
        self.book.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Drop the cached contacts.
    pub fn forget(&self) {
        self.update_book(|book| book.contacts.clear());
    }

    /// A rejected session ends here regardless of which path produced it.
    fn observe<T>(&self, result: Result<T, LifelineError>) -> Result<T, LifelineError> {
        if let Err(LifelineError::AuthenticationRejected { .. }) = &result {
            self.validator.invalidate();
            self.forget();
        }
        result
    }

    fn update_book<F: FnOnce(&mut ContactBook)>(&self, f: F) {
        match self.book.lock() {
            Ok(mut book) => f(&mut book),
            Err(_) => tracing::warn!("contact book lock poisoned, cache not updated"),
        }
    }
}
