//! Contact lookup
//!
//! Contacts are owned by the UI layer. The engine only consults them, through
//! [`ContactDirectory`], to resolve display names for remote addresses.

use std::sync::RwLock;

use crate::types::{Contact, LocalAddress};

/// Read-only contact lookup used by the engine
pub trait ContactDirectory: Send + Sync {
    fn resolve_name(&self, address: &LocalAddress) -> Option<String>;
}

/// Directory that knows nobody
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContacts;

impl ContactDirectory for NoContacts {
    fn resolve_name(&self, _address: &LocalAddress) -> Option<String> {
        None
    }
}

/// In-memory address book the UI can share with the engine
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: RwLock<Vec<Contact>>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: impl Into<String>, address: LocalAddress) -> Contact {
        let contact = Contact::new(name, address);
        if let Ok(mut contacts) = self.contacts.write() {
            contacts.push(contact.clone());
        }
        contact
    }

    pub fn list(&self) -> Vec<Contact> {
        self.contacts
            .read()
            .map(|contacts| contacts.clone())
            .unwrap_or_default()
    }
}

impl ContactDirectory for ContactBook {
    fn resolve_name(&self, address: &LocalAddress) -> Option<String> {
        let contacts = self.contacts.read().ok()?;
        contacts
            .iter()
            .find(|contact| &contact.address == address)
            .map(|contact| contact.name.clone())
    }
}
