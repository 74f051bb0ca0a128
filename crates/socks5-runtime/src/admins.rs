//! Admin table for the monitor protocol.
//!
//! Slot 0 is the root admin: created at process start from the
//! bootstrap token and permanently named `"root"` regardless of what
//! name a caller supplies — it can never be renamed or removed.

pub const MAX_ADMINS: usize = 3;
pub const TOKEN_LEN: usize = 16;

pub type Token = [u8; TOKEN_LEN];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admin {
    pub name: String,
    pub token: Token,
}

pub struct AdminTable {
    admins: Vec<Admin>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdminError {
    TableFull,
    AlreadyExists,
    NotFound,
    RootImmutable,
}

impl AdminTable {
    /// Bootstraps the table with the root admin in slot 0.
    pub fn with_root(root_token: Token) -> Self {
        Self {
            admins: vec![Admin { name: "root".to_string(), token: root_token }],
        }
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn register(&mut self, name: &str, token: Token) -> Result<(), AdminError> {
        if self.admins.len() >= MAX_ADMINS {
            return Err(AdminError::TableFull);
        }
        if self.admins.iter().any(|a| a.name == name) {
            return Err(AdminError::AlreadyExists);
        }
        self.admins.push(Admin { name: name.to_string(), token });
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), AdminError> {
        let idx = self.admins.iter().position(|a| a.name == name).ok_or(AdminError::NotFound)?;
        // Slot 0 is immutable by position, not by the name it happens to
        // carry — some source drafts compare by name only, which breaks
        // if "root" is never the bootstrap admin's name.
        if idx == 0 {
            return Err(AdminError::RootImmutable);
        }
        self.admins.remove(idx);
        Ok(())
    }

    pub fn is_admin(&self, token: &Token) -> bool {
        self.admins.iter().any(|a| &a.token == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Admin> {
        self.admins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(byte: u8) -> Token {
        [byte; TOKEN_LEN]
    }

    #[test]
    fn root_slot_is_created_and_immutable() {
        let mut t = AdminTable::with_root(tok(1));
        assert_eq!(t.len(), 1);
        assert!(t.is_admin(&tok(1)));
        assert_eq!(t.register("root", tok(2)), Err(AdminError::AlreadyExists));
        assert_eq!(t.unregister("root"), Err(AdminError::RootImmutable));
    }

    #[test]
    fn slot_zero_is_immutable_by_position_not_name() {
        // Even if the bootstrap admin were registered under a different
        // name, index 0 must stay undeletable.
        let mut t = AdminTable { admins: vec![Admin { name: "bootstrap".to_string(), token: tok(9) }] };
        assert_eq!(t.unregister("bootstrap"), Err(AdminError::RootImmutable));
    }

    #[test]
    fn register_respects_cap() {
        let mut t = AdminTable::with_root(tok(1));
        t.register("carol", tok(2)).unwrap();
        assert_eq!(t.register("dave", tok(3)), Err(AdminError::TableFull));
    }

    #[test]
    fn unregister_non_root_works() {
        let mut t = AdminTable::with_root(tok(1));
        t.register("carol", tok(2)).unwrap();
        t.unregister("carol").unwrap();
        assert_eq!(t.len(), 1);
        assert!(!t.is_admin(&tok(2)));
    }
}
