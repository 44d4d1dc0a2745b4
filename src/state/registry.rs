use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::CommandError;

/// Identity of one client connection.
pub type ConnectionId = Uuid;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 64;

/// Result of a successful [`ParticipantRegistry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection registered for the first time.
    Joined,
    /// The connection switched to a new display name.
    Renamed {
        /// Name held before the switch.
        previous: String,
    },
    /// The connection already held this name.
    Unchanged,
}

impl JoinOutcome {
    /// Whether the visible roster changed.
    pub fn roster_changed(&self) -> bool {
        !matches!(self, JoinOutcome::Unchanged)
    }
}

/// Maps connections to display names and remembers removed names.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    names: HashMap<ConnectionId, String>,
    // only grows for the lifetime of the process
    banned: HashSet<String>,
}

/// Trim a display name and check its length.
pub fn normalize_name(raw: &str) -> Result<String, CommandError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidName("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(CommandError::InvalidName(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_owned())
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `name`. The name must already be normalized.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: &str,
    ) -> Result<JoinOutcome, CommandError> {
        if self.is_banned(name) {
            return Err(CommandError::Banned(name.to_owned()));
        }
        if self.holder_of(name).is_some_and(|holder| holder != connection) {
            return Err(CommandError::NameTaken(name.to_owned()));
        }

        match self.names.insert(connection, name.to_owned()) {
            None => Ok(JoinOutcome::Joined),
            Some(previous) if previous == name => Ok(JoinOutcome::Unchanged),
            Some(previous) => Ok(JoinOutcome::Renamed { previous }),
        }
    }

    /// Ban `name` and drop the connection holding it. `None` when nobody holds the name.
    pub fn kick(&mut self, name: &str) -> Option<ConnectionId> {
        let connection = self.holder_of(name)?;
        self.banned.insert(name.to_owned());
        self.names.remove(&connection);
        Some(connection)
    }

    /// Forget `connection`, returning the name it held.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<String> {
        self.names.remove(&connection)
    }

    pub fn name_of(&self, connection: ConnectionId) -> Option<&str> {
        self.names.get(&connection).map(String::as_str)
    }

    fn is_banned(&self, name: &str) -> bool {
        self.banned.contains(name)
    }

    /// Current display names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.values().cloned().collect();
        names.sort();
        names
    }

    fn holder_of(&self, name: &str) -> Option<ConnectionId> {
        self.names
            .iter()
            .find(|(_, held)| held.as_str() == name)
            .map(|(connection, _)| *connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(normalize_name("  alice ").unwrap(), "alice");
        assert!(matches!(
            normalize_name("   "),
            Err(CommandError::InvalidName(_))
        ));
        assert!(normalize_name(&"x".repeat(MAX_NAME_CHARS)).is_ok());
        assert!(normalize_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn rejoining_with_the_same_name_is_idempotent() {
        let mut registry = ParticipantRegistry::new();
        let conn = Uuid::new_v4();

        assert_eq!(registry.join(conn, "alice").unwrap(), JoinOutcome::Joined);
        assert_eq!(registry.join(conn, "alice").unwrap(), JoinOutcome::Unchanged);
        assert_eq!(registry.names(), vec!["alice".to_string()]);
    }

    #[test]
    fn same_connection_can_rename() {
        let mut registry = ParticipantRegistry::new();
        let conn = Uuid::new_v4();
        registry.join(conn, "alice").unwrap();

        let outcome = registry.join(conn, "alicia").unwrap();
        assert_eq!(
            outcome,
            JoinOutcome::Renamed {
                previous: "alice".into()
            }
        );
        assert_eq!(registry.names(), vec!["alicia".to_string()]);
    }

    #[test]
    fn names_are_unique_across_connections() {
        let mut registry = ParticipantRegistry::new();
        registry.join(Uuid::new_v4(), "bob").unwrap();

        let err = registry.join(Uuid::new_v4(), "bob").unwrap_err();
        assert_eq!(err, CommandError::NameTaken("bob".into()));
    }

    #[test]
    fn kicked_names_can_never_rejoin() {
        let mut registry = ParticipantRegistry::new();
        let first = Uuid::new_v4();
        registry.join(first, "mallory").unwrap();

        assert_eq!(registry.kick("mallory"), Some(first));
        assert!(registry.name_of(first).is_none());
        assert!(registry.is_banned("mallory"));

        for connection in [first, Uuid::new_v4()] {
            let err = registry.join(connection, "mallory").unwrap_err();
            assert_eq!(err, CommandError::Banned("mallory".into()));
        }
    }

    #[test]
    fn kicking_an_unknown_name_is_a_no_op() {
        let mut registry = ParticipantRegistry::new();
        assert_eq!(registry.kick("ghost"), None);
        assert!(!registry.is_banned("ghost"));
    }

    #[test]
    fn leaving_keeps_the_ban_set() {
        let mut registry = ParticipantRegistry::new();
        let conn = Uuid::new_v4();
        registry.join(conn, "eve").unwrap();
        registry.kick("eve");
        registry.join(conn, "dave").unwrap();

        assert_eq!(registry.leave(conn), Some("dave".into()));
        assert_eq!(registry.leave(conn), None);
        assert!(registry.is_banned("eve"));
        assert!(registry.names().is_empty());
    }
}
