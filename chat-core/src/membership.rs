//! The set of currently present members.
//!
//! Insertion order is kept for display; it carries no protocol meaning.

use chat_types::MemberName;

/// Members that joined and left in a single reconciliation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Members that became present.
    pub joined: Vec<MemberName>,
    /// Members that became absent.
    pub left: Vec<MemberName>,
}

impl MembershipDiff {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Ordered set of present members.
///
/// Group sizes are small (a LAN chat room), so a `Vec` with linear lookups
/// keeps the insertion order without a second index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    members: Vec<MemberName>,
}

impl MembershipSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `true` if it was absent.
    pub fn insert(&mut self, name: MemberName) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.members.push(name);
        true
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, name: &MemberName) -> bool {
        match self.members.iter().position(|m| m == name) {
            Some(index) => {
                self.members.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check whether a member is present.
    pub fn contains(&self, name: &MemberName) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// Replace the contents with `names`.
    ///
    /// Members that stay keep their position; newcomers are appended in the
    /// order given. Duplicates in `names` are ignored. Applying the same
    /// `names` twice yields an empty diff the second time.
    pub fn replace(&mut self, names: &[MemberName]) -> MembershipDiff {
        let mut diff = MembershipDiff::default();

        let mut kept = Vec::with_capacity(names.len());
        for member in self.members.drain(..) {
            if names.contains(&member) {
                kept.push(member);
            } else {
                diff.left.push(member);
            }
        }
        self.members = kept;

        for name in names {
            if self.insert(name.clone()) {
                diff.joined.push(name.clone());
            }
        }

        diff
    }

    /// Remove every member for which `expired` returns true.
    pub fn remove_where<F>(&mut self, mut expired: F) -> Vec<MemberName>
    where
        F: FnMut(&MemberName) -> bool,
    {
        let mut removed = Vec::new();
        self.members.retain(|member| {
            if expired(member) {
                removed.push(member.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Members in display order.
    pub fn as_slice(&self) -> &[MemberName] {
        &self.members
    }

    /// Owned copy of the members in display order.
    pub fn to_vec(&self) -> Vec<MemberName> {
        self.members.clone()
    }

    /// Number of present members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no one is present.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
