#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Chairman = 2,
    Director = 3,
    Staff = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Chairman),
            3 => Some(Role::Director),
            4 => Some(Role::Staff),
            _ => None,
        }
    }

    pub fn as_id(&self) -> u8 {
        *self as u8
    }

    /// The two approver capabilities: chairman signs the first stage,
    /// director the second. Either may single-handedly approve a document
    /// below the director threshold.
    pub fn is_approver(&self) -> bool {
        matches!(self, Role::Chairman | Role::Director)
    }
}
