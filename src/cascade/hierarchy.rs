use crate::store::EntityKind;

/// How child records of a kind relate to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildArity {
    /// At most one record; absence is not a failure.
    OptionalSingle,
    /// Every historical revision is a separate record of the same logical id.
    Versioned,
    /// Zero or more records, each with children of its own.
    Collection,
}

/// One node of the ownership tree: which kind, how it is scoped under its
/// parent, and which kinds hang below it.
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    pub kind: EntityKind,
    pub arity: ChildArity,
    pub children: &'static [ChildSpec],
}

/// The fixed, acyclic ownership graph. Children are always processed before
/// their parent; a new entity type is added here, not in control flow.
pub const NOTIFICATION_CHILDREN: &[ChildSpec] = &[ChildSpec {
    kind: EntityKind::NotificationStatus,
    arity: ChildArity::Versioned,
    children: &[],
}];

pub const MESSAGE_CHILDREN: &[ChildSpec] = &[
    ChildSpec {
        kind: EntityKind::MessageContent,
        arity: ChildArity::OptionalSingle,
        children: &[],
    },
    ChildSpec {
        kind: EntityKind::MessageStatus,
        arity: ChildArity::Versioned,
        children: &[],
    },
    ChildSpec {
        kind: EntityKind::Notification,
        arity: ChildArity::Collection,
        children: NOTIFICATION_CHILDREN,
    },
];

/// Top-level walks for one user, in execution order. The profile comes last:
/// everything the user owns hangs (directly or transitively) off it, so it
/// is only erased once the rest of the hierarchy is gone.
pub const USER_ROOTS: &[ChildSpec] = &[
    ChildSpec {
        kind: EntityKind::Message,
        arity: ChildArity::Collection,
        children: MESSAGE_CHILDREN,
    },
    ChildSpec {
        kind: EntityKind::Profile,
        arity: ChildArity::Versioned,
        children: &[],
    },
];
