//! Data items and the tagged insert/delete operations applied to them.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

use crate::geometry::{Descriptor, Rectangle};

/// A spatial object stored in the tree.
///
/// Two items are the same object when they are equal; `id` is the logical
/// identity used to pair an insertion with its deletion.
pub trait DataItem: Clone + Eq + Hash + Debug {
    type Id: Clone + Eq + Hash + Debug;
    type Desc: Descriptor;

    fn id(&self) -> Self::Id;

    fn descriptor(&self) -> Self::Desc;
}

/// A keyed rectangle, the stock data item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialObject {
    pub id: u64,
    pub rect: Rectangle,
}

impl SpatialObject {
    pub fn new(id: u64, rect: Rectangle) -> Self {
        Self { id, rect }
    }
}

impl DataItem for SpatialObject {
    type Id = u64;
    type Desc = Rectangle;

    fn id(&self) -> u64 {
        self.id
    }

    fn descriptor(&self) -> Rectangle {
        self.rect.clone()
    }
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insertion,
    Deletion,
}

impl OperationKind {
    pub fn opposite(self) -> Self {
        match self {
            OperationKind::Insertion => OperationKind::Deletion,
            OperationKind::Deletion => OperationKind::Insertion,
        }
    }
}

/// A buffered insertion or deletion of one data item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation<E> {
    pub kind: OperationKind,
    pub data: E,
}

impl<E: DataItem> Operation<E> {
    pub fn new(kind: OperationKind, data: E) -> Self {
        Self { kind, data }
    }

    pub fn insertion(data: E) -> Self {
        Self::new(OperationKind::Insertion, data)
    }

    pub fn deletion(data: E) -> Self {
        Self::new(OperationKind::Deletion, data)
    }

    pub fn is_insertion(&self) -> bool {
        self.kind == OperationKind::Insertion
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == OperationKind::Deletion
    }

    pub fn id(&self) -> E::Id {
        self.data.id()
    }

    pub fn descriptor(&self) -> E::Desc {
        self.data.descriptor()
    }

    /// The operation that cancels this one.
    pub fn make_opposite(&self) -> Self {
        Self::new(self.kind.opposite(), self.data.clone())
    }

    /// True if `self` and `other` cancel each other: opposite kinds on the
    /// same logical id with equal data.
    pub fn annihilates(&self, other: &Self) -> bool {
        self.kind != other.kind && self.id() == other.id() && self.data == other.data
    }
}
