//! Graph capability consumed by the clustering core
//!
//! The core never owns graph state. It holds [`Node`] handles handed out by a
//! [`Graph`] provider and asks the provider for adjacency whenever it needs it.
//! Providers may reveal adjacency lazily; clusters learn about edges discovered
//! after a node joined them through the [`NeighborListener`] port.

pub mod builder;
pub mod compressed;
pub mod lazy;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

pub use builder::GraphBuilder;
pub use compressed::CompressedGraph;
pub use lazy::LazyGraph;

/// Stable identity of a node within its graph provider.
pub type NodeIndex = u32;

#[derive(Debug)]
struct NodeData {
    index: NodeIndex,
    name: String,
}

/// Cheap, clonable handle to a node owned by a graph provider.
///
/// Cloning a handle keeps the same object identity. Two handles created
/// separately are different objects even if they carry the same index, which
/// the cluster reports as an identity conflict.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
    pub fn new(index: NodeIndex, name: impl Into<String>) -> Self {
        Self(Arc::new(NodeData {
            index,
            name: name.into(),
        }))
    }

    pub fn index(&self) -> NodeIndex {
        self.0.index
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether both handles point at the same node object.
    pub fn same_object(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, {:?})", self.0.index, self.0.name)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Sent to subscribers when a node they watch gains a new neighbor.
#[derive(Debug, Clone)]
pub struct NeighborAdded {
    /// The watched node whose adjacency grew
    pub node: Node,

    /// The newly revealed neighbor
    pub neighbor: Node,
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Subscription endpoint handed to [`Graph::subscribe`].
///
/// The provider delivers notifications synchronously by pushing them into the
/// listener's channel; the owner of the paired receiver drains it.
#[derive(Debug, Clone)]
pub struct NeighborListener {
    id: u64,
    sender: Sender<NeighborAdded>,
}

impl NeighborListener {
    /// Create a listener and the receiving end of its notification channel.
    pub fn channel() -> (Self, Receiver<NeighborAdded>) {
        let (sender, receiver) = channel::unbounded();
        let listener = Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        };
        (listener, receiver)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deliver a notification. Returns false once the receiver is gone.
    pub fn notify(&self, event: NeighborAdded) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Node capability required by the clustering core.
///
/// Equal indices must always map to the same [`Node`] object. Adjacency may
/// grow over time but never shrinks.
pub trait Graph {
    /// Current neighbors of `node`. May reveal previously unknown edges.
    fn neighbors(&self, node: &Node) -> Vec<Node>;

    /// Current degree of `node`.
    fn degree(&self, node: &Node) -> usize {
        self.neighbors(node).len()
    }

    /// Start delivering neighbor-growth notifications for `node` to `listener`.
    fn subscribe(&self, node: &Node, listener: &NeighborListener);

    /// Stop delivering notifications for `node` to `listener`.
    fn unsubscribe(&self, node: &Node, listener: &NeighborListener);
}
