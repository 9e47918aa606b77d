//! Quad-Tree Spatial Index
//!
//! Each layer owns one `SpatialIndex`: a fixed-shape quad-tree built once
//! over the level's pixel bounds. Only entity membership changes after
//! construction.
//!
//! Placement rule: starting at the root, find the children whose region
//! intersects the entity rect. If that is all four (or none, or the node is
//! a leaf) the entity is stored at the current node; otherwise placement
//! recurses into each intersecting child. An entity can therefore live in
//! several nodes at once, and queries deduplicate with a visitation stamp.
//!
//! Nodes live in a flat arena addressed by `NodeId`. The index keeps the
//! authoritative record of which nodes hold each entity (its membership),
//! so removal and re-bucketing never depend on which node "received" the
//! call.

use smallvec::SmallVec;

use super::rect::Rect;
use crate::game::{ComponentStorage, Entity};

/// Address of a node inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The set of nodes an entity is stored at. Almost always 1-2 entries.
pub type NodeSet = SmallVec<[NodeId; 4]>;

#[derive(Debug)]
struct Node {
    region: Rect,
    /// Levels remaining below this node (0 = leaf)
    depth: u32,
    /// NW, NE, SW, SE
    children: Option<[NodeId; 4]>,
    entities: Vec<Entity>,
}

#[derive(Debug)]
struct Membership {
    nodes: NodeSet,
    /// Rect the membership was computed from; queries filter against it
    rect: Rect,
    /// Movable entities are re-bucketed on every move notification
    tracks_moves: bool,
    /// Stamp of the last query that yielded this entity
    last_seen: u64,
}

pub struct SpatialIndex {
    nodes: Vec<Node>,
    members: ComponentStorage<Membership>,
    len: usize,
    stamp: u64,
}

impl SpatialIndex {
    /// Build a tree over `bounds` with `depth` levels (the root counts as
    /// one level, so `depth == 1` is a single leaf).
    pub fn new(bounds: Rect, depth: u32) -> Self {
        assert!(depth >= 1, "a spatial index needs at least one level");
        let mut nodes = vec![Node {
            region: bounds,
            depth: depth - 1,
            children: None,
            entities: Vec::new(),
        }];
        Self::subdivide(&mut nodes, NodeId::ROOT);
        Self {
            nodes,
            members: ComponentStorage::new(),
            len: 0,
            stamp: 0,
        }
    }

    fn subdivide(nodes: &mut Vec<Node>, id: NodeId) {
        let (region, depth) = {
            let node = &nodes[id.idx()];
            (node.region, node.depth)
        };
        if depth == 0 {
            return;
        }

        // Odd sizes give the extra pixel to the east/south quadrants so the
        // children tile the parent exactly.
        let west_w = region.w / 2;
        let north_h = region.h / 2;
        let cx = region.x + west_w;
        let cy = region.y + north_h;
        let quads = [
            Rect::new(region.x, region.y, west_w, north_h),
            Rect::new(cx, region.y, region.w - west_w, north_h),
            Rect::new(region.x, cy, west_w, region.h - north_h),
            Rect::new(cx, cy, region.w - west_w, region.h - north_h),
        ];

        let first = nodes.len() as u32;
        let children = [NodeId(first), NodeId(first + 1), NodeId(first + 2), NodeId(first + 3)];
        for quad in quads {
            nodes.push(Node {
                region: quad,
                depth: depth - 1,
                children: None,
                entities: Vec::new(),
            });
        }
        nodes[id.idx()].children = Some(children);

        for child in children {
            Self::subdivide(nodes, child);
        }
    }

    pub fn bounds(&self) -> Rect {
        self.nodes[0].region
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_region(&self, id: NodeId) -> Rect {
        self.nodes[id.idx()].region
    }

    /// Number of entities currently indexed
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(entity)
    }

    /// Nodes currently holding `entity`, if it is indexed.
    pub fn nodes_of(&self, entity: Entity) -> Option<&[NodeId]> {
        self.members.get(entity).map(|m| m.nodes.as_slice())
    }

    /// The node set an entity with extent `rect` should be stored at.
    pub fn ideal_nodes(&self, rect: Rect) -> NodeSet {
        let mut out = NodeSet::new();
        self.collect_nodes(NodeId::ROOT, rect, &mut out);
        out
    }

    fn collect_nodes(&self, id: NodeId, rect: Rect, out: &mut NodeSet) {
        if let Some(children) = self.nodes[id.idx()].children {
            let hits: SmallVec<[NodeId; 4]> = children
                .iter()
                .copied()
                .filter(|child| self.nodes[child.idx()].region.intersects(&rect))
                .collect();
            if !hits.is_empty() && hits.len() < 4 {
                for child in hits {
                    self.collect_nodes(child, rect, out);
                }
                return;
            }
        }
        out.push(id);
    }

    /// Register an entity with extent `rect`.
    ///
    /// Panics if the entity is already indexed.
    pub fn insert(&mut self, entity: Entity, rect: Rect, tracks_moves: bool) {
        assert!(
            !self.members.contains(entity),
            "entity {entity} is already in the spatial index"
        );
        let nodes = self.ideal_nodes(rect);
        for id in &nodes {
            self.nodes[id.idx()].entities.push(entity);
        }
        self.members.insert(
            entity,
            Membership {
                nodes,
                rect,
                tracks_moves,
                last_seen: 0,
            },
        );
        self.len += 1;
    }

    /// Unregister an entity from every node holding it.
    ///
    /// Panics if the entity is not indexed (e.g. a double remove).
    pub fn remove(&mut self, entity: Entity) {
        let member = self
            .members
            .remove(entity)
            .unwrap_or_else(|| panic!("entity {entity} is not in the spatial index"));
        assert!(!member.nodes.is_empty(), "entity {entity} has an empty node set");
        for id in member.nodes {
            let list = &mut self.nodes[id.idx()].entities;
            if let Some(pos) = list.iter().position(|&e| e == entity) {
                list.remove(pos);
            }
        }
        self.len -= 1;
    }

    /// Move notification: re-bucket the entity if it tracks moves.
    ///
    /// Static entities (tiles) do not subscribe to moves; their membership
    /// is left as it was inserted. Returns true if membership changed.
    pub fn notify_moved(&mut self, entity: Entity, rect: Rect) -> bool {
        let tracks = self
            .members
            .get(entity)
            .unwrap_or_else(|| panic!("move notification for unindexed entity {entity}"))
            .tracks_moves;
        tracks && self.recompute(entity, rect)
    }

    /// Recompute the node set for the entity's new extent, moving it between
    /// nodes if the set changed. Returns true if it was re-bucketed.
    pub fn recompute(&mut self, entity: Entity, rect: Rect) -> bool {
        let ideal = self.ideal_nodes(rect);
        let member = self
            .members
            .get_mut(entity)
            .unwrap_or_else(|| panic!("recompute for unindexed entity {entity}"));
        member.rect = rect;
        if member.nodes == ideal {
            return false;
        }
        let tracks_moves = member.tracks_moves;
        self.remove(entity);
        self.insert(entity, rect, tracks_moves);
        true
    }

    /// Lazily visit indexed entities.
    ///
    /// With `Some(rect)`, only nodes intersecting `rect` are walked and only
    /// entities whose own extent intersects `rect` are yielded. With `None`
    /// every entity is yielded. Either way each entity appears at most once.
    pub fn query(&mut self, rect: Option<Rect>) -> Query<'_> {
        self.stamp += 1;
        let mut stack = Vec::new();
        let root_hit = match rect {
            Some(r) => self.nodes[0].region.intersects(&r),
            None => true,
        };
        if root_hit {
            stack.push(NodeId::ROOT);
        }
        Query {
            stamp: self.stamp,
            index: self,
            rect,
            stack,
            current: None,
        }
    }
}

/// Iterator returned by [`SpatialIndex::query`]. Walks nodes depth-first,
/// each node's own entities before its children (NW, NE, SW, SE).
pub struct Query<'a> {
    index: &'a mut SpatialIndex,
    rect: Option<Rect>,
    stamp: u64,
    stack: Vec<NodeId>,
    current: Option<(NodeId, usize)>,
}

impl Iterator for Query<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        loop {
            if let Some((node, pos)) = self.current {
                let entities = &self.index.nodes[node.idx()].entities;
                if pos < entities.len() {
                    let entity = entities[pos];
                    self.current = Some((node, pos + 1));

                    let Some(member) = self.index.members.get_mut(entity) else {
                        continue;
                    };
                    if member.last_seen == self.stamp {
                        continue;
                    }
                    member.last_seen = self.stamp;
                    if let Some(rect) = self.rect {
                        if !member.rect.intersects(&rect) {
                            continue;
                        }
                    }
                    return Some(entity);
                }

                self.current = None;
                if let Some(children) = self.index.nodes[node.idx()].children {
                    for child in children.iter().rev() {
                        let region = self.index.nodes[child.idx()].region;
                        if self.rect.map_or(true, |r| region.intersects(&r)) {
                            self.stack.push(*child);
                        }
                    }
                }
            }

            let next = self.stack.pop()?;
            self.current = Some((next, 0));
        }
    }
}
