//! Scene-graph object model.
//!
//! All exported objects live in one [`SceneGraph`] arena. An object's
//! [`ObjectId`] is its arena slot, handed out by a counter at construction
//! time, so identities follow construction order and are never reused.
//! Parents hold ids rather than owning children: the same id may appear
//! under several parents and the serializer writes it once, then refers back
//! to it.
//!
//! Light-weight per-parent elements (update callbacks, stacked transform
//! elements, channels, primitive sets) are stored inline in their owner and
//! have no identity, so they can never be back-referenced.

mod animation;
mod geometry;
mod node;
mod state;

pub use animation::*;
pub use geometry::*;
pub use node::*;
pub use state::*;

/// Identity of an object within one export job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn counter(self) -> u32 {
        self.0
    }
}

/// Whether an object's data changes after construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataVariance {
    Static,
    Dynamic,
    #[default]
    Unspecified,
}

impl DataVariance {
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            DataVariance::Static => Some("STATIC"),
            DataVariance::Dynamic => Some("DYNAMIC"),
            DataVariance::Unspecified => None,
        }
    }
}

/// The closed set of shareable object types.
#[derive(Clone, Debug)]
pub enum ObjectData {
    Group(Group),
    MatrixTransform(MatrixTransform),
    Skeleton(Skeleton),
    Bone(Bone),
    Geode(Geode),
    LightSource(LightSource),
    Geometry(Geometry),
    RigGeometry(RigGeometry),
    StateSet(StateSet),
    Material(Material),
    LightModel(LightModel),
    BlendFunc(BlendFunc),
    Texture2D(Texture2D),
    Light(Light),
    Animation(Animation),
}

impl ObjectData {
    /// Type name used for identifiers (`<kind>_<counter>`).
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectData::Group(_) => "Group",
            ObjectData::MatrixTransform(_) => "MatrixTransform",
            ObjectData::Skeleton(_) => "Skeleton",
            ObjectData::Bone(_) => "Bone",
            ObjectData::Geode(_) => "Geode",
            ObjectData::LightSource(_) => "LightSource",
            ObjectData::Geometry(_) => "Geometry",
            ObjectData::RigGeometry(_) => "RigGeometry",
            ObjectData::StateSet(_) => "StateSet",
            ObjectData::Material(_) => "Material",
            ObjectData::LightModel(_) => "LightModel",
            ObjectData::BlendFunc(_) => "BlendFunc",
            ObjectData::Texture2D(_) => "Texture2D",
            ObjectData::Light(_) => "Light",
            ObjectData::Animation(_) => "Animation",
        }
    }

    /// Block tag written in the text format.
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectData::Skeleton(_) => "osgAnimation::Skeleton",
            ObjectData::Bone(_) => "osgAnimation::Bone",
            ObjectData::RigGeometry(_) => "osgAnimation::RigGeometry",
            ObjectData::Animation(_) => "osgAnimation::Animation",
            other => other.kind(),
        }
    }

    /// Node-level attributes, for the object types that are scene nodes.
    pub fn node(&self) -> Option<&NodeCore> {
        match self {
            ObjectData::Group(g) => Some(&g.node),
            ObjectData::MatrixTransform(t) => Some(&t.group.node),
            ObjectData::Skeleton(s) => Some(&s.transform.group.node),
            ObjectData::Bone(b) => Some(&b.transform.group.node),
            ObjectData::Geode(g) => Some(&g.node),
            ObjectData::LightSource(l) => Some(&l.node),
            _ => None,
        }
    }

    pub fn node_mut(&mut self) -> Option<&mut NodeCore> {
        match self {
            ObjectData::Group(g) => Some(&mut g.node),
            ObjectData::MatrixTransform(t) => Some(&mut t.group.node),
            ObjectData::Skeleton(s) => Some(&mut s.transform.group.node),
            ObjectData::Bone(b) => Some(&mut b.transform.group.node),
            ObjectData::Geode(g) => Some(&mut g.node),
            ObjectData::LightSource(l) => Some(&mut l.node),
            _ => None,
        }
    }

    /// Child list for group-like nodes.
    pub fn group(&self) -> Option<&Group> {
        match self {
            ObjectData::Group(g) => Some(g),
            ObjectData::MatrixTransform(t) => Some(&t.group),
            ObjectData::Skeleton(s) => Some(&s.transform.group),
            ObjectData::Bone(b) => Some(&b.transform.group),
            _ => None,
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut Group> {
        match self {
            ObjectData::Group(g) => Some(g),
            ObjectData::MatrixTransform(t) => Some(&mut t.group),
            ObjectData::Skeleton(s) => Some(&mut s.transform.group),
            ObjectData::Bone(b) => Some(&mut b.transform.group),
            _ => None,
        }
    }

    /// Transform part of transform-like nodes.
    pub fn transform(&self) -> Option<&MatrixTransform> {
        match self {
            ObjectData::MatrixTransform(t) => Some(t),
            ObjectData::Skeleton(s) => Some(&s.transform),
            ObjectData::Bone(b) => Some(&b.transform),
            _ => None,
        }
    }

    pub fn transform_mut(&mut self) -> Option<&mut MatrixTransform> {
        match self {
            ObjectData::MatrixTransform(t) => Some(t),
            ObjectData::Skeleton(s) => Some(&mut s.transform),
            ObjectData::Bone(b) => Some(&mut b.transform),
            _ => None,
        }
    }
}

/// One arena entry: identity, name, variance and typed data.
#[derive(Clone, Debug)]
pub struct Object {
    pub id: ObjectId,
    pub name: String,
    pub data_variance: DataVariance,
    pub data: ObjectData,
}

impl Object {
    /// Stable identifier written as `UniqueID` and in `Use` directives.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.data.kind(), self.id.counter())
    }
}

/// Arena holding every object built during one export job.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    objects: Vec<Object>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its identity.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        data_variance: DataVariance,
        data: ObjectData,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object {
            id,
            name: name.into(),
            data_variance,
            data,
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    pub fn name(&self, id: ObjectId) -> &str {
        self.get(id).map(|o| o.name.as_str()).unwrap_or("")
    }

    /// Children of a group-like node (empty for anything else).
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id)
            .and_then(|o| o.data.group())
            .map(|g| g.children.as_slice())
            .unwrap_or(&[])
    }

    /// Append `child` to a group-like `parent`. Returns false when the
    /// parent cannot hold children.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> bool {
        match self.get_mut(parent).and_then(|o| o.data.group_mut()) {
            Some(group) => {
                group.children.push(child);
                true
            }
            None => false,
        }
    }

    /// Remove every occurrence of `child` from `parent`'s child list.
    pub fn remove_child(&mut self, parent: ObjectId, child: ObjectId) -> bool {
        match self.get_mut(parent).and_then(|o| o.data.group_mut()) {
            Some(group) => {
                let before = group.children.len();
                group.children.retain(|&c| c != child);
                group.children.len() != before
            }
            None => false,
        }
    }

    /// Find the first group-like node listing `child` among its children.
    pub fn parent_of(&self, child: ObjectId) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|o| {
                o.data
                    .group()
                    .map(|g| g.children.contains(&child))
                    .unwrap_or(false)
            })
            .map(|o| o.id)
    }

    pub fn node_mut(&mut self, id: ObjectId) -> Option<&mut NodeCore> {
        self.get_mut(id).and_then(|o| o.data.node_mut())
    }

    pub fn transform_mut(&mut self, id: ObjectId) -> Option<&mut MatrixTransform> {
        self.get_mut(id).and_then(|o| o.data.transform_mut())
    }

    pub fn geometry(&self, id: ObjectId) -> Option<&Geometry> {
        match self.get(id).map(|o| &o.data) {
            Some(ObjectData::Geometry(g)) => Some(g),
            _ => None,
        }
    }

    pub fn geometry_mut(&mut self, id: ObjectId) -> Option<&mut Geometry> {
        match self.get_mut(id).map(|o| &mut o.data) {
            Some(ObjectData::Geometry(g)) => Some(g),
            _ => None,
        }
    }

    pub fn skeleton(&self, id: ObjectId) -> Option<&Skeleton> {
        match self.get(id).map(|o| &o.data) {
            Some(ObjectData::Skeleton(s)) => Some(s),
            _ => None,
        }
    }

    pub fn skeleton_mut(&mut self, id: ObjectId) -> Option<&mut Skeleton> {
        match self.get_mut(id).map(|o| &mut o.data) {
            Some(ObjectData::Skeleton(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bone(&self, id: ObjectId) -> Option<&Bone> {
        match self.get(id).map(|o| &o.data) {
            Some(ObjectData::Bone(b)) => Some(b),
            _ => None,
        }
    }

    pub fn animation_mut(&mut self, id: ObjectId) -> Option<&mut Animation> {
        match self.get_mut(id).map(|o| &mut o.data) {
            Some(ObjectData::Animation(a)) => Some(a),
            _ => None,
        }
    }

    pub fn state_set_mut(&mut self, id: ObjectId) -> Option<&mut StateSet> {
        match self.get_mut(id).map(|o| &mut o.data) {
            Some(ObjectData::StateSet(s)) => Some(s),
            _ => None,
        }
    }

    /// Number of objects of a given kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.objects.iter().filter(|o| o.data.kind() == kind).count()
    }
}
