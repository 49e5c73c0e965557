//! Export job orchestration.
//!
//! An [`Exporter`] walks the host objects parent-first, converting each into
//! scene-graph nodes, then runs the passes that need the whole graph:
//! moving skinned meshes under their skeletons and installing the root
//! state and animation manager. The result is an [`Export`] that can be
//! serialized any number of times.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use osgx_math::{Mat4, Mat4Ext};
use thiserror::Error;

use crate::animation::{transform_stack, ChannelExtractor};
use crate::config::{ConfigError, ExportConfig};
use crate::graph::{
    Animation, Channel, DataVariance, Geode, Group, LightModel, LightSource, MatrixTransform,
    ObjectData, ObjectId, SceneGraph, StateSet, UpdateCallback,
};
use crate::joblog::{ExportLog, LogEntry};
use crate::light::convert_light;
use crate::material::{uv_units, MaterialRegistry};
use crate::osg::{serialize, WriteContext};
use crate::rig::{bone_relative_matrix, build_influences, build_skeleton, reparent_to_skeleton, rig_geometry};
use crate::source::{ObjectType, SourceAction, SourceLight, SourceObject, SourceScene};
use crate::weld::Welder;

/// Lights the fixed-function pipeline can enable at once.
pub const MAX_LIGHTS: u32 = 8;

/// Errors that abort an export job.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("No objects to export")]
    NoObjects,

    #[error("Unknown armature: {0}")]
    UnknownArmature(String),
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Record the error in the job log before handing it back.
    fn logged(self, log: &mut ExportLog) -> Self {
        log.error(self.to_string());
        self
    }
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Read a host scene description from a JSON file.
pub fn read_scene<P: AsRef<Path>>(path: P) -> ExportResult<SourceScene> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    Ok(SourceScene::from_json(&text)?)
}

/// Build the graph for `scene`, write it to `path` and close the log.
/// Fatal errors are recorded in `log` before it is closed.
pub fn export_scene<P: AsRef<Path>>(
    scene: &SourceScene,
    config: ExportConfig,
    mut log: ExportLog,
    path: P,
) -> ExportResult<ExportReport> {
    if let Err(e) = config.validate() {
        return Err(ExportError::from(e).logged(&mut log));
    }
    let mut export = Exporter::new(scene, config)?.with_log(log).build()?;
    if let Err(e) = export.write_to(path) {
        return Err(e.logged(&mut export.log));
    }
    Ok(export.finish())
}

/// Counts gathered while building the graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub objects: usize,
    pub geometries: usize,
    pub rig_geometries: usize,
    pub bones: usize,
    pub lights: usize,
    pub animations: usize,
    pub channels: usize,
    pub state_sets: usize,
    pub textures: usize,
    pub rejected_faces: usize,
}

/// Outcome of a finished job.
#[derive(Clone, Debug)]
pub struct ExportReport {
    pub stats: ExportStats,
    pub entries: Vec<LogEntry>,
}

impl ExportReport {
    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.level == log::Level::Warn)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// A built scene graph ready to be written.
#[derive(Debug)]
pub struct Export {
    graph: SceneGraph,
    root: ObjectId,
    config: ExportConfig,
    stats: ExportStats,
    log: ExportLog,
}

impl Export {
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn stats(&self) -> &ExportStats {
        &self.stats
    }

    pub fn log(&self) -> &ExportLog {
        &self.log
    }

    /// Serialize with a fresh write context, so repeated calls agree.
    pub fn to_osg_string(&self) -> String {
        let mut ctx = WriteContext::new(&self.config);
        serialize(&self.graph, self.root, &mut ctx)
    }

    /// Write the text file, creating its directory first.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> ExportResult<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;
        }

        let text = self.to_osg_string();
        let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
        let mut out = BufWriter::new(file);
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| ExportError::io(path, e))?;

        log::info!("Wrote {} ({} bytes)", path.display(), text.len());
        Ok(())
    }

    /// Close the job log and hand back the report.
    pub fn finish(self) -> ExportReport {
        let Export { stats, log, .. } = self;
        ExportReport {
            stats,
            entries: log.into_entries(),
        }
    }
}

/// Converts one host scene into a scene graph.
pub struct Exporter<'s> {
    scene: &'s SourceScene,
    config: ExportConfig,
    log: ExportLog,
    graph: SceneGraph,
    materials: MaterialRegistry,
    extractor: ChannelExtractor,
    skeletons: HashMap<&'s str, ObjectId>,
    animations: HashMap<String, ObjectId>,
    animation_order: Vec<ObjectId>,
    skinned: Vec<(&'s SourceObject, ObjectId)>,
    light_count: u32,
    stats: ExportStats,
}

impl<'s> Exporter<'s> {
    pub fn new(scene: &'s SourceScene, config: ExportConfig) -> ExportResult<Self> {
        config.validate()?;
        Ok(Self {
            scene,
            materials: MaterialRegistry::new(&config),
            extractor: ChannelExtractor::new(&config, scene.frame_start),
            config,
            log: ExportLog::new(),
            graph: SceneGraph::new(),
            skeletons: HashMap::new(),
            animations: HashMap::new(),
            animation_order: Vec::new(),
            skinned: Vec::new(),
            light_count: 0,
            stats: ExportStats::default(),
        })
    }

    /// Record diagnostics in `log` instead of a fresh in-memory log.
    pub fn with_log(mut self, log: ExportLog) -> Self {
        self.log = log;
        self
    }

    pub fn build(mut self) -> ExportResult<Export> {
        let scene = self.scene;
        let included: Vec<&'s SourceObject> = scene
            .objects
            .iter()
            .filter(|o| !self.config.selected_only || o.selected)
            .collect();
        if included.is_empty() {
            return Err(ExportError::NoObjects.logged(&mut self.log));
        }
        self.log.info(format!(
            "Exporting {} of {} objects from '{}'",
            included.len(),
            scene.objects.len(),
            scene.name
        ));

        let names: HashSet<&str> = included.iter().map(|o| o.name.as_str()).collect();
        let mut children: HashMap<&'s str, Vec<&'s SourceObject>> = HashMap::new();
        let mut roots = Vec::new();
        for &object in &included {
            match object.parent.as_deref() {
                Some(parent) if names.contains(parent) => {
                    children.entry(parent).or_default().push(object);
                }
                Some(parent) => {
                    if scene.object(parent).is_none() {
                        self.log.warn(format!(
                            "Object '{}' names missing parent '{}'; exported as a root",
                            object.name, parent
                        ));
                    }
                    roots.push(object);
                }
                None => roots.push(object),
            }
        }

        let root = self
            .graph
            .add("Root", DataVariance::Static, ObjectData::Group(Group::default()));
        let mut visited = HashSet::new();
        for object in roots {
            self.export_object(object, root, true, &children, &mut visited);
        }
        for object in &included {
            if !visited.contains(object.name.as_str()) {
                self.log.warn(format!("Object '{}' is part of a parent cycle; skipped", object.name));
            }
        }

        self.reparent_skinned();
        self.finish_root(root);

        self.stats.animations = self.animation_order.len();
        self.stats.state_sets = self.materials.state_set_count();
        self.stats.textures = self.materials.texture_count();
        self.log.info(format!(
            "Built {} objects: {} geometries, {} bones, {} lights, {} animations, {} materials",
            self.stats.objects,
            self.stats.geometries,
            self.stats.bones,
            self.stats.lights,
            self.stats.animations,
            self.stats.state_sets
        ));

        let Exporter {
            config,
            log,
            graph,
            stats,
            ..
        } = self;
        Ok(Export {
            graph,
            root,
            config,
            stats,
            log,
        })
    }

    fn export_object(
        &mut self,
        object: &'s SourceObject,
        parent: ObjectId,
        is_root: bool,
        children: &HashMap<&'s str, Vec<&'s SourceObject>>,
        visited: &mut HashSet<&'s str>,
    ) {
        if !visited.insert(object.name.as_str()) {
            return;
        }

        let world = object.world_matrix().sanitized();
        let (attach, matrix) = self.placement(object, parent, is_root, world);

        let node = match object.kind {
            ObjectType::Mesh => self.export_mesh(object, matrix),
            ObjectType::Armature => self.export_armature(object, matrix),
            ObjectType::Light => self.export_light(object, matrix),
            ObjectType::Camera | ObjectType::Empty => self.add_transform(object, matrix),
        };
        self.graph.add_child(attach, node);
        self.stats.objects += 1;

        if self.config.export_animations {
            self.animate_object(object, node, matrix);
        }

        if let Some(kids) = children.get(object.name.as_str()) {
            for &child in kids {
                self.export_object(child, node, false, children, visited);
            }
        }
    }

    /// Node to attach to and the matrix relative to it.
    fn placement(
        &mut self,
        object: &SourceObject,
        parent: ObjectId,
        is_root: bool,
        world: Mat4,
    ) -> (ObjectId, Mat4) {
        if is_root {
            let matrix = if self.config.zero_translation {
                world.without_translation()
            } else {
                world
            };
            return (parent, matrix);
        }

        let local = object.local_matrix().sanitized();
        let Some(bone) = object.parent_bone.as_deref() else {
            return (parent, local);
        };
        match self.bone_attachment(object, bone, world) {
            Some(found) => found,
            None => {
                self.log.warn(format!(
                    "Bone '{}' for '{}' not found; attached to its parent object",
                    bone, object.name
                ));
                (parent, local)
            }
        }
    }

    fn bone_attachment(&self, object: &SourceObject, bone: &str, world: Mat4) -> Option<(ObjectId, Mat4)> {
        let armature_name = object.parent.as_deref()?;
        let skeleton = *self.skeletons.get(armature_name)?;
        let bone_id = self.graph.skeleton(skeleton)?.bone(bone)?;

        let armature = self.scene.object(armature_name)?;
        let source = armature.armature.as_ref()?.bones.iter().find(|b| b.name == bone)?;
        let matrix = bone_relative_matrix(
            armature.world_matrix().sanitized(),
            source.bind_matrix().sanitized(),
            world,
        );
        Some((bone_id, matrix))
    }

    fn add_transform(&mut self, object: &SourceObject, matrix: Mat4) -> ObjectId {
        self.graph.add(
            &object.name,
            DataVariance::Static,
            ObjectData::MatrixTransform(MatrixTransform::new(matrix)),
        )
    }

    fn export_mesh(&mut self, object: &'s SourceObject, matrix: Mat4) -> ObjectId {
        let node = self.add_transform(object, matrix);
        let scene = self.scene;
        let Some(mesh) = object.export_mesh(self.config.apply_modifiers) else {
            self.log.warn(format!(
                "Mesh object '{}' has no mesh data; exported as a transform",
                object.name
            ));
            return node;
        };

        let precision = self.config.float_precision;
        let rigged = object.armature_modifier.is_some();
        let mut drawables = Vec::new();

        for slot in Welder::new(mesh, Vec::new(), precision).material_slots() {
            let material_name = mesh.materials.get(slot).and_then(|m| m.as_deref());
            let (layers, units) = uv_units(material_name.and_then(|n| scene.material(n)), mesh);

            let mut welded = Welder::new(mesh, layers, precision).weld(slot, &mut self.log);
            self.stats.rejected_faces += welded.rejected_faces;
            if welded.primitives.is_empty() {
                self.log.info(format!(
                    "Material slot {} of '{}' has no drawable faces",
                    slot, object.name
                ));
                continue;
            }
            log::debug!(
                "'{}' slot {}: {} corners welded to {} vertices",
                object.name,
                slot,
                welded.loose_count,
                welded.vertex_count()
            );

            let vertex_map = std::mem::take(&mut welded.vertex_map);
            let mut geometry = welded.into_geometry(&units);
            if let Some(name) = material_name {
                geometry.state_set = self.materials.state_set(&mut self.graph, scene, name, &mut self.log);
            }
            let geometry = self
                .graph
                .add(&object.name, DataVariance::Static, ObjectData::Geometry(geometry));
            self.stats.geometries += 1;

            let drawable = if rigged {
                let influences = build_influences(&mesh.vertex_groups, &vertex_map, &mut self.log);
                self.stats.rig_geometries += 1;
                rig_geometry(&mut self.graph, &object.name, geometry, influences)
            } else {
                geometry
            };
            drawables.push(drawable);
        }

        if rigged {
            self.skinned.push((object, node));
        }

        let geode = self.graph.add(
            &object.name,
            DataVariance::Static,
            ObjectData::Geode(Geode {
                drawables,
                ..Default::default()
            }),
        );
        self.graph.add_child(node, geode);
        node
    }

    fn export_armature(&mut self, object: &'s SourceObject, matrix: Mat4) -> ObjectId {
        let Some(armature) = object.armature.as_ref() else {
            self.log.warn(format!(
                "Armature object '{}' has no bones; exported as a transform",
                object.name
            ));
            return self.add_transform(object, matrix);
        };

        let skeleton = build_skeleton(&mut self.graph, &object.name, armature, matrix, &mut self.log);
        self.stats.bones += self.graph.skeleton(skeleton).map(|s| s.bones.len()).unwrap_or(0);
        self.skeletons.insert(object.name.as_str(), skeleton);
        skeleton
    }

    fn export_light(&mut self, object: &SourceObject, matrix: Mat4) -> ObjectId {
        let node = self.add_transform(object, matrix);

        let fallback = SourceLight::default();
        let src = match object.light.as_ref() {
            Some(light) => light,
            None => {
                self.log.warn(format!("Light object '{}' has no light data; defaults used", object.name));
                &fallback
            }
        };

        let light_num = self.light_count;
        if light_num >= MAX_LIGHTS {
            self.log.warn(format!(
                "Light '{}' is number {}; only {} lights can be enabled",
                object.name, light_num, MAX_LIGHTS
            ));
        }
        self.light_count += 1;

        let light = self
            .graph
            .add(&object.name, DataVariance::Static, ObjectData::Light(convert_light(src, light_num)));
        let source = self.graph.add(
            &object.name,
            DataVariance::Static,
            ObjectData::LightSource(LightSource::new(light)),
        );
        self.graph.add_child(node, source);
        self.stats.lights += 1;
        node
    }

    fn animate_object(&mut self, object: &'s SourceObject, node: ObjectId, matrix: Mat4) {
        let scene = self.scene;
        let action = match object.action.as_deref() {
            Some(name) => {
                let found = scene.action(name);
                if found.is_none() {
                    self.log.warn(format!("Action '{}' of '{}' not found", name, object.name));
                }
                found
            }
            None => None,
        };

        let channels = self.extractor.object_channels(object, action, matrix, &mut self.log);
        if !channels.is_empty() {
            if let Some(core) = self.graph.node_mut(node) {
                core.update_callbacks.push(UpdateCallback::MatrixTransform {
                    name: object.name.clone(),
                    stack: transform_stack(matrix, object.rotation_mode),
                });
            }
            if let Some(entry) = self.graph.get_mut(node) {
                entry.data_variance = DataVariance::Dynamic;
            }

            let baked = object.has_constraints && self.config.bake_constraints;
            let key = match action {
                Some(action) if !baked => action.name.clone(),
                _ => format!("{}_baked", object.name),
            };
            self.add_channels(&key, channels);
        }

        let skeleton = self.skeletons.get(object.name.as_str()).copied();
        if let (Some(action), Some(skeleton)) = (action, skeleton) {
            self.animate_bones(object, action, skeleton);
        }
    }

    fn animate_bones(&mut self, object: &SourceObject, action: &SourceAction, skeleton: ObjectId) {
        let Some(armature) = object.armature.as_ref() else {
            return;
        };

        let mut channels = Vec::new();
        for name in ChannelExtractor::animated_bones(action) {
            let built = self
                .graph
                .skeleton(skeleton)
                .and_then(|s| s.bone(&name))
                .is_some();
            match armature.bones.iter().find(|b| b.name == name).filter(|_| built) {
                Some(bone) => channels.extend(self.extractor.bone_channels(
                    action,
                    &bone.name,
                    bone.rotation_mode,
                    &mut self.log,
                )),
                None => self.log.warn(format!(
                    "Action '{}' animates unknown bone '{}' of '{}'",
                    action.name, name, object.name
                )),
            }
        }

        if !channels.is_empty() {
            self.add_channels(&action.name, channels);
        }
    }

    /// Append channels to the animation registered under `key`.
    fn add_channels(&mut self, key: &str, channels: Vec<Channel>) {
        let id = match self.animations.get(key) {
            Some(&id) => id,
            None => {
                let id = self.graph.add(
                    key,
                    DataVariance::Unspecified,
                    ObjectData::Animation(Animation::default()),
                );
                self.animations.insert(key.to_string(), id);
                self.animation_order.push(id);
                id
            }
        };
        self.stats.channels += channels.len();
        if let Some(animation) = self.graph.animation_mut(id) {
            animation.channels.extend(channels);
        }
    }

    fn skeleton_for(&self, armature: &str) -> ExportResult<ObjectId> {
        self.skeletons
            .get(armature)
            .copied()
            .ok_or_else(|| ExportError::UnknownArmature(armature.to_string()))
    }

    /// Skinned geometry must sit below the skeleton that deforms it.
    fn reparent_skinned(&mut self) {
        for (object, node) in std::mem::take(&mut self.skinned) {
            let Some(armature) = object.armature_modifier.as_deref() else {
                continue;
            };
            if let Err(e) = self.attach_to_skeleton(object, armature, node) {
                self.log.warn(format!("{}; '{}' stays under its parent", e, object.name));
            }
        }
    }

    fn attach_to_skeleton(&mut self, object: &SourceObject, armature: &str, node: ObjectId) -> ExportResult<()> {
        let skeleton = self.skeleton_for(armature)?;
        if self.is_ancestor(node, skeleton) {
            self.log.warn(format!(
                "Skeleton '{}' is below '{}'; mesh not moved",
                armature, object.name
            ));
            return Ok(());
        }

        let armature_world = self
            .scene
            .object(armature)
            .map(|a| a.world_matrix().sanitized())
            .unwrap_or(Mat4::IDENTITY);
        let matrix = armature_world.delta_to(&object.world_matrix().sanitized());
        reparent_to_skeleton(&mut self.graph, node, skeleton, matrix);

        if let Some(core) = self.graph.node_mut(node) {
            for callback in &mut core.update_callbacks {
                if let UpdateCallback::MatrixTransform { stack, .. } = callback {
                    *stack = transform_stack(matrix, object.rotation_mode);
                }
            }
        }
        Ok(())
    }

    fn is_ancestor(&self, candidate: ObjectId, node: ObjectId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.graph.parent_of(id);
        }
        false
    }

    /// Global lighting state and the animation manager.
    fn finish_root(&mut self, root: ObjectId) {
        let mut state = StateSet::default();
        state.set_mode("GL_LIGHTING", true);
        for n in 0..self.light_count.min(MAX_LIGHTS) {
            state.set_mode(format!("GL_LIGHT{}", n), true);
        }
        let model = self
            .graph
            .add("", DataVariance::Static, ObjectData::LightModel(LightModel::default()));
        state.attributes.push(model);
        let state = self.graph.add("", DataVariance::Static, ObjectData::StateSet(state));

        let animations = self.animation_order.clone();
        if let Some(core) = self.graph.node_mut(root) {
            core.state_set = Some(state);
            if !animations.is_empty() {
                core.update_callbacks
                    .push(UpdateCallback::AnimationManager { animations });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ChannelKeys;
    use osgx_math::Vec3;
    use serde_json::{json, Value};

    fn translation(x: f32, y: f32, z: f32) -> Value {
        json!([
            [1.0, 0.0, 0.0, x],
            [0.0, 1.0, 0.0, y],
            [0.0, 0.0, 1.0, z],
            [0.0, 0.0, 0.0, 1.0]
        ])
    }

    fn triangle() -> Value {
        json!({
            "positions": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
            "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]],
            "faces": [{"vertices": [0, 1, 2], "normal": [0, 0, 1], "smooth": true}]
        })
    }

    fn quad_pair() -> Value {
        json!({
            "positions": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]],
            "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1], [0, 0, 1]],
            "faces": [
                {"vertices": [0, 1, 2], "normal": [0, 0, 1], "smooth": true},
                {"vertices": [0, 2, 3], "normal": [0, 0, 1], "smooth": true}
            ],
            "materials": ["Red"]
        })
    }

    fn scene(value: Value) -> SourceScene {
        SourceScene::from_json(&value.to_string()).unwrap()
    }

    fn build(value: Value, config: ExportConfig) -> ExportResult<Export> {
        let scene = scene(value);
        Exporter::new(&scene, config)?.build()
    }

    fn find(export: &Export, name: &str, kind: &str) -> ObjectId {
        export
            .graph()
            .iter()
            .find(|o| o.name == name && o.data.kind() == kind)
            .map(|o| o.id)
            .unwrap()
    }

    fn matrix_of(export: &Export, id: ObjectId) -> Mat4 {
        export.graph().get(id).unwrap().data.transform().unwrap().matrix
    }

    #[test]
    fn test_mesh_scene_serializes() {
        let _ = env_logger::builder().is_test(true).try_init();
        let export = build(
            json!({"objects": [{"name": "Plane", "type": "MESH", "mesh": quad_pair()}]}),
            ExportConfig::default(),
        )
        .unwrap();

        let text = export.to_osg_string();
        assert!(text.starts_with("Group {\n"));
        assert!(text.contains("name \"Root\""));
        assert!(text.contains("DrawElementsUByte TRIANGLES 6"));
        assert!(text.contains("VertexArray Vec3Array 4"));
        assert!(text.contains("GL_LIGHTING ON"));
        assert!(text.contains("LightModel {"));
        assert_eq!(text, export.to_osg_string());

        assert_eq!(export.stats().objects, 1);
        assert_eq!(export.stats().geometries, 1);
        // Material "Red" is not in the scene
        assert_eq!(export.log().warning_count(), 1);
    }

    #[test]
    fn test_shared_material_written_once() {
        let export = build(
            json!({
                "objects": [
                    {"name": "A", "type": "MESH", "mesh": quad_pair()},
                    {"name": "B", "type": "MESH", "mesh": quad_pair()}
                ],
                "materials": [{"name": "Red", "diffuse_color": [1, 0, 0]}]
            }),
            ExportConfig::default(),
        )
        .unwrap();

        let text = export.to_osg_string();
        assert_eq!(text.matches("Material {").count(), 1);
        assert_eq!(text.matches("Use StateSet_").count(), 1);
        assert_eq!(export.graph().count_kind("Material"), 1);
        assert_eq!(export.stats().state_sets, 1);
        assert_eq!(export.stats().textures, 0);
        assert_eq!(export.log().warning_count(), 0);
    }

    #[test]
    fn test_skinned_mesh_moves_under_skeleton() {
        let mut mesh = triangle();
        mesh["vertex_groups"] = json!([
            {"name": "Bone", "weights": [[0, 1.0], [1, 0.5], [2, 0.0005]]},
            {"name": "Unused", "weights": []}
        ]);
        let export = build(
            json!({
                "objects": [
                    {"name": "Body", "type": "MESH", "mesh": mesh,
                     "armature_modifier": "Armature", "matrix_world": translation(0.0, 0.0, 1.0)},
                    {"name": "Armature", "type": "ARMATURE",
                     "matrix_world": translation(0.0, 0.0, 0.5),
                     "armature": {"bones": [{"name": "Bone"}]}}
                ]
            }),
            ExportConfig::default(),
        )
        .unwrap();

        let body = find(&export, "Body", "MatrixTransform");
        let skeleton = find(&export, "Armature", "Skeleton");
        assert!(export.graph().children(skeleton).contains(&body));
        assert!(!export.graph().children(export.root()).contains(&body));
        assert!(matrix_of(&export, body).abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5)), 1e-6));

        let text = export.to_osg_string();
        assert!(text.contains("osgAnimation::RigGeometry {"));
        assert!(text.contains("osgAnimation::VertexInfluence \"Bone\" 2 {"));
        assert!(text.contains("osgAnimation::UpdateSkeleton"));
        assert_eq!(export.stats().bones, 1);
        assert_eq!(export.stats().rig_geometries, 1);
        // The empty "Unused" group
        assert_eq!(export.log().warning_count(), 1);
    }

    #[test]
    fn test_unknown_armature_is_a_warning() {
        let export = build(
            json!({"objects": [
                {"name": "Body", "type": "MESH", "mesh": triangle(), "armature_modifier": "Ghost"}
            ]}),
            ExportConfig::default(),
        )
        .unwrap();
        let body = find(&export, "Body", "MatrixTransform");
        assert!(export.graph().children(export.root()).contains(&body));
        let warning = export.log().warnings().next().unwrap();
        assert!(warning.message.contains("Unknown armature: Ghost"));
    }

    #[test]
    fn test_bone_parented_object() {
        let value = json!({
            "objects": [
                {"name": "Armature", "type": "ARMATURE",
                 "matrix_world": translation(0.0, 0.0, 2.0),
                 "armature": {"bones": [{"name": "Hand", "matrix_local": translation(0.0, 1.0, 0.0)}]}},
                {"name": "Prop", "parent": "Armature", "parent_bone": "Hand",
                 "matrix_world": translation(1.0, 1.0, 2.0)},
                {"name": "Lost", "parent": "Armature", "parent_bone": "Foot",
                 "matrix_local": translation(3.0, 0.0, 0.0)}
            ]
        });
        let export = build(value, ExportConfig::default()).unwrap();

        let hand = find(&export, "Hand", "Bone");
        let prop = find(&export, "Prop", "MatrixTransform");
        assert_eq!(export.graph().children(hand), &[prop]);
        assert!(matrix_of(&export, prop).abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6));

        let skeleton = find(&export, "Armature", "Skeleton");
        let lost = find(&export, "Lost", "MatrixTransform");
        assert!(export.graph().children(skeleton).contains(&lost));
        assert!(matrix_of(&export, lost).abs_diff_eq(Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)), 1e-6));
        assert_eq!(export.log().warning_count(), 1);
    }

    #[test]
    fn test_light_enabled_on_root() {
        let export = build(
            json!({"objects": [
                {"name": "Lamp", "type": "LIGHT", "light": {"type": "SPOT", "spot_size": 1.0}},
                {"name": "Sun", "type": "LIGHT", "light": {"type": "SUN"}}
            ]}),
            ExportConfig::default(),
        )
        .unwrap();
        let text = export.to_osg_string();
        assert!(text.contains("GL_LIGHT0 ON"));
        assert!(text.contains("GL_LIGHT1 ON"));
        assert!(text.contains("light_num 1"));
        assert_eq!(text.matches("LightSource {").count(), 2);
        assert_eq!(export.stats().lights, 2);
    }

    #[test]
    fn test_object_animation() {
        let export = build(
            json!({
                "frame_start": 1,
                "objects": [{"name": "Cube", "type": "EMPTY", "action": "Move"}],
                "actions": [{"name": "Move", "curves": [
                    {"data_path": "location", "array_index": 0,
                     "keyframes": [{"frame": 1, "value": 0}, {"frame": 26, "value": 2}]}
                ]}]
            }),
            ExportConfig::default(),
        )
        .unwrap();

        let cube = find(&export, "Cube", "MatrixTransform");
        assert_eq!(export.graph().get(cube).unwrap().data_variance, DataVariance::Dynamic);

        let animation = find(&export, "Move", "Animation");
        match &export.graph().get(animation).unwrap().data {
            ObjectData::Animation(a) => {
                assert_eq!(a.channels.len(), 1);
                assert_eq!(a.channels[0].keys.times(), vec![0.0, 1.0]);
            }
            other => panic!("unexpected {}", other.kind()),
        }

        let text = export.to_osg_string();
        assert!(text.contains("osgAnimation::BasicAnimationManager {"));
        assert!(text.contains("osgAnimation::UpdateMatrixTransform {"));
        assert!(text.contains("Vec3LinearChannel {"));
        assert!(text.contains("key 1.00000 2.00000 0.00000 0.00000"));
    }

    #[test]
    fn test_shared_action_is_one_animation() {
        let export = build(
            json!({
                "objects": [
                    {"name": "A", "action": "Spin"},
                    {"name": "B", "action": "Spin"},
                    {"name": "C", "action": "Missing"}
                ],
                "actions": [{"name": "Spin", "curves": [
                    {"data_path": "rotation_euler", "array_index": 2,
                     "keyframes": [{"frame": 1, "value": 0}, {"frame": 11, "value": 3}]}
                ]}]
            }),
            ExportConfig::default(),
        )
        .unwrap();
        assert_eq!(export.graph().count_kind("Animation"), 1);
        assert_eq!(export.stats().channels, 2);
        assert_eq!(export.log().warning_count(), 1);
    }

    #[test]
    fn test_bone_animation() {
        let export = build(
            json!({
                "objects": [{"name": "Rig", "type": "ARMATURE", "action": "Wave",
                             "armature": {"bones": [{"name": "Arm"}]}}],
                "actions": [{"name": "Wave", "curves": [
                    {"data_path": "pose.bones[\"Arm\"].rotation_quaternion", "array_index": 0,
                     "keyframes": [{"frame": 1, "value": 1}, {"frame": 6, "value": 0}]},
                    {"data_path": "pose.bones[\"Arm\"].rotation_quaternion", "array_index": 1,
                     "keyframes": [{"frame": 1, "value": 0}, {"frame": 6, "value": 1}]},
                    {"data_path": "pose.bones[\"Leg\"].location", "array_index": 0,
                     "keyframes": [{"frame": 1, "value": 0}]}
                ]}]
            }),
            ExportConfig::default(),
        )
        .unwrap();

        let animation = find(&export, "Wave", "Animation");
        match &export.graph().get(animation).unwrap().data {
            ObjectData::Animation(a) => {
                assert_eq!(a.channels.len(), 1);
                assert_eq!(a.channels[0].target, "Arm");
                assert!(matches!(a.channels[0].keys, ChannelKeys::Quat(_)));
            }
            other => panic!("unexpected {}", other.kind()),
        }
        let text = export.to_osg_string();
        assert!(text.contains("QuatSphericalLinearChannel {"));
        assert!(text.contains("osgAnimation::UpdateBone {"));
        assert_eq!(export.log().warning_count(), 1);
    }

    #[test]
    fn test_animations_can_be_disabled() {
        let export = build(
            json!({
                "objects": [{"name": "Cube", "action": "Move"}],
                "actions": [{"name": "Move", "curves": [
                    {"data_path": "location", "keyframes": [{"frame": 1, "value": 0}]}
                ]}]
            }),
            ExportConfig {
                export_animations: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(export.graph().count_kind("Animation"), 0);
        assert!(!export.to_osg_string().contains("BasicAnimationManager"));
    }

    #[test]
    fn test_selected_child_becomes_root() {
        let export = build(
            json!({"objects": [
                {"name": "Parent", "matrix_world": translation(5.0, 0.0, 0.0)},
                {"name": "Kid", "parent": "Parent", "selected": true,
                 "matrix_world": translation(5.0, 1.0, 0.0), "matrix_local": translation(0.0, 1.0, 0.0)}
            ]}),
            ExportConfig {
                selected_only: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(export.stats().objects, 1);
        let kid = find(&export, "Kid", "MatrixTransform");
        assert_eq!(export.graph().children(export.root()), &[kid]);
        assert!(matrix_of(&export, kid).abs_diff_eq(Mat4::from_translation(Vec3::new(5.0, 1.0, 0.0)), 1e-6));
    }

    #[test]
    fn test_zero_translation_on_roots_only() {
        let export = build(
            json!({"objects": [
                {"name": "Top", "matrix_world": translation(4.0, 5.0, 6.0)},
                {"name": "Child", "parent": "Top", "matrix_local": translation(1.0, 0.0, 0.0)}
            ]}),
            ExportConfig {
                zero_translation: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(matrix_of(&export, find(&export, "Top", "MatrixTransform")), Mat4::IDENTITY);
        assert_eq!(
            matrix_of(&export, find(&export, "Child", "MatrixTransform")),
            Mat4::from_translation(Vec3::X)
        );
    }

    #[test]
    fn test_rejected_faces_counted() {
        let export = build(
            json!({"objects": [{"name": "Ngon", "type": "MESH", "mesh": {
                "positions": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0], [0.5, 2, 0]],
                "faces": [
                    {"vertices": [0, 1, 2, 4, 3], "normal": [0, 0, 1]},
                    {"vertices": [0, 1, 2], "normal": [0, 0, 1]}
                ]
            }}]}),
            ExportConfig::default(),
        )
        .unwrap();
        assert_eq!(export.stats().rejected_faces, 1);
        assert_eq!(export.stats().geometries, 1);
        assert!(export.log().warning_count() >= 1);
    }

    #[test]
    fn test_parent_cycle_is_skipped() {
        let export = build(
            json!({"objects": [
                {"name": "Solo"},
                {"name": "X", "parent": "Y"},
                {"name": "Y", "parent": "X"}
            ]}),
            ExportConfig::default(),
        )
        .unwrap();
        assert_eq!(export.stats().objects, 1);
        assert_eq!(export.log().warning_count(), 2);
    }

    #[test]
    fn test_no_objects() {
        assert!(matches!(build(json!({}), ExportConfig::default()), Err(ExportError::NoObjects)));
        assert!(matches!(
            build(
                json!({"objects": [{"name": "Idle"}]}),
                ExportConfig {
                    selected_only: true,
                    ..Default::default()
                }
            ),
            Err(ExportError::NoObjects)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = build(
            json!({"objects": [{"name": "A"}]}),
            ExportConfig {
                bake_frame_step: 0,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ExportError::Config(_))));
    }

    #[test]
    fn test_write_to_creates_directory() {
        let dir = std::env::temp_dir().join(format!("osgx_export_{}", std::process::id()));
        let path = dir.join("nested").join("scene.osg");
        let scene = scene(json!({"objects": [{"name": "Empty"}]}));

        let report = export_scene(&scene, ExportConfig::default(), ExportLog::new(), &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Group {"));
        assert_eq!(report.stats.objects, 1);
        assert_eq!(report.warning_count(), 0);
        assert!(!report.entries.is_empty());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_write_recorded_in_log() {
        let dir = std::env::temp_dir().join(format!("osgx_export_blocked_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        let log_path = dir.join("job.log");
        let out = blocker.join("scene.osg");

        let scene = scene(json!({"objects": [{"name": "Empty"}]}));
        let log = ExportLog::with_file(&log_path).unwrap();
        let result = export_scene(&scene, ExportConfig::default(), log, &out);
        match result {
            Err(ExportError::Io { ref path, .. }) => assert_eq!(path, &blocker),
            ref other => panic!("expected an IO error, got {:?}", other.as_ref().map(|r| &r.stats)),
        }

        let text = fs::read_to_string(&log_path).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("ERROR: IO error on "), "{}", last);
        assert!(last.contains("not_a_dir"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_config_recorded_in_log() {
        let scene = scene(json!({"objects": [{"name": "Empty"}]}));
        let path = std::env::temp_dir().join(format!("osgx_bad_config_{}.log", std::process::id()));
        let config = ExportConfig {
            bake_frame_step: 0,
            ..Default::default()
        };
        let log = ExportLog::with_file(&path).unwrap();
        let out = std::env::temp_dir().join("osgx_never_written.osg");
        assert!(matches!(export_scene(&scene, config, log, &out), Err(ExportError::Config(_))));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ERROR: Config error"), "{}", text);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_read_scene_reports_json_errors() {
        let path = std::env::temp_dir().join(format!("osgx_bad_scene_{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_scene(&path), Err(ExportError::Json(_))));
        let _ = fs::remove_file(&path);
        match read_scene(&path) {
            Err(ExportError::Io { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected an IO error, got {:?}", other.map(|s| s.name)),
        }
    }
}
