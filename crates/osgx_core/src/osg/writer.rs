//! Graph walker producing the dotosg text.

use osgx_math::Mat4;

use super::format::{quote, WriteContext, LEVEL_MARK};
use crate::graph::*;

/// Serialize the graph below `root` into a string.
///
/// Ids already recorded in `ctx` are written as back-references; call
/// [`WriteContext::reset`] between unrelated graphs.
pub fn serialize(graph: &SceneGraph, root: ObjectId, ctx: &mut WriteContext) -> String {
    let mut writer = OsgWriter::new(graph, ctx);
    writer.write_object(root, 0);
    writer.finish()
}

/// Recursive writer over one graph.
pub struct OsgWriter<'a> {
    graph: &'a SceneGraph,
    ctx: &'a mut WriteContext,
    out: String,
}

impl<'a> OsgWriter<'a> {
    pub fn new(graph: &'a SceneGraph, ctx: &'a mut WriteContext) -> Self {
        Self {
            graph,
            ctx,
            out: String::new(),
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, level: usize, template: &str) {
        let encoded = self.ctx.encoder.encode(level, template);
        self.out.push_str(&encoded);
        self.out.push('\n');
    }

    /// Like `line`, pushed right by `blocks` extra block indents.
    fn block_line(&mut self, level: usize, blocks: usize, template: &str) {
        let body = template.strip_prefix(LEVEL_MARK).unwrap_or(template);
        let nested = format!("{}{}{}", LEVEL_MARK, "#".repeat(blocks), body);
        self.line(level, &nested);
    }

    fn bool_word(value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn on_off(value: bool) -> &'static str {
        if value {
            "ON"
        } else {
            "OFF"
        }
    }

    /// Write one shareable object in full, or as `Use <id>` when it has
    /// already been written in this pass.
    pub fn write_object(&mut self, id: ObjectId, level: usize) {
        let graph = self.graph;
        let Some(object) = graph.get(id) else {
            log::warn!("Skipping reference to unknown object {:?}", id);
            return;
        };

        if !self.ctx.mark_written(id) {
            self.line(level, &format!("$Use {}", object.unique_id()));
            return;
        }

        self.line(level, &format!("${} {{", object.data.tag()));
        self.write_object_content(object, level);

        match &object.data {
            ObjectData::Group(group) => {
                self.write_node_content(&group.node, level);
                self.write_group_content(group, level);
            }
            ObjectData::MatrixTransform(transform) => {
                self.write_node_content(&transform.group.node, level);
                self.write_transform_content(transform, level);
                self.write_group_content(&transform.group, level);
            }
            ObjectData::Skeleton(skeleton) => {
                let transform = &skeleton.transform;
                self.write_node_content(&transform.group.node, level);
                self.write_transform_content(transform, level);
                self.write_group_content(&transform.group, level);
            }
            ObjectData::Bone(bone) => {
                let transform = &bone.transform;
                self.write_node_content(&transform.group.node, level);
                self.write_matrix(level, 0, "InvBindMatrixInSkeletonSpace", &bone.inverse_bind);
                self.write_transform_content(transform, level);
                self.write_group_content(&transform.group, level);
            }
            ObjectData::Geode(geode) => {
                self.write_node_content(&geode.node, level);
                self.line(level, &format!("$#num_drawables {}", geode.drawables.len()));
                for &drawable in &geode.drawables {
                    self.write_object(drawable, level + 1);
                }
            }
            ObjectData::LightSource(source) => {
                self.write_node_content(&source.node, level);
                self.line(level, "$#referenceFrame RELATIVE");
                self.write_object(source.light, level + 1);
                self.line(level, "$#num_children 0");
            }
            ObjectData::Geometry(geometry) => self.write_geometry_content(geometry, level),
            ObjectData::RigGeometry(rig) => self.write_rig_content(rig, level),
            ObjectData::StateSet(state) => self.write_state_set_content(state, level),
            ObjectData::Material(material) => self.write_material_content(material, level),
            ObjectData::LightModel(model) => {
                self.line(
                    level,
                    &format!("$#ambientIntensity {}", self.ctx.floats(&model.ambient_intensity.to_array())),
                );
                let control = if model.separate_specular {
                    "SEPARATE_SPECULAR_COLOR"
                } else {
                    "SINGLE_COLOR"
                };
                self.line(level, &format!("$#colorControl {}", control));
                self.line(level, &format!("$#localViewer {}", Self::bool_word(model.local_viewer)));
                self.line(level, &format!("$#twoSided {}", Self::bool_word(model.two_sided)));
            }
            ObjectData::BlendFunc(blend) => {
                self.line(level, &format!("$#source {}", blend.source));
                self.line(level, &format!("$#destination {}", blend.destination));
            }
            ObjectData::Texture2D(texture) => {
                self.line(level, &format!("$#file {}", quote(&texture.file)));
                for axis in ["s", "t", "r"] {
                    self.line(level, &format!("$#wrap_{} {}", axis, texture.wrap));
                }
                self.line(level, &format!("$#min_filter {}", texture.min_filter));
                self.line(level, &format!("$#mag_filter {}", texture.mag_filter));
                self.line(level, "$#unRefImageDataAfterApply TRUE");
            }
            ObjectData::Light(light) => self.write_light_content(light, level),
            ObjectData::Animation(animation) => self.write_animation_content(animation, level),
        }

        self.line(level, "$}");
    }

    fn write_object_content(&mut self, object: &Object, level: usize) {
        self.line(level, &format!("$#UniqueID {}", object.unique_id()));
        if let Some(variance) = object.data_variance.as_str() {
            self.line(level, &format!("$#DataVariance {}", variance));
        }
        if !object.name.is_empty() {
            self.line(level, &format!("$#name {}", quote(&object.name)));
        }
    }

    fn write_node_content(&mut self, node: &NodeCore, level: usize) {
        self.line(
            level,
            &format!("$#cullingActive {}", Self::bool_word(node.culling_active)),
        );
        if !node.update_callbacks.is_empty() {
            self.line(level, "$#UpdateCallbacks {");
            for callback in &node.update_callbacks {
                self.write_callback(callback, level, 2);
            }
            self.line(level, "$#}");
        }
        if let Some(state_set) = node.state_set {
            self.write_object(state_set, level + 1);
        }
    }

    fn write_transform_content(&mut self, transform: &MatrixTransform, level: usize) {
        self.line(level, "$#referenceFrame RELATIVE");
        self.write_matrix(level, 0, "Matrix", &transform.matrix);
    }

    fn write_group_content(&mut self, group: &Group, level: usize) {
        self.line(level, &format!("$#num_children {}", group.children.len()));
        for &child in &group.children {
            self.write_object(child, level + 1);
        }
    }

    /// Four rows of four numbers; each row is one basis column of the
    /// matrix, so translation lands on the last row.
    fn write_matrix(&mut self, level: usize, blocks: usize, label: &str, matrix: &Mat4) {
        self.block_line(level, blocks, &format!("$#{} {{", label));
        for column in matrix.to_cols_array_2d() {
            let row = self.ctx.floats(&column);
            self.block_line(level, blocks, &format!("$##{}", row));
        }
        self.block_line(level, blocks, "$#}");
    }

    fn write_callback(&mut self, callback: &UpdateCallback, level: usize, blocks: usize) {
        self.block_line(level, blocks, &format!("${} {{", callback.tag()));
        match callback {
            UpdateCallback::MatrixTransform { name, stack } | UpdateCallback::Bone { name, stack } => {
                self.block_line(level, blocks, &format!("$#name {}", quote(name)));
                for element in stack {
                    self.write_stacked_element(element, level, blocks + 1);
                }
            }
            UpdateCallback::Skeleton => {}
            UpdateCallback::AnimationManager { animations } => {
                self.block_line(level, blocks, &format!("$#num_animations {}", animations.len()));
                for &animation in animations {
                    self.write_object(animation, level + blocks + 1);
                }
            }
        }
        self.block_line(level, blocks, "$}");
    }

    fn write_stacked_element(&mut self, element: &StackedElement, level: usize, blocks: usize) {
        self.block_line(level, blocks, &format!("${} {{", element.tag()));
        self.block_line(level, blocks, &format!("$#name {}", quote(element.name())));
        match element {
            StackedElement::Translate { value, .. } => {
                self.block_line(
                    level,
                    blocks,
                    &format!("$#translate {}", self.ctx.floats(&value.to_array())),
                );
            }
            StackedElement::Quaternion { value, .. } => {
                self.block_line(
                    level,
                    blocks,
                    &format!("$#quaternion {}", self.ctx.floats(&value.to_array())),
                );
            }
            StackedElement::RotateAxis { axis, angle, .. } => {
                self.block_line(
                    level,
                    blocks,
                    &format!("$#axis {}", self.ctx.floats(&axis.to_array())),
                );
                self.block_line(level, blocks, &format!("$#angle {}", self.ctx.float(*angle)));
            }
            StackedElement::Scale { value, .. } => {
                self.block_line(
                    level,
                    blocks,
                    &format!("$#scale {}", self.ctx.floats(&value.to_array())),
                );
            }
            StackedElement::Matrix { value, .. } => self.write_matrix(level, blocks, "Matrix", value),
        }
        self.block_line(level, blocks, "$}");
    }

    fn write_geometry_content(&mut self, geometry: &Geometry, level: usize) {
        if let Some(state_set) = geometry.state_set {
            self.write_object(state_set, level + 1);
        }
        self.line(level, "$#useDisplayList TRUE");
        self.line(level, "$#useVertexBufferObjects FALSE");

        if !geometry.primitives.is_empty() {
            self.line(level, &format!("$#PrimitiveSets {}", geometry.primitives.len()));
            self.line(level, "$#{");
            for primitive in &geometry.primitives {
                self.line(
                    level,
                    &format!(
                        "$##{} {} {}",
                        primitive.index_width().draw_elements_tag(),
                        primitive.mode.as_str(),
                        primitive.indices.len()
                    ),
                );
                self.line(level, "$##{");
                for face in primitive.indices.chunks(primitive.mode.corners()) {
                    let text = face
                        .iter()
                        .map(|i| i.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    self.line(level, &format!("$###{}", text));
                }
                self.line(level, "$##}");
            }
            self.line(level, "$#}");
        }

        let vertices: Vec<Vec<f32>> = geometry.vertices.iter().map(|v| v.to_array().to_vec()).collect();
        self.write_array(level, "VertexArray Vec3Array", &vertices);

        if !geometry.normals.is_empty() {
            self.line(level, "$#NormalBinding PER_VERTEX");
            let normals: Vec<Vec<f32>> = geometry.normals.iter().map(|n| n.to_array().to_vec()).collect();
            self.write_array(level, "NormalArray Vec3Array", &normals);
        }

        if let Some(colors) = &geometry.colors {
            self.line(level, "$#ColorBinding PER_VERTEX");
            let colors: Vec<Vec<f32>> = colors.iter().map(|c| c.to_array().to_vec()).collect();
            self.write_array(level, "ColorArray Vec4Array", &colors);
        }

        for (unit, coords) in &geometry.tex_coords {
            let coords: Vec<Vec<f32>> = coords.iter().map(|uv| uv.to_array().to_vec()).collect();
            self.write_array(level, &format!("TexCoordArray {} Vec2Array", unit), &coords);
        }
    }

    fn write_array(&mut self, level: usize, label: &str, rows: &[Vec<f32>]) {
        self.line(level, &format!("$#{} {}", label, rows.len()));
        self.line(level, "$#{");
        for row in rows {
            let text = self.ctx.floats(row);
            self.line(level, &format!("$##{}", text));
        }
        self.line(level, "$#}");
    }

    fn write_rig_content(&mut self, rig: &RigGeometry, level: usize) {
        if let Some(state_set) = rig.state_set {
            self.write_object(state_set, level + 1);
        }
        self.line(level, &format!("$#num_influences {}", rig.influences.len()));
        for influence in &rig.influences {
            self.line(
                level,
                &format!(
                    "$#osgAnimation::VertexInfluence {} {} {{",
                    quote(&influence.name),
                    influence.weights.len()
                ),
            );
            for (index, weight) in &influence.weights {
                self.line(level, &format!("$##{} {}", index, self.ctx.float(*weight)));
            }
            self.line(level, "$#}");
        }
        self.write_object(rig.source, level + 1);
    }

    fn write_state_set_content(&mut self, state: &StateSet, level: usize) {
        self.line(level, &format!("$#rendering_hint {}", state.rendering_hint.as_str()));
        match state.rendering_hint {
            RenderingHint::Default => self.line(level, "$#renderBinMode INHERIT"),
            RenderingHint::Transparent => {
                self.line(level, "$#renderBinMode USE");
                self.line(level, "$#binNumber 10");
                self.line(level, "$#binName DepthSortedBin");
            }
        }
        for (mode, on) in &state.modes {
            self.line(level, &format!("$#{} {}", mode, Self::on_off(*on)));
        }
        for &attribute in &state.attributes {
            self.write_object(attribute, level + 1);
        }
        for (unit, slot) in &state.texture_units {
            self.line(level, &format!("$#textureUnit {} {{", unit));
            for (mode, on) in &slot.modes {
                self.line(level, &format!("$##{} {}", mode, Self::on_off(*on)));
            }
            for &attribute in &slot.attributes {
                self.write_object(attribute, level + 2);
            }
            self.line(level, "$#}");
        }
    }

    fn write_material_content(&mut self, material: &Material, level: usize) {
        self.line(level, "$#ColorMode OFF");
        let colors = [
            ("ambientColor", material.ambient),
            ("diffuseColor", material.diffuse),
            ("specularColor", material.specular),
            ("emissionColor", material.emission),
        ];
        for (label, color) in colors {
            self.line(level, &format!("$#{} {}", label, self.ctx.floats(&color.to_array())));
        }
        self.line(level, &format!("$#shininess {}", self.ctx.float(material.shininess)));
    }

    fn write_light_content(&mut self, light: &Light, level: usize) {
        self.line(level, &format!("$#light_num {}", light.light_num));
        let vectors = [
            ("ambient", light.ambient.to_array().to_vec()),
            ("diffuse", light.diffuse.to_array().to_vec()),
            ("specular", light.specular.to_array().to_vec()),
            ("position", light.position.to_array().to_vec()),
            ("direction", light.direction.to_array().to_vec()),
        ];
        for (label, values) in vectors {
            self.line(level, &format!("$#{} {}", label, self.ctx.floats(&values)));
        }
        let scalars = [
            ("constant_attenuation", light.constant_attenuation),
            ("linear_attenuation", light.linear_attenuation),
            ("quadratic_attenuation", light.quadratic_attenuation),
            ("spot_exponent", light.spot_exponent),
            ("spot_cutoff", light.spot_cutoff),
        ];
        for (label, value) in scalars {
            self.line(level, &format!("$#{} {}", label, self.ctx.float(value)));
        }
    }

    fn write_animation_content(&mut self, animation: &Animation, level: usize) {
        self.line(level, &format!("$#num_channels {}", animation.channels.len()));
        for channel in &animation.channels {
            let inner = level + 1;
            self.line(inner, &format!("${} {{", channel.keys.tag()));
            self.line(inner, &format!("$#name {}", quote(&channel.name)));
            self.line(inner, &format!("$#target {}", quote(&channel.target)));
            self.line(inner, &format!("$#Keyframes {} {{", channel.keys.len()));
            for (time, values) in channel.keys.components() {
                self.line(
                    inner,
                    &format!("$##key {} {}", self.ctx.float(time), self.ctx.floats(&values)),
                );
            }
            self.line(inner, "$#}");
            self.line(inner, "$}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osg::Encoder;
    use osgx_math::{Vec3, Vec4};

    fn shared_state_graph() -> (SceneGraph, ObjectId, ObjectId) {
        let mut graph = SceneGraph::new();
        let material = graph.add(
            "Red",
            DataVariance::Static,
            ObjectData::Material(Material {
                diffuse: Vec4::new(1.0, 0.0, 0.0, 1.0),
                ..Default::default()
            }),
        );
        let mut state = StateSet::default();
        state.attributes.push(material);
        let state = graph.add("Red", DataVariance::Static, ObjectData::StateSet(state));

        let mut geodes = Vec::new();
        for name in ["A", "B", "C"] {
            let geometry = graph.add(
                name,
                DataVariance::Static,
                ObjectData::Geometry(Geometry {
                    vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                    normals: vec![Vec3::Z; 3],
                    primitives: vec![Primitive {
                        mode: PrimitiveMode::Triangles,
                        indices: vec![0, 1, 2],
                    }],
                    state_set: Some(state),
                    ..Default::default()
                }),
            );
            geodes.push(graph.add(
                name,
                DataVariance::Static,
                ObjectData::Geode(Geode {
                    drawables: vec![geometry],
                    ..Default::default()
                }),
            ));
        }
        let root = graph.add(
            "Root",
            DataVariance::Static,
            ObjectData::Group(Group {
                children: geodes,
                ..Default::default()
            }),
        );
        (graph, root, state)
    }

    #[test]
    fn test_shared_state_written_once() {
        let (graph, root, state) = shared_state_graph();
        let mut ctx = WriteContext::default();
        let text = serialize(&graph, root, &mut ctx);

        let uid = graph.get(state).unwrap().unique_id();
        assert_eq!(text.matches(&format!("UniqueID {}", uid)).count(), 1);
        assert_eq!(text.matches(&format!("Use {}", uid)).count(), 2);
        assert_eq!(text.matches("Material {").count(), 1);
    }

    #[test]
    fn test_serialize_is_deterministic_after_reset() {
        let (graph, root, _) = shared_state_graph();
        let mut ctx = WriteContext::default();
        let first = serialize(&graph, root, &mut ctx);
        ctx.reset();
        let second = serialize(&graph, root, &mut ctx);
        assert_eq!(first, second);
    }

    #[test]
    fn test_without_reset_root_is_back_reference() {
        let (graph, root, _) = shared_state_graph();
        let mut ctx = WriteContext::default();
        serialize(&graph, root, &mut ctx);
        let again = serialize(&graph, root, &mut ctx);
        assert_eq!(again.trim(), format!("Use {}", graph.get(root).unwrap().unique_id()));
    }

    #[test]
    fn test_indentation_and_primitives() {
        let (graph, root, _) = shared_state_graph();
        let mut ctx = WriteContext::default();
        let text = serialize(&graph, root, &mut ctx);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Group {");
        assert_eq!(lines[1], "  UniqueID Group_8");
        assert!(lines.contains(&"  Geode {"));
        assert!(lines.contains(&"    Geometry {"));
        assert!(text.contains("DrawElementsUByte TRIANGLES 3"));
        assert!(text.contains("VertexArray Vec3Array 3"));
        assert_eq!(lines.last(), Some(&"}"));
    }

    #[test]
    fn test_callbacks_nest_with_block_indent() {
        let mut transform = MatrixTransform::new(Mat4::IDENTITY);
        transform.group.node.update_callbacks.push(UpdateCallback::MatrixTransform {
            name: "Cube".into(),
            stack: vec![StackedElement::Translate {
                name: "translate".into(),
                value: Vec3::ZERO,
            }],
        });
        let mut graph = SceneGraph::new();
        let node = graph.add("Cube", DataVariance::Dynamic, ObjectData::MatrixTransform(transform));

        let mut ctx = WriteContext::default();
        ctx.encoder = Encoder {
            indent: 1,
            block_indent: 4,
        };
        let text = serialize(&graph, node, &mut ctx);
        let indent_of = |needle: &str| {
            let line = text.lines().find(|l| l.trim_start().starts_with(needle)).unwrap();
            line.len() - line.trim_start().len()
        };

        assert_eq!(indent_of("UpdateCallbacks {"), 4);
        assert_eq!(indent_of("osgAnimation::UpdateMatrixTransform {"), 8);
        assert_eq!(indent_of("osgAnimation::StackedTranslateElement {"), 12);
        assert_eq!(indent_of("name \"translate\""), 16);
        assert_eq!(indent_of("translate 0"), 16);
    }

    #[test]
    fn test_matrix_rows_carry_translation_last() {
        let mut graph = SceneGraph::new();
        let node = graph.add(
            "Moved",
            DataVariance::Static,
            ObjectData::MatrixTransform(MatrixTransform::new(Mat4::from_translation(Vec3::new(
                1.0, 2.0, 3.0,
            )))),
        );
        let mut ctx = WriteContext::default();
        ctx.precision = 1;
        let text = serialize(&graph, node, &mut ctx);
        assert!(text.contains("    1.0 2.0 3.0 1.0\n  }"));
        assert!(text.contains("    1.0 0.0 0.0 0.0\n"));
    }

    #[test]
    fn test_animation_channels_written() {
        let mut graph = SceneGraph::new();
        let animation = graph.add(
            "Spin",
            DataVariance::Dynamic,
            ObjectData::Animation(Animation {
                channels: vec![Channel::new(
                    "quaternion",
                    "Cube",
                    ChannelKeys::Quat(vec![(0.0, osgx_math::Quat::IDENTITY)]),
                )],
            }),
        );
        let root = graph.add(
            "Root",
            DataVariance::Static,
            ObjectData::Group(Group {
                node: NodeCore {
                    update_callbacks: vec![UpdateCallback::AnimationManager {
                        animations: vec![animation],
                    }],
                    ..Default::default()
                },
                ..Default::default()
            }),
        );
        let mut ctx = WriteContext::default();
        ctx.precision = 2;
        let text = serialize(&graph, root, &mut ctx);
        assert!(text.contains("osgAnimation::BasicAnimationManager {"));
        assert!(text.contains("QuatSphericalLinearChannel {"));
        assert!(text.contains("key 0.00 0.00 0.00 0.00 1.00"));
        assert!(text.contains("target \"Cube\""));
    }
}
