//! WGSL front-end shared by every driver.
//!
//! "Compiling" a stage means parsing and validating it with naga and
//! extracting the interface a link step needs: the entry point, the
//! `@location` inputs/outputs and the uniform buffers it actually uses.

use std::collections::BTreeMap;
use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::driver::Stage;

/// Per-vertex attribute formats accepted as vertex shader inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttributeFormat {
    pub fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32 => 4,
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u64,
}

/// Tightly packed, single-buffer vertex layout derived from the vertex inputs.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
    pub stride: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UniformBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Size in bytes of the uniform's type.
    pub size: u64,
}

/// Number of components every color target format has.
pub const COLOR_TARGET_COMPONENTS: u32 = 4;

/// Scalar or vector type carried through a `@location`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IoType {
    pub scalar: naga::Scalar,
    /// 1 for scalars, 2..=4 for vectors.
    pub components: u32,
}

impl IoType {
    fn of(inner: &naga::TypeInner) -> Option<Self> {
        match *inner {
            naga::TypeInner::Scalar(scalar) => Some(Self {
                scalar,
                components: 1,
            }),
            naga::TypeInner::Vector { size, scalar } => Some(Self {
                scalar,
                components: size as u32,
            }),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        self.scalar.kind == naga::ScalarKind::Float
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.scalar.kind {
            naga::ScalarKind::Float => "f",
            naga::ScalarKind::Sint => "i",
            naga::ScalarKind::Uint => "u",
            _ => return write!(f, "{:?}x{}", self.scalar, self.components),
        };
        let bits = u32::from(self.scalar.width) * 8;
        match self.components {
            1 => write!(f, "{prefix}{bits}"),
            n => write!(f, "vec{n}<{prefix}{bits}>"),
        }
    }
}

/// One user-defined stage input or output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocationIo {
    pub location: u32,
    pub ty: IoType,
    pub interpolation: Option<naga::Interpolation>,
    pub sampling: Option<naga::Sampling>,
}

/// Interface of one successfully compiled stage.
#[derive(Debug, Clone)]
pub struct StageInterface {
    pub stage: Stage,
    pub entry_point: String,
    /// Vertex inputs with their formats; empty for fragment stages.
    pub vertex_inputs: Vec<(u32, AttributeFormat)>,
    pub inputs: Vec<LocationIo>,
    pub outputs: Vec<LocationIo>,
    pub uniforms: Vec<UniformBinding>,
}

impl StageInterface {
    fn output(&self, location: u32) -> Option<&LocationIo> {
        self.outputs.iter().find(|o| o.location == location)
    }
}

/// Interface of a linked vertex + fragment pair.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_layout: VertexLayout,
    pub uniforms: Vec<UniformBinding>,
    /// Number of bind groups, `0..group_count` are all populated.
    pub group_count: u32,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<&UniformBinding> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn uniform_at(&self, group: u32, binding: u32) -> Option<&UniformBinding> {
        self.uniforms
            .iter()
            .find(|u| u.group == group && u.binding == binding)
    }
}

fn naga_stage(stage: Stage) -> naga::ShaderStage {
    match stage {
        Stage::Vertex => naga::ShaderStage::Vertex,
        Stage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses, validates and reflects one WGSL stage.
///
/// On failure the returned string is the full diagnostic, source excerpts included.
pub fn compile(stage: Stage, source: &str) -> Result<StageInterface, String> {
    if source.trim().is_empty() {
        return Err(format!("{stage} source is empty"));
    }

    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let wanted = naga_stage(stage);
    let mut candidates = module
        .entry_points
        .iter()
        .enumerate()
        .filter(|(_, ep)| ep.stage == wanted);

    let Some((ep_index, ep)) = candidates.next() else {
        return Err(format!("no @{stage} entry point found"));
    };
    if let Some((_, extra)) = candidates.next() {
        return Err(format!(
            "expected exactly one @{stage} entry point, found `{}` and `{}`",
            ep.name, extra.name
        ));
    }

    let mut inputs = Vec::new();
    for arg in &ep.function.arguments {
        collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut inputs)?;
    }

    let mut outputs = Vec::new();
    if let Some(result) = &ep.function.result {
        collect_locations(&module, result.ty, result.binding.as_ref(), &mut outputs)?;
    }

    let vertex_inputs = if stage == Stage::Vertex {
        inputs
            .iter()
            .map(|io| {
                attribute_format(io.ty).map(|format| (io.location, format)).ok_or_else(|| {
                    format!(
                        "vertex input @location({}) is {}; only f32 or vecN<f32> attributes are supported",
                        io.location, io.ty
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    let ep_info = info.get_entry_point(ep_index);
    let mut uniforms = Vec::new();
    for (handle, var) in module.global_variables.iter() {
        if ep_info[handle].is_empty() {
            continue;
        }
        let Some(binding) = &var.binding else { continue };
        let name = var.name.clone().unwrap_or_default();

        if var.space != naga::AddressSpace::Uniform {
            return Err(format!(
                "resource `{name}` at group {} binding {} is not a uniform buffer",
                binding.group, binding.binding
            ));
        }

        uniforms.push(UniformBinding {
            name,
            group: binding.group,
            binding: binding.binding,
            size: u64::from(module.types[var.ty].inner.size(module.to_ctx())),
        });
    }

    Ok(StageInterface {
        stage,
        entry_point: ep.name.clone(),
        vertex_inputs,
        inputs,
        outputs,
        uniforms,
    })
}

/// Checks that two stages form a usable program and merges their interfaces.
pub fn link(vertex: &StageInterface, fragment: &StageInterface) -> Result<ProgramInterface, String> {
    if vertex.stage != Stage::Vertex {
        return Err(format!("{} stage attached in the vertex slot", vertex.stage));
    }
    if fragment.stage != Stage::Fragment {
        return Err(format!("{} stage attached in the fragment slot", fragment.stage));
    }

    let mut errors = Vec::new();

    for input in &fragment.inputs {
        let loc = input.location;
        let Some(output) = vertex.output(loc) else {
            errors.push(format!(
                "fragment input @location({loc}) is not written by the vertex stage"
            ));
            continue;
        };
        if output.ty != input.ty {
            errors.push(format!(
                "fragment input @location({loc}) is {} but the vertex stage writes {}",
                input.ty, output.ty
            ));
        }
        if (output.interpolation, output.sampling) != (input.interpolation, input.sampling) {
            errors.push(format!(
                "@location({loc}) is interpolated as {:?}/{:?} in the vertex stage and {:?}/{:?} in the fragment stage",
                output.interpolation, output.sampling, input.interpolation, input.sampling
            ));
        }
    }

    match fragment.output(0) {
        None => errors.push("fragment stage does not write color target @location(0)".to_string()),
        Some(color) if !color.ty.is_float() || color.ty.components != COLOR_TARGET_COMPONENTS => {
            errors.push(format!(
                "fragment color output @location(0) is {}; the color target takes vec{COLOR_TARGET_COMPONENTS}<f32>",
                color.ty
            ));
        }
        Some(_) => {}
    }

    let mut by_slot: BTreeMap<(u32, u32), UniformBinding> = BTreeMap::new();
    for u in vertex.uniforms.iter().chain(&fragment.uniforms) {
        match by_slot.get(&(u.group, u.binding)) {
            Some(seen) if seen.name != u.name || seen.size != u.size => errors.push(format!(
                "group {} binding {} is `{}` ({} bytes) in one stage and `{}` ({} bytes) in the other",
                u.group, u.binding, seen.name, seen.size, u.name, u.size
            )),
            Some(_) => {}
            None => {
                if let Some(other) = by_slot.values().find(|o| o.name == u.name) {
                    errors.push(format!(
                        "uniform `{}` is bound at group {} binding {} and group {} binding {}",
                        u.name, other.group, other.binding, u.group, u.binding
                    ));
                }
                by_slot.insert((u.group, u.binding), u.clone());
            }
        }
    }

    let group_count = by_slot.keys().map(|&(g, _)| g + 1).max().unwrap_or(0);
    for g in 0..group_count {
        if !by_slot.keys().any(|&(group, _)| group == g) {
            errors.push(format!("bind group {g} is unused; groups must be contiguous from 0"));
        }
    }

    if !errors.is_empty() {
        return Err(errors.join("\n"));
    }

    let mut inputs = vertex.vertex_inputs.clone();
    inputs.sort_by_key(|&(location, _)| location);

    let mut layout = VertexLayout::default();
    for (location, format) in inputs {
        layout.attributes.push(VertexAttribute {
            location,
            format,
            offset: layout.stride,
        });
        layout.stride += format.size();
    }

    Ok(ProgramInterface {
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
        vertex_layout: layout,
        uniforms: by_slot.into_values().collect(),
        group_count,
    })
}

/// Links whatever stages were attached to a program, in any order.
///
/// `None` entries are stages that were attached without compiling successfully.
pub fn link_attached(attached: &[(Stage, Option<&StageInterface>)]) -> Result<ProgramInterface, String> {
    let pick = |stage: Stage| -> Result<&StageInterface, String> {
        let mut found = attached.iter().filter(|(s, _)| *s == stage);
        let Some((_, iface)) = found.next() else {
            return Err(format!("no {stage} stage attached"));
        };
        if found.next().is_some() {
            return Err(format!("more than one {stage} stage attached"));
        }
        iface.ok_or_else(|| format!("attached {stage} stage is not compiled"))
    };

    let vertex = pick(Stage::Vertex)?;
    let fragment = pick(Stage::Fragment)?;
    link(vertex, fragment)
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<LocationIo>,
) -> Result<(), String> {
    match binding {
        Some(&naga::Binding::Location {
            location,
            interpolation,
            sampling,
            ..
        }) => {
            let inner = &module.types[ty].inner;
            let ty = IoType::of(inner)
                .ok_or_else(|| format!("@location({location}) has unsupported type {inner:?}"))?;
            out.push(LocationIo {
                location,
                ty,
                interpolation,
                sampling,
            });
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out)?;
                }
            }
        }
    }
    Ok(())
}

fn attribute_format(ty: IoType) -> Option<AttributeFormat> {
    let f32_scalar = naga::Scalar {
        kind: naga::ScalarKind::Float,
        width: 4,
    };
    if ty.scalar != f32_scalar {
        return None;
    }
    match ty.components {
        1 => Some(AttributeFormat::Float32),
        2 => Some(AttributeFormat::Float32x2),
        3 => Some(AttributeFormat::Float32x3),
        4 => Some(AttributeFormat::Float32x4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
@group(0) @binding(0) var<uniform> u_Color: vec4<f32>;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) tint: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) depth: f32) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(position, depth, 1.0);
    out.tint = u_Color;
    return out;
}
"#;

    const FS: &str = r#"
@group(0) @binding(0) var<uniform> u_Color: vec4<f32>;

@fragment
fn fs_main(@location(0) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint * u_Color;
}
"#;

    #[test]
    fn reflects_vertex_inputs_and_uniforms() {
        let vs = compile(Stage::Vertex, VS).unwrap();
        assert_eq!(vs.entry_point, "vs_main");
        assert_eq!(
            vs.vertex_inputs,
            vec![(0, AttributeFormat::Float32x2), (1, AttributeFormat::Float32)]
        );
        assert_eq!(vs.outputs.len(), 1);
        assert_eq!(vs.outputs[0].location, 0);
        assert_eq!(vs.outputs[0].ty.to_string(), "vec4<f32>");
        assert_eq!(vs.uniforms.len(), 1);
        assert_eq!(vs.uniforms[0].name, "u_Color");
        assert_eq!(vs.uniforms[0].size, 16);
    }

    #[test]
    fn link_builds_packed_layout() {
        let vs = compile(Stage::Vertex, VS).unwrap();
        let fs = compile(Stage::Fragment, FS).unwrap();
        let program = link(&vs, &fs).unwrap();

        assert_eq!(program.vertex_layout.stride, 12);
        assert_eq!(program.vertex_layout.attributes[1].offset, 8);
        assert_eq!(program.group_count, 1);
        assert_eq!(program.uniforms.len(), 1);
        assert!(program.uniform("u_Color").is_some());
        assert!(program.uniform_at(0, 0).is_some());
    }

    #[test]
    fn syntax_error_reports_diagnostic() {
        let log = compile(Stage::Vertex, "@vertex fn main( -> {").unwrap_err();
        assert!(!log.is_empty());
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let log = compile(Stage::Fragment, VS).unwrap_err();
        assert!(log.contains("@fragment"), "{log}");
    }

    #[test]
    fn unused_uniform_is_not_reflected() {
        let src = r#"
@group(0) @binding(0) var<uniform> u_Unused: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let fs = compile(Stage::Fragment, src).unwrap();
        assert!(fs.uniforms.is_empty());
    }

    #[test]
    fn link_rejects_unfed_fragment_input() {
        let vs_src = r#"
@vertex
fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 0.0, 1.0);
}
"#;
        let vs = compile(Stage::Vertex, vs_src).unwrap();
        let fs = compile(Stage::Fragment, FS).unwrap();
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("@location(0)"), "{log}");
    }

    #[test]
    fn link_rejects_swapped_stages() {
        let vs = compile(Stage::Vertex, VS).unwrap();
        let fs = compile(Stage::Fragment, FS).unwrap();
        assert!(link(&fs, &vs).is_err());
    }

    #[test]
    fn link_rejects_varying_type_mismatch() {
        let vs_src = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) v: f32,
};

@vertex
fn vs_main(@location(0) p: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(p, 0.0, 1.0);
    out.v = p.x;
    return out;
}
"#;
        let fs_src = r#"
@fragment
fn fs_main(@location(0) v: vec4<f32>) -> @location(0) vec4<f32> {
    return v;
}
"#;
        let vs = compile(Stage::Vertex, vs_src).unwrap();
        let fs = compile(Stage::Fragment, fs_src).unwrap();
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("is vec4<f32> but the vertex stage writes f32"), "{log}");
    }

    #[test]
    fn link_rejects_interpolation_mismatch() {
        let vs_src = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) @interpolate(flat) tint: vec4<f32>,
};

@vertex
fn vs_main(@location(0) p: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(p, 0.0, 1.0);
    out.tint = vec4<f32>(1.0);
    return out;
}
"#;
        let vs = compile(Stage::Vertex, vs_src).unwrap();
        let fs = compile(Stage::Fragment, FS).unwrap();
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("interpolated"), "{log}");
    }

    #[test]
    fn link_rejects_integer_color_output() {
        let vs_src = r#"
@vertex
fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 0.0, 1.0);
}
"#;
        let fs_src = r#"
@fragment
fn fs_main() -> @location(0) vec4<i32> {
    return vec4<i32>(1);
}
"#;
        let vs = compile(Stage::Vertex, vs_src).unwrap();
        let fs = compile(Stage::Fragment, fs_src).unwrap();
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("vec4<i32>"), "{log}");
    }

    #[test]
    fn link_rejects_narrow_color_output() {
        let vs_src = r#"
@vertex
fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p, 0.0, 1.0);
}
"#;
        let fs_src = r#"
@fragment
fn fs_main() -> @location(0) vec3<f32> {
    return vec3<f32>(1.0);
}
"#;
        let vs = compile(Stage::Vertex, vs_src).unwrap();
        let fs = compile(Stage::Fragment, fs_src).unwrap();
        assert!(link(&vs, &fs).is_err());
    }
}
