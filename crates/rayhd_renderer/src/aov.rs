//! AOV (arbitrary output variable) bindings and their validation.

use std::fmt;
use std::sync::Arc;

use rayhd_math::{DVec3, DVec4, Vec3, Vec4};

use crate::format::{ComponentFormat, Format};
use crate::render_buffer::{lock_buffer, SharedRenderBuffer};

const PRIMVAR_PREFIX: &str = "primvars:";

/// A parsed AOV name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AovName {
    Color,
    /// Hit distance along the camera ray
    Depth,
    /// Distance in front of the camera along its view axis
    CameraDepth,
    /// World-space normal
    Normal,
    /// Eye-space normal (`Neye`)
    NormalEye,
    /// World-space hit point (`position` or `P`)
    Position,
    /// Eye-space hit point (`Peye`)
    PositionEye,
    /// `primvars:<name>`, holding the primvar name
    Primvar(String),
    /// Anything else; not rendered
    Other(String),
}

impl AovName {
    pub fn parse(name: &str) -> Self {
        match name {
            "color" => AovName::Color,
            "depth" => AovName::Depth,
            "cameraDepth" => AovName::CameraDepth,
            "normal" => AovName::Normal,
            "Neye" => AovName::NormalEye,
            "position" | "P" => AovName::Position,
            "Peye" => AovName::PositionEye,
            _ => match name.strip_prefix(PRIMVAR_PREFIX) {
                Some(primvar) => AovName::Primvar(primvar.to_string()),
                None => AovName::Other(name.to_string()),
            },
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, AovName::Depth | AovName::CameraDepth)
    }

    /// Normal and position AOVs in either space.
    pub fn is_geometric_vector(&self) -> bool {
        matches!(
            self,
            AovName::Normal | AovName::NormalEye | AovName::Position | AovName::PositionEye
        )
    }
}

impl fmt::Display for AovName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AovName::Color => f.write_str("color"),
            AovName::Depth => f.write_str("depth"),
            AovName::CameraDepth => f.write_str("cameraDepth"),
            AovName::Normal => f.write_str("normal"),
            AovName::NormalEye => f.write_str("Neye"),
            AovName::Position => f.write_str("position"),
            AovName::PositionEye => f.write_str("Peye"),
            AovName::Primvar(name) => write!(f, "{}{}", PRIMVAR_PREFIX, name),
            AovName::Other(name) => f.write_str(name),
        }
    }
}

impl From<&str> for AovName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

/// Value an AOV buffer is reset to by [`Renderer::clear`](crate::Renderer::clear).
#[derive(Debug, Clone, PartialEq)]
pub enum ClearValue {
    Float(f32),
    Double(f64),
    Int(i32),
    Vec3(Vec3),
    Vec4(Vec4),
    DVec3(DVec3),
    DVec4(DVec4),
    /// Arrays are never valid clear values
    FloatArray(Vec<f32>),
}

impl ClearValue {
    fn type_name(&self) -> &'static str {
        match self {
            ClearValue::Float(_) => "float",
            ClearValue::Double(_) => "double",
            ClearValue::Int(_) => "int",
            ClearValue::Vec3(_) => "vec3f",
            ClearValue::Vec4(_) => "vec4f",
            ClearValue::DVec3(_) => "vec3d",
            ClearValue::DVec4(_) => "vec4d",
            ClearValue::FloatArray(_) => "float[]",
        }
    }
}

/// Colour a clear value stands for: vec3 gains alpha 1, vec4 passes
/// through, anything else is opaque black.
pub fn clear_color(value: Option<&ClearValue>) -> Vec4 {
    match value {
        Some(ClearValue::Vec3(v)) => v.extend(1.0),
        Some(ClearValue::Vec4(v)) => *v,
        Some(ClearValue::DVec3(v)) => v.as_vec3().extend(1.0),
        Some(ClearValue::DVec4(v)) => v.as_vec4(),
        _ => Vec4::new(0.0, 0.0, 0.0, 1.0),
    }
}

/// One output channel: a name, the buffer it renders into and an
/// optional clear value.
#[derive(Debug, Clone)]
pub struct AovBinding {
    pub name: AovName,
    pub render_buffer: Option<SharedRenderBuffer>,
    pub clear_value: Option<ClearValue>,
}

impl AovBinding {
    pub fn new(name: impl Into<AovName>, render_buffer: SharedRenderBuffer) -> Self {
        Self {
            name: name.into(),
            render_buffer: Some(render_buffer),
            clear_value: None,
        }
    }

    /// A binding whose buffer has not been resolved yet.
    pub fn unbound(name: impl Into<AovName>) -> Self {
        Self {
            name: name.into(),
            render_buffer: None,
            clear_value: None,
        }
    }

    pub fn with_clear_value(mut self, value: ClearValue) -> Self {
        self.clear_value = Some(value);
        self
    }
}

/// Bindings compare equal when they target the very same buffer.
impl PartialEq for AovBinding {
    fn eq(&self, other: &Self) -> bool {
        let same_buffer = match (&self.render_buffer, &other.render_buffer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_buffer && self.name == other.name && self.clear_value == other.clear_value
    }
}

fn is_color_format(format: Format) -> bool {
    matches!(
        format.component(),
        ComponentFormat::UNorm8 | ComponentFormat::SNorm8 | ComponentFormat::Float32
    ) && matches!(format.arity(), 3 | 4)
}

fn clear_value_fits(name: &AovName, format: Format, value: &ClearValue) -> bool {
    if matches!(value, ClearValue::FloatArray(_)) {
        return false;
    }
    let is_vector = matches!(
        value,
        ClearValue::Vec3(_) | ClearValue::Vec4(_) | ClearValue::DVec3(_) | ClearValue::DVec4(_)
    );
    if *name == AovName::Color && !is_vector {
        return false;
    }
    match format {
        Format::FLOAT32 => matches!(value, ClearValue::Float(_)),
        Format::INT32 => matches!(value, ClearValue::Int(_)),
        Format::FLOAT32_VEC3 => matches!(value, ClearValue::Vec3(_)),
        _ => true,
    }
}

/// Check a binding list can be rendered.
///
/// Every problem is logged; the result is false if any binding is
/// unusable. Unknown AOV names only warn.
pub fn validate_aov_bindings(bindings: &[AovBinding]) -> bool {
    let mut valid = true;

    for binding in bindings {
        let Some(buffer) = &binding.render_buffer else {
            log::warn!("Bad AOV binding '{}': no render buffer bound", binding.name);
            valid = false;
            continue;
        };
        let format = lock_buffer(buffer).format();

        match &binding.name {
            AovName::Other(name) => {
                log::warn!("Unsupported AOV '{}'; it will not be rendered", name);
            }
            name if name.is_depth() && format != Format::FLOAT32 => {
                log::warn!(
                    "Unsupported format {} for AOV '{}'; depth needs Float32",
                    format,
                    name
                );
                valid = false;
            }
            name if name.is_geometric_vector() && format != Format::FLOAT32_VEC3 => {
                log::warn!(
                    "Unsupported format {} for AOV '{}'; needs Float32Vec3",
                    format,
                    name
                );
                valid = false;
            }
            AovName::Color if !is_color_format(format) => {
                log::warn!(
                    "Unsupported format {} for AOV 'color'; \
                     needs UNorm8, SNorm8 or Float32 with 3 or 4 components",
                    format
                );
                valid = false;
            }
            _ => {}
        }

        if let Some(value) = &binding.clear_value {
            if !clear_value_fits(&binding.name, format, value) {
                log::warn!(
                    "Unsupported clear value type {} for AOV '{}' with format {}",
                    value.type_name(),
                    binding.name,
                    format
                );
                valid = false;
            }
        }
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_buffer::RenderBuffer;

    fn buffer(format: Format) -> SharedRenderBuffer {
        RenderBuffer::with_size(2, 2, format, true)
            .unwrap()
            .into_shared()
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(AovName::parse("color"), AovName::Color);
        assert_eq!(AovName::parse("P"), AovName::Position);
        assert_eq!(AovName::parse("Neye"), AovName::NormalEye);
        assert_eq!(
            AovName::parse("primvars:st"),
            AovName::Primvar("st".to_string())
        );
        assert_eq!(
            AovName::parse("primId"),
            AovName::Other("primId".to_string())
        );
        assert_eq!(AovName::parse("primvars:st").to_string(), "primvars:st");
    }

    #[test]
    fn test_clear_color_conversion() {
        let rgb = ClearValue::Vec3(Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(clear_color(Some(&rgb)), Vec4::new(0.1, 0.2, 0.3, 1.0));

        let rgba = ClearValue::DVec4(DVec4::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(clear_color(Some(&rgba)), Vec4::splat(0.5));

        assert_eq!(
            clear_color(Some(&ClearValue::Float(3.0))),
            Vec4::new(0.0, 0.0, 0.0, 1.0)
        );
        assert_eq!(clear_color(None), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_valid_bindings() {
        let bindings = vec![
            AovBinding::new("color", buffer(Format::UNORM8_VEC4))
                .with_clear_value(ClearValue::Vec4(Vec4::ZERO)),
            AovBinding::new("depth", buffer(Format::FLOAT32))
                .with_clear_value(ClearValue::Float(1.0)),
            AovBinding::new("normal", buffer(Format::FLOAT32_VEC3))
                .with_clear_value(ClearValue::Vec3(Vec3::ZERO)),
            AovBinding::new("primvars:st", buffer(Format::FLOAT32_VEC2)),
        ];
        assert!(validate_aov_bindings(&bindings));
    }

    #[test]
    fn test_unknown_name_only_warns() {
        let bindings = vec![AovBinding::new("primId", buffer(Format::INT32))];
        assert!(validate_aov_bindings(&bindings));
    }

    #[test]
    fn test_invalid_bindings() {
        let unbound = vec![AovBinding::unbound("color")];
        assert!(!validate_aov_bindings(&unbound));

        let bad_depth = vec![AovBinding::new("depth", buffer(Format::FLOAT32_VEC3))];
        assert!(!validate_aov_bindings(&bad_depth));

        let bad_color = vec![AovBinding::new("color", buffer(Format::FLOAT16_VEC4))];
        assert!(!validate_aov_bindings(&bad_color));

        let bad_normal = vec![AovBinding::new("Neye", buffer(Format::FLOAT32_VEC4))];
        assert!(!validate_aov_bindings(&bad_normal));
    }

    #[test]
    fn test_invalid_clear_values() {
        let array = vec![AovBinding::new("depth", buffer(Format::FLOAT32))
            .with_clear_value(ClearValue::FloatArray(vec![1.0]))];
        assert!(!validate_aov_bindings(&array));

        let scalar_color = vec![AovBinding::new("color", buffer(Format::FLOAT32_VEC4))
            .with_clear_value(ClearValue::Float(0.0))];
        assert!(!validate_aov_bindings(&scalar_color));

        let int_depth = vec![AovBinding::new("depth", buffer(Format::FLOAT32))
            .with_clear_value(ClearValue::Int(1))];
        assert!(!validate_aov_bindings(&int_depth));
    }

    #[test]
    fn test_float3_color_takes_only_vec3f_clear_values() {
        let rgb = vec![AovBinding::new("color", buffer(Format::FLOAT32_VEC3))
            .with_clear_value(ClearValue::Vec3(Vec3::ONE))];
        assert!(validate_aov_bindings(&rgb));

        let rgba = vec![AovBinding::new("color", buffer(Format::FLOAT32_VEC3))
            .with_clear_value(ClearValue::Vec4(Vec4::ONE))];
        assert!(!validate_aov_bindings(&rgba));

        let double_rgb = vec![AovBinding::new("color", buffer(Format::FLOAT32_VEC3))
            .with_clear_value(ClearValue::DVec3(DVec3::ONE))];
        assert!(!validate_aov_bindings(&double_rgb));

        // Other colour formats still take any vector
        let unorm = vec![AovBinding::new("color", buffer(Format::UNORM8_VEC3))
            .with_clear_value(ClearValue::DVec4(DVec4::ONE))];
        assert!(validate_aov_bindings(&unorm));
    }

    #[test]
    fn test_binding_equality_is_by_buffer_identity() {
        let shared = buffer(Format::FLOAT32);
        let a = AovBinding::new("depth", shared.clone());
        let b = AovBinding::new("depth", shared);
        let c = AovBinding::new("depth", buffer(Format::FLOAT32));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
