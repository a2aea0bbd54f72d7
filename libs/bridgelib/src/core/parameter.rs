// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Typed, named, lockable live-control values exposed by streams.
//!
//! A parameter is owned by the stream that created it and lives exactly as
//! long as that stream; the host only ever holds a non-owning reference
//! (by index or by name/property lookup) while the stream is alive. Value
//! and property bag are guarded by one per-instance lock.
//!
//! The value is a tagged union over a fixed variant set. Typed accessors
//! fail closed: a tag mismatch yields the variant's default instead of an
//! error. That silent-fallback policy is part of the observed contract and
//! is preserved deliberately.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::format::PixelFormat;
use super::names::{property_names, setting_names};
use super::texture::{TextureDesc, TextureRef};
use super::values::{FromValue, ToValue};

/// Parameter type tag. Immutable for the lifetime of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ParameterType {
    Bool = 0,
    Int = 1,
    Value = 2,
    Vector2 = 3,
    Vector3 = 4,
    Vector4 = 5,
    Matrix3 = 6,
    Matrix4 = 7,
    String = 8,
    Texture = 9,
    Data = 10,
    TextureSet = 11,
}

/// Current value of a parameter.
#[derive(Debug, Clone, Default)]
pub enum ParameterValue {
    #[default]
    Empty,
    Bool(bool),
    Int(i32),
    Value(f64),
    Vector2([f64; 2]),
    Vector3([f64; 3]),
    Vector4([f64; 4]),
    Matrix3([f64; 9]),
    Matrix4([f64; 16]),
    String(String),
    Data(Vec<u8>),
    Texture(Option<TextureRef>),
    TextureSet(Vec<TextureRef>),
}

impl ParameterValue {
    /// Default value for a type tag.
    pub fn default_for(ty: ParameterType) -> Self {
        match ty {
            ParameterType::Bool => Self::Bool(false),
            ParameterType::Int => Self::Int(0),
            ParameterType::Value => Self::Value(0.0),
            ParameterType::Vector2 => Self::Vector2([0.0; 2]),
            ParameterType::Vector3 => Self::Vector3([0.0; 3]),
            ParameterType::Vector4 => Self::Vector4([0.0; 4]),
            ParameterType::Matrix3 => Self::Matrix3([0.0; 9]),
            ParameterType::Matrix4 => Self::Matrix4([0.0; 16]),
            ParameterType::String => Self::String(String::new()),
            ParameterType::Data => Self::Data(Vec::new()),
            ParameterType::Texture => Self::Texture(None),
            ParameterType::TextureSet => Self::TextureSet(Vec::new()),
        }
    }

    pub fn type_tag(&self) -> Option<ParameterType> {
        Some(match self {
            Self::Empty => return None,
            Self::Bool(_) => ParameterType::Bool,
            Self::Int(_) => ParameterType::Int,
            Self::Value(_) => ParameterType::Value,
            Self::Vector2(_) => ParameterType::Vector2,
            Self::Vector3(_) => ParameterType::Vector3,
            Self::Vector4(_) => ParameterType::Vector4,
            Self::Matrix3(_) => ParameterType::Matrix3,
            Self::Matrix4(_) => ParameterType::Matrix4,
            Self::String(_) => ParameterType::String,
            Self::Data(_) => ParameterType::Data,
            Self::Texture(_) => ParameterType::Texture,
            Self::TextureSet(_) => ParameterType::TextureSet,
        })
    }
}

struct ParameterState {
    value: ParameterValue,
    properties: BTreeMap<String, String>,
}

/// A live-control value with metadata, exposed for host-side UI and
/// automation.
pub struct Parameter {
    ty: ParameterType,
    name: String,
    state: Mutex<ParameterState>,
}

impl Parameter {
    pub fn new(ty: ParameterType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            state: Mutex::new(ParameterState {
                value: ParameterValue::default_for(ty),
                properties: BTreeMap::new(),
            }),
        }
    }

    pub fn with_value(ty: ParameterType, name: impl Into<String>, value: ParameterValue) -> Self {
        let parameter = Self::new(ty, name);
        parameter.set_value(value);
        parameter
    }

    pub fn param_type(&self) -> ParameterType {
        self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the value. Rejected (fail closed) unless the variant matches
    /// the parameter's type tag.
    pub fn set_value(&self, value: ParameterValue) -> bool {
        if value.type_tag() != Some(self.ty) {
            return false;
        }
        self.state.lock().value = value;
        true
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> ParameterValue {
        self.state.lock().value.clone()
    }

    pub fn bool_value(&self) -> bool {
        match self.state.lock().value {
            ParameterValue::Bool(v) => v,
            _ => false,
        }
    }

    pub fn int_value(&self) -> i32 {
        match self.state.lock().value {
            ParameterValue::Int(v) => v,
            _ => 0,
        }
    }

    pub fn float_value(&self) -> f64 {
        match self.state.lock().value {
            ParameterValue::Value(v) => v,
            _ => 0.0,
        }
    }

    pub fn vector2(&self) -> [f64; 2] {
        match self.state.lock().value {
            ParameterValue::Vector2(v) => v,
            _ => [0.0; 2],
        }
    }

    pub fn vector3(&self) -> [f64; 3] {
        match self.state.lock().value {
            ParameterValue::Vector3(v) => v,
            _ => [0.0; 3],
        }
    }

    pub fn vector4(&self) -> [f64; 4] {
        match self.state.lock().value {
            ParameterValue::Vector4(v) => v,
            _ => [0.0; 4],
        }
    }

    pub fn matrix4(&self) -> [f64; 16] {
        match self.state.lock().value {
            ParameterValue::Matrix4(v) => v,
            _ => [0.0; 16],
        }
    }

    pub fn string_value(&self) -> String {
        match &self.state.lock().value {
            ParameterValue::String(v) => v.clone(),
            _ => String::new(),
        }
    }

    pub fn data(&self) -> Vec<u8> {
        match &self.state.lock().value {
            ParameterValue::Data(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn texture(&self) -> Option<TextureRef> {
        match &self.state.lock().value {
            ParameterValue::Texture(v) => v.clone(),
            _ => None,
        }
    }

    pub fn textures(&self) -> Vec<TextureRef> {
        match &self.state.lock().value {
            ParameterValue::TextureSet(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_texture(&self, texture: Option<TextureRef>) -> bool {
        self.set_value(ParameterValue::Texture(texture))
    }

    pub fn set_textures(&self, textures: Vec<TextureRef>) -> bool {
        self.set_value(ParameterValue::TextureSet(textures))
    }

    pub fn set_property<T: ToValue>(&self, name: &str, value: T) {
        self.state
            .lock()
            .properties
            .insert(name.to_string(), value.to_value());
    }

    /// Raw property read; empty string when absent.
    pub fn property(&self, name: &str) -> String {
        self.state
            .lock()
            .properties
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Typed property read with the value codec's silent recovery.
    pub fn property_as<T: FromValue>(&self, name: &str) -> T {
        T::from_value(&self.property(name)).unwrap_or_default()
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("type", &self.ty)
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered set of parameters owned by a stream.
#[derive(Debug, Default)]
pub struct ParameterSet {
    parameters: Vec<Arc<Parameter>>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Parameter>> {
        self.parameters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Parameter>> {
        self.parameters.iter()
    }

    pub fn add(&mut self, parameter: Parameter) -> Arc<Parameter> {
        let parameter = Arc::new(parameter);
        self.parameters.push(Arc::clone(&parameter));
        parameter
    }

    pub fn add_parameter(&mut self, ty: ParameterType, name: &str) -> Arc<Parameter> {
        self.add(Parameter::new(ty, name))
    }

    /// Add a parameter written by the stream and read by the host.
    pub fn add_output_parameter(&mut self, ty: ParameterType, name: &str) -> Arc<Parameter> {
        let parameter = self.add_parameter(ty, name);
        parameter.set_property(property_names::DIRECTION, "out");
        parameter
    }

    /// Add a parameter the host drives but does not surface in its UI.
    pub fn add_internal_parameter(&mut self, ty: ParameterType, name: &str) -> Arc<Parameter> {
        let parameter = self.add_parameter(ty, name);
        parameter.set_property(property_names::INTERNAL, true);
        parameter
    }

    pub fn find(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn find_by_property(&self, property: &str, value: &str) -> Option<&Arc<Parameter>> {
        self.parameters.iter().find(|p| p.property(property) == value)
    }
}

/// Recreate an input texture when its negotiated size or format changed.
///
/// Reads the `resolution_x`/`resolution_y`/`format` properties the host
/// pushed onto the parameter and invokes `create_texture` only when they
/// describe a valid texture different from the current one.
pub fn update_input_texture(
    parameter: &Parameter,
    mut create_texture: impl FnMut(TextureDesc) -> Option<TextureRef>,
) {
    let width: u32 = parameter.property_as(setting_names::RESOLUTION_X);
    let height: u32 = parameter.property_as(setting_names::RESOLUTION_Y);
    let format = PixelFormat::by_name(
        &parameter.property(setting_names::FORMAT),
        PixelFormat::None,
    );
    if width == 0 || height == 0 || format == PixelFormat::None {
        return;
    }

    let current = parameter
        .texture()
        .map(|t| t.desc())
        .unwrap_or_default();
    if (width, height, format) == (current.width, current.height, current.format) {
        return;
    }

    let desc = TextureDesc {
        width,
        height,
        format,
        is_target: false,
        share_handle: Default::default(),
    };
    if let Some(texture) = create_texture(desc) {
        parameter.set_texture(Some(texture));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::texture::SharedTexture;

    #[test]
    fn test_typed_access_fails_closed() {
        let parameter = Parameter::new(ParameterType::Value, "time");
        assert!(parameter.set_value(ParameterValue::Value(1.5)));
        assert_eq!(parameter.float_value(), 1.5);

        // wrong-type read returns the variant default, wrong-type write is
        // rejected and leaves the value untouched
        assert_eq!(parameter.int_value(), 0);
        assert!(!parameter.set_value(ParameterValue::Int(3)));
        assert_eq!(parameter.float_value(), 1.5);
    }

    #[test]
    fn test_property_bag_round_trip() {
        let parameter = Parameter::new(ParameterType::Int, "layer_index");
        parameter.set_property(property_names::MIN_VALUE, 0);
        parameter.set_property(property_names::MAX_VALUE, 7);
        parameter.set_property(property_names::GROUP_NAME, "Layers");
        assert_eq!(parameter.property_as::<i32>(property_names::MAX_VALUE), 7);
        assert_eq!(parameter.property(property_names::GROUP_NAME), "Layers");
        assert_eq!(parameter.property("missing"), "");
    }

    #[test]
    fn test_parameter_set_lookup() {
        let mut set = ParameterSet::new();
        set.add_parameter(ParameterType::Value, "time");
        let sampler = set.add_output_parameter(ParameterType::Texture, "sampler");
        set.add_internal_parameter(ParameterType::Bool, "visible");

        assert_eq!(set.len(), 3);
        assert_eq!(set.find("sampler").unwrap().name(), "sampler");
        assert!(
            set.find_by_property(property_names::DIRECTION, "out")
                .unwrap()
                .name()
                == sampler.name()
        );
        assert!(set.find("nope").is_none());
        assert_eq!(
            set.find("visible").unwrap().property(property_names::INTERNAL),
            "true"
        );
    }

    #[test]
    fn test_update_input_texture_only_on_change() {
        let parameter = Parameter::new(ParameterType::Texture, "background");
        parameter.set_property(setting_names::RESOLUTION_X, 64);
        parameter.set_property(setting_names::RESOLUTION_Y, 32);
        parameter.set_property(setting_names::FORMAT, "RGBA8");

        let mut created = 0;
        update_input_texture(&parameter, |desc| {
            created += 1;
            Some(SharedTexture::create(desc))
        });
        assert_eq!(created, 1);
        assert_eq!(parameter.texture().unwrap().desc().width, 64);

        // same properties: no recreation
        update_input_texture(&parameter, |desc| {
            created += 1;
            Some(SharedTexture::create(desc))
        });
        assert_eq!(created, 1);

        // resolution change: recreated
        parameter.set_property(setting_names::RESOLUTION_X, 128);
        update_input_texture(&parameter, |desc| {
            created += 1;
            Some(SharedTexture::create(desc))
        });
        assert_eq!(created, 2);
        assert_eq!(parameter.texture().unwrap().desc().width, 128);
    }

    #[test]
    fn test_update_input_texture_ignores_incomplete_desc() {
        let parameter = Parameter::new(ParameterType::Texture, "background");
        parameter.set_property(setting_names::RESOLUTION_X, 64);
        // no height/format yet
        let mut created = 0;
        update_input_texture(&parameter, |desc| {
            created += 1;
            Some(SharedTexture::create(desc))
        });
        assert_eq!(created, 0);
    }
}
