// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pixel formats shared across the boundary.
//!
//! Discriminants mirror the VK_FORMAT numbering so a Vulkan-side extension
//! can cast directly; other backends translate through the enum.

/// Texture pixel format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    #[default]
    None = 0,
    R8Unorm = 9,
    Rg8Unorm = 16,
    Rgba8Unorm = 37,
    Bgra8Unorm = 44,
    Rgba16Float = 97,
    Rgba32Float = 109,
}

impl PixelFormat {
    /// Canonical wire name.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::None => "",
            PixelFormat::R8Unorm => "R8_UNORM",
            PixelFormat::Rg8Unorm => "R8G8_UNORM",
            PixelFormat::Rgba8Unorm => "R8G8B8A8_UNORM",
            PixelFormat::Bgra8Unorm => "B8G8R8A8_UNORM",
            PixelFormat::Rgba16Float => "R16G16B16A16_SFLOAT",
            PixelFormat::Rgba32Float => "R32G32B32A32_SFLOAT",
        }
    }

    /// Look up a format by canonical name or short alias.
    ///
    /// Returns `default` for an empty name and `None` for an unknown one.
    pub fn by_name(name: &str, default: PixelFormat) -> PixelFormat {
        if name.is_empty() {
            return default;
        }
        match name {
            "RGBA8" | "R8G8B8A8_UNORM" => PixelFormat::Rgba8Unorm,
            "BGRA8" | "B8G8R8A8_UNORM" => PixelFormat::Bgra8Unorm,
            "RGBA16F" | "R16G16B16A16_SFLOAT" => PixelFormat::Rgba16Float,
            "RGBA32F" | "R32G32B32A32_SFLOAT" => PixelFormat::Rgba32Float,
            "R8_UNORM" => PixelFormat::R8Unorm,
            "R8G8_UNORM" => PixelFormat::Rg8Unorm,
            _ => PixelFormat::None,
        }
    }

    /// Bytes per pixel for CPU-side storage and transfers.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::None => 0,
            PixelFormat::R8Unorm => 1,
            PixelFormat::Rg8Unorm => 2,
            PixelFormat::Rgba8Unorm | PixelFormat::Bgra8Unorm => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for format in [
            PixelFormat::R8Unorm,
            PixelFormat::Rg8Unorm,
            PixelFormat::Rgba8Unorm,
            PixelFormat::Bgra8Unorm,
            PixelFormat::Rgba16Float,
            PixelFormat::Rgba32Float,
        ] {
            assert_eq!(
                PixelFormat::by_name(format.name(), PixelFormat::None),
                format
            );
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(
            PixelFormat::by_name("RGBA8", PixelFormat::None),
            PixelFormat::Rgba8Unorm
        );
        assert_eq!(
            PixelFormat::by_name("RGBA16F", PixelFormat::None),
            PixelFormat::Rgba16Float
        );
    }

    #[test]
    fn test_empty_name_uses_default() {
        assert_eq!(
            PixelFormat::by_name("", PixelFormat::Bgra8Unorm),
            PixelFormat::Bgra8Unorm
        );
        assert_eq!(
            PixelFormat::by_name("garbage", PixelFormat::Bgra8Unorm),
            PixelFormat::None
        );
    }

    #[test]
    fn test_vk_format_numbering() {
        assert_eq!(PixelFormat::Rgba8Unorm as u32, 37);
        assert_eq!(PixelFormat::Bgra8Unorm as u32, 44);
        assert_eq!(PixelFormat::Rgba32Float as u32, 109);
    }
}
