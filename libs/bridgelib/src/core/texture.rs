// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared texture handles.
//!
//! A texture produced on one side of the boundary is handed over as an
//! opaque, refcounted handle: the descriptor is immutable after creation and
//! the handle carries its own dispatch table, so either side can acquire and
//! release it without knowing the backing GPU object. Whichever side drops
//! the last reference destroys it.
//!
//! A populated [`ShareHandle`] in the descriptor lets the receiver import
//! the same GPU memory into its own API context without a pixel copy; an
//! empty one means CPU-side transfer is required.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::format::PixelFormat;

/// Kind of OS-level share handle. Discriminants are part of the wire
/// contract and follow the external-memory handle-type numbering used by
/// the GPU APIs themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShareHandleKind {
    #[default]
    None = 0,
    /// A host-created texture; the handle is the host's texture id.
    HostTexture = 1,
    OpaqueFd = 0x9586,
    OpaqueWin32 = 0x9587,
    OpaqueWin32Kmt = 0x9588,
    D3D12TilePool = 0x9589,
    D3D12Resource = 0x958A,
    D3D11Image = 0x958B,
    D3D11ImageKmt = 0x958C,
    D3DFence = 0x9594,
}

/// An OS-level opaque identifier letting one GPU/process context import a
/// resource created by another without copying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct ShareHandle {
    pub kind: ShareHandleKind,
    /// Raw OS handle value (fd, HANDLE, or host texture id).
    pub handle: u64,
    pub process_id: u64,
    pub memory_size: u64,
    pub memory_offset: u64,
    pub dedicated: bool,
}

impl ShareHandle {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.kind == ShareHandleKind::None
    }
}

/// Immutable texture descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub is_target: bool,
    pub share_handle: ShareHandle,
}

/// Dispatch table of a shared texture handle.
///
/// Embedded as the first field of the concrete object, so a `*mut
/// RawTexture` is also a pointer to the implementation. All entries are
/// non-unwinding.
#[repr(C)]
pub struct RawTexture {
    pub acquire: unsafe extern "C" fn(*mut RawTexture),
    pub release: unsafe extern "C" fn(*mut RawTexture),
    pub desc: unsafe extern "C" fn(*const RawTexture) -> *const TextureDesc,
}

/// Owning reference to a shared texture.
///
/// `Clone` acquires, `Drop` releases. Passing a `TextureRef` across the
/// boundary transfers exactly one reference to the receiver.
pub struct TextureRef {
    ptr: NonNull<RawTexture>,
}

// SAFETY: every RawTexture implementation in this protocol must be
// internally synchronized (the refcount is atomic and the descriptor is
// immutable), which is what makes handing handles across threads and
// modules sound in the first place.
unsafe impl Send for TextureRef {}
unsafe impl Sync for TextureRef {}

impl TextureRef {
    /// Take ownership of one reference held by `ptr`.
    ///
    /// # Safety
    /// `ptr` must point to a live texture object and the caller must own
    /// one reference to it, which is transferred to the returned value.
    pub unsafe fn from_raw(ptr: *mut RawTexture) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Give up ownership of this reference, returning the raw handle.
    ///
    /// The caller (or the receiver across the boundary) becomes responsible
    /// for the reference.
    pub fn into_raw(self) -> *mut RawTexture {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    pub fn as_raw(&self) -> *mut RawTexture {
        self.ptr.as_ptr()
    }

    pub fn desc(&self) -> TextureDesc {
        unsafe {
            let desc = (self.ptr.as_ref().desc)(self.ptr.as_ptr());
            if desc.is_null() {
                TextureDesc::default()
            } else {
                *desc
            }
        }
    }

    /// Identity comparison (same underlying object).
    pub fn same_texture(&self, other: &TextureRef) -> bool {
        self.ptr == other.ptr
    }
}

impl Clone for TextureRef {
    fn clone(&self) -> Self {
        unsafe { (self.ptr.as_ref().acquire)(self.ptr.as_ptr()) };
        Self { ptr: self.ptr }
    }
}

impl Drop for TextureRef {
    fn drop(&mut self) {
        unsafe { (self.ptr.as_ref().release)(self.ptr.as_ptr()) };
    }
}

impl std::fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureRef").field("desc", &self.desc()).finish()
    }
}

/// Host-side texture with CPU backing storage.
///
/// Used for textures the host allocates on behalf of CPU-fed extensions.
/// The share handle in the descriptor is a [`ShareHandleKind::HostTexture`]
/// id, so an extension running in the host process can hand it back for
/// upload/download without the host guessing object identity.
#[repr(C)]
pub struct SharedTexture {
    raw: RawTexture,
    refs: AtomicUsize,
    desc: TextureDesc,
    pixels: Mutex<Vec<u8>>,
}

impl SharedTexture {
    /// Allocate a host texture and return one owned reference to it.
    pub fn create(desc: TextureDesc) -> TextureRef {
        let storage = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel();
        let texture = Box::new(SharedTexture {
            raw: RawTexture {
                acquire: Self::raw_acquire,
                release: Self::raw_release,
                desc: Self::raw_desc,
            },
            refs: AtomicUsize::new(1),
            desc,
            pixels: Mutex::new(vec![0u8; storage]),
        });
        let ptr = Box::into_raw(texture) as *mut RawTexture;
        unsafe { TextureRef::from_raw(ptr).expect("fresh allocation") }
    }

    /// Downcast a texture reference to a host texture.
    ///
    /// Identity is established through the dispatch table entries, not
    /// through the descriptor, so a foreign texture that merely copied a
    /// descriptor cannot be confused with a host one.
    pub fn from_ref(texture: &TextureRef) -> Option<&SharedTexture> {
        let ptr = texture.as_raw();
        let release = unsafe { (*ptr).release };
        if std::ptr::fn_addr_eq(
            release,
            Self::raw_release as unsafe extern "C" fn(*mut RawTexture),
        ) {
            Some(unsafe { &*(ptr as *const SharedTexture) })
        } else {
            None
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// Copy pixel rows in. `pitch` is the source row stride in bytes.
    pub fn write_pixels(&self, data: &[u8], pitch: usize) {
        let row = self.desc.width as usize * self.desc.format.bytes_per_pixel();
        let mut pixels = self.pixels.lock();
        for y in 0..self.desc.height as usize {
            let src = y * pitch;
            let dst = y * row;
            if src + row > data.len() || dst + row > pixels.len() {
                break;
            }
            pixels[dst..dst + row].copy_from_slice(&data[src..src + row]);
        }
    }

    /// Snapshot the pixel contents (tightly packed rows).
    pub fn read_pixels(&self) -> Vec<u8> {
        self.pixels.lock().clone()
    }

    /// Row stride of the CPU storage in bytes.
    pub fn row_pitch(&self) -> usize {
        self.desc.width as usize * self.desc.format.bytes_per_pixel()
    }

    unsafe extern "C" fn raw_acquire(ptr: *mut RawTexture) {
        let this = unsafe { &*(ptr as *const SharedTexture) };
        this.refs.fetch_add(1, Ordering::Relaxed);
    }

    unsafe extern "C" fn raw_release(ptr: *mut RawTexture) {
        let this = unsafe { &*(ptr as *const SharedTexture) };
        if this.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            drop(unsafe { Box::from_raw(ptr as *mut SharedTexture) });
        }
    }

    unsafe extern "C" fn raw_desc(ptr: *const RawTexture) -> *const TextureDesc {
        let this = unsafe { &*(ptr as *const SharedTexture) };
        &this.desc
    }
}

// SAFETY: refcount is atomic, descriptor immutable, pixels behind a mutex.
unsafe impl Send for SharedTexture {}
unsafe impl Sync for SharedTexture {}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format: PixelFormat::Rgba8Unorm,
            is_target: false,
            share_handle: ShareHandle {
                kind: ShareHandleKind::HostTexture,
                handle: 7,
                ..ShareHandle::default()
            },
        }
    }

    #[test]
    fn test_desc_is_preserved() {
        let texture = SharedTexture::create(desc(4, 2));
        assert_eq!(texture.desc().width, 4);
        assert_eq!(texture.desc().height, 2);
        assert_eq!(texture.desc().share_handle.handle, 7);
    }

    #[test]
    fn test_clone_and_drop_balance() {
        let texture = SharedTexture::create(desc(2, 2));
        let second = texture.clone();
        let third = second.clone();
        drop(texture);
        drop(second);
        // last reference still valid
        assert_eq!(third.desc().width, 2);
    }

    #[test]
    fn test_raw_round_trip_transfers_one_reference() {
        let texture = SharedTexture::create(desc(2, 2));
        let extra = texture.clone();
        let raw = extra.into_raw();
        let back = unsafe { TextureRef::from_raw(raw) }.unwrap();
        assert!(back.same_texture(&texture));
    }

    #[test]
    fn test_pixel_round_trip_with_pitch() {
        let texture = SharedTexture::create(desc(2, 2));
        let shared = SharedTexture::from_ref(&texture).unwrap();
        // 2x2 RGBA rows padded to 12-byte pitch
        let mut data = vec![0u8; 24];
        data[0] = 1;
        data[12] = 2;
        shared.write_pixels(&data, 12);
        let pixels = shared.read_pixels();
        assert_eq!(pixels.len(), 16);
        assert_eq!(pixels[0], 1);
        assert_eq!(pixels[8], 2);
    }

    #[test]
    fn test_from_ref_rejects_foreign_textures() {
        // A texture implementation with its own dispatch table must not be
        // downcast to a host texture.
        #[repr(C)]
        struct Foreign {
            raw: RawTexture,
            refs: AtomicUsize,
            desc: TextureDesc,
        }
        unsafe extern "C" fn acquire(ptr: *mut RawTexture) {
            let this = unsafe { &*(ptr as *const Foreign) };
            this.refs.fetch_add(1, Ordering::Relaxed);
        }
        unsafe extern "C" fn release(ptr: *mut RawTexture) {
            let this = unsafe { &*(ptr as *const Foreign) };
            if this.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
                drop(unsafe { Box::from_raw(ptr as *mut Foreign) });
            }
        }
        unsafe extern "C" fn raw_desc(ptr: *const RawTexture) -> *const TextureDesc {
            let this = unsafe { &*(ptr as *const Foreign) };
            &this.desc
        }
        let foreign = Box::new(Foreign {
            raw: RawTexture {
                acquire,
                release,
                desc: raw_desc,
            },
            refs: AtomicUsize::new(1),
            desc: TextureDesc::default(),
        });
        let texture =
            unsafe { TextureRef::from_raw(Box::into_raw(foreign) as *mut RawTexture) }.unwrap();
        assert!(SharedTexture::from_ref(&texture).is_none());
    }
}
