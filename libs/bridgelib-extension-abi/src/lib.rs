// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! ABI-stable load-time contract for bridgelib extension modules.
//!
//! An extension module exports exactly one symbol, `BRIDGELIB_EXTENSION`,
//! describing how to open and close the extension — the sole load-time
//! contract between a host and a dynamically loaded module. Use the
//! [`export_extension!`] macro to generate it:
//!
//! ```ignore
//! use bridgelib::prelude::*;
//! use bridgelib_extension_abi::export_extension;
//!
//! #[derive(Default)]
//! pub struct MyExtension { /* ... */ }
//!
//! impl Extension for MyExtension {
//!     fn initialize(&mut self, host: HostContext) -> Result<()> { Ok(()) }
//!     fn create_stream_device(&mut self, settings: ValueSet)
//!         -> Result<Box<dyn StreamDevice>> { /* ... */ }
//! }
//!
//! export_extension!(MyExtension);
//! ```
//!
//! # Extension Cargo.toml
//!
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! bridgelib = "0.3"
//! bridgelib-extension-abi = "0.3"
//! ```

use std::path::Path;

use bridgelib::core::abi::RawExtension;
use bridgelib::{BridgeError, Result};

/// Current ABI version. Extensions must match this exactly.
///
/// Increment when making breaking changes to the dispatch tables or to any
/// type crossing them.
pub const EXTENSION_ABI_VERSION: u32 = 1;

/// Symbol name of the declaration every extension module exports.
pub const EXTENSION_DECLARATION_SYMBOL: &[u8] = b"BRIDGELIB_EXTENSION\0";

/// Creates a new extension and returns its dispatch table.
pub type ExtensionOpenFn = unsafe extern "C" fn() -> *mut RawExtension;

/// Destroys an extension previously returned by the open function.
pub type ExtensionCloseFn = unsafe extern "C" fn(*mut RawExtension);

/// Extension declaration exported by dynamic modules.
///
/// Use [`export_extension!`] to generate this correctly.
#[repr(C)]
#[derive(Debug)]
pub struct ExtensionDeclaration {
    /// Must match [`EXTENSION_ABI_VERSION`] exactly.
    pub abi_version: u32,
    pub open: ExtensionOpenFn,
    pub close: ExtensionCloseFn,
}

// SAFETY: a version number and two function pointers.
unsafe impl Send for ExtensionDeclaration {}
unsafe impl Sync for ExtensionDeclaration {}

/// Export an extension type for dynamic loading.
///
/// Generates the module's open/close entry points and the
/// `BRIDGELIB_EXTENSION` declaration the host looks for. The type must
/// implement `bridgelib::core::Extension` and `Default`.
#[macro_export]
macro_rules! export_extension {
    ($extension:ty) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn bridgelib_extension_open()
        -> *mut ::bridgelib::core::abi::RawExtension {
            ::bridgelib::core::abi::extension_into_raw(::std::boxed::Box::new(
                <$extension as ::std::default::Default>::default(),
            ))
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn bridgelib_extension_close(
            extension: *mut ::bridgelib::core::abi::RawExtension,
        ) {
            unsafe { ::bridgelib::core::abi::extension_drop_raw(extension) }
        }

        #[unsafe(no_mangle)]
        pub static BRIDGELIB_EXTENSION: $crate::ExtensionDeclaration =
            $crate::ExtensionDeclaration {
                abi_version: $crate::EXTENSION_ABI_VERSION,
                open: bridgelib_extension_open,
                close: bridgelib_extension_close,
            };
    };
}

/// A loaded extension module.
///
/// Keeps the library mapped for as long as any extension opened from it
/// may be alive.
#[derive(Debug)]
pub struct ExtensionLibrary {
    declaration: ExtensionDeclaration,
    _library: libloading::Library,
}

impl ExtensionLibrary {
    /// Load a module and validate its declaration.
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: module loading runs arbitrary initializers; that is the
        // deal with loading extensions at all.
        let library = unsafe { libloading::Library::new(path) }.map_err(|error| {
            BridgeError::Extension(format!("loading {}: {error}", path.display()))
        })?;
        let declaration = unsafe {
            let symbol = library
                .get::<*const ExtensionDeclaration>(EXTENSION_DECLARATION_SYMBOL)
                .map_err(|error| {
                    BridgeError::Extension(format!(
                        "{} exports no extension declaration: {error}",
                        path.display()
                    ))
                })?;
            std::ptr::read(*symbol)
        };
        if declaration.abi_version != EXTENSION_ABI_VERSION {
            return Err(BridgeError::AbiMismatch(format!(
                "{}: extension ABI {} does not match host ABI {}",
                path.display(),
                declaration.abi_version,
                EXTENSION_ABI_VERSION
            )));
        }
        tracing::debug!(path = %path.display(), "loaded extension module");
        Ok(Self {
            declaration,
            _library: library,
        })
    }

    pub fn declaration(&self) -> &ExtensionDeclaration {
        &self.declaration
    }

    /// Open a new extension. Null is an open failure.
    pub fn open(&self) -> Result<*mut RawExtension> {
        let extension = unsafe { (self.declaration.open)() };
        if extension.is_null() {
            return Err(BridgeError::Extension("extension open failed".to_string()));
        }
        Ok(extension)
    }

    /// The close function matching [`open`](Self::open); pass it to the
    /// host's attach so the owning handle closes through the module.
    pub fn close_fn(&self) -> ExtensionCloseFn {
        self.declaration.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn fake_open() -> *mut RawExtension {
        std::ptr::null_mut()
    }

    unsafe extern "C" fn fake_close(_extension: *mut RawExtension) {}

    #[test]
    fn test_declaration_is_plain_data() {
        let declaration = ExtensionDeclaration {
            abi_version: EXTENSION_ABI_VERSION,
            open: fake_open,
            close: fake_close,
        };
        assert_eq!(declaration.abi_version, 1);
    }

    #[test]
    fn test_load_rejects_missing_module() {
        let error = ExtensionLibrary::load(Path::new("/nonexistent/ext.so")).unwrap_err();
        assert!(matches!(error, BridgeError::Extension(_)));
    }
}
