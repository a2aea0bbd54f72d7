// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bridgelib::core::error::Result;
use bridgelib::prelude::*;

use crate::device::PatternDevice;

/// Sample extension rooted in the simulated source directory.
#[derive(Default)]
pub struct PatternExtension {
    host: Option<HostContext>,
}

impl Extension for PatternExtension {
    fn initialize(&mut self, host: HostContext) -> Result<()> {
        host.log_verbose("pattern extension initialized");
        self.host = Some(host);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.host = None;
    }

    fn property(&mut self, name: &str) -> String {
        if name == property_names::NAME {
            return "Pattern".to_string();
        }
        String::new()
    }

    fn enumerate_stream_device_settings(&mut self) -> Vec<ValueSet> {
        // one device without settings
        vec![ValueSet::new()]
    }

    fn create_stream_device(&mut self, settings: ValueSet) -> Result<Box<dyn StreamDevice>> {
        Ok(Box::new(PatternDevice::new(settings)))
    }
}
