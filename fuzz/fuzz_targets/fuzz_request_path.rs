// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use nmos_registry::{ApiRequest, Method, Registry, RegistryConfig, RequestPath};

fuzz_target!(|data: &[u8]| {
    let Ok(path) = std::str::from_utf8(data) else {
        return;
    };

    // Path splitting alone
    let _ = RequestPath::parse(path);

    // Full dispatch: every request must be answered, never panic
    let mut registry = Registry::new(RegistryConfig::default());
    for method in [Method::Get, Method::Post, Method::Delete] {
        let response = registry.handle(&ApiRequest::new(method, path));
        assert!((200..600).contains(&response.status));
    }
});
