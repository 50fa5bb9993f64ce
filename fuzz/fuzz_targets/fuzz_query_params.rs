// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use nmos_registry::{QueryParams, ResourceType};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Interpret input as a raw query string: a=b&c=d
    let pairs: Vec<(String, String)> = text
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();

    if let Ok(params) = QueryParams::parse(ResourceType::Flow, &pairs) {
        let _ = params.matches(&serde_json::json!({ "id": "x", "label": text }));
    }
});
