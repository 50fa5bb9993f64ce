// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use nmos_registry::VersionStamp;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(stamp) = text.parse::<VersionStamp>() {
        // Formatting then parsing gives the same stamp
        let again: VersionStamp = stamp.to_string().parse().expect("formatted stamp parses");
        assert_eq!(stamp, again);

        // Cursor arithmetic stays ordered
        assert!(stamp.decrement() <= stamp);
        assert!(stamp.increment() >= stamp);
    }
});
