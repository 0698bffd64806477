// Copyright (c) 2026 QuantumEco
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parser robustness only: any input must yield Ok or a Config error.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = quantumeco::core::config::NodeConfig::from_toml_str(s);
    }
});
