// Copyright (c) 2026 QuantumEco
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use quantumeco::core::types::{
    decode_value, encode_canonical, CarbonCredit, DeliveryRecord, Retirement, TrustToken,
};

fuzz_target!(|data: &[u8]| {
    // Stored values must either decode and re-encode to the same bytes, or fail cleanly.
    if let Ok(r) = decode_value::<DeliveryRecord>(data) {
        assert_eq!(encode_canonical(&r).unwrap(), data);
    }
    let _ = decode_value::<TrustToken>(data);
    let _ = decode_value::<CarbonCredit>(data);
    let _ = decode_value::<Retirement>(data);
});
