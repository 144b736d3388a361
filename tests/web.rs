//! Browser tests for the exported entry points
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use txn_extractor::repair_transaction_id;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn repairs_known_collapse() {
    let raw = format!("EEP8{}NRJ4C", "6".repeat(12));
    assert_eq!(repair_transaction_id(&raw), "EEP86556NRJ4C");
}

#[wasm_bindgen_test]
fn clean_id_passes_through() {
    assert_eq!(repair_transaction_id(" EEP86556NRJ4C "), "EEP86556NRJ4C");
}

#[wasm_bindgen_test]
fn unrecoverable_id_is_not_available() {
    assert_eq!(repair_transaction_id("ABC"), "N/A");
}
