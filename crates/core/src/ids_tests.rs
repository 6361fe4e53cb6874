// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn generated_ids_carry_prefix() {
    let exe = ExecutionId::new();
    assert!(exe.as_str().starts_with("exe-"));
    assert_eq!(exe.as_str().len(), 4 + 16);

    let sub = SubscriptionId::new();
    assert!(sub.as_str().starts_with("sub-"));

    let cli = ClientId::new();
    assert!(cli.as_str().starts_with("cli-"));
}

#[test]
fn generated_ids_are_unique() {
    let a = ExecutionId::new();
    let b = ExecutionId::new();
    assert_ne!(a, b);
}

#[test]
fn id_serde_is_transparent() {
    let id = SubscriptionId::from_string("sub-abc");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"sub-abc\"");
    let back: SubscriptionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[parameterized(
    simple = { "hello" },
    dotted = { "com.example.app" },
    dashed = { "my-app_01" },
)]
fn app_id_accepts(id: &str) {
    assert!(AppId::parse(id).is_ok());
}

#[parameterized(
    empty = { "" },
    slash = { "a/b" },
    space = { "a b" },
    unicode = { "appé" },
)]
fn app_id_rejects(id: &str) {
    assert!(AppId::parse(id).is_err());
}

#[test]
fn app_id_rejects_overlong() {
    let id = "a".repeat(129);
    assert!(AppId::parse(&id).is_err());
    let id = "a".repeat(128);
    assert!(AppId::parse(&id).is_ok());
}
