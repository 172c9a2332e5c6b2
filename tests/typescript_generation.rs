//! TypeScript Generation Tests
//!
//! Validates that the view-facing types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_view_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<heatcast::ConnectionStatus>();
    assert_type::<heatcast::UpdateRate>();
    assert_type::<heatcast::Subscription>();
    assert_type::<heatcast::ViewSnapshot>();
    assert_type::<heatcast::config::MapViewport>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = heatcast::UpdateRate::Native;
    let _ = heatcast::ConnectionStatus::Connecting;
}
