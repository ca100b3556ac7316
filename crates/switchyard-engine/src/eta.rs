//! Provisioning time estimates.

/// Rough wait estimate in minutes, `(typical, worst_case)`, for a new
/// deployment of the given engine and storage size.
///
/// Shared-storage engines provision without copying data, so they get a
/// flat estimate regardless of size. For everything else the copy
/// dominates and the estimate scales with allocated storage; unknown
/// storage gets the cautious middle band.
pub fn estimate_provisioning_eta(engine: &str, storage_gib: Option<u32>) -> (u32, u32) {
    if engine.to_lowercase().contains("aurora") {
        return (5, 25);
    }
    match storage_gib {
        None => (10, 45),
        Some(gib) if gib <= 100 => (10, 25),
        Some(gib) if gib <= 500 => (20, 60),
        Some(_) => (30, 120),
    }
}
