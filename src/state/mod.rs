/// Controller state module
///
/// This module holds all view-side state, including:
/// - Shared data structures (data.rs)
/// - The live mirror both controllers rebuild on every snapshot (mirror.rs)
/// - The authenticated admin editor (admin.rs)
/// - The public front/back gallery (public.rs)

pub mod admin;
pub mod data;
pub mod mirror;
pub mod public;
