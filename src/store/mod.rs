/// External collaborators
///
/// The record store (realtime document database), blob store (binary
/// object storage), and auth gateway, each behind a trait with a local
/// implementation so the whole application runs self-contained.

pub mod auth;
pub mod blobs;
pub mod records;
pub mod sqlite;
