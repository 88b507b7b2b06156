//! Permission probe contract
//!
//! A probe answers one question: what can this subject do on this
//! resource? Decoding raw permission masks, authentication and retries are
//! the implementation's business; the engine only sees labels or a failure.

use crate::error::ProbeFailure;
use crate::permission::PermissionSet;
use crate::types::{ResourceRef, Subject};
use async_trait::async_trait;
use std::sync::Arc;

/// Per-resource permission lookup
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    /// Effective permissions of `subject` on `resource`
    ///
    /// An empty set means no access. Errors are contained by the engine and
    /// reported as a failed row.
    async fn check(
        &self,
        resource: &ResourceRef,
        subject: &Subject,
    ) -> Result<PermissionSet, ProbeFailure>;
}

#[async_trait]
impl<T: PermissionProbe + ?Sized> PermissionProbe for Arc<T> {
    async fn check(
        &self,
        resource: &ResourceRef,
        subject: &Subject,
    ) -> Result<PermissionSet, ProbeFailure> {
        (**self).check(resource, subject).await
    }
}
