//! Discovery port: one mechanism for finding devices.
//!
//! A discovery backend (local network probe, radio scan, simulated network…)
//! returns every device visible right now. The [`Scanner`](crate::scanner)
//! wraps it with presence tracking, so a backend never has to remember what
//! it returned last time.

use std::future::Future;

use commoniot_domain::error::DiscoveryError;

use crate::device::IotDevice;

pub trait Discovery: Send + Sync {
    /// Name used for the scanner and its log lines, e.g. `"virtual"`.
    fn name(&self) -> &str;

    /// Return the devices currently visible through this mechanism.
    ///
    /// The identifiers of returned devices must be derived from the physical
    /// source so repeated scans map to the same registry entry.
    fn scan(&self) -> impl Future<Output = Result<Vec<IotDevice>, DiscoveryError>> + Send;
}

impl<T: Discovery> Discovery for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn scan(&self) -> impl Future<Output = Result<Vec<IotDevice>, DiscoveryError>> + Send {
        (**self).scan()
    }
}
