//! Errors reported while bringing up the transport.
//!
//! Runtime conditions (ring buffer overflow, unsupported control requests)
//! are not errors: overflow silently drops bytes and unsupported requests are
//! answered with a STALL. Only initialization can fail, and it carries the
//! underlying bus error so the caller can decide whether to retry.

use crate::types::EndpointAddress;

/// Initialization failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Error<E> {
    /// The peripheral refused to register an endpoint.
    EndpointSetup {
        /// Endpoint that failed.
        address: EndpointAddress,
        /// Error reported by the bus.
        source: E,
    },

    /// The peripheral could not be enabled or its interrupt line unmasked.
    Enable(E),
}

impl<E> Error<E> {
    /// The bus error underlying this failure.
    pub fn source(&self) -> &E {
        match self {
            Self::EndpointSetup { source, .. } | Self::Enable(source) => source,
        }
    }
}
