//! Trust chain resolution for the oidfed workspace.
//!
//! Given a leaf entity and a trust anchor, this crate discovers a chain of
//! signed statements connecting them by following authority hints, validates
//! every hop, and resolves the leaf's metadata under the policies its
//! superiors impose.
//!
//! - [`retrieval`]: fetches and validates entity configurations and
//!   subordinate statements over a [`Transport`]
//! - [`resolver`]: depth-first search with backtracking over authority hints
//! - [`metadata`]: re-validation of a chain and metadata policy application
//! - [`directory`]: the issuer side, a cached view of registered subordinates
//!
//! Resolution is synchronous. Servers run it on a blocking thread.

pub mod directory;
pub mod error;
pub mod metadata;
pub mod resolver;
pub mod retrieval;
pub mod transport;

pub use directory::{DirectoryError, SubordinateDirectory, SubordinateRecord, SubordinateSource};
pub use error::ResolveError;
pub use metadata::{MetadataResolver, ResolvedMetadata};
pub use resolver::{TrustAnchor, TrustChain, TrustChainResolver};
pub use retrieval::{RetrievalError, Retriever, SignedStatement};
pub use transport::{HttpResponse, ReqwestTransport, RequestContext, Transport, TransportError};
