//! The address resolution protocol.
//!
//! Answers requests for the local address and resolves the hardware addresses of neighbors. As
//! noted in RFC 826, the resolver keeps only a very small cache of immediate communication
//! partners. A lookup that misses sends a broadcast request and reports `MacNotFound`, the caller
//! tries again once the reply has filled the cache.
mod endpoint;
mod neighbor;

pub use endpoint::{
    Endpoint,
    receive,
    request,
    resolve,
    update,
};

pub use neighbor::{
    Cache as NeighborCache,
    Neighbor,
};
