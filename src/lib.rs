//! Searchlink bundles the workspace crates behind cargo features.
//! ### Features
//! **client** (default): the [cluster](crate::cluster) access layer, a
//! node-aware HTTP client for multi-node search clusters.
//! **vendor** (default): logger builders and lock primitives shared by the
//! crates, re-exported through the [prelude](crate::prelude).

pub mod prelude {
    #[cfg(feature = "vendor")]
    pub use vendor::prelude::*;
    #[cfg(feature = "client")]
    pub use cluster::{
        Client, ClientBuilder, Context, Error as ClientError, Method, PerformRequestOptions,
        Response,
    };
}

#[cfg(feature = "client")] pub use cluster::{self, *};
