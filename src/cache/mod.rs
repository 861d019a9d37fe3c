pub mod local;
pub mod pairtree;
pub mod remote;

pub use local::LocalIndex;
pub use pairtree::{Addressing, Pairtree, PersistentCache};
pub use remote::RemoteImageCache;
