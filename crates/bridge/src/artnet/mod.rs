//! Art-Net side of the bridge

pub mod node;

pub use node::ArtNetNode;
