//! Link configuration.

use flexrpc::Decoding;
use flexrpc::codec::DEFAULT_MAX_DEPTH;

/// Knobs shared by the dispatcher and every peer it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Containers nested deeper than this decode as nil.
    pub max_decode_depth: usize,
    /// Remove one leading `/` from node paths before resolving them.
    pub strip_leading_slash: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_decode_depth: DEFAULT_MAX_DEPTH,
            strip_leading_slash: true,
        }
    }
}

impl LinkConfig {
    pub fn with_max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }

    pub fn with_strip_leading_slash(mut self, strip: bool) -> Self {
        self.strip_leading_slash = strip;
        self
    }

    pub fn decoding(&self) -> Decoding {
        Decoding::with_max_depth(self.max_decode_depth)
    }

    /// The path as the node graph should see it.
    pub fn node_path<'a>(&self, path: &'a str) -> &'a str {
        if self.strip_leading_slash {
            path.strip_prefix('/').unwrap_or(path)
        } else {
            path
        }
    }
}
