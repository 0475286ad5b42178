//! Channel pattern compilation.
//!
//! `*` matches one channel segment, `**` matches any number of segments,
//! and character classes follow the usual glob rules. Segments are split
//! on `/`.

use std::fmt;

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::errors::{BayeuxError, Result};

/// A compiled channel pattern.
#[derive(Clone)]
pub struct ChannelPattern {
    source: String,
    glob: Glob,
    matcher: GlobMatcher,
}

impl ChannelPattern {
    /// Compile `pattern`, failing with [`BayeuxError::InvalidPattern`].
    pub fn compile(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| BayeuxError::InvalidPattern {
                pattern: pattern.to_owned(),
                message: e.kind().to_string(),
            })?;
        let matcher = glob.compile_matcher();
        Ok(Self {
            source: pattern.to_owned(),
            glob,
            matcher,
        })
    }

    /// Whether `channel` falls under this pattern.
    pub fn matches(&self, channel: &str) -> bool {
        self.matcher.is_match(channel)
    }

    /// Registry key. Patterns that compile to the same matcher share it.
    pub fn canonical(&self) -> &str {
        self.glob.regex()
    }

    /// The pattern as the caller wrote it, which is what the server sees.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelPattern").field(&self.source).finish()
    }
}

impl fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
