/// A filesystem path classified by depth.
///
/// Segments are borrowed in their encoded (filesystem) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsPath<'a> {
    Root,
    Channel(&'a str),
    Topic(&'a str, &'a str),
    /// Deeper than two segments, or containing an empty segment.
    Malformed,
}

impl<'a> FsPath<'a> {
    /// Classify a `/`-separated path. A leading `/` is optional and one
    /// trailing `/` is ignored.
    pub fn parse(path: &'a str) -> Self {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return FsPath::Root;
        }

        let mut segments = trimmed.split('/');
        let first = segments.next().unwrap_or_default();
        let second = segments.next();
        if segments.next().is_some() {
            return FsPath::Malformed;
        }

        match (first, second) {
            ("", _) | (_, Some("")) => FsPath::Malformed,
            (channel, None) => FsPath::Channel(channel),
            (channel, Some(topic)) => FsPath::Topic(channel, topic),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FsPath::Root | FsPath::Channel(_))
    }
}
