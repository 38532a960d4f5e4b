/// Priority of a streaming request.
///
/// `High > Normal > Low`. Services deliver queued requests in descending
/// priority, oldest first within the same priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LoadPriority {
    /// Background streaming. May wait behind everything else.
    Low,
    /// Regular gameplay requests.
    #[default]
    Normal,
    /// Needed this frame, ahead of everything queued.
    High,
}
