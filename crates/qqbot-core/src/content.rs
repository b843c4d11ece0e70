//! Formatted-content traits.
//!
//! A message body on the wire is an ordered list of segments: plain text,
//! mentions, faces, images and so on. [`ContentSegment`] describes one unit,
//! [`FormattedContent`] the whole sequence.

use std::fmt::Debug;

/// A single unit of formatted content.
pub trait ContentSegment: Debug + Clone + Send + Sync + 'static {
    /// Returns the wire type identifier of this segment (`"text"`, `"at"`, ...).
    fn segment_type(&self) -> &str;

    /// Returns true if this is a plain text segment.
    fn is_text(&self) -> bool {
        self.segment_type() == "text"
    }

    /// Returns the text content if this is a text segment.
    fn as_text(&self) -> Option<&str>;

    /// Returns a human-readable rendering of the segment.
    fn display(&self) -> String;
}

/// An ordered sequence of [`ContentSegment`]s.
///
/// ```rust,ignore
/// fn summarize<C: FormattedContent>(content: &C) {
///     println!("{} segments, text = {:?}", content.len(), content.plain_text());
/// }
/// ```
pub trait FormattedContent: Debug + Clone + Send + Sync + 'static {
    /// The segment type stored in this content.
    type Segment: ContentSegment;

    /// Returns the segments in order.
    fn as_slice(&self) -> &[Self::Segment];

    /// Returns an iterator over the segments.
    fn iter(&self) -> impl Iterator<Item = &Self::Segment> {
        self.as_slice().iter()
    }

    /// Returns the number of segments.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if there are no segments.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the content to plain text.
    ///
    /// Only text segments contribute; mentions, media and other rich segments
    /// are dropped.
    fn plain_text(&self) -> String {
        self.iter().filter_map(ContentSegment::as_text).collect()
    }

    /// Renders every segment for display, rich segments included.
    fn display(&self) -> String {
        self.iter().map(ContentSegment::display).collect()
    }
}
