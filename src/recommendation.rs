//! Splitting a recommender response into its sections.
//!
//! A response is expected to read: an explanation, then
//! `Revised Directory Tree:` followed by the tree text, then
//! `Additional Notes:` followed by free text. Only the tree section is fed
//! to the parser.

/// Marker that opens the revised tree section.
pub const TREE_MARKER: &str = "Revised Directory Tree:";
/// Marker that closes the revised tree section.
pub const NOTES_MARKER: &str = "Additional Notes:";
/// Optional heading in front of the explanation.
pub const EXPLANATION_MARKER: &str = "Explanation of Recommendations:";

/// The three sections of a recommender response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub explanation: String,
    pub tree: String,
    pub notes: String,
}

impl Recommendation {
    /// Splits `text` on the section markers.
    ///
    /// Without a tree marker the whole text is taken as the tree. Without a
    /// notes marker the tree runs to the end of the text. Markdown code fences
    /// and heading decoration around the markers are blanked out.
    ///
    /// The tree keeps one line per line of `text` up to its last entry, so
    /// line numbers in parse errors point into the original response.
    ///
    /// # Examples
    ///
    /// ```
    /// use tidyup::recommendation::Recommendation;
    ///
    /// let response = "Group the documents.\nRevised Directory Tree:\n- root\n  - docs\nAdditional Notes:\nNone.";
    /// let recommendation = Recommendation::split(response);
    /// assert_eq!(recommendation.explanation, "Group the documents.");
    /// assert_eq!(recommendation.tree.trim_start(), "- root\n  - docs\n");
    /// assert_eq!(recommendation.notes, "None.");
    /// ```
    pub fn split(text: &str) -> Self {
        let Some(start) = text.find(TREE_MARKER) else {
            return Self {
                explanation: String::new(),
                tree: clean_tree_section(text, 0),
                notes: String::new(),
            };
        };

        let explanation = text[..start].replacen(EXPLANATION_MARKER, "", 1);
        let tree_start = start + TREE_MARKER.len();
        let preceding_lines = text[..tree_start].matches('\n').count();
        let after = &text[tree_start..];
        let (tree, notes) = match after.find(NOTES_MARKER) {
            Some(end) => (&after[..end], &after[end + NOTES_MARKER.len()..]),
            None => (after, ""),
        };

        Self {
            explanation: trim_decoration(&explanation).to_string(),
            tree: clean_tree_section(tree, preceding_lines),
            notes: trim_decoration(notes).to_string(),
        }
    }
}

/// Blanks fence lines and lines made only of markdown decoration, keeping
/// everything else verbatim so indentation survives. The section is preceded
/// by `preceding_lines` empty lines so it lines up with the full response.
fn clean_tree_section(section: &str, preceding_lines: usize) -> String {
    let mut tree = "\n".repeat(preceding_lines);
    for line in section.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with("```")
            && !trimmed.chars().all(|ch| matches!(ch, '*' | '#' | '_'))
        {
            tree.push_str(line.trim_end());
        }
        tree.push('\n');
    }

    let content_end = tree.trim_end().len();
    tree.truncate(content_end);
    if !tree.is_empty() {
        tree.push('\n');
    }
    tree
}

fn trim_decoration(text: &str) -> &str {
    text.trim_matches(|ch: char| ch.is_whitespace() || matches!(ch, '*' | '#'))
}
