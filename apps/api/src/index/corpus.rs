//! Resume corpus preparation: cleaning and passage chunking.

/// Default passage size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A resume split into passages. Built once per analysis and shared read-only
/// by every skill query.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    passages: Vec<String>,
}

impl Corpus {
    pub fn from_resume(resume_text: &str, chunk_size: usize) -> Self {
        Self {
            passages: chunk_text(&clean_text(resume_text), chunk_size),
        }
    }

    pub fn passages(&self) -> &[String] {
        &self.passages
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Drops non-ASCII characters, trims every line and removes blank lines.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.chars().filter(char::is_ascii).collect::<String>())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits text into passages of at most `chunk_size` characters, breaking on whitespace.
/// A single word longer than `chunk_size` becomes its own passage.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.len() + 1 + word.len()
        };
        if needed > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_removes_blank_lines_and_non_ascii() {
        let cleaned = clean_text("  Jane Doe  \n\n\u{2022} Python developer \u{2014} 5 years\n   \n");
        assert_eq!(cleaned, "Jane Doe\nPython developer  5 years");
    }

    #[test]
    fn test_chunk_text_respects_size() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(chunks.iter().all(|c| c.len() <= 11));
    }

    #[test]
    fn test_chunk_text_never_splits_words() {
        let chunks = chunk_text("Kubernetes", 4);
        assert_eq!(chunks, vec!["Kubernetes"]);
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("   \n ", 500).is_empty());
    }

    #[test]
    fn test_corpus_from_resume() {
        let corpus = Corpus::from_resume("Experienced Python developer\n\nBuilt ETL pipelines", 500);
        assert_eq!(corpus.passages().len(), 1);
        assert!(corpus.passages()[0].contains("Python"));
        assert!(!corpus.is_empty());
    }
}
