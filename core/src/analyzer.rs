use crate::error::AnalyzeError;
use crate::index::Token;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Turns raw text into normalized `(term, position)` tokens. The index never
/// tokenizes on its own; every build goes through one of these.
pub trait Analyzer: Send + Sync {
    /// Recorded in generation metadata.
    fn name(&self) -> String;

    /// Positions are 1-indexed and contiguous after filtering.
    fn analyze(&self, text: &str, apply_stemming: bool) -> Result<Vec<Token>, AnalyzeError>;
}

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\d+(?:\.\d+)*|\w+(?:'\w+)*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref DEFAULT_STOPWORDS: HashSet<String> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().map(|w| w.to_string()).collect()
    };
}

/// NFKC + lowercase, regex word splitting, stopword removal and optional
/// English Snowball stemming.
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    stopwords: HashSet<String>,
    stopwords_source: String,
}

impl Default for StandardAnalyzer {
    fn default() -> Self {
        Self { stopwords: DEFAULT_STOPWORDS.clone(), stopwords_source: "english".into() }
    }
}

impl StandardAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stopwords = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { stopwords, stopwords_source: "custom".into() }
    }

    /// One stopword per line; blank lines are ignored.
    pub fn with_stopwords_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let mut analyzer = Self::with_stopwords(contents.lines());
        analyzer.stopwords_source = path.as_ref().display().to_string();
        Ok(analyzer)
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

impl Analyzer for StandardAnalyzer {
    fn name(&self) -> String {
        format!("standard(stopwords={}, stemmer=snowball-english)", self.stopwords_source)
    }

    fn analyze(&self, text: &str, apply_stemming: bool) -> Result<Vec<Token>, AnalyzeError> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for mat in RE.find_iter(&normalized) {
            let word = mat.as_str();
            if self.is_stopword(word) { continue; }
            position += 1;
            let term = if apply_stemming { STEMMER.stem(word).into_owned() } else { word.to_string() };
            tokens.push(Token::new(term, position));
        }
        Ok(tokens)
    }
}
