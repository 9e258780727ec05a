use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources. Anything else in the
// checkout (reference material, build output) is not policed.
const SOURCE_ROOTS: [&str; 4] = ["engine", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: &str =
    "FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE";

#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    StarsInComment,
    UppercaseComment,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> String {
        match self {
            Self::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Self::ForbiddenWord => format!(r"(//|/\*|///).*(?:{FORBIDDEN_WORDS})"),
            Self::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Self::UppercaseComment => r"(//|/\*|///).*".to_string(),
            Self::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn headline(self) -> &'static str {
        match self {
            Self::UnderscorePrefix => "underscore-prefixed identifiers",
            Self::ForbiddenWord => "forbidden comment words",
            Self::StarsInComment => "'**' sequences in regular comments",
            Self::UppercaseComment => "all-uppercase comments",
            Self::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn advice(self) -> String {
        match self {
            Self::UnderscorePrefix => "Underscore-prefixed names are not allowed. Use the binding or remove it.".to_string(),
            Self::ForbiddenWord => format!(
                "Comments must not contain any of: {}. Remove the comment instead of rewording it.",
                FORBIDDEN_WORDS.replace('|', ", ")
            ),
            Self::StarsInComment => "The '**' pattern is only allowed in doc comments.".to_string(),
            Self::UppercaseComment => "Comments written entirely in uppercase are not allowed.".to_string(),
            Self::AllowDeadCode => "Dead code must be used or deleted, never silenced.".to_string(),
        }
    }

    // Decides whether a regex hit on `line` is a real violation.
    fn is_violation(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Self::UnderscorePrefix => !trimmed.starts_with("//") && !underscore_only_in_strings(line),
            Self::ForbiddenWord | Self::AllowDeadCode => true,
            Self::StarsInComment => !trimmed.starts_with("///") && !trimmed.starts_with("//!"),
            Self::UppercaseComment => comment_text(trimmed).is_some_and(|text| {
                let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
                letters.peek().is_some() && letters.all(char::is_uppercase)
            }),
        }
    }
}

fn underscore_only_in_strings(line: &str) -> bool {
    line.split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 0)
        .all(|(_, code)| !code.split(|c: char| !(c.is_alphanumeric() || c == '_')).any(|word| {
            word.len() > 1 && word.starts_with('_')
        }))
}

fn comment_text(trimmed: &str) -> Option<&str> {
    ["///", "//!", "//"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .map(str::trim)
}

struct Violations {
    rule: Rule,
    file_path: PathBuf,
    lines: Vec<String>,
}

impl Violations {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            lines: Vec::new(),
        }
    }

    fn into_error(self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.lines.len(),
            self.rule.headline(),
            self.file_path.display()
        );
        for line in &self.lines {
            message.push_str(&format!("   {line}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", self.rule.advice()));
        Some(message)
    }
}

impl Sink for Violations {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.is_violation(line_text) {
            self.lines.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn source_files() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS
        .iter()
        .filter(|root| Path::new(root).is_dir())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(Result::ok))
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|entry| entry.into_path())
}

fn enforce(rule: Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
    let mut searcher = Searcher::new();
    for path in source_files() {
        let mut violations = Violations::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut violations)?;
        if let Some(message) = violations.into_error() {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    let rules = [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWord,
        Rule::StarsInComment,
        Rule::UppercaseComment,
        Rule::AllowDeadCode,
    ];
    for rule in rules {
        if let Err(e) = enforce(rule) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
