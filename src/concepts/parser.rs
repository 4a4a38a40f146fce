//! Reader for the Turtle subset emitted by taxonomy exporters.
//!
//! Only what a concept hierarchy needs is understood: `@prefix` / `PREFIX`
//! declarations and statements typed `a skos:Concept` carrying `prefLabel`,
//! `definition`, `broader` and `narrower`. Everything else is skipped.

use std::collections::HashMap;
use std::path::Path;

use super::index::{Concept, ConceptIndex};

/// The outcome of parsing a concept source. Never fails outright.
#[derive(Debug, Clone, Default)]
pub struct ConceptParse {
    pub concepts: ConceptIndex,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Iri(String),
    Literal(String),
    Word(String),
    Semicolon,
    Comma,
    Dot,
}

/// Parses concept statements from Turtle-like source text.
///
/// # Examples
///
/// ```
/// let source = r#"
/// @prefix skos: <http://www.w3.org/2004/02/skos/core#> .
/// @prefix tax: <https://example.org/taxonomy/> .
///
/// tax:category/climate a skos:Concept ;
///     skos:prefLabel "Climate"@en ;
///     skos:narrower tax:category/mitigation .
///
/// tax:category/mitigation a skos:Concept ;
///     skos:prefLabel "Mitigation"@en .
/// "#;
///
/// let parsed = taxon::concepts::parse(source);
/// assert!(parsed.errors.is_empty());
///
/// let mitigation = parsed.concepts.get("category/mitigation").unwrap();
/// assert_eq!(mitigation.broader.as_deref(), Some("category/climate"));
/// ```
pub fn parse(source: &str) -> ConceptParse {
    let mut errors = Vec::new();
    let statements = split_statements(tokenize(source, &mut errors));

    let resolver = Resolver {
        prefixes: collect_prefixes(&statements, &mut errors),
    };

    let mut concepts = ConceptIndex::new();
    for statement in statements.iter().filter(|s| !is_directive(s)) {
        if let Some(concept) = resolver.concept(statement, &mut errors) {
            concepts.insert(concept);
        }
    }
    concepts.reconcile_links();

    tracing::debug!(
        concepts = concepts.len(),
        errors = errors.len(),
        "parsed concept source"
    );
    ConceptParse { concepts, errors }
}

/// Reads and parses a concept file.
///
/// A missing or unreadable file yields an empty index and one error entry.
pub fn parse_file(path: impl AsRef<Path>) -> ConceptParse {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(source) => parse(&source),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "concept file unavailable");
            ConceptParse {
                concepts: ConceptIndex::new(),
                errors: vec![format!(
                    "could not read concept file {}: {}",
                    path.display(),
                    e
                )],
            }
        }
    }
}

fn tokenize(source: &str, errors: &mut Vec<String>) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '<' => match chars[i + 1..].iter().position(|&c| c == '>') {
                Some(len) => {
                    tokens.push(Token::Iri(chars[i + 1..i + 1 + len].iter().collect()));
                    i += len + 2;
                }
                None => {
                    errors.push(format!("line {}: unterminated IRI", line));
                    break;
                }
            },
            '"' | '\'' => match read_literal(&chars, i) {
                Some((text, next, newlines)) => {
                    tokens.push(Token::Literal(text));
                    line += newlines;
                    i = skip_literal_suffix(&chars, next);
                }
                None => {
                    errors.push(format!("line {}: unterminated string literal", line));
                    break;
                }
            },
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' if at_boundary(&chars, i + 1) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            _ => {
                let end = word_end(&chars, i);
                tokens.push(Token::Word(chars[i..end].iter().collect()));
                i = end;
            }
        }
    }

    tokens
}

/// A `.` ends a statement only when followed by whitespace or end of input.
fn at_boundary(chars: &[char], i: usize) -> bool {
    chars.get(i).is_none_or(|c| c.is_whitespace())
}

fn word_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || matches!(c, ';' | ',' | '"' | '<') {
            break;
        }
        if c == '.' && at_boundary(chars, i + 1) {
            break;
        }
        i += 1;
    }
    // Guarantees progress on a lone delimiter the match arms did not claim.
    i.max(start + 1)
}

/// Returns the decoded text, the index after the closing quote and the
/// number of newlines consumed.
fn read_literal(chars: &[char], start: usize) -> Option<(String, usize, usize)> {
    let quote = chars[start];
    let long = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if long { start + 3 } else { start + 1 };
    let mut text = String::new();
    let mut newlines = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            let escaped = chars.get(i + 1)?;
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => *other,
            });
            i += 2;
            continue;
        }
        if c == quote {
            if !long {
                return Some((text, i + 1, newlines));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Some((text, i + 3, newlines));
            }
        }
        if c == '\n' {
            newlines += 1;
        }
        text.push(c);
        i += 1;
    }

    None
}

/// Skips a `@lang` tag or `^^datatype` after a literal.
fn skip_literal_suffix(chars: &[char], mut i: usize) -> usize {
    if chars.get(i) == Some(&'@') {
        i += 1;
        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '-') {
            i += 1;
        }
    } else if chars.get(i) == Some(&'^') && chars.get(i + 1) == Some(&'^') {
        i += 2;
        if chars.get(i) == Some(&'<') {
            while i < chars.len() && chars[i] != '>' {
                i += 1;
            }
            i += 1;
        } else if i < chars.len() {
            i = word_end(chars, i);
        }
    }
    i
}

fn split_statements(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        match token {
            Token::Dot => {
                if !current.is_empty() {
                    statements.push(std::mem::take(&mut current));
                }
            }
            // SPARQL-style directives have no terminating dot.
            Token::Word(word) if current.is_empty() && is_sparql_directive(&word) => {
                let mut directive = vec![Token::Word(word)];
                for next in tokens.by_ref() {
                    let done = matches!(next, Token::Iri(_));
                    directive.push(next);
                    if done {
                        break;
                    }
                }
                statements.push(directive);
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }

    statements
}

fn is_sparql_directive(word: &str) -> bool {
    word.eq_ignore_ascii_case("prefix") || word.eq_ignore_ascii_case("base")
}

fn is_directive(statement: &[Token]) -> bool {
    match statement.first() {
        Some(Token::Word(word)) => {
            word.starts_with('@') || is_sparql_directive(word)
        }
        _ => false,
    }
}

fn collect_prefixes(statements: &[Vec<Token>], errors: &mut Vec<String>) -> HashMap<String, String> {
    let mut prefixes = HashMap::new();

    for statement in statements {
        let Some(Token::Word(keyword)) = statement.first() else {
            continue;
        };
        if keyword != "@prefix" && !keyword.eq_ignore_ascii_case("prefix") {
            continue;
        }
        match statement.as_slice() {
            [_, Token::Word(name), Token::Iri(uri), ..] if name.ends_with(':') => {
                prefixes.insert(name.trim_end_matches(':').to_string(), uri.clone());
            }
            _ => errors.push(format!("malformed prefix declaration: {:?}", statement)),
        }
    }

    prefixes
}

struct Resolver {
    prefixes: HashMap<String, String>,
}

impl Resolver {
    fn concept(&self, statement: &[Token], errors: &mut Vec<String>) -> Option<Concept> {
        let (subject, rest) = statement.split_first()?;
        let groups = predicate_objects(rest);

        let typed_concept = groups.iter().any(|(predicate, objects)| {
            is_type_predicate(predicate)
                && objects.iter().any(|o| local_name(o) == Some("Concept"))
        });
        if !typed_concept {
            return None;
        }

        let Some(key) = self.reference_key(subject) else {
            errors.push(format!("could not resolve concept subject {:?}", subject));
            return None;
        };

        let mut concept = Concept::new(key);
        for (predicate, objects) in &groups {
            match local_name(predicate) {
                Some("prefLabel") if concept.pref_label.is_none() => {
                    concept.pref_label = first_literal(objects);
                }
                Some("definition") if concept.definition.is_none() => {
                    concept.definition = first_literal(objects);
                }
                Some("broader") if concept.broader.is_none() => {
                    concept.broader = objects.iter().find_map(|o| self.reference_key(o));
                }
                Some("narrower") => {
                    for child in objects.iter().filter_map(|o| self.reference_key(o)) {
                        if !concept.narrower.contains(&child) {
                            concept.narrower.push(child);
                        }
                    }
                }
                _ => {}
            }
        }

        Some(concept)
    }

    fn resolve(&self, token: &Token) -> Option<String> {
        match token {
            Token::Iri(uri) => Some(uri.clone()),
            Token::Word(word) => {
                let (prefix, local) = word.split_once(':')?;
                let base = self.prefixes.get(prefix)?;
                Some(format!("{}{}", base, local))
            }
            _ => None,
        }
    }

    fn reference_key(&self, token: &Token) -> Option<String> {
        self.resolve(token).map(|uri| self.canonical_key(&uri))
    }

    /// Strips the longest matching base URI; falls back to the last path
    /// segment.
    fn canonical_key(&self, uri: &str) -> String {
        let stripped = self
            .prefixes
            .values()
            .filter(|base| !base.is_empty() && uri.starts_with(base.as_str()))
            .max_by_key(|base| base.len())
            .map(|base| uri[base.len()..].trim_matches('/'));

        match stripped {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => last_segment(uri).to_string(),
        }
    }
}

fn last_segment(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches(['/', '#']);
    trimmed.rsplit(['/', '#']).next().unwrap_or(trimmed)
}

/// Groups `pred obj, obj ; pred obj` into predicate/object lists.
fn predicate_objects(tokens: &[Token]) -> Vec<(&Token, Vec<&Token>)> {
    tokens
        .split(|t| *t == Token::Semicolon)
        .filter_map(|group| {
            let (predicate, objects) = group.split_first()?;
            let objects = objects
                .split(|t| *t == Token::Comma)
                .filter_map(|segment| segment.first())
                .collect();
            Some((predicate, objects))
        })
        .collect()
}

fn is_type_predicate(token: &Token) -> bool {
    matches!(token, Token::Word(w) if w == "a") || local_name(token) == Some("type")
}

fn local_name(token: &Token) -> Option<&str> {
    match token {
        Token::Word(word) => word.rsplit([':', '/', '#']).next(),
        Token::Iri(uri) => uri.rsplit(['/', '#']).next(),
        _ => None,
    }
}

fn first_literal(objects: &[&Token]) -> Option<String> {
    objects.iter().find_map(|o| match o {
        Token::Literal(text) => Some(text.trim().to_string()),
        _ => None,
    })
}
