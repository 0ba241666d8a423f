//! Ranked query syntax accepted by [`SearchIndex::search`](crate::SearchIndex::search).
//!
//! A query is a list of clauses separated by whitespace (or `-` between
//! words). Each clause is
//!
//! ```text
//! [+|-][field:]term[~distance][^boost]
//! ```
//!
//! `+` makes the clause required and `-` prohibited. `term` may contain `*`
//! wildcards. A backslash escapes the next character. The string is used as
//! typed: nothing is escaped on the caller's behalf.

use crate::document::Field;
use crate::error::QueryError;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presence {
    #[default]
    Optional,
    Required,
    Prohibited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Analysed term, or the lowercased pattern for wildcard clauses
    pub term: String,
    /// Fields the clause is scoped to; empty means every field
    pub fields: Vec<Field>,
    pub presence: Presence,
    pub boost: f64,
    pub edit_distance: u32,
    pub wildcard: bool,
}

impl Clause {
    pub fn fields(&self) -> &[Field] {
        if self.fields.is_empty() {
            &Field::ALL
        } else {
            &self.fields
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn parse(input: &str, tokenizer: &Tokenizer) -> Result<Self, QueryError> {
        let mut clauses = Vec::new();
        for raw in split_clauses(input) {
            parse_clause(&raw, tokenizer, &mut clauses)?;
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Split on whitespace, and on `-` anywhere but the start of a clause.
/// Escapes are kept so that clause parsing can honour them.
fn split_clauses(input: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
        } else if c.is_whitespace() || (c == '-' && !current.is_empty()) {
            if !current.is_empty() {
                clauses.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        clauses.push(current);
    }
    clauses
}

#[derive(Clone, Copy, PartialEq)]
enum Slot {
    Term,
    EditDistance,
    Boost,
}

fn parse_clause(raw: &str, tokenizer: &Tokenizer, out: &mut Vec<Clause>) -> Result<(), QueryError> {
    let mut chars = raw.chars().peekable();
    let presence = match chars.peek() {
        Some('+') => Presence::Required,
        Some('-') => Presence::Prohibited,
        _ => Presence::Optional,
    };
    if presence != Presence::Optional {
        chars.next();
    }

    let mut field: Option<String> = None;
    let mut term = String::new();
    let mut edit_distance: Option<String> = None;
    let mut boost: Option<String> = None;
    let mut wildcard = false;
    let mut slot = Slot::Term;

    while let Some(c) = chars.next() {
        let literal = if c == '\\' {
            match chars.next() {
                Some(escaped) => escaped,
                None => break,
            }
        } else {
            match c {
                ':' if slot == Slot::Term && field.is_none() => {
                    field = Some(std::mem::take(&mut term));
                    continue;
                }
                '~' => {
                    slot = Slot::EditDistance;
                    edit_distance = Some(String::new());
                    continue;
                }
                '^' => {
                    slot = Slot::Boost;
                    boost = Some(String::new());
                    continue;
                }
                '*' if slot == Slot::Term => {
                    wildcard = true;
                    c
                }
                _ => c,
            }
        };
        match slot {
            Slot::Term => term.push(literal),
            Slot::EditDistance => edit_distance.get_or_insert_with(String::new).push(literal),
            Slot::Boost => boost.get_or_insert_with(String::new).push(literal),
        }
    }

    let fields = match &field {
        Some(name) => match Field::from_name(name) {
            Some(field) => vec![field],
            None => {
                return Err(QueryError::UnknownField {
                    field: name.clone(),
                    known: Field::ALL.map(Field::name).join(", "),
                })
            }
        },
        None => Vec::new(),
    };

    if term.is_empty() {
        return Err(match field {
            Some(name) => QueryError::MissingFieldTerm(name),
            None => QueryError::MissingTerm,
        });
    }

    let edit_distance = match edit_distance {
        Some(value) => leading_number(&value).ok_or(QueryError::InvalidEditDistance(value))?,
        None => 0,
    };
    let boost = match boost {
        Some(value) => leading_number(&value).ok_or(QueryError::InvalidBoost(value))? as f64,
        None => 1.0,
    };

    let terms = if wildcard {
        vec![term.to_lowercase()]
    } else {
        let analysed = tokenizer.analyze_query(&term);
        if analysed.is_empty() {
            // nothing left to look up; the clause can never match
            vec![String::new()]
        } else {
            analysed
        }
    };

    out.extend(terms.into_iter().map(|term| Clause {
        term,
        fields: fields.clone(),
        presence,
        boost,
        edit_distance,
        wildcard,
    }));
    Ok(())
}

/// Integer value of the leading decimal digits; `1.5` reads as 1
fn leading_number(value: &str) -> Option<u32> {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let digits = &value[..end];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(u32::MAX))
}

/// Match `term` against a pattern where `*` stands for any run of characters
pub fn wildcard_match(pattern: &str, term: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return pattern == term,
    };
    let Some(mut remaining) = term.strip_prefix(first) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}
