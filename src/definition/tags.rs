//! Tag selector expressions used by hooks (`@smoke and not @slow`).

use std::fmt;

use super::{DefinitionError, Result};

/// Deepest `not`/parenthesis nesting a selector may use.
const MAX_NESTING: usize = 64;

/// Parsed tag selector. An empty source selects every scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagExpression {
    /// Matches everything.
    Any,
    /// Matches scenarios carrying this tag (including the leading `@`).
    Tag(String),
    /// Negation.
    Not(Box<TagExpression>),
    /// Both sides must match.
    And(Box<TagExpression>, Box<TagExpression>),
    /// Either side must match.
    Or(Box<TagExpression>, Box<TagExpression>),
}

impl TagExpression {
    /// Parse a selector. Precedence is `not` > `and` > `or`.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source);
        if tokens.is_empty() {
            return Ok(TagExpression::Any);
        }
        let mut parser = TagParser {
            source,
            tokens,
            index: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(&format!("unexpected token '{}'", token)));
        }
        Ok(expr)
    }

    /// Evaluate against a scenario's tags.
    pub fn matches<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        match self {
            TagExpression::Any => true,
            TagExpression::Tag(tag) => tags.iter().any(|t| t.as_ref() == tag.as_str()),
            TagExpression::Not(inner) => !inner.matches(tags),
            TagExpression::And(lhs, rhs) => lhs.matches(tags) && rhs.matches(tags),
            TagExpression::Or(lhs, rhs) => lhs.matches(tags) || rhs.matches(tags),
        }
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpression::Any => Ok(()),
            TagExpression::Tag(tag) => write!(f, "{}", tag),
            TagExpression::Not(inner) => write!(f, "not {}", inner),
            TagExpression::And(lhs, rhs) => write!(f, "({} and {})", lhs, rhs),
            TagExpression::Or(lhs, rhs) => write!(f, "({} or {})", lhs, rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::Word(word) => write!(f, "{}", word),
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for ch in source.chars() {
        match ch {
            '(' | ')' => {
                flush_word(&mut word, &mut tokens);
                tokens.push(if ch == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush_word(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush_word(&mut word, &mut tokens);
    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>) {
    if !word.is_empty() {
        tokens.push(Token::Word(std::mem::take(word)));
    }
}

struct TagParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl TagParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word == keyword => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> Result<TagExpression> {
        let mut expr = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            expr = TagExpression::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<TagExpression> {
        let mut expr = self.parse_not()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_not()?;
            expr = TagExpression::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<TagExpression> {
        let mut negations = 0;
        while self.eat_keyword("not") {
            negations += 1;
            if self.depth + negations > MAX_NESTING {
                return Err(self.error("expression is nested too deeply"));
            }
        }
        self.depth += negations;
        let mut expr = self.parse_primary()?;
        self.depth -= negations;
        for _ in 0..negations {
            expr = TagExpression::Not(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<TagExpression> {
        match self.next() {
            Some(Token::Open) => {
                if self.depth >= MAX_NESTING {
                    return Err(self.error("expression is nested too deeply"));
                }
                self.depth += 1;
                let expr = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::Close) => Ok(expr),
                    _ => Err(self.error("unbalanced parenthesis")),
                }
            }
            Some(Token::Word(word)) if word.starts_with('@') && word.len() > 1 => {
                Ok(TagExpression::Tag(word))
            }
            Some(token) => Err(self.error(&format!("expected a tag, found '{}'", token))),
            None => Err(self.error("unexpected end of tag expression")),
        }
    }

    fn error(&self, message: &str) -> DefinitionError {
        DefinitionError::Format {
            line: self.source.to_string(),
            message: format!("invalid tag expression: {}", message),
        }
    }
}
