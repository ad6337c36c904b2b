//! Path Parser
//!
//! Recursive descent over the lexer's tokens producing location steps with
//! prefixes still unresolved. Only the child axis, the attribute axis,
//! `text()`, `.` and positional predicates are part of the grammar.

use super::lexer::{Lexer, Token};
use crate::error::{OxmError, Result};
use crate::qname::split_prefixed;

/// What a location step selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Element,
    Attribute,
    Text,
    SelfNode,
}

/// Location step with its prefix not yet bound to a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub prefix: Option<String>,
    pub local: String,
    /// 1-based positional predicate
    pub position: Option<usize>,
}

impl Step {
    fn new(kind: StepKind, name: &str) -> Self {
        let (prefix, local) = split_prefixed(name);
        Step {
            kind,
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            position: None,
        }
    }
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn error(&self, reason: impl Into<String>) -> OxmError {
        OxmError::InvalidPath {
            path: self.expr.to_string(),
            reason: reason.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.next();
        if token == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", expected, token)))
        }
    }

    fn parse_path(&mut self) -> Result<Vec<Step>> {
        if *self.peek() == Token::Slash || *self.peek() == Token::DoubleSlash {
            return Err(self.error("absolute paths are not supported in field addresses"));
        }
        let mut steps = vec![self.parse_step()?];
        loop {
            match self.next() {
                Token::Eof => break,
                Token::Slash => steps.push(self.parse_step()?),
                Token::DoubleSlash => {
                    return Err(self.error("the descendant axis is not supported"));
                }
                other => return Err(self.error(format!("unexpected {:?}", other))),
            }
        }
        self.validate(&steps)?;
        Ok(steps)
    }

    fn parse_step(&mut self) -> Result<Step> {
        match self.next() {
            Token::Dot => Ok(Step::new(StepKind::SelfNode, ".")),
            Token::At => match self.next() {
                Token::Name(name) => Ok(Step::new(StepKind::Attribute, &name)),
                other => Err(self.error(format!("expected attribute name, found {:?}", other))),
            },
            Token::Name(name) => {
                if *self.peek() == Token::LeftParen {
                    self.next();
                    self.expect(Token::RightParen)?;
                    if name == "text" {
                        return Ok(Step::new(StepKind::Text, "text()"));
                    }
                    return Err(self.error(format!("unsupported node test {}()", name)));
                }
                let mut step = Step::new(StepKind::Element, &name);
                if *self.peek() == Token::LeftBracket {
                    self.next();
                    match self.next() {
                        Token::Number(n) if n >= 1 => step.position = Some(n),
                        other => {
                            return Err(self.error(format!(
                                "only positional predicates [n >= 1] are supported, found {:?}",
                                other
                            )))
                        }
                    }
                    self.expect(Token::RightBracket)?;
                }
                Ok(step)
            }
            Token::Eof => Err(self.error("empty step")),
            other => Err(self.error(format!("unexpected {:?}", other))),
        }
    }

    /// Attribute and text steps may only end a path; `.` may only stand alone
    fn validate(&self, steps: &[Step]) -> Result<()> {
        let last = steps.len() - 1;
        for (i, step) in steps.iter().enumerate() {
            match step.kind {
                StepKind::Attribute | StepKind::Text if i != last => {
                    return Err(self.error("attribute and text() steps must be last"));
                }
                StepKind::SelfNode if steps.len() > 1 && i != 0 => {
                    return Err(self.error("'.' is only allowed as the first step"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Parse a field address into location steps
pub fn parse(expr: &str) -> Result<Vec<Step>> {
    let mut parser = Parser {
        expr,
        tokens: Lexer::new(expr).tokenize(),
        pos: 0,
    };
    let mut steps = parser.parse_path()?;
    // a leading "./" adds nothing
    if steps.len() > 1 && steps[0].kind == StepKind::SelfNode {
        steps.remove(0);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_path() {
        let steps = parse("name/text()").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind, StepKind::Element);
        assert_eq!(steps[0].local, "name");
        assert_eq!(steps[1].kind, StepKind::Text);
    }

    #[test]
    fn test_parse_prefixed_position() {
        let steps = parse("e:phone[2]/@e:type").unwrap();
        assert_eq!(steps[0].prefix.as_deref(), Some("e"));
        assert_eq!(steps[0].position, Some(2));
        assert_eq!(steps[1].kind, StepKind::Attribute);
        assert_eq!(steps[1].local, "type");
    }

    #[test]
    fn test_parse_self() {
        let steps = parse(".").unwrap();
        assert_eq!(steps[0].kind, StepKind::SelfNode);
        let steps = parse("./a").unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].local, "a");
    }

    #[test]
    fn test_reject_unsupported() {
        assert!(parse("/a").is_err());
        assert!(parse("a//b").is_err());
        assert!(parse("@a/b").is_err());
        assert!(parse("a[@k='v']").is_err());
        assert!(parse("a[0]").is_err());
        assert!(parse("comment()").is_err());
        assert!(parse("").is_err());
    }
}
