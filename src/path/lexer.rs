//! Path Lexer
//!
//! Tokenizes the XPath subset used for field addresses:
//! `a/b`, `p:a[2]/@x`, `a/text()`, `.`.

/// Path token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DoubleDot,
    At,
    Star,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    /// Non-negative integer inside a positional predicate
    Number(usize),
    /// NCName or prefixed QName (`p:local`)
    Name(String),
    /// Any character the path grammar has no use for
    Unexpected(char),
    Eof,
}

impl Token {
    /// Token for a one-character punctuator
    fn punctuator(c: char) -> Option<Token> {
        Some(match c {
            '@' => Token::At,
            '*' => Token::Star,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            _ => return None,
        })
    }
}

/// Path lexer over one expression
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume the longest run of chars satisfying `pred`, returning it
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Byte offset of the next token, for error messages
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next_token(&mut self) -> Token {
        self.take_while(char::is_whitespace);
        let Some(c) = self.peek() else {
            return Token::Eof;
        };

        if let Some(token) = Token::punctuator(c) {
            self.pos += 1;
            return token;
        }
        match c {
            '/' | '.' => {
                self.pos += 1;
                let doubled = self.peek() == Some(c);
                if doubled {
                    self.pos += 1;
                }
                match (c, doubled) {
                    ('/', false) => Token::Slash,
                    ('/', true) => Token::DoubleSlash,
                    (_, false) => Token::Dot,
                    (_, true) => Token::DoubleDot,
                }
            }
            c if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_digit());
                digits.parse().map(Token::Number).unwrap_or(Token::Unexpected(c))
            }
            c if is_name_start_char(c) => self.read_name(),
            other => {
                self.pos += other.len_utf8();
                Token::Unexpected(other)
            }
        }
    }

    /// An NCName, optionally followed by `:NCName`
    fn read_name(&mut self) -> Token {
        let start = self.pos;
        self.take_while(is_name_char);
        let prefixed = self
            .rest()
            .strip_prefix(':')
            .and_then(|r| r.chars().next())
            .is_some_and(is_name_start_char);
        if prefixed {
            self.pos += 1;
            self.take_while(is_name_char);
        }
        Token::Name(self.input[start..self.pos].to_string())
    }

    /// All tokens, ending with `Eof`
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_path() {
        let tokens = Lexer::new("a/b/text()").tokenize();
        assert_eq!(
            tokens,
            vec![
                Token::Name("a".into()),
                Token::Slash,
                Token::Name("b".into()),
                Token::Slash,
                Token::Name("text".into()),
                Token::LeftParen,
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_prefixed_position_attribute() {
        let tokens = Lexer::new("p:item[2]/@p:id").tokenize();
        assert_eq!(
            tokens,
            vec![
                Token::Name("p:item".into()),
                Token::LeftBracket,
                Token::Number(2),
                Token::RightBracket,
                Token::Slash,
                Token::At,
                Token::Name("p:id".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_dot_and_double_slash() {
        let tokens = Lexer::new(".//x").tokenize();
        assert_eq!(
            tokens,
            vec![Token::Dot, Token::DoubleSlash, Token::Name("x".into()), Token::Eof]
        );
    }

    #[test]
    fn test_hyphenated_name() {
        let tokens = Lexer::new("first-name").tokenize();
        assert_eq!(tokens[0], Token::Name("first-name".into()));
    }

    #[test]
    fn test_unexpected() {
        let tokens = Lexer::new("a=b").tokenize();
        assert_eq!(tokens[1], Token::Unexpected('='));
    }
}
