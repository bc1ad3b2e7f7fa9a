use crate::token::{Token, TokenKind};
use crate::ParseError;

/// Turn source text into a token sequence ending in a single `Eof` token.
///
/// The first lexical error fails the whole tokenization; there is no
/// recovery and no silently dropped input.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        lexer.skip_whitespace();
        let (line, column) = (lexer.line, lexer.column);
        if lexer.is_at_end() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
            return Ok(tokens);
        }
        let kind = lexer
            .scan_token()
            .map_err(|message| ParseError::new(message, line, column))?;
        tokens.push(Token { kind, line, column });
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    // Column of the next unconsumed character, 1-based, reset by newline.
    column: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume spaces, tabs, carriage returns, newlines, and `#` comments
    /// (which run up to but not including the next newline).
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn scan_token(&mut self) -> Result<TokenKind, String> {
        let c = self.advance();

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.identifier(c));
        }
        if c.is_ascii_digit() {
            return self.number(c);
        }

        match c {
            '"' => self.string(),
            '+' => Ok(TokenKind::Plus),
            '-' => Ok(TokenKind::Minus),
            '*' => Ok(TokenKind::Star),
            '/' => Ok(TokenKind::Slash),
            ',' => Ok(TokenKind::Comma),
            '(' => Ok(TokenKind::LParen),
            ')' => Ok(TokenKind::RParen),
            '<' => Ok(if self.match_char('=') {
                TokenKind::LessEq
            } else {
                TokenKind::Less
            }),
            '>' => Ok(if self.match_char('=') {
                TokenKind::GreaterEq
            } else {
                TokenKind::Greater
            }),
            // A bare '=' is not part of the language; equality is '=='.
            '=' => {
                if self.match_char('=') {
                    Ok(TokenKind::EqEq)
                } else {
                    Err("Unexpected character '='".to_owned())
                }
            }
            // Likewise '!' only occurs in '!='; negation is spelled 'not'.
            '!' => {
                if self.match_char('=') {
                    Ok(TokenKind::BangEq)
                } else {
                    Err("Unexpected character '!'".to_owned())
                }
            }
            other => Err(format!("Unexpected character '{other}'")),
        }
    }

    fn identifier(&mut self, first: char) -> TokenKind {
        let mut lexeme = String::from(first);
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            lexeme.push(self.advance());
        }
        TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Ident(lexeme))
    }

    fn number(&mut self, first: char) -> Result<TokenKind, String> {
        let mut lexeme = String::from(first);
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.advance());
        }

        // A '.' only continues the number when a digit follows, so "1."
        // lexes as the integer 1 and a stray '.'.
        let is_double =
            self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_double {
            lexeme.push(self.advance());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                lexeme.push(self.advance());
            }
            let value = lexeme
                .parse::<f64>()
                .map_err(|_| format!("Invalid numeric literal '{lexeme}'"))?;
            Ok(TokenKind::Float(value))
        } else {
            let value = lexeme
                .parse::<i64>()
                .map_err(|_| format!("Invalid numeric literal '{lexeme}'"))?;
            Ok(TokenKind::Int(value))
        }
    }

    fn string(&mut self) -> Result<TokenKind, String> {
        let mut content = String::new();
        loop {
            match self.peek() {
                None => return Err("Unterminated string".to_owned()),
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Str(content));
                }
                // Newlines are permitted inside string literals.
                Some(_) => content.push(self.advance()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize;
    use crate::token::TokenKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize should pass")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn keywords_identifiers_and_operators_lex() {
        assert_eq!(
            kinds("filter age >= 30"),
            vec![
                TokenKind::Filter,
                TokenKind::Ident("age".to_owned()),
                TokenKind::GreaterEq,
                TokenKind::Int(30),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_split_into_int_and_float() {
        assert_eq!(
            kinds("1 2.5 10.0"),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Float(10.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn a_dot_without_fraction_digits_stays_integer() {
        let err = tokenize("1.x").expect_err("stray dot must fail");
        assert_eq!(err.message, "Unexpected character '.'");
        assert_eq!((err.line, err.column), (1, 2));
    }

    #[test]
    fn strings_store_unquoted_content() {
        assert_eq!(
            kinds("from \"emp.csv\""),
            vec![
                TokenKind::From,
                TokenKind::Str("emp.csv".to_owned()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("# header comment\nselect name # trailing\n"),
            vec![
                TokenKind::Select,
                TokenKind::Ident("name".to_owned()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn positions_are_one_based_and_reset_per_line() {
        let tokens = tokenize("from \"a\"\n  filter x").expect("tokenize should pass");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 6));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 10));
    }

    #[test]
    fn unterminated_string_is_a_hard_failure() {
        let err = tokenize("write \"out.csv").expect_err("open string must fail");
        assert_eq!(err.message, "Unterminated string");
        assert_eq!((err.line, err.column), (1, 7));
    }

    #[test]
    fn bare_equals_and_bang_are_rejected() {
        let err = tokenize("filter a = 1").expect_err("bare '=' must fail");
        assert_eq!(err.message, "Unexpected character '='");
        assert_eq!((err.line, err.column), (1, 10));

        let err = tokenize("filter !a").expect_err("bare '!' must fail");
        assert_eq!(err.message, "Unexpected character '!'");
    }

    #[test]
    fn multiline_strings_advance_the_line_counter() {
        let tokens = tokenize("from \"a\nb\" filter x").expect("tokenize should pass");
        assert_eq!(tokens[1].kind, TokenKind::Str("a\nb".to_owned()));
        // The string token is located at its opening quote.
        assert_eq!((tokens[1].line, tokens[1].column), (1, 6));
        // Tokens after the embedded newline count from the new line.
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn last_token_is_always_eof() {
        let tokens = tokenize("").expect("empty source lexes");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
